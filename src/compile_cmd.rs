use anyhow::{Context, Result};
use log::info;

use crate::{
    cli::CompileArgs,
    io_utils,
    mapping::MappingConfig,
    mapping_cmd, parse_cmd,
    schema::{self, SchemaCache, SchemaSnapshot},
    sql::{CompileOptions, SqlCompiler},
};

pub fn execute(args: &CompileArgs) -> Result<()> {
    let result = parse_cmd::load_table(&args.input)?;
    let mut config = MappingConfig::load(&args.mapping)?;

    if let Some(schema_path) = &args.schema {
        let mut cache = SchemaCache::new(SchemaSnapshot::load(schema_path)?);
        let missing = mapping_cmd::resolve_missing(&config, &mut cache)?;
        for table_name in config.target_tables() {
            schema::ensure_resolved(&table_name, &missing)?;
        }
        config.missing_values = missing;
    }

    let options = CompileOptions {
        strict_identifiers: args.strict_identifiers,
    };
    let sql = SqlCompiler::from_config(&config)
        .with_options(options)
        .compile(&result)
        .context("Compiling INSERT statements")?;
    io_utils::write_output(args.output.as_deref(), &sql)?;
    info!(
        "Compiled {} row(s) into {} statement(s)",
        result.rows.len(),
        sql.matches("INSERT INTO").count()
    );
    Ok(())
}
