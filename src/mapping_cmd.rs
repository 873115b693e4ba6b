//! `mapping` and `missing` commands.

use anyhow::{Context, Result};
use log::info;

use crate::{
    cli::{MappingArgs, MissingArgs},
    io_utils,
    mapping::{self, MappingConfig},
    parse_cmd,
    schema::{self, MissingColumnValue, SchemaCache, SchemaSnapshot, SchemaSource},
    table,
};

pub fn execute_mapping(args: &MappingArgs) -> Result<()> {
    let result = parse_cmd::load_table(&args.input)?;
    let mut config = MappingConfig::from_parse_result(&result);

    if let Some(table_name) = &args.table {
        match &args.schema {
            Some(schema_path) => {
                let mut cache = SchemaCache::new(SchemaSnapshot::load(schema_path)?);
                let columns = cache.columns(table_name)?.to_vec();
                let assigned = mapping::auto_map(
                    &mut config.mappings,
                    table_name,
                    &columns,
                    args.min_confidence,
                );
                info!(
                    "Matched {assigned} of {} column(s) to '{table_name}'",
                    config.mappings.len()
                );
                config.missing_values =
                    schema::find_missing_columns(table_name, &columns, &config.mappings);
            }
            None => mapping::assign_table(&mut config.mappings, table_name),
        }
    }

    match &args.output {
        Some(path) if !io_utils::is_dash(path) => {
            config.save(path)?;
            info!(
                "Mapping for {} column(s) written to {:?}",
                config.mappings.len(),
                path
            );
        }
        _ => {
            let rendered = serde_yaml::to_string(&config).context("Serializing mapping")?;
            io_utils::write_output(None, &rendered)?;
        }
    }
    Ok(())
}

/// Missing columns for every destination table of `config`, carrying over
/// values already present in the file.
pub fn resolve_missing<S: SchemaSource>(
    config: &MappingConfig,
    cache: &mut SchemaCache<S>,
) -> Result<Vec<MissingColumnValue>> {
    let mut resolved = Vec::new();
    for table_name in config.target_tables() {
        let columns = cache
            .columns(&table_name)
            .with_context(|| format!("Looking up columns of '{table_name}'"))?;
        let missing = schema::find_missing_columns(&table_name, columns, &config.mappings);
        resolved.extend(schema::apply_supplied_values(
            missing,
            &config.missing_values,
        ));
    }
    Ok(resolved)
}

pub fn execute_missing(args: &MissingArgs) -> Result<()> {
    let mut config = MappingConfig::load(&args.mapping)?;
    let mut cache = SchemaCache::new(SchemaSnapshot::load(&args.schema)?);
    let missing = resolve_missing(&config, &mut cache)?;

    if missing.is_empty() {
        println!("No required columns are missing.");
    } else {
        let headers = ["table", "column", "type", "source", "value"]
            .iter()
            .map(|h| h.to_string())
            .collect::<Vec<_>>();
        let rows = missing
            .iter()
            .map(|entry| {
                vec![
                    entry.table.clone(),
                    entry.column.clone(),
                    entry.data_type.clone(),
                    entry.source.as_str().to_string(),
                    entry.value.clone().unwrap_or_default(),
                ]
            })
            .collect::<Vec<_>>();
        print!("{}", table::render_table(&headers, &rows));
    }
    let unresolved = missing.iter().filter(|entry| !entry.is_resolved()).count();
    info!(
        "{} missing column(s), {unresolved} without a value",
        missing.len()
    );

    if args.update {
        config.missing_values = missing;
        config.save(&args.mapping)?;
        info!("Updated {:?} with missing column entries", args.mapping);
    }
    Ok(())
}
