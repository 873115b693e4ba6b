//! Detects, parses, and compiles pasted tabular text into SQL.
//!
//! The pipeline is `raw text → detect → parse → ParseResult → mapping →
//! INSERT statements`. Every stage is a pure function over in-memory input;
//! the database itself is left to the caller.

pub mod cli;
pub mod compile_cmd;
pub mod delimited;
pub mod detect;
pub mod diagnostics;
pub mod infer;
pub mod io_utils;
pub mod json_table;
pub mod mapping;
pub mod mapping_cmd;
pub mod markdown;
pub mod parse_cmd;
pub mod result;
pub mod schema;
pub mod sql;
pub mod table;
pub mod value;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::{LevelFilter, debug};

use crate::cli::{Cli, Commands};

pub use crate::detect::{FormatDetector, InputFormat, detect, parse_text};
pub use crate::diagnostics::{ParseError, ParseErrorKind};
pub use crate::mapping::{ColumnMapping, MappingConfig, SmartLink};
pub use crate::result::{ParseResult, Record};
pub use crate::schema::MissingColumnValue;
pub use crate::sql::{SqlCompiler, compile_sql};
pub use crate::value::TypedValue;

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sqlpaste", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    debug!("Running {:?}", cli.command);
    match cli.command {
        Commands::Detect(args) => parse_cmd::execute_detect(&args),
        Commands::Parse(args) => parse_cmd::execute_parse(&args),
        Commands::Mapping(args) => mapping_cmd::execute_mapping(&args),
        Commands::Missing(args) => mapping_cmd::execute_missing(&args),
        Commands::Compile(args) => compile_cmd::execute(&args),
    }
}
