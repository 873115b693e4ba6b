use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::detect::InputFormat;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Turn pasted Markdown, JSON, or delimited tables into SQL INSERT statements",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the detected format of the input (markdown, json, csv, unknown)
    Detect(DetectArgs),
    /// Parse the input into typed rows and report diagnostics
    Parse(ParseArgs),
    /// Derive a column mapping file from the input headers
    Mapping(MappingArgs),
    /// List required destination columns that the mapping does not supply
    Missing(MissingArgs),
    /// Compile the input and a mapping file into INSERT statements
    Compile(CompileArgs),
}

#[derive(Debug, Clone, Args)]
pub struct InputArgs {
    /// Input file containing the pasted text (`-` reads stdin)
    #[arg(short = 'i', long = "input", default_value = "-")]
    pub input: PathBuf,
    /// Character encoding of the input (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Parse as this format instead of detecting it
    #[arg(long = "format", value_enum, default_value_t = FormatChoice::Auto)]
    pub format: FormatChoice,
    /// Delimiter for csv input (',', 'tab', ';', '|'); implies `--format csv`
    #[arg(long = "delimiter", value_parser = parse_delimiter)]
    pub delimiter: Option<char>,
    /// Preview values kept per column in the parse metadata
    #[arg(long = "samples", default_value_t = crate::result::DEFAULT_SAMPLE_LIMIT)]
    pub samples: usize,
}

impl InputArgs {
    /// The format to parse as instead of detecting one.
    pub fn forced_format(&self) -> Result<Option<InputFormat>> {
        match (self.format.forced(), self.delimiter) {
            (Some(format), Some(_)) if format != InputFormat::Csv => {
                bail!("--delimiter only applies to csv input, not {format}")
            }
            (None, Some(_)) => Ok(Some(InputFormat::Csv)),
            (forced, _) => Ok(forced),
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
#[value(rename_all = "kebab-case")]
pub enum FormatChoice {
    #[default]
    Auto,
    Markdown,
    Json,
    Csv,
}

impl FormatChoice {
    pub fn forced(self) -> Option<InputFormat> {
        match self {
            FormatChoice::Auto => None,
            FormatChoice::Markdown => Some(InputFormat::Markdown),
            FormatChoice::Json => Some(InputFormat::Json),
            FormatChoice::Csv => Some(InputFormat::Csv),
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
#[value(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Json,
    Table,
    Csv,
}

#[derive(Debug, Args)]
pub struct DetectArgs {
    #[command(flatten)]
    pub input: InputArgs,
}

#[derive(Debug, Args)]
pub struct ParseArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Rendering of the parse result
    #[arg(long = "output-format", value_enum, default_value_t = OutputFormat::Json)]
    pub output_format: OutputFormat,
    /// Output file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Rows shown by the table preview
    #[arg(long = "preview-rows", default_value_t = 20)]
    pub preview_rows: usize,
}

#[derive(Debug, Args)]
pub struct MappingArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Destination mapping file (.yml/.yaml or .json); stdout if omitted
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Assign every column to this destination table
    #[arg(short = 't', long = "table")]
    pub table: Option<String>,
    /// Schema snapshot used to match columns by name similarity
    #[arg(short = 's', long = "schema", requires = "table")]
    pub schema: Option<PathBuf>,
    /// Minimum similarity for automatic column matching
    #[arg(long = "min-confidence", default_value_t = 0.6)]
    pub min_confidence: f64,
}

#[derive(Debug, Args)]
pub struct MissingArgs {
    /// Mapping file to check
    #[arg(short = 'm', long = "mapping")]
    pub mapping: PathBuf,
    /// Schema snapshot describing the destination tables
    #[arg(short = 's', long = "schema")]
    pub schema: PathBuf,
    /// Write the missing columns back into the mapping file for editing
    #[arg(long = "update")]
    pub update: bool,
}

#[derive(Debug, Args)]
pub struct CompileArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Mapping file produced by `mapping`
    #[arg(short = 'm', long = "mapping")]
    pub mapping: PathBuf,
    /// Schema snapshot; when given, required columns must be resolved first
    #[arg(short = 's', long = "schema")]
    pub schema: Option<PathBuf>,
    /// Output SQL file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Reject table and column names that are not plain identifiers
    #[arg(long = "strict-identifiers")]
    pub strict_identifiers: bool,
}

pub fn parse_delimiter(value: &str) -> Result<char, String> {
    match value {
        "tab" | "\t" => Ok('\t'),
        "comma" | "," => Ok(','),
        "pipe" | "|" => Ok('|'),
        "semicolon" | ";" => Ok(';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if first == '"' || first.is_alphanumeric() {
                return Err(format!("'{first}' cannot be used as a delimiter"));
            }
            Ok(first)
        }
    }
}
