//! `detect` and `parse` commands, plus the input loading they share with the
//! mapping and compile commands.

use anyhow::{Context, Result, bail};
use log::{info, warn};

use crate::{
    cli::{DetectArgs, InputArgs, OutputFormat, ParseArgs},
    delimited::DelimitedTableParser,
    detect::{FormatDetector, InputFormat},
    io_utils,
    result::{ParseOptions, ParseResult},
    table,
};

/// Reads, detects (unless forced), and parses the input.
pub fn load_input(args: &InputArgs) -> Result<(InputFormat, ParseResult)> {
    let forced = args.forced_format()?;
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let text = io_utils::read_input(&args.input, encoding)
        .with_context(|| format!("Reading input {:?}", args.input))?;
    let options = ParseOptions {
        sample_limit: args.samples,
    };
    let (format, result) = match (forced, args.delimiter) {
        (Some(InputFormat::Csv), Some(delimiter)) => (
            InputFormat::Csv,
            DelimitedTableParser::with_options(options)
                .with_delimiter(delimiter)
                .parse(&text),
        ),
        (Some(format), _) => (
            format,
            FormatDetector::with_options(options).parse_as(format, &text),
        ),
        (None, _) => FormatDetector::with_options(options).parse(&text),
    };
    info!(
        "Parsed '{}' as {format}: {} row(s), {} column(s)",
        args.input.display(),
        result.metadata.row_count,
        result.metadata.column_count
    );
    report_diagnostics(&result);
    Ok((format, result))
}

/// Like [`load_input`] but refuses results that carry a fatal diagnostic.
pub fn load_table(args: &InputArgs) -> Result<ParseResult> {
    let (format, result) = load_input(args)?;
    if let Some(fatal) = result.errors.iter().find(|err| err.kind.is_fatal()) {
        bail!("Input could not be parsed as {format}: {}", fatal.message);
    }
    Ok(result)
}

pub fn report_diagnostics(result: &ParseResult) {
    for err in &result.errors {
        match err.line {
            Some(line) => warn!("line {line}: {err}"),
            None => warn!("{err}"),
        }
    }
}

pub fn execute_detect(args: &DetectArgs) -> Result<()> {
    let encoding = io_utils::resolve_encoding(args.input.input_encoding.as_deref())?;
    let text = io_utils::read_input(&args.input.input, encoding)
        .with_context(|| format!("Reading input {:?}", args.input.input))?;
    let format = match args.input.forced_format()? {
        Some(forced) => forced,
        None => FormatDetector::new().detect(&text),
    };
    println!("{format}");
    Ok(())
}

pub fn execute_parse(args: &ParseArgs) -> Result<()> {
    let (_, result) = load_input(&args.input)?;
    let output = args.output.as_deref();
    match args.output_format {
        OutputFormat::Json => {
            let rendered =
                serde_json::to_string_pretty(&result).context("Serializing parse result")?;
            io_utils::write_output(output, &rendered)?;
        }
        OutputFormat::Table => {
            let mut rendered = table::render_parse_result(&result, args.preview_rows);
            if !result.errors.is_empty() {
                rendered.push('\n');
                rendered.push_str(&table::render_diagnostics(&result));
            }
            io_utils::write_output(output, &rendered)?;
        }
        OutputFormat::Csv => {
            let writer = io_utils::open_output(output)?;
            io_utils::write_csv(writer, &result)?;
        }
    }
    Ok(())
}
