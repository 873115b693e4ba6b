//! I/O helpers: input decoding, document files, and output sinks.
//!
//! - **Input**: a path or `-` for stdin, decoded with `encoding_rs` (UTF-8 by
//!   default, BOM-aware) into one in-memory string.
//! - **Documents**: mapping files and schema snapshots are YAML unless the
//!   extension is `.json`.
//! - **Output**: a path or stdout; parse results can be exported as CSV.

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};
use encoding_rs_io::DecodeReaderBytesBuilder;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::result::ParseResult;

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn decode_reader<R: Read>(reader: R, encoding: &'static Encoding) -> Result<String> {
    let mut decoder = DecodeReaderBytesBuilder::new()
        .encoding(Some(encoding))
        .bom_override(true)
        .build(reader);
    let mut text = String::new();
    decoder
        .read_to_string(&mut text)
        .with_context(|| format!("Decoding input as {}", encoding.name()))?;
    Ok(text)
}

/// Reads the whole input from `path` (or stdin for `-`).
pub fn read_input(path: &Path, encoding: &'static Encoding) -> Result<String> {
    if is_dash(path) {
        decode_reader(io::stdin().lock(), encoding)
    } else {
        let file = File::open(path).with_context(|| format!("Opening input file {path:?}"))?;
        decode_reader(BufReader::new(file), encoding)
    }
}

fn is_json_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context(|| format!("Opening {path:?}"))?;
    let reader = BufReader::new(file);
    if is_json_path(path) {
        serde_json::from_reader(reader).context("Parsing JSON document")
    } else {
        serde_yaml::from_reader(reader).context("Parsing YAML document")
    }
}

pub fn write_document<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Creating {path:?}"))?;
    let mut writer = BufWriter::new(file);
    if is_json_path(path) {
        serde_json::to_writer_pretty(&mut writer, value).context("Writing JSON document")?;
        writeln!(writer)?;
    } else {
        serde_yaml::to_writer(&mut writer, value).context("Writing YAML document")?;
    }
    writer.flush()?;
    Ok(())
}

pub fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    let writer: Box<dyn Write> = match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(io::stdout()),
    };
    Ok(writer)
}

pub fn write_output(path: Option<&Path>, contents: &str) -> Result<()> {
    let mut writer = open_output(path)?;
    writer.write_all(contents.as_bytes())?;
    if !contents.is_empty() && !contents.ends_with('\n') {
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes headers and display values of `result` as CSV.
pub fn write_csv<W: Write>(writer: W, result: &ParseResult) -> Result<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true)
        .from_writer(writer);
    csv_writer.write_record(&result.headers)?;
    for row in result.display_rows() {
        csv_writer.write_record(&row)?;
    }
    csv_writer.flush()?;
    Ok(())
}
