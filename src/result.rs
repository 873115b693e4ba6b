//! The uniform tabular shape every parser produces.

use std::collections::{BTreeMap, HashSet};

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::diagnostics::{ParseError, ParseErrorKind};
use crate::value::{TypedValue, ValueKind, merge_kinds};

pub const DEFAULT_SAMPLE_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Maximum number of non-null preview values kept per column.
    pub sample_limit: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            sample_limit: DEFAULT_SAMPLE_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MarkdownVariant {
    Pipe,
    Grid,
    Minimal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JsonShape {
    Array,
    Object,
    Ndjson,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum SourceFormat {
    Markdown { variant: MarkdownVariant },
    Json { shape: JsonShape },
    Delimited { delimiter: char },
}

/// One parsed row in header order. Every header is present; absent cells are
/// [`TypedValue::Null`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    cells: Vec<(String, TypedValue)>,
}

impl Record {
    pub fn from_cells(headers: &[String], values: Vec<TypedValue>) -> Self {
        let mut values = values.into_iter();
        let cells = headers
            .iter()
            .map(|name| (name.clone(), values.next().unwrap_or(TypedValue::Null)))
            .collect();
        Self { cells }
    }

    pub fn get(&self, column: &str) -> Option<&TypedValue> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn values(&self) -> impl Iterator<Item = &TypedValue> {
        self.cells.iter().map(|(_, value)| value)
    }
}

impl Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (name, value) in &self.cells {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct ParseMetadata {
    pub row_count: usize,
    pub column_count: usize,
    /// Only reported for Markdown input.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_separator_row: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_format: Option<SourceFormat>,
    pub sample_values: BTreeMap<String, Vec<TypedValue>>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct ParseResult {
    pub headers: Vec<String>,
    pub rows: Vec<Record>,
    pub errors: Vec<ParseError>,
    pub metadata: ParseMetadata,
}

impl ParseResult {
    /// Empty result carrying a single fatal diagnostic.
    pub fn failed(error: ParseError, source_format: Option<SourceFormat>) -> Self {
        Self {
            headers: Vec::new(),
            rows: Vec::new(),
            errors: vec![error],
            metadata: ParseMetadata {
                source_format,
                ..ParseMetadata::default()
            },
        }
    }

    pub fn has_error(&self, kind: ParseErrorKind) -> bool {
        self.errors.iter().any(|err| err.kind == kind)
    }

    pub fn error_count(&self, kind: ParseErrorKind) -> usize {
        self.errors.iter().filter(|err| err.kind == kind).count()
    }

    /// Values of one column in row order.
    pub fn column_values<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a TypedValue> {
        self.rows.iter().filter_map(move |row| row.get(column))
    }

    pub fn column_kind(&self, column: &str) -> ValueKind {
        merge_kinds(self.column_values(column).map(TypedValue::kind))
    }

    /// Rows rendered as display strings, aligned with `headers`.
    pub fn display_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| row.values().map(TypedValue::as_display).collect())
            .collect()
    }
}

/// Accumulates headers, typed cells, and diagnostics before producing a
/// [`ParseResult`] with its metadata.
#[derive(Debug, Default)]
pub(crate) struct TableBuilder {
    headers: Vec<String>,
    rows: Vec<Vec<TypedValue>>,
    errors: Vec<ParseError>,
}

impl TableBuilder {
    pub(crate) fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub(crate) fn header_count(&self) -> usize {
        self.headers.len()
    }

    pub(crate) fn extend_errors(&mut self, errors: impl IntoIterator<Item = ParseError>) {
        self.errors.extend(errors);
    }

    /// Adds a row of raw cells, truncating or padding to the header width and
    /// reporting a `column_mismatch` when the widths differ.
    pub(crate) fn push_cells(&mut self, mut cells: Vec<String>, row_number: usize, line: usize) {
        let expected = self.headers.len();
        if cells.len() != expected {
            self.errors.push(
                ParseError::column_mismatch(row_number, cells.len(), expected)
                    .at_line(line)
                    .with_raw(cells.join(" | ")),
            );
            cells.resize(expected, String::new());
        }
        let values = cells
            .iter()
            .map(|cell| crate::infer::infer_value(cell))
            .collect();
        self.rows.push(values);
    }

    pub(crate) fn push_values(&mut self, values: Vec<TypedValue>) {
        self.rows.push(values);
    }

    pub(crate) fn finish(
        self,
        source_format: SourceFormat,
        has_separator_row: Option<bool>,
        options: &ParseOptions,
    ) -> ParseResult {
        let mut sample_values: BTreeMap<String, Vec<TypedValue>> = BTreeMap::new();
        for (idx, header) in self.headers.iter().enumerate() {
            let samples = self
                .rows
                .iter()
                .filter_map(|row| row.get(idx))
                .filter(|value| !value.is_null())
                .take(options.sample_limit)
                .cloned()
                .collect();
            sample_values.insert(header.clone(), samples);
        }
        let rows: Vec<Record> = self
            .rows
            .into_iter()
            .map(|values| Record::from_cells(&self.headers, values))
            .collect();
        ParseResult {
            metadata: ParseMetadata {
                row_count: rows.len(),
                column_count: self.headers.len(),
                has_separator_row,
                source_format: Some(source_format),
                sample_values,
            },
            headers: self.headers,
            rows,
            errors: self.errors,
        }
    }
}

/// Makes header names non-empty and unique, preserving order.
///
/// Blank names become `field_N` (1-based position); repeats get a `_2`,
/// `_3`, ... suffix.
pub fn unique_headers<I>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    let mut headers = Vec::new();
    for (idx, name) in raw.into_iter().enumerate() {
        let base = match name.trim() {
            "" => format!("field_{}", idx + 1),
            trimmed => trimmed.to_string(),
        };
        let mut candidate = base.clone();
        let mut suffix = 2;
        while !seen.insert(candidate.clone()) {
            candidate = format!("{base}_{suffix}");
            suffix += 1;
        }
        headers.push(candidate);
    }
    headers
}
