//! Parse diagnostics.
//!
//! Parsers accumulate [`ParseError`] values instead of failing. Only
//! [`ParseErrorKind::EmptyTable`] and an unrecoverable
//! [`ParseErrorKind::FormatError`] short-circuit a parse to an empty result.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ParseErrorKind {
    MalformedRow,
    ColumnMismatch,
    EmptyTable,
    InvalidSeparator,
    FormatError,
}

impl ParseErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseErrorKind::MalformedRow => "malformed_row",
            ParseErrorKind::ColumnMismatch => "column_mismatch",
            ParseErrorKind::EmptyTable => "empty_table",
            ParseErrorKind::InvalidSeparator => "invalid_separator",
            ParseErrorKind::FormatError => "format_error",
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, ParseErrorKind::EmptyTable | ParseErrorKind::FormatError)
    }
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// 1-based line in the original input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            line: None,
            raw: None,
            suggestion: None,
        }
    }

    pub fn empty_table(message: impl Into<String>) -> Self {
        Self::new(ParseErrorKind::EmptyTable, message)
    }

    pub fn format_error(message: impl Into<String>) -> Self {
        Self::new(ParseErrorKind::FormatError, message)
    }

    pub fn malformed_row(message: impl Into<String>) -> Self {
        Self::new(ParseErrorKind::MalformedRow, message)
    }

    pub fn invalid_separator(message: impl Into<String>) -> Self {
        Self::new(ParseErrorKind::InvalidSeparator, message)
    }

    /// Diagnostic for a data row whose cell count differs from the header.
    pub fn column_mismatch(row: usize, found: usize, expected: usize) -> Self {
        let adjustment = if found > expected {
            "extra cells were discarded"
        } else {
            "missing cells were filled with empty values"
        };
        Self::new(
            ParseErrorKind::ColumnMismatch,
            format!("Row {row} has {found} column(s), expected {expected}; {adjustment}"),
        )
        .with_suggestion("Check for unescaped delimiters or missing cells in this row")
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = Some(raw.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}
