//! Input format detection and parser dispatch.
//!
//! Formats are tried in a fixed priority: Markdown, JSON, then delimited text.
//! Markdown goes first because pipe-table lines would otherwise pass the
//! delimited check with `|` as the delimiter.

use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::delimited::{self, DelimitedTableParser};
use crate::diagnostics::ParseError;
use crate::json_table::{self, JsonTableParser};
use crate::markdown::{self, MarkdownTableParser};
use crate::result::{ParseOptions, ParseResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    Markdown,
    Json,
    Csv,
    Unknown,
}

impl InputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputFormat::Markdown => "markdown",
            InputFormat::Json => "json",
            InputFormat::Csv => "csv",
            InputFormat::Unknown => "unknown",
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parser that can also cheaply decide whether it recognises an input.
pub trait TableParser {
    fn format(&self) -> InputFormat;
    fn quick_check(&self, text: &str) -> bool;
    fn parse(&self, text: &str) -> ParseResult;
}

impl TableParser for MarkdownTableParser {
    fn format(&self) -> InputFormat {
        InputFormat::Markdown
    }

    fn quick_check(&self, text: &str) -> bool {
        markdown::looks_like_markdown(text)
    }

    fn parse(&self, text: &str) -> ParseResult {
        MarkdownTableParser::parse(self, text)
    }
}

impl TableParser for JsonTableParser {
    fn format(&self) -> InputFormat {
        InputFormat::Json
    }

    fn quick_check(&self, text: &str) -> bool {
        json_table::looks_like_json(text)
    }

    fn parse(&self, text: &str) -> ParseResult {
        JsonTableParser::parse(self, text)
    }
}

impl TableParser for DelimitedTableParser {
    fn format(&self) -> InputFormat {
        InputFormat::Csv
    }

    fn quick_check(&self, text: &str) -> bool {
        delimited::looks_delimited(text)
    }

    fn parse(&self, text: &str) -> ParseResult {
        DelimitedTableParser::parse(self, text)
    }
}

pub struct FormatDetector {
    parsers: Vec<Box<dyn TableParser>>,
}

impl Default for FormatDetector {
    fn default() -> Self {
        Self::with_options(ParseOptions::default())
    }
}

impl FormatDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ParseOptions) -> Self {
        Self {
            parsers: vec![
                Box::new(MarkdownTableParser::with_options(options)),
                Box::new(JsonTableParser::with_options(options)),
                Box::new(DelimitedTableParser::with_options(options)),
            ],
        }
    }

    fn first_match(&self, text: &str) -> Option<&dyn TableParser> {
        if text.trim().is_empty() {
            return None;
        }
        self.parsers
            .iter()
            .map(|parser| parser.as_ref())
            .find(|parser| parser.quick_check(text))
    }

    pub fn detect(&self, text: &str) -> InputFormat {
        let format = self
            .first_match(text)
            .map(|parser| parser.format())
            .unwrap_or(InputFormat::Unknown);
        debug!("Detected input format: {format}");
        format
    }

    /// Detects the format and parses with the matching parser.
    pub fn parse(&self, text: &str) -> (InputFormat, ParseResult) {
        match self.first_match(text) {
            Some(parser) => (parser.format(), parser.parse(text)),
            None => (InputFormat::Unknown, unknown_format_result(text)),
        }
    }

    /// Parses with the parser for `format`, skipping detection.
    pub fn parse_as(&self, format: InputFormat, text: &str) -> ParseResult {
        match self.parsers.iter().find(|parser| parser.format() == format) {
            Some(parser) => parser.parse(text),
            None => unknown_format_result(text),
        }
    }
}

fn unknown_format_result(text: &str) -> ParseResult {
    let error = if text.trim().is_empty() {
        ParseError::empty_table("Input is empty")
    } else {
        ParseError::format_error("Could not recognise the input as Markdown, JSON, or CSV")
            .with_suggestion("Paste a Markdown pipe table, a JSON array, or delimited text")
    };
    ParseResult::failed(error, None)
}

pub fn detect(text: &str) -> InputFormat {
    FormatDetector::new().detect(text)
}

pub fn parse_text(text: &str) -> (InputFormat, ParseResult) {
    FormatDetector::new().parse(text)
}
