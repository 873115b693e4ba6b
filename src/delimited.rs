//! Delimiter-separated text (CSV-like) parsing.
//!
//! The delimiter is sniffed from the first non-blank line. Fields are split by
//! a single-pass scanner that honours CSV double quotes and keeps JSON-like
//! fragments (`[...]`, `{...}`) intact even when they contain the delimiter.

use log::debug;

use crate::diagnostics::ParseError;
use crate::result::{ParseOptions, ParseResult, SourceFormat, TableBuilder, unique_headers};

/// Candidate delimiters in tie-break order: the earliest wins on equal counts.
pub const DELIMITER_CANDIDATES: [char; 4] = [',', '\t', ';', '|'];
pub const DEFAULT_DELIMITER: char = ',';
const CONSISTENT_ROW_THRESHOLD_PERCENT: usize = 80;

/// Returns the candidate with the most occurrences in `line` and its count,
/// or `None` when no candidate occurs.
pub fn sniff_delimiter(line: &str) -> Option<(char, usize)> {
    let mut best: Option<(char, usize)> = None;
    for candidate in DELIMITER_CANDIDATES {
        let count = line.matches(candidate).count();
        if count > best.map_or(0, |(_, c)| c) {
            best = Some((candidate, count));
        }
    }
    best
}

pub fn printable_delimiter(delimiter: char) -> String {
    match delimiter {
        '\t' => "\\t".to_string(),
        other => other.to_string(),
    }
}

/// Splits one line into raw fields.
///
/// A delimiter only ends a field outside double quotes and outside any
/// bracketed fragment. `""` inside quotes is an escaped quote. The final field
/// is always emitted, even when empty.
pub fn split_fields(line: &str, delimiter: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut in_fragment_string = false;
    let mut square_depth = 0usize;
    let mut curly_depth = 0usize;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        if square_depth > 0 || curly_depth > 0 {
            current.push(ch);
            if in_fragment_string {
                match ch {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            current.push(escaped);
                        }
                    }
                    '"' => in_fragment_string = false,
                    _ => {}
                }
                continue;
            }
            match ch {
                '"' => in_fragment_string = true,
                '[' => square_depth += 1,
                ']' => square_depth = square_depth.saturating_sub(1),
                '{' => curly_depth += 1,
                '}' => curly_depth = curly_depth.saturating_sub(1),
                _ => {}
            }
            continue;
        }

        if in_quotes {
            if ch == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(ch);
            }
            continue;
        }

        if ch == delimiter {
            fields.push(current.trim().to_string());
            current.clear();
            continue;
        }
        match ch {
            '"' => in_quotes = true,
            '[' => {
                square_depth += 1;
                current.push(ch);
            }
            '{' => {
                curly_depth += 1;
                current.push(ch);
            }
            _ => current.push(ch),
        }
    }
    fields.push(current.trim().to_string());
    fields
}

fn non_blank_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| (idx + 1, line))
}

/// Heuristic used by format detection: a sniffed delimiter splits the first
/// line into several fields, at least one of them non-empty, and at least 80%
/// of lines agree on that width.
pub fn looks_delimited(text: &str) -> bool {
    let lines: Vec<&str> = non_blank_lines(text).map(|(_, line)| line).collect();
    let Some(first) = lines.first() else {
        return false;
    };
    let Some((delimiter, count)) = sniff_delimiter(first) else {
        return false;
    };
    let header = split_fields(first, delimiter);
    let width = header.len();
    if count == 0 || width <= 1 || header.iter().all(|field| field.is_empty()) {
        return false;
    }
    let consistent = lines
        .iter()
        .filter(|line| split_fields(line, delimiter).len() == width)
        .count();
    consistent * 100 >= lines.len() * CONSISTENT_ROW_THRESHOLD_PERCENT
}

#[derive(Debug, Clone, Default)]
pub struct DelimitedTableParser {
    options: ParseOptions,
    delimiter: Option<char>,
}

impl DelimitedTableParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ParseOptions) -> Self {
        Self {
            options,
            delimiter: None,
        }
    }

    /// Forces a delimiter instead of sniffing one.
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    pub fn parse(&self, text: &str) -> ParseResult {
        let mut lines = non_blank_lines(text);
        let Some((header_line_no, header_line)) = lines.next() else {
            return ParseResult::failed(
                ParseError::empty_table("Input does not contain any delimited rows"),
                None,
            );
        };

        let delimiter = self.delimiter.unwrap_or_else(|| {
            sniff_delimiter(header_line)
                .map(|(delimiter, _)| delimiter)
                .unwrap_or(DEFAULT_DELIMITER)
        });
        debug!(
            "Delimited header on line {header_line_no} using delimiter '{}'",
            printable_delimiter(delimiter)
        );

        let header_fields = split_fields(header_line, delimiter);
        if header_fields.iter().all(|field| field.is_empty()) {
            return ParseResult::failed(
                ParseError::format_error(format!(
                    "No header fields found on line {header_line_no}"
                ))
                .at_line(header_line_no)
                .with_raw(header_line)
                .with_suggestion("Put the column names on the first line"),
                Some(SourceFormat::Delimited { delimiter }),
            );
        }
        let mut builder = TableBuilder::new(unique_headers(header_fields));

        for (row_number, (line_no, line)) in lines.enumerate() {
            builder.push_cells(split_fields(line, delimiter), row_number + 1, line_no);
        }

        builder.finish(SourceFormat::Delimited { delimiter }, None, &self.options)
    }
}
