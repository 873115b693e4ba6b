//! Markdown table parsing.
//!
//! Only pipe tables are parsed. Grid tables (`+---+---+`) and minimal,
//! pipe-less tables are recognised and answered with a single `format_error`
//! so callers can tell the user what to convert.

use std::sync::OnceLock;

use anyhow::{Result, bail};
use log::debug;
use regex::Regex;

use crate::diagnostics::{ParseError, ParseErrorKind};
use crate::result::{
    MarkdownVariant, ParseOptions, ParseResult, SourceFormat, TableBuilder, unique_headers,
};

fn separator_cell_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[-: ]+$").expect("separator pattern is valid"))
}

fn is_separator_cell(cell: &str) -> bool {
    separator_cell_pattern().is_match(cell)
}

/// A `|` line whose cells are all dashes, colons, spaces, or empty. A row of
/// nothing but empty cells is data, not a separator.
pub fn is_separator_row(line: &str) -> bool {
    if !line.contains('|') {
        return false;
    }
    let cells = split_row(line);
    cells
        .iter()
        .all(|cell| cell.is_empty() || is_separator_cell(cell))
        && cells.iter().any(|cell| !cell.is_empty())
}

/// Splits a pipe-table line into trimmed cells.
///
/// One leading and one trailing pipe are stripped first; `\|` is an escaped
/// pipe and stays inside the cell.
pub fn split_row(line: &str) -> Vec<String> {
    let mut body = line.trim();
    if let Some(rest) = body.strip_prefix('|') {
        body = rest;
    }
    if body.ends_with('|') && !body.ends_with("\\|") {
        body = &body[..body.len() - 1];
    }

    let mut cells = Vec::new();
    let mut current = String::new();
    let mut chars = body.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' if chars.peek() == Some(&'|') => {
                chars.next();
                current.push('|');
            }
            '|' => {
                cells.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    cells.push(current.trim().to_string());
    cells
}

fn classify(lines: &[(usize, &str)]) -> MarkdownVariant {
    let first = lines[0].1;
    if first.contains('+') && first.contains("--") {
        return MarkdownVariant::Grid;
    }
    if first.contains('|') {
        let has_separator = lines[1..].iter().any(|(_, line)| is_separator_row(line));
        let all_piped = lines
            .iter()
            .filter(|(_, line)| !line.is_empty())
            .all(|(_, line)| line.contains('|'));
        if has_separator || all_piped {
            return MarkdownVariant::Pipe;
        }
    }
    MarkdownVariant::Minimal
}

/// Format-detection heuristic: two or more lines, a pipe on the first, and a
/// parse that yields headers without malformed rows or an empty table.
pub fn looks_like_markdown(text: &str) -> bool {
    let mut non_blank = text.lines().map(str::trim).filter(|line| !line.is_empty());
    let Some(first) = non_blank.next() else {
        return false;
    };
    if !first.contains('|') || non_blank.next().is_none() {
        return false;
    }
    let result = MarkdownTableParser::new().parse(text);
    !result.headers.is_empty()
        && !result.has_error(ParseErrorKind::MalformedRow)
        && !result.has_error(ParseErrorKind::EmptyTable)
}

#[derive(Debug, Clone, Default)]
pub struct MarkdownTableParser {
    options: ParseOptions,
}

impl MarkdownTableParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ParseOptions) -> Self {
        Self { options }
    }

    pub fn parse(&self, text: &str) -> ParseResult {
        match self.try_parse(text) {
            Ok(result) => result,
            Err(err) => ParseResult::failed(
                ParseError::format_error(format!("Failed to parse Markdown table: {err:#}")),
                None,
            ),
        }
    }

    fn try_parse(&self, text: &str) -> Result<ParseResult> {
        // (1-based line number, trimmed line), starting at the first non-blank line
        let lines: Vec<(usize, &str)> = text
            .lines()
            .enumerate()
            .map(|(idx, line)| (idx + 1, line.trim()))
            .skip_while(|(_, line)| line.is_empty())
            .collect();
        let lines = trim_trailing_blank(lines);
        if lines.is_empty() {
            return Ok(ParseResult::failed(
                ParseError::empty_table("Input does not contain a Markdown table"),
                None,
            ));
        }

        let variant = classify(&lines);
        debug!("Markdown table classified as {variant:?}");
        match variant {
            MarkdownVariant::Pipe => self.parse_pipe(&lines),
            MarkdownVariant::Grid => Ok(unsupported(
                variant,
                "Grid Markdown tables are not supported",
                "Convert the table to pipe syntax: | a | b | followed by | --- | --- |",
            )),
            MarkdownVariant::Minimal => Ok(unsupported(
                variant,
                "Minimal Markdown tables without pipes are not supported",
                "Add leading and trailing pipes to each row",
            )),
        }
    }

    fn parse_pipe(&self, lines: &[(usize, &str)]) -> Result<ParseResult> {
        let separator_idx = lines
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, (_, line))| is_separator_row(line))
            .map(|(idx, _)| idx);

        let mut errors = Vec::new();
        let (header_idx, data_start) = match separator_idx {
            Some(idx) => (idx - 1, idx + 1),
            None => {
                errors.push(
                    ParseError::invalid_separator(
                        "No separator row found; treating the first line as the header",
                    )
                    .at_line(lines[0].0 + 1)
                    .with_suggestion("Add a separator row such as | --- | --- | below the header"),
                );
                (0, 1)
            }
        };

        let (header_line_no, header_line) = lines[header_idx];
        if !header_line.contains('|') {
            bail!("header on line {header_line_no} does not contain any pipes");
        }
        let header_cells: Vec<String> = split_row(header_line)
            .into_iter()
            .filter(|cell| cell.is_empty() || !is_separator_cell(cell))
            .collect();
        if header_cells.iter().all(|cell| cell.is_empty()) {
            return Ok(ParseResult::failed(
                ParseError::empty_table("Markdown table header has no columns")
                    .at_line(header_line_no)
                    .with_raw(header_line),
                Some(SourceFormat::Markdown {
                    variant: MarkdownVariant::Pipe,
                }),
            ));
        }

        let mut builder = TableBuilder::new(unique_headers(header_cells));
        builder.extend_errors(errors);

        let mut row_number = 0;
        for &(line_no, line) in &lines[data_start..] {
            if line.is_empty() || is_separator_row(line) {
                continue;
            }
            row_number += 1;
            builder.push_cells(split_row(line), row_number, line_no);
        }
        debug!(
            "Parsed {row_number} Markdown row(s) across {} column(s)",
            builder.header_count()
        );

        Ok(builder.finish(
            SourceFormat::Markdown {
                variant: MarkdownVariant::Pipe,
            },
            Some(separator_idx.is_some()),
            &self.options,
        ))
    }
}

fn trim_trailing_blank(mut lines: Vec<(usize, &str)>) -> Vec<(usize, &str)> {
    while lines.last().is_some_and(|(_, line)| line.is_empty()) {
        lines.pop();
    }
    lines
}

fn unsupported(variant: MarkdownVariant, message: &str, suggestion: &str) -> ParseResult {
    ParseResult::failed(
        ParseError::format_error(message).with_suggestion(suggestion),
        Some(SourceFormat::Markdown { variant }),
    )
}
