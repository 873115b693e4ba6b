//! Elastic ASCII rendering for parse previews and CLI listings.

use std::borrow::Cow;
use std::fmt::Write as _;

use crate::result::ParseResult;
use crate::value::TypedValue;

const NULL_MARKER: &str = "∅";

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }
    for width in &mut widths {
        *width = (*width).max(3);
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let rule = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&rule, &widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

/// Preview of the first `limit` rows; nulls are shown as `∅`.
pub fn render_parse_result(result: &ParseResult, limit: usize) -> String {
    let rows = result
        .rows
        .iter()
        .take(limit)
        .map(|row| {
            row.values()
                .map(|value| match value {
                    TypedValue::Null => NULL_MARKER.to_string(),
                    other => other.as_display(),
                })
                .collect()
        })
        .collect::<Vec<Vec<String>>>();
    render_table(&result.headers, &rows)
}

/// One line per diagnostic: kind, optional line number, message.
pub fn render_diagnostics(result: &ParseResult) -> String {
    let headers = vec!["kind".to_string(), "line".to_string(), "message".to_string()];
    let rows = result
        .errors
        .iter()
        .map(|err| {
            vec![
                err.kind.to_string(),
                err.line.map(|line| line.to_string()).unwrap_or_default(),
                err.message.clone(),
            ]
        })
        .collect::<Vec<_>>();
    render_table(&headers, &rows)
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let cells = values
        .iter()
        .zip(widths)
        .map(|(value, width)| {
            let sanitized = sanitize_cell(value);
            let padding = width.saturating_sub(display_width(sanitized.as_ref()));
            format!("{sanitized}{}", " ".repeat(padding))
        })
        .collect::<Vec<_>>();
    cells.join("  ").trim_end().to_string()
}

fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            width += 1;
        }
    }
    width
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
