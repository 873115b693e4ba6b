//! Cell-level type inference shared by the Markdown and delimited parsers.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::value::{TypedValue, parse_loose_date};

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[-+]?(\d+(\.\d+)?|\.\d+)$").expect("number pattern is valid")
    })
}

fn iso_date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^(\d{4}-\d{2}-\d{2})([T ]\d{2}:\d{2}(:\d{2}(\.\d+)?)?(Z|[+-]\d{2}:?\d{2})?)?$",
        )
        .expect("iso date pattern is valid")
    })
}

fn loose_date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d{2}/\d{2}/\d{4}|\d{4}/\d{2}/\d{2}|\d{2}-\d{2}-\d{4})$")
            .expect("loose date pattern is valid")
    })
}

/// True when `value` is an ISO-8601 date or date-time with a real calendar date.
pub fn is_iso_date(value: &str) -> bool {
    iso_date_pattern()
        .captures(value)
        .and_then(|caps| caps.get(1))
        .is_some_and(|date| NaiveDate::parse_from_str(date.as_str(), "%Y-%m-%d").is_ok())
}

/// Converts a raw cell into a [`TypedValue`].
///
/// ISO dates are kept verbatim; `DD/MM/YYYY`, `YYYY/MM/DD` and `DD-MM-YYYY`
/// are rewritten as `YYYY-MM-DD`. Anything unrecognised stays a string.
pub fn infer_value(raw: &str) -> TypedValue {
    let value = raw.trim();
    if value.is_empty() {
        return TypedValue::Null;
    }
    if value.eq_ignore_ascii_case("true") {
        return TypedValue::Boolean(true);
    }
    if value.eq_ignore_ascii_case("false") {
        return TypedValue::Boolean(false);
    }
    if number_pattern().is_match(value) {
        if let Ok(number) = value.parse::<f64>() {
            return TypedValue::Number(number);
        }
    }
    if is_iso_date(value) {
        return TypedValue::Date(value.to_string());
    }
    if loose_date_pattern().is_match(value) {
        if let Ok(date) = parse_loose_date(value) {
            return TypedValue::Date(date.format("%Y-%m-%d").to_string());
        }
    }
    TypedValue::String(value.to_string())
}
