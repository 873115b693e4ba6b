//! Typed cell values shared by every parser and by the SQL compiler.
//!
//! A [`TypedValue`] is the result of running a raw cell through type inference.
//! Rows never hold open-ended dynamic data: JSON arrays and objects are carried
//! as their serialized JSON text inside [`TypedValue::String`].

use std::fmt;

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Null,
    Boolean(bool),
    Number(f64),
    /// ISO-8601 date or date-time, stored as text.
    Date(String),
    String(String),
}

/// Coarse type of a value or a whole column, used for mapping hints and
/// SQL formatting when no destination type is declared.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    #[default]
    Null,
    Boolean,
    Number,
    Date,
    String,
    Json,
}

impl TypedValue {
    pub fn is_null(&self) -> bool {
        matches!(self, TypedValue::Null)
    }

    /// True for values the compiler treats as SQL `NULL`.
    pub fn is_blank(&self) -> bool {
        match self {
            TypedValue::Null => true,
            TypedValue::String(s) => is_blank_text(s),
            _ => false,
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            TypedValue::Null => ValueKind::Null,
            TypedValue::Boolean(_) => ValueKind::Boolean,
            TypedValue::Number(_) => ValueKind::Number,
            TypedValue::Date(_) => ValueKind::Date,
            TypedValue::String(s) if looks_like_json_container(s) => ValueKind::Json,
            TypedValue::String(_) => ValueKind::String,
        }
    }

    pub fn as_display(&self) -> String {
        match self {
            TypedValue::Null => String::new(),
            TypedValue::Boolean(b) => b.to_string(),
            TypedValue::Number(f) => format_number(*f),
            TypedValue::Date(s) | TypedValue::String(s) => s.clone(),
        }
    }

    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => TypedValue::Null,
            serde_json::Value::Bool(b) => TypedValue::Boolean(*b),
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => TypedValue::Number(f),
                None => TypedValue::String(n.to_string()),
            },
            serde_json::Value::String(s) => {
                if crate::infer::is_iso_date(s) {
                    TypedValue::Date(s.clone())
                } else {
                    TypedValue::String(s.clone())
                }
            }
            other => TypedValue::String(other.to_string()),
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl Serialize for TypedValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            TypedValue::Null => serializer.serialize_none(),
            TypedValue::Boolean(b) => serializer.serialize_bool(*b),
            TypedValue::Number(f) => serializer.serialize_f64(*f),
            TypedValue::Date(s) | TypedValue::String(s) => serializer.serialize_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for TypedValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = serde_json::Value::deserialize(deserializer)?;
        match raw {
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => Err(de::Error::custom(
                "nested values must be serialized to JSON text",
            )),
            other => Ok(TypedValue::from_json(&other)),
        }
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        (value as i64).to_string()
    } else {
        value.to_string()
    }
}

/// Empty after trimming, or the literal text `null`.
pub fn is_blank_text(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed == "null"
}

fn looks_like_json_container(value: &str) -> bool {
    let trimmed = value.trim();
    let bracketed = (trimmed.starts_with('[') && trimmed.ends_with(']'))
        || (trimmed.starts_with('{') && trimmed.ends_with('}'));
    bracketed && serde_json::from_str::<serde_json::Value>(trimmed).is_ok()
}

/// Parses the non-ISO date layouts recognised during inference.
pub fn parse_loose_date(value: &str) -> Result<NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y"];
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

/// Collapses the kinds observed in a column into a single kind.
///
/// Nulls are ignored; numbers mixed with anything else degrade to strings.
pub fn merge_kinds<I>(kinds: I) -> ValueKind
where
    I: IntoIterator<Item = ValueKind>,
{
    let mut merged = ValueKind::Null;
    for kind in kinds {
        merged = match (merged, kind) {
            (current, ValueKind::Null) => current,
            (ValueKind::Null, next) => next,
            (current, next) if current == next => current,
            _ => ValueKind::String,
        };
    }
    merged
}
