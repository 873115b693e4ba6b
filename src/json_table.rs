//! JSON and NDJSON table parsing.
//!
//! Accepts an array of objects, a single object, or newline-delimited JSON.
//! Nested objects are flattened into dotted column names; arrays and scalars
//! end the flattening and arrays are kept as JSON text.

use std::collections::{BTreeSet, HashMap};

use log::debug;
use serde_json::{Map, Value};

use crate::diagnostics::ParseError;
use crate::result::{JsonShape, ParseOptions, ParseResult, SourceFormat, TableBuilder};
use crate::value::TypedValue;

/// Flattens one object into `(dotted path, leaf)` pairs.
pub fn flatten_object(object: &Map<String, Value>) -> Vec<(String, &Value)> {
    let mut leaves = Vec::new();
    flatten_into(object, None, &mut leaves);
    leaves
}

fn flatten_into<'a>(
    object: &'a Map<String, Value>,
    prefix: Option<&str>,
    leaves: &mut Vec<(String, &'a Value)>,
) {
    for (key, value) in object {
        let path = match prefix {
            Some(prefix) => format!("{prefix}.{key}"),
            None => key.clone(),
        };
        match value {
            Value::Object(nested) if !nested.is_empty() => {
                flatten_into(nested, Some(&path), leaves)
            }
            leaf => leaves.push((path, leaf)),
        }
    }
}

fn is_structured(value: &Value) -> bool {
    matches!(value, Value::Array(_) | Value::Object(_))
}

/// Detection heuristic: the whole input is a JSON array or object, or most
/// non-blank lines are JSON objects/arrays on their own.
pub fn looks_like_json(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return is_structured(&value);
    }
    let lines: Vec<&str> = trimmed
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let parsed = lines
        .iter()
        .filter(|line| serde_json::from_str::<Value>(line).is_ok_and(|value| is_structured(&value)))
        .count();
    parsed > 0 && parsed * 2 > lines.len()
}

#[derive(Debug, Clone, Default)]
pub struct JsonTableParser {
    options: ParseOptions,
}

impl JsonTableParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ParseOptions) -> Self {
        Self { options }
    }

    pub fn parse(&self, text: &str) -> ParseResult {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return ParseResult::failed(
                ParseError::empty_table("Input does not contain any JSON"),
                None,
            );
        }

        match serde_json::from_str::<Value>(trimmed) {
            Ok(Value::Array(items)) => {
                let mut errors = Vec::new();
                let mut objects = Vec::with_capacity(items.len());
                for (idx, item) in items.into_iter().enumerate() {
                    match item {
                        Value::Object(object) => objects.push(object),
                        other => errors.push(
                            ParseError::malformed_row(format!(
                                "Array element {} is not an object and was skipped",
                                idx + 1
                            ))
                            .with_raw(other.to_string()),
                        ),
                    }
                }
                self.build(objects, errors, JsonShape::Array)
            }
            Ok(Value::Object(object)) => self.build(vec![object], Vec::new(), JsonShape::Object),
            Ok(_) => ParseResult::failed(
                ParseError::format_error("JSON input must be an array of objects or an object")
                    .with_suggestion("Wrap scalar values in an object such as {\"value\": 1}"),
                None,
            ),
            Err(_) if trimmed.contains('\n') => self.parse_ndjson(text),
            Err(err) => ParseResult::failed(
                ParseError::format_error(format!("Invalid JSON: {err}"))
                    .at_line(err.line())
                    .with_raw(trimmed),
                None,
            ),
        }
    }

    fn parse_ndjson(&self, text: &str) -> ParseResult {
        let mut errors = Vec::new();
        let mut objects = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let line_no = idx + 1;
            match serde_json::from_str::<Value>(line) {
                Ok(Value::Object(object)) => objects.push(object),
                Ok(_) => errors.push(
                    ParseError::malformed_row(format!(
                        "Line {line_no} is valid JSON but not an object and was skipped"
                    ))
                    .at_line(line_no)
                    .with_raw(line),
                ),
                Err(err) => errors.push(
                    ParseError::malformed_row(format!("Line {line_no} is not valid JSON: {err}"))
                        .at_line(line_no)
                        .with_raw(line),
                ),
            }
        }
        debug!(
            "NDJSON parsed {} object(s), {} line(s) rejected",
            objects.len(),
            errors.len()
        );
        if objects.is_empty() {
            return ParseResult::failed(
                ParseError::format_error("No line of the input could be parsed as a JSON object"),
                Some(SourceFormat::Json {
                    shape: JsonShape::Ndjson,
                }),
            );
        }
        self.build(objects, errors, JsonShape::Ndjson)
    }

    fn build(
        &self,
        objects: Vec<Map<String, Value>>,
        mut errors: Vec<ParseError>,
        shape: JsonShape,
    ) -> ParseResult {
        let mut flattened: Vec<HashMap<String, &Value>> = Vec::with_capacity(objects.len());
        for (idx, object) in objects.iter().enumerate() {
            let mut row = HashMap::new();
            for (path, leaf) in flatten_object(object) {
                if row.insert(path.clone(), leaf).is_some() {
                    errors.push(
                        ParseError::malformed_row(format!(
                            "Object {} has more than one value for column '{path}'; the last one was kept",
                            idx + 1
                        ))
                        .with_raw(Value::Object(object.clone()).to_string()),
                    );
                }
            }
            flattened.push(row);
        }
        let headers: Vec<String> = flattened
            .iter()
            .flat_map(|row| row.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if headers.is_empty() {
            let mut result = ParseResult::failed(
                ParseError::empty_table("JSON input does not contain any fields")
                    .with_suggestion("Provide objects with at least one key, such as [{\"id\": 1}]"),
                Some(SourceFormat::Json { shape }),
            );
            errors.append(&mut result.errors);
            result.errors = errors;
            return result;
        }

        let mut builder = TableBuilder::new(headers.clone());
        builder.extend_errors(errors);
        for row in &flattened {
            let values = headers
                .iter()
                .map(|header| {
                    row.get(header)
                        .map(|value| TypedValue::from_json(value))
                        .unwrap_or(TypedValue::Null)
                })
                .collect();
            builder.push_values(values);
        }
        builder.finish(SourceFormat::Json { shape }, None, &self.options)
    }
}
