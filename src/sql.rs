//! Compiles a parsed table and its mappings into `INSERT` statements.
//!
//! All SQL is produced as literal text. Values are escaped; table and column
//! identifiers are interpolated as given (columns are double-quoted) unless
//! strict identifier checking is enabled, so mapping targets must come from a
//! trusted source.

use std::{str::FromStr, sync::OnceLock};

use itertools::Itertools;
use log::debug;
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::mapping::{ColumnMapping, MappingConfig, SmartLink};
use crate::result::{ParseResult, Record};
use crate::schema::MissingColumnValue;
use crate::value::{TypedValue, ValueKind};

pub const NO_ACTIVE_MAPPINGS_COMMENT: &str =
    "-- No columns are mapped to a destination table; nothing to insert.";

const TRUTHY_TOKENS: &[&str] = &["true", "1", "yes", "t", "y"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompileError {
    #[error("Unsafe SQL identifier '{0}': expected letters, digits, and underscores")]
    UnsafeIdentifier(String),
}

/// Formatting family of a destination column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Json,
    Numeric,
    Boolean,
    Text,
}

impl SqlType {
    /// Classifies a database type name such as `bigint`, `jsonb`, or `text[]`.
    pub fn classify(type_name: &str) -> Self {
        const NUMERIC_PREFIXES: &[&str] = &[
            "int", "smallint", "bigint", "tinyint", "mediumint", "numeric", "decimal", "real",
            "double", "float", "serial", "bigserial", "smallserial", "number",
        ];
        let lowered = type_name.trim().to_ascii_lowercase();
        if lowered.ends_with("[]") || lowered.starts_with("json") || lowered.contains("array") {
            SqlType::Json
        } else if lowered == "bool" || lowered == "boolean" {
            SqlType::Boolean
        } else if lowered.starts_with("interval") {
            SqlType::Text
        } else if NUMERIC_PREFIXES
            .iter()
            .any(|prefix| lowered.starts_with(prefix))
        {
            SqlType::Numeric
        } else {
            SqlType::Text
        }
    }

    pub fn from_kind(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Number => SqlType::Numeric,
            ValueKind::Boolean => SqlType::Boolean,
            ValueKind::Json => SqlType::Json,
            ValueKind::Null | ValueKind::Date | ValueKind::String => SqlType::Text,
        }
    }
}

/// Single-quoted SQL string literal with embedded quotes doubled.
pub fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn safe_identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
            .expect("identifier pattern is valid")
    })
}

pub fn is_safe_identifier(name: &str) -> bool {
    safe_identifier_pattern().is_match(name)
}

/// Renders one value as a SQL literal for a destination of type `sql_type`.
///
/// Null, empty, and the literal text `null` become `NULL`. Numeric targets
/// that do not coerce also become `NULL`; boolean targets accept
/// `true`/`1`/`yes`/`t`/`y` as true and anything else as false.
pub fn format_value(value: &TypedValue, sql_type: SqlType) -> String {
    if value.is_blank() {
        return "NULL".to_string();
    }
    match sql_type {
        SqlType::Json => quote_literal(&json_text(value)),
        SqlType::Numeric => numeric_literal(value).unwrap_or_else(|| "NULL".to_string()),
        SqlType::Boolean => {
            let lowered = value.as_display().trim().to_ascii_lowercase();
            if TRUTHY_TOKENS.contains(&lowered.as_str()) {
                "true".to_string()
            } else {
                "false".to_string()
            }
        }
        SqlType::Text => quote_literal(&value.as_display()),
    }
}

fn json_text(value: &TypedValue) -> String {
    let parsed = match value {
        TypedValue::Boolean(b) => JsonValue::Bool(*b),
        TypedValue::Number(n) => serde_json::Number::from_f64(*n)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        TypedValue::Null => JsonValue::Null,
        TypedValue::Date(text) | TypedValue::String(text) => {
            let trimmed = text.trim();
            serde_json::from_str::<JsonValue>(trimmed)
                .ok()
                .or_else(|| repair_json_array(trimmed))
                .unwrap_or_else(|| JsonValue::String(text.clone()))
        }
    };
    parsed.to_string()
}

/// Best-effort repair of bracket syntax with unquoted items, e.g.
/// `[red, green, 3]` becomes `["red","green",3]`.
pub fn repair_json_array(text: &str) -> Option<JsonValue> {
    let inner = text.strip_prefix('[')?.strip_suffix(']')?;
    let items = inner
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            serde_json::from_str::<JsonValue>(token).unwrap_or_else(|_| {
                let unquoted = token.trim_matches(|c| c == '"' || c == '\'');
                JsonValue::String(unquoted.to_string())
            })
        })
        .collect();
    Some(JsonValue::Array(items))
}

fn numeric_literal(value: &TypedValue) -> Option<String> {
    match value {
        TypedValue::Number(n) if n.is_finite() => Some(value.as_display()),
        TypedValue::Number(_) | TypedValue::Null => None,
        TypedValue::Boolean(b) => Some(if *b { "1" } else { "0" }.to_string()),
        TypedValue::Date(text) | TypedValue::String(text) => {
            let trimmed = text.trim();
            Decimal::from_str(trimmed)
                .or_else(|_| Decimal::from_scientific(trimmed))
                .map(|decimal| decimal.to_string())
                .ok()
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CompileOptions {
    /// Reject table and column names that are not plain identifiers.
    pub strict_identifiers: bool,
}

pub struct SqlCompiler<'a> {
    mappings: &'a [ColumnMapping],
    smart_links: &'a [SmartLink],
    missing_values: &'a [MissingColumnValue],
    options: CompileOptions,
}

impl<'a> SqlCompiler<'a> {
    pub fn new(mappings: &'a [ColumnMapping]) -> Self {
        Self {
            mappings,
            smart_links: &[],
            missing_values: &[],
            options: CompileOptions::default(),
        }
    }

    pub fn from_config(config: &'a MappingConfig) -> Self {
        Self::new(&config.mappings)
            .with_smart_links(&config.smart_links)
            .with_missing_values(&config.missing_values)
    }

    pub fn with_smart_links(mut self, smart_links: &'a [SmartLink]) -> Self {
        self.smart_links = smart_links;
        self
    }

    pub fn with_missing_values(mut self, missing_values: &'a [MissingColumnValue]) -> Self {
        self.missing_values = missing_values;
        self
    }

    pub fn with_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    /// One `INSERT` per destination table, separated by a blank line.
    ///
    /// Returns an empty string when there are no rows or no mappings, and a
    /// SQL comment when no mapping is active.
    pub fn compile(&self, result: &ParseResult) -> Result<String, CompileError> {
        if result.rows.is_empty() || self.mappings.is_empty() {
            return Ok(String::new());
        }
        let active: Vec<&ColumnMapping> = self
            .mappings
            .iter()
            .filter(|mapping| mapping.is_active())
            .collect();
        if active.is_empty() {
            return Ok(NO_ACTIVE_MAPPINGS_COMMENT.to_string());
        }

        let tables = active
            .iter()
            .filter_map(|mapping| mapping.target_table.as_deref())
            .unique()
            .collect::<Vec<_>>();
        let statements = tables
            .iter()
            .map(|table| self.compile_table(table, &active, &result.rows))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(
            "Compiled {} INSERT statement(s) for {} row(s)",
            statements.len(),
            result.rows.len()
        );
        Ok(statements.join("\n\n"))
    }

    fn compile_table(
        &self,
        table: &str,
        active: &[&ColumnMapping],
        rows: &[Record],
    ) -> Result<String, CompileError> {
        let mappings: Vec<&ColumnMapping> = active
            .iter()
            .copied()
            .filter(|mapping| mapping.target_table.as_deref() == Some(table))
            .collect();
        let fill_ins: Vec<(&MissingColumnValue, &str)> = self
            .missing_values
            .iter()
            .filter(|missing| missing.table == table)
            .filter_map(|missing| missing.resolved_value().map(|value| (missing, value)))
            .collect();

        if self.options.strict_identifiers {
            self.check_identifiers(table, &mappings, &fill_ins)?;
        }

        let columns = mappings
            .iter()
            .map(|mapping| mapping.target_column.as_str())
            .chain(fill_ins.iter().map(|(missing, _)| missing.column.as_str()))
            .map(|column| format!("\"{column}\""))
            .join(", ");

        let value_rows = rows
            .iter()
            .map(|row| {
                let values = mappings
                    .iter()
                    .map(|mapping| self.compile_cell(table, mapping, row))
                    .chain(fill_ins.iter().map(|(missing, value)| {
                        format_value(
                            &TypedValue::String((*value).to_string()),
                            SqlType::classify(&missing.data_type),
                        )
                    }))
                    .join(", ");
                format!("({values})")
            })
            .join(",\n  ");

        Ok(format!("INSERT INTO {table} ({columns}) VALUES\n  {value_rows};"))
    }

    fn compile_cell(&self, table: &str, mapping: &ColumnMapping, row: &Record) -> String {
        let value = row
            .get(&mapping.source_column)
            .cloned()
            .unwrap_or(TypedValue::Null);

        if let Some(link) = self
            .smart_links
            .iter()
            .find(|link| link.applies_to(table, &mapping.target_column))
        {
            if value.is_blank() {
                return "NULL".to_string();
            }
            return format!(
                "(SELECT {} FROM {} WHERE {} = {} LIMIT 1)",
                link.foreign_key,
                link.foreign_table,
                link.lookup_column(),
                quote_literal(&value.as_display())
            );
        }

        let sql_type = match (&mapping.target_type, mapping.source_type) {
            (Some(declared), _) => SqlType::classify(declared),
            (None, ValueKind::Null) => SqlType::from_kind(value.kind()),
            (None, inferred) => SqlType::from_kind(inferred),
        };
        format_value(&value, sql_type)
    }

    fn check_identifiers(
        &self,
        table: &str,
        mappings: &[&ColumnMapping],
        fill_ins: &[(&MissingColumnValue, &str)],
    ) -> Result<(), CompileError> {
        let link_names = self
            .smart_links
            .iter()
            .filter(|link| {
                mappings
                    .iter()
                    .any(|mapping| link.applies_to(table, &mapping.target_column))
            })
            .flat_map(|link| {
                [
                    link.foreign_table.as_str(),
                    link.foreign_key.as_str(),
                    link.lookup_column(),
                ]
            });
        let names = std::iter::once(table)
            .chain(mappings.iter().map(|mapping| mapping.target_column.as_str()))
            .chain(fill_ins.iter().map(|(missing, _)| missing.column.as_str()))
            .chain(link_names);
        for name in names {
            if !is_safe_identifier(name) {
                return Err(CompileError::UnsafeIdentifier(name.to_string()));
            }
        }
        Ok(())
    }
}

/// Compiles with everything in `config` and default options.
pub fn compile_sql(result: &ParseResult, config: &MappingConfig) -> Result<String, CompileError> {
    SqlCompiler::from_config(config).compile(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{ParseOptions, SourceFormat, TableBuilder};

    fn table(headers: &[&str], rows: &[&[&str]]) -> ParseResult {
        let mut builder = TableBuilder::new(headers.iter().map(|h| h.to_string()).collect());
        for (idx, row) in rows.iter().enumerate() {
            builder.push_cells(row.iter().map(|c| c.to_string()).collect(), idx + 1, idx + 2);
        }
        builder.finish(
            SourceFormat::Delimited { delimiter: ',' },
            None,
            &ParseOptions::default(),
        )
    }

    #[test]
    fn classify_recognises_type_families() {
        assert_eq!(SqlType::classify("BIGINT"), SqlType::Numeric);
        assert_eq!(SqlType::classify("numeric(10,2)"), SqlType::Numeric);
        assert_eq!(SqlType::classify("double precision"), SqlType::Numeric);
        assert_eq!(SqlType::classify("jsonb"), SqlType::Json);
        assert_eq!(SqlType::classify("text[]"), SqlType::Json);
        assert_eq!(SqlType::classify("ARRAY"), SqlType::Json);
        assert_eq!(SqlType::classify("boolean"), SqlType::Boolean);
        assert_eq!(SqlType::classify("interval"), SqlType::Text);
        assert_eq!(SqlType::classify("timestamp with time zone"), SqlType::Text);
    }

    #[test]
    fn format_value_nulls() {
        for value in [
            TypedValue::Null,
            TypedValue::String(String::new()),
            TypedValue::String("null".into()),
        ] {
            assert_eq!(format_value(&value, SqlType::Text), "NULL");
            assert_eq!(format_value(&value, SqlType::Numeric), "NULL");
        }
    }

    #[test]
    fn format_value_escapes_single_quotes() {
        let value = TypedValue::String("O'Brien'; DROP TABLE x; --".into());
        assert_eq!(
            format_value(&value, SqlType::Text),
            "'O''Brien''; DROP TABLE x; --'"
        );
    }

    #[test]
    fn format_value_numeric_coercion() {
        assert_eq!(format_value(&TypedValue::Number(42.0), SqlType::Numeric), "42");
        assert_eq!(
            format_value(&TypedValue::String("12.50".into()), SqlType::Numeric),
            "12.50"
        );
        assert_eq!(
            format_value(&TypedValue::String("abc".into()), SqlType::Numeric),
            "NULL"
        );
        assert_eq!(format_value(&TypedValue::Boolean(true), SqlType::Numeric), "1");
    }

    #[test]
    fn format_value_boolean_vocabulary() {
        for token in ["true", "1", "YES", "t", "y"] {
            let value = TypedValue::String(token.into());
            assert_eq!(format_value(&value, SqlType::Boolean), "true", "{token}");
        }
        assert_eq!(format_value(&TypedValue::Number(1.0), SqlType::Boolean), "true");
        assert_eq!(
            format_value(&TypedValue::String("no".into()), SqlType::Boolean),
            "false"
        );
        assert_eq!(format_value(&TypedValue::Boolean(false), SqlType::Boolean), "false");
    }

    #[test]
    fn format_value_json_reserializes_and_repairs() {
        assert_eq!(
            format_value(&TypedValue::String(r#"{ "a" : "it's" }"#.into()), SqlType::Json),
            r#"'{"a":"it''s"}'"#
        );
        assert_eq!(
            format_value(&TypedValue::String("[red, 'green', 3]".into()), SqlType::Json),
            r#"'["red","green",3]'"#
        );
        assert_eq!(
            format_value(&TypedValue::String("plain".into()), SqlType::Json),
            r#"'"plain"'"#
        );
    }

    #[test]
    fn smart_link_compiles_to_subselect() {
        let mut result = table(&["id"], &[]);
        result.rows = vec![Record::from_cells(
            &["id".to_string()],
            vec![TypedValue::String("5".into())],
        )];
        let mappings = vec![ColumnMapping::new("id", "user_id").to_table("orders")];
        let links = vec![SmartLink::new("user_id", "users", "id")];
        let sql = SqlCompiler::new(&mappings)
            .with_smart_links(&links)
            .compile(&result)
            .unwrap();
        assert_eq!(
            sql,
            "INSERT INTO orders (\"user_id\") VALUES\n  ((SELECT id FROM users WHERE id = '5' LIMIT 1));"
        );
    }

    #[test]
    fn smart_link_with_blank_value_is_null() {
        let result = table(&["email", "n"], &[&["", "1"]]);
        let mappings = vec![
            ColumnMapping::new("email", "user_id").to_table("orders"),
            ColumnMapping::new("n", "n").to_table("orders"),
        ];
        let links = vec![SmartLink::new("user_id", "users", "id").lookup_by("email")];
        let sql = SqlCompiler::new(&mappings)
            .with_smart_links(&links)
            .compile(&result)
            .unwrap();
        assert!(sql.ends_with("(NULL, 1);"), "{sql}");
    }

    #[test]
    fn statements_per_table_with_missing_values() {
        let result = table(&["name", "qty", "sku"], &[&["Ann", "2", "A1"], &["Bo", "x", "B2"]]);
        let mappings = vec![
            ColumnMapping::new("name", "name").to_table("customers"),
            ColumnMapping::new("qty", "quantity")
                .to_table("items")
                .with_target_type("integer"),
            ColumnMapping::new("sku", "sku").to_table("items"),
        ];
        let missing = vec![
            MissingColumnValue {
                table: "customers".into(),
                column: "active".into(),
                data_type: "boolean".into(),
                value: Some("yes".into()),
                source: Default::default(),
                foreign_key_table: None,
                foreign_key_column: None,
            },
            MissingColumnValue {
                table: "items".into(),
                column: "warehouse".into(),
                data_type: "text".into(),
                value: None,
                source: Default::default(),
                foreign_key_table: None,
                foreign_key_column: None,
            },
        ];
        let sql = SqlCompiler::new(&mappings)
            .with_missing_values(&missing)
            .compile(&result)
            .unwrap();
        assert_eq!(
            sql,
            "INSERT INTO customers (\"name\", \"active\") VALUES\n  ('Ann', true),\n  ('Bo', true);\n\n\
             INSERT INTO items (\"quantity\", \"sku\") VALUES\n  (2, 'A1'),\n  (NULL, 'B2');"
        );
    }

    #[test]
    fn empty_inputs_and_inactive_mappings() {
        let result = table(&["a"], &[&["1"]]);
        assert_eq!(SqlCompiler::new(&[]).compile(&result).unwrap(), "");

        let empty = table(&["a"], &[]);
        let mappings = vec![ColumnMapping::new("a", "a").to_table("t")];
        assert_eq!(SqlCompiler::new(&mappings).compile(&empty).unwrap(), "");

        let unassigned = vec![ColumnMapping::new("a", "a")];
        assert_eq!(
            SqlCompiler::new(&unassigned).compile(&result).unwrap(),
            NO_ACTIVE_MAPPINGS_COMMENT
        );
    }

    #[test]
    fn inferred_source_type_drives_formatting() {
        let result = table(&["n", "flag", "label"], &[&["7", "true", "x"]]);
        let mappings = vec![
            ColumnMapping::new("n", "n")
                .to_table("t")
                .with_source_type(ValueKind::Number),
            ColumnMapping::new("flag", "flag").to_table("t"),
            ColumnMapping::new("label", "label")
                .to_table("t")
                .with_source_type(ValueKind::String),
        ];
        let sql = SqlCompiler::new(&mappings).compile(&result).unwrap();
        assert!(sql.ends_with("(7, true, 'x');"), "{sql}");
    }

    #[test]
    fn strict_identifiers_reject_injection() {
        let result = table(&["a"], &[&["1"]]);
        let mappings = vec![ColumnMapping::new("a", "a").to_table("t; DROP TABLE users")];
        let strict = CompileOptions {
            strict_identifiers: true,
        };
        assert_eq!(
            SqlCompiler::new(&mappings).with_options(strict).compile(&result),
            Err(CompileError::UnsafeIdentifier("t; DROP TABLE users".into()))
        );
        let ok = vec![ColumnMapping::new("a", "a").to_table("public.t")];
        assert!(
            SqlCompiler::new(&ok)
                .with_options(strict)
                .compile(&result)
                .is_ok()
        );
    }
}
