//! Destination schema snapshots and missing-column resolution.
//!
//! The live database is an external collaborator. This module only consumes
//! column descriptions through [`SchemaSource`], caches them explicitly in a
//! caller-owned [`SchemaCache`], and diffs them against the active mappings to
//! find required columns the pasted data does not supply.

use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::io_utils;
use crate::mapping::ColumnMapping;
use crate::value::is_blank_text;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Table '{0}' is not present in the schema")]
    UnknownTable(String),

    #[error("Table '{table}' has required column(s) without a value: {}", .columns.join(", "))]
    UnresolvedMissingColumns { table: String, columns: Vec<String> },
}

fn default_true() -> bool {
    true
}

/// One destination column as reported by the database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DestinationColumn {
    pub name: String,
    pub data_type: String,
    #[serde(default = "default_true")]
    pub is_nullable: bool,
    #[serde(default)]
    pub has_default: bool,
    #[serde(default)]
    pub is_auto_generated: bool,
    #[serde(default)]
    pub is_generated: bool,
    #[serde(default)]
    pub is_identity: bool,
    #[serde(default)]
    pub is_foreign_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key_table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key_column: Option<String>,
}

impl DestinationColumn {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            is_nullable: true,
            has_default: false,
            is_auto_generated: false,
            is_generated: false,
            is_identity: false,
            is_foreign_key: false,
            foreign_key_table: None,
            foreign_key_column: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.is_nullable = false;
        self
    }

    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.is_foreign_key = true;
        self.foreign_key_table = Some(table.into());
        self.foreign_key_column = Some(column.into());
        self
    }

    /// Not nullable, no default, and not filled in by the database.
    pub fn requires_value(&self) -> bool {
        !self.is_nullable
            && !self.has_default
            && !self.is_auto_generated
            && !self.is_generated
            && !self.is_identity
    }
}

/// Lookup of destination columns by table name.
pub trait SchemaSource {
    fn fetch_columns(&self, table: &str) -> Result<Vec<DestinationColumn>, SchemaError>;
}

/// A schema captured to a YAML or JSON file: table name to columns.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct SchemaSnapshot {
    pub tables: BTreeMap<String, Vec<DestinationColumn>>,
}

impl SchemaSnapshot {
    pub fn load(path: &Path) -> Result<Self> {
        io_utils::read_document(path).with_context(|| format!("Loading schema snapshot {path:?}"))
    }

    pub fn with_table(mut self, table: impl Into<String>, columns: Vec<DestinationColumn>) -> Self {
        self.tables.insert(table.into(), columns);
        self
    }
}

impl SchemaSource for SchemaSnapshot {
    fn fetch_columns(&self, table: &str) -> Result<Vec<DestinationColumn>, SchemaError> {
        self.tables
            .get(table)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownTable(table.to_string()))
    }
}

#[derive(Debug)]
struct CachedColumns {
    fetched_at: Instant,
    columns: Vec<DestinationColumn>,
}

/// Caller-owned cache in front of a [`SchemaSource`].
///
/// Entries live until [`SchemaCache::invalidate`]/[`SchemaCache::clear`] or,
/// when a TTL is configured, until they are older than the TTL.
#[derive(Debug)]
pub struct SchemaCache<S> {
    source: S,
    ttl: Option<Duration>,
    entries: HashMap<String, CachedColumns>,
}

impl<S: SchemaSource> SchemaCache<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            ttl: None,
            entries: HashMap::new(),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    fn is_fresh(&self, entry: &CachedColumns) -> bool {
        self.ttl.is_none_or(|ttl| entry.fetched_at.elapsed() < ttl)
    }

    pub fn columns(&mut self, table: &str) -> Result<&[DestinationColumn], SchemaError> {
        let stale = self
            .entries
            .get(table)
            .is_none_or(|entry| !self.is_fresh(entry));
        if stale {
            debug!("Fetching destination columns for '{table}'");
            let columns = self.source.fetch_columns(table)?;
            self.entries.insert(
                table.to_string(),
                CachedColumns {
                    fetched_at: Instant::now(),
                    columns,
                },
            );
        }
        Ok(self
            .entries
            .get(table)
            .map(|entry| entry.columns.as_slice())
            .unwrap_or_default())
    }

    pub fn invalidate(&mut self, table: &str) -> bool {
        self.entries.remove(table).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MissingValueSource {
    #[default]
    Literal,
    /// Chosen from the referenced table's keys.
    ForeignKey,
}

impl MissingValueSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissingValueSource::Literal => "literal",
            MissingValueSource::ForeignKey => "foreign_key",
        }
    }
}

/// A required destination column that no active mapping supplies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MissingColumnValue {
    pub table: String,
    pub column: String,
    pub data_type: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub source: MissingValueSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key_table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key_column: Option<String>,
}

impl MissingColumnValue {
    pub fn from_column(table: &str, column: &DestinationColumn) -> Self {
        Self {
            table: table.to_string(),
            column: column.name.clone(),
            data_type: column.data_type.clone(),
            value: None,
            source: if column.is_foreign_key {
                MissingValueSource::ForeignKey
            } else {
                MissingValueSource::Literal
            },
            foreign_key_table: column.foreign_key_table.clone(),
            foreign_key_column: column.foreign_key_column.clone(),
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// The fill-in value, unless it is blank and would compile to `NULL`.
    pub fn resolved_value(&self) -> Option<&str> {
        self.value.as_deref().filter(|value| !is_blank_text(value))
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved_value().is_some()
    }
}

/// Required columns of `table` that no active mapping targets.
pub fn find_missing_columns(
    table: &str,
    columns: &[DestinationColumn],
    mappings: &[ColumnMapping],
) -> Vec<MissingColumnValue> {
    columns
        .iter()
        .filter(|column| column.requires_value())
        .filter(|column| !mappings.iter().any(|m| m.targets(table, &column.name)))
        .map(|column| MissingColumnValue::from_column(table, column))
        .collect()
}

/// Copies values the user already supplied onto freshly computed missing
/// columns, matching on table and column name.
pub fn apply_supplied_values(
    missing: Vec<MissingColumnValue>,
    supplied: &[MissingColumnValue],
) -> Vec<MissingColumnValue> {
    missing
        .into_iter()
        .map(|mut entry| {
            if let Some(found) = supplied
                .iter()
                .find(|s| s.table == entry.table && s.column == entry.column)
            {
                entry.value = found.value.clone();
                entry.source = found.source;
            }
            entry
        })
        .collect()
}

/// Fails when any missing column of `table` still has no value.
pub fn ensure_resolved(table: &str, missing: &[MissingColumnValue]) -> Result<(), SchemaError> {
    let unresolved: Vec<String> = missing
        .iter()
        .filter(|entry| entry.table == table && !entry.is_resolved())
        .map(|entry| entry.column.clone())
        .collect();
    if unresolved.is_empty() {
        Ok(())
    } else {
        Err(SchemaError::UnresolvedMissingColumns {
            table: table.to_string(),
            columns: unresolved,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct CountingSource {
        snapshot: SchemaSnapshot,
        calls: Cell<usize>,
    }

    impl SchemaSource for CountingSource {
        fn fetch_columns(&self, table: &str) -> Result<Vec<DestinationColumn>, SchemaError> {
            self.calls.set(self.calls.get() + 1);
            self.snapshot.fetch_columns(table)
        }
    }

    fn orders_columns() -> Vec<DestinationColumn> {
        vec![
            DestinationColumn {
                is_identity: true,
                ..DestinationColumn::new("id", "integer").required()
            },
            DestinationColumn::new("user_id", "integer")
                .required()
                .references("users", "id"),
            DestinationColumn::new("status", "text").required(),
            DestinationColumn {
                has_default: true,
                ..DestinationColumn::new("created_at", "timestamp").required()
            },
            DestinationColumn::new("note", "text"),
        ]
    }

    #[test]
    fn requires_value_excludes_nullable_defaulted_and_generated() {
        let columns = orders_columns();
        let required: Vec<&str> = columns
            .iter()
            .filter(|c| c.requires_value())
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(required, vec!["user_id", "status"]);
    }

    #[test]
    fn find_missing_columns_skips_mapped_columns() {
        let mappings = vec![ColumnMapping::new("state", "status").to_table("orders")];
        let missing = find_missing_columns("orders", &orders_columns(), &mappings);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].column, "user_id");
        assert_eq!(missing[0].source, MissingValueSource::ForeignKey);
        assert_eq!(missing[0].foreign_key_table.as_deref(), Some("users"));
    }

    #[test]
    fn ignored_mappings_do_not_supply_columns() {
        let mut mapping = ColumnMapping::new("state", "status").to_table("orders");
        mapping.ignored = true;
        let missing = find_missing_columns("orders", &orders_columns(), &[mapping]);
        assert_eq!(missing.len(), 2);
    }

    #[test]
    fn ensure_resolved_lists_unresolved_columns() {
        let missing = find_missing_columns("orders", &orders_columns(), &[]);
        let err = ensure_resolved("orders", &missing).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Table 'orders' has required column(s) without a value: user_id, status"
        );
        let supplied = vec![
            missing[0].clone().with_value("1"),
            missing[1].clone().with_value("new"),
        ];
        let resolved = apply_supplied_values(missing, &supplied);
        assert!(ensure_resolved("orders", &resolved).is_ok());
        assert!(ensure_resolved("other", &resolved).is_ok());
    }

    #[test]
    fn blank_or_null_values_do_not_resolve() {
        let missing = find_missing_columns("orders", &orders_columns(), &[]);
        for blank in ["", "   ", "null"] {
            let supplied = vec![
                missing[0].clone().with_value("1"),
                missing[1].clone().with_value(blank),
            ];
            let resolved = apply_supplied_values(missing.clone(), &supplied);
            assert!(!resolved[1].is_resolved(), "{blank:?}");
            assert_eq!(
                ensure_resolved("orders", &resolved),
                Err(SchemaError::UnresolvedMissingColumns {
                    table: "orders".into(),
                    columns: vec!["status".into()],
                })
            );
        }
    }

    #[test]
    fn cache_fetches_once_until_invalidated() {
        let mut cache = SchemaCache::new(CountingSource {
            snapshot: SchemaSnapshot::default().with_table("orders", orders_columns()),
            calls: Cell::new(0),
        });
        assert_eq!(cache.columns("orders").unwrap().len(), 5);
        assert_eq!(cache.columns("orders").unwrap().len(), 5);
        assert_eq!(cache.source.calls.get(), 1);
        assert!(cache.invalidate("orders"));
        cache.columns("orders").unwrap();
        assert_eq!(cache.source.calls.get(), 2);
        cache.clear();
        assert!(!cache.invalidate("orders"));
    }

    #[test]
    fn cache_with_zero_ttl_always_refetches() {
        let mut cache = SchemaCache::new(CountingSource {
            snapshot: SchemaSnapshot::default().with_table("orders", orders_columns()),
            calls: Cell::new(0),
        })
        .with_ttl(Duration::ZERO);
        cache.columns("orders").unwrap();
        cache.columns("orders").unwrap();
        assert_eq!(cache.source.calls.get(), 2);
    }

    #[test]
    fn unknown_tables_are_errors() {
        let mut cache = SchemaCache::new(SchemaSnapshot::default());
        assert_eq!(
            cache.columns("missing").unwrap_err(),
            SchemaError::UnknownTable("missing".to_string())
        );
    }
}
