//! Source-to-destination column mappings.
//!
//! Mappings are derived once from parsed headers and then edited by the
//! caller (or a mapping file). Only mappings that are not ignored and name a
//! destination table take part in SQL compilation.

use std::path::Path;

use anyhow::{Context, Result};
use heck::ToSnakeCase;
use log::debug;
use serde::{Deserialize, Serialize};
use similar::TextDiff;

use crate::io_utils;
use crate::result::ParseResult;
use crate::schema::{DestinationColumn, MissingColumnValue};
use crate::value::ValueKind;

fn default_confidence() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnMapping {
    pub source_column: String,
    pub target_column: String,
    #[serde(default)]
    pub target_table: Option<String>,
    #[serde(default)]
    pub ignored: bool,
    #[serde(default)]
    pub source_type: ValueKind,
    /// Declared destination type, e.g. `integer` or `jsonb`.
    #[serde(default)]
    pub target_type: Option<String>,
    /// Informational only, in `[0, 1]`.
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

impl ColumnMapping {
    pub fn new(source_column: impl Into<String>, target_column: impl Into<String>) -> Self {
        Self {
            source_column: source_column.into(),
            target_column: target_column.into(),
            target_table: None,
            ignored: false,
            source_type: ValueKind::Null,
            target_type: None,
            confidence: default_confidence(),
        }
    }

    pub fn to_table(mut self, table: impl Into<String>) -> Self {
        self.target_table = Some(table.into());
        self
    }

    pub fn with_target_type(mut self, target_type: impl Into<String>) -> Self {
        self.target_type = Some(target_type.into());
        self
    }

    pub fn with_source_type(mut self, source_type: ValueKind) -> Self {
        self.source_type = source_type;
        self
    }

    /// Mapped to a destination table and not ignored.
    pub fn is_active(&self) -> bool {
        !self.ignored
            && !self.target_column.trim().is_empty()
            && self
                .target_table
                .as_deref()
                .is_some_and(|table| !table.trim().is_empty())
    }

    pub fn targets(&self, table: &str, column: &str) -> bool {
        self.is_active()
            && self.target_table.as_deref() == Some(table)
            && self.target_column == column
    }
}

/// Routes a destination column through a lookup on a foreign-key table.
///
/// Compiles to `(SELECT <foreign_key> FROM <foreign_table> WHERE
/// <lookup_column> = <value> LIMIT 1)`; the lookup column defaults to the
/// foreign key itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SmartLink {
    pub target_column: String,
    /// Restricts the link to one destination table when set.
    #[serde(default)]
    pub target_table: Option<String>,
    pub foreign_table: String,
    pub foreign_key: String,
    #[serde(default)]
    pub lookup_column: Option<String>,
}

impl SmartLink {
    pub fn new(
        target_column: impl Into<String>,
        foreign_table: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            target_column: target_column.into(),
            target_table: None,
            foreign_table: foreign_table.into(),
            foreign_key: foreign_key.into(),
            lookup_column: None,
        }
    }

    pub fn lookup_by(mut self, column: impl Into<String>) -> Self {
        self.lookup_column = Some(column.into());
        self
    }

    pub fn lookup_column(&self) -> &str {
        self.lookup_column.as_deref().unwrap_or(&self.foreign_key)
    }

    pub fn applies_to(&self, table: &str, column: &str) -> bool {
        self.target_column == column
            && self
                .target_table
                .as_deref()
                .is_none_or(|target| target == table)
    }
}

/// Everything the compiler needs besides the parsed table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MappingConfig {
    #[serde(default)]
    pub mappings: Vec<ColumnMapping>,
    #[serde(default)]
    pub smart_links: Vec<SmartLink>,
    #[serde(default)]
    pub missing_values: Vec<MissingColumnValue>,
}

impl MappingConfig {
    pub fn from_parse_result(result: &ParseResult) -> Self {
        Self {
            mappings: derive_mappings(result),
            ..Self::default()
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        io_utils::read_document(path).with_context(|| format!("Loading mapping file {path:?}"))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        io_utils::write_document(path, self)
            .with_context(|| format!("Writing mapping file {path:?}"))
    }

    /// Distinct destination tables of the active mappings, in first-seen order.
    pub fn target_tables(&self) -> Vec<String> {
        let mut tables: Vec<String> = Vec::new();
        for table in self
            .mappings
            .iter()
            .filter(|mapping| mapping.is_active())
            .filter_map(|mapping| mapping.target_table.clone())
        {
            if !tables.contains(&table) {
                tables.push(table);
            }
        }
        tables
    }
}

/// One mapping per header; the destination name defaults to the snake_case
/// form of the header and no table is assigned yet.
pub fn derive_mappings(result: &ParseResult) -> Vec<ColumnMapping> {
    result
        .headers
        .iter()
        .map(|header| {
            let target = header.to_snake_case();
            let confidence = if target == *header {
                1.0
            } else {
                f64::from(TextDiff::from_chars(header.as_str(), target.as_str()).ratio())
            };
            ColumnMapping {
                confidence,
                source_type: result.column_kind(header),
                ..ColumnMapping::new(header.clone(), target)
            }
        })
        .collect()
}

/// Assigns every non-ignored mapping without a table to `table`.
pub fn assign_table(mappings: &mut [ColumnMapping], table: &str) {
    for mapping in mappings.iter_mut().filter(|m| !m.ignored) {
        if mapping.target_table.is_none() {
            mapping.target_table = Some(table.to_string());
        }
    }
}

/// Marks the mapping for `source_column` as ignored. Returns false when no
/// such mapping exists.
pub fn ignore_column(mappings: &mut [ColumnMapping], source_column: &str) -> bool {
    match mappings
        .iter_mut()
        .find(|mapping| mapping.source_column == source_column)
    {
        Some(mapping) => {
            mapping.ignored = true;
            true
        }
        None => false,
    }
}

/// Character-level similarity of two column names after snake_case
/// normalisation, in `[0, 1]`.
pub fn name_similarity(left: &str, right: &str) -> f64 {
    let left = left.to_snake_case();
    let right = right.to_snake_case();
    if left == right {
        return 1.0;
    }
    f64::from(TextDiff::from_chars(left.as_str(), right.as_str()).ratio())
}

/// Greedily pairs mappings with the most similar destination columns of
/// `table`. Pairs below `min_confidence` are left untouched. Returns the
/// number of mappings assigned.
pub fn auto_map(
    mappings: &mut [ColumnMapping],
    table: &str,
    columns: &[DestinationColumn],
    min_confidence: f64,
) -> usize {
    let mut candidates = Vec::new();
    for (mapping_idx, mapping) in mappings.iter().enumerate() {
        if mapping.ignored {
            continue;
        }
        for (column_idx, column) in columns.iter().enumerate() {
            let score = name_similarity(&mapping.source_column, &column.name);
            if score >= min_confidence {
                candidates.push((score, mapping_idx, column_idx));
            }
        }
    }
    candidates.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

    let mut used_mappings = vec![false; mappings.len()];
    let mut used_columns = vec![false; columns.len()];
    let mut assigned = 0;
    for (score, mapping_idx, column_idx) in candidates {
        if used_mappings[mapping_idx] || used_columns[column_idx] {
            continue;
        }
        used_mappings[mapping_idx] = true;
        used_columns[column_idx] = true;
        let column = &columns[column_idx];
        let mapping = &mut mappings[mapping_idx];
        debug!(
            "Mapped '{}' -> {table}.{} (confidence {score:.2})",
            mapping.source_column, column.name
        );
        mapping.target_column = column.name.clone();
        mapping.target_table = Some(table.to_string());
        mapping.target_type = Some(column.data_type.clone());
        mapping.confidence = score;
        assigned += 1;
    }
    assigned
}
