//! Table-level metadata shared by dialects and the orchestrator.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Tables the operator wants left alone.
///
/// Excluded tables are never deleted, truncated or identity-reset. Whether
/// the match is case-sensitive depends on the engine's default collation, so
/// callers pass that in from the dialect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExcludeSet {
    tables: BTreeSet<String>,
}

impl ExcludeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether `table` is excluded.
    pub fn contains(&self, table: &str, case_insensitive: bool) -> bool {
        if case_insensitive {
            self.tables.iter().any(|t| t.eq_ignore_ascii_case(table))
        } else {
            self.tables.contains(table)
        }
    }

    pub fn insert(&mut self, table: impl Into<String>) {
        let table = table.into();
        let trimmed = table.trim();
        if !trimmed.is_empty() {
            self.tables.insert(trimmed.to_string());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for ExcludeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = ExcludeSet::new();
        for table in iter {
            set.insert(table);
        }
        set
    }
}

/// A catalog lookup: SQL text plus its bind values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQuery {
    pub sql: String,
    pub params: Vec<String>,
}

impl CatalogQuery {
    pub fn new(sql: impl Into<String>, params: Vec<String>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Borrow the bind values in the shape `Session` expects.
    pub fn param_refs(&self) -> Vec<&str> {
        self.params.iter().map(String::as_str).collect()
    }
}
