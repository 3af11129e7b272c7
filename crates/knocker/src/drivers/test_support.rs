//! Session double for dialect unit tests.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::core::traits::Session;
use crate::error::Result;

/// Records every statement and answers catalog queries from fixed data.
#[derive(Debug, Default)]
pub(crate) struct RecordingSession {
    tables: Vec<String>,
    identity: HashMap<String, Vec<String>>,
    executed: Vec<(String, Vec<String>)>,
}

impl RecordingSession {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_tables(mut self, tables: &[&str]) -> Self {
        self.tables = tables.iter().map(|t| t.to_string()).collect();
        self
    }

    pub(crate) fn with_identity(mut self, table: &str, columns: &[&str]) -> Self {
        self.identity.insert(
            table.to_string(),
            columns.iter().map(|c| c.to_string()).collect(),
        );
        self
    }

    pub(crate) fn statements(&self) -> Vec<&str> {
        self.executed.iter().map(|(sql, _)| sql.as_str()).collect()
    }

    pub(crate) fn params(&self, index: usize) -> &[String] {
        &self.executed[index].1
    }
}

#[async_trait]
impl Session for RecordingSession {
    fn db_type(&self) -> &str {
        "recording"
    }

    async fn begin(&mut self) -> Result<()> {
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        Ok(())
    }

    async fn execute(&mut self, sql: &str, params: &[&str]) -> Result<u64> {
        self.executed.push((
            sql.to_string(),
            params.iter().map(|p| p.to_string()).collect(),
        ));
        Ok(0)
    }

    async fn query_strings(&mut self, sql: &str, params: &[&str]) -> Result<Vec<String>> {
        if sql.to_ascii_lowercase().contains("columns") {
            let table = params.last().copied().unwrap_or_default();
            Ok(self.identity.get(table).cloned().unwrap_or_default())
        } else {
            Ok(self.tables.clone())
        }
    }

    async fn execute_batch(&mut self, sql: &str, rows: &[Vec<String>]) -> Result<u64> {
        for row in rows {
            self.executed.push((sql.to_string(), row.clone()));
        }
        Ok(rows.len() as u64)
    }
}
