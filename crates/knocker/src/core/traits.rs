//! Core traits for provider-agnostic resets.
//!
//! - [`Session`]: one open connection with explicit transaction control
//! - [`Dialect`]: SQL syntax and catalog strategy for one database engine
//!
//! # Design Patterns
//!
//! - **Strategy**: each engine supplies a `Dialect`; the orchestrator never
//!   branches on the engine.
//! - **Template Method**: catalog operations (`list_tables`,
//!   `has_auto_increment`) have default implementations built on the
//!   per-engine `*_query` hooks.

use async_trait::async_trait;

use crate::error::Result;

use super::schema::{CatalogQuery, ExcludeSet};

/// An open connection to a target database.
///
/// The caller opens the session and owns it; the orchestrator borrows it for
/// the duration of a single reset or delete. Statements run on the session's
/// one connection, so everything between `begin` and `commit`/`rollback`
/// belongs to a single transaction.
#[async_trait]
pub trait Session: Send {
    /// Get the database type identifier (e.g., "mssql", "postgres").
    fn db_type(&self) -> &str;

    async fn begin(&mut self) -> Result<()>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;

    /// Execute a statement, returning the affected row count.
    async fn execute(&mut self, sql: &str, params: &[&str]) -> Result<u64>;

    /// Run a query and collect the first column of every row as text.
    async fn query_strings(&mut self, sql: &str, params: &[&str]) -> Result<Vec<String>>;

    /// Execute one parameterized statement once per entry in `rows`.
    ///
    /// Each entry holds the bind values for one execution, in placeholder
    /// order. Returns the total affected row count.
    async fn execute_batch(&mut self, sql: &str, rows: &[Vec<String>]) -> Result<u64>;
}

/// SQL dialect and catalog strategy for one database engine.
#[async_trait]
pub trait Dialect: Send + Sync {
    /// Get the dialect name (e.g., "mssql", "postgres").
    fn name(&self) -> &str;

    /// Validate and quote an identifier.
    fn quote_ident(&self, name: &str) -> Result<String>;

    /// Quote a table name, qualified with the dialect's schema when it has one.
    fn qualify_table(&self, table: &str) -> Result<String>;

    /// Get a parameter placeholder for the given 1-based index.
    fn param_placeholder(&self, index: usize) -> String;

    /// Whether the engine compares unquoted table names case-insensitively
    /// under its default collation.
    fn case_insensitive_names(&self) -> bool;

    /// Catalog query returning every base table name in the active schema.
    fn list_tables_query(&self) -> CatalogQuery;

    /// Catalog query returning the identity/auto-increment column names of
    /// `table`.
    fn identity_columns_query(&self, table: &str) -> CatalogQuery;

    /// Build the statement that removes every row of `table`.
    fn build_delete(&self, table: &str) -> Result<String> {
        Ok(format!("DELETE FROM {}", self.qualify_table(table)?))
    }

    /// Build a parameterized INSERT for `table` whose placeholders line up
    /// with `columns`.
    fn build_insert(&self, table: &str, columns: &[String]) -> Result<String>;

    /// Bind values for one dataset row, shaped to match [`Dialect::build_insert`].
    fn row_params(&self, _columns: &[String], row: &[String]) -> Result<Vec<String>> {
        Ok(row.to_vec())
    }

    /// Whether identity resets must run after the commit, either because the
    /// engine commits implicitly around them or because they are not undone
    /// by a rollback.
    fn defers_identity_reset(&self) -> bool {
        false
    }

    /// List the tables to clear, minus `excludes`, in catalog order.
    async fn list_tables(
        &self,
        session: &mut dyn Session,
        excludes: &ExcludeSet,
    ) -> Result<Vec<String>> {
        let query = self.list_tables_query();
        let tables = session.query_strings(&query.sql, &query.param_refs()).await?;
        let case_insensitive = self.case_insensitive_names();
        Ok(tables
            .into_iter()
            .filter(|t| !excludes.contains(t, case_insensitive))
            .collect())
    }

    /// Identity/auto-increment column names of `table`.
    async fn identity_columns(&self, session: &mut dyn Session, table: &str) -> Result<Vec<String>> {
        let query = self.identity_columns_query(table);
        session.query_strings(&query.sql, &query.param_refs()).await
    }

    /// Whether `table` owns an identity/auto-increment/serial column.
    async fn has_auto_increment(&self, session: &mut dyn Session, table: &str) -> Result<bool> {
        Ok(!self.identity_columns(session, table).await?.is_empty())
    }

    /// Suspend foreign-key and trigger enforcement.
    async fn disable_constraints(&self, session: &mut dyn Session) -> Result<()>;

    /// Restore foreign-key and trigger enforcement.
    async fn enable_constraints(&self, session: &mut dyn Session) -> Result<()>;

    /// Reseed `table`'s generated key back to its initial value.
    async fn reset_auto_increment(&self, session: &mut dyn Session, table: &str) -> Result<()>;

    /// Allow explicit values for `table`'s identity column.
    async fn begin_identity_insert(&self, _session: &mut dyn Session, _table: &str) -> Result<()> {
        Ok(())
    }

    /// Undo [`Dialect::begin_identity_insert`] once the rows are in.
    async fn end_identity_insert(&self, _session: &mut dyn Session, _table: &str) -> Result<()> {
        Ok(())
    }

    /// Move `table`'s generated key past explicit values loaded into it.
    /// Runs after the commit; a no-op for engines that advance the counter
    /// on explicit inserts.
    async fn sync_identity(&self, _session: &mut dyn Session, _table: &str) -> Result<()> {
        Ok(())
    }
}
