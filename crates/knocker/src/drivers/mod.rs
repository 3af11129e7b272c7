//! Database driver implementations.
//!
//! This module provides database-specific implementations of the core traits:
//!
//! - [`mssql`]: Microsoft SQL Server driver
//! - [`mysql`]: MySQL/MariaDB driver
//! - [`postgres`]: PostgreSQL driver
//! - [`common`]: Shared utilities (TLS, connection strings)
//!
//! # Architecture
//!
//! Each driver module implements:
//! - `Dialect`: SQL syntax and catalog strategy for the database engine
//! - `Session`: one connection with explicit transaction control
//!
//! [`Provider`] is the single place that maps an operator-supplied provider
//! name onto a dialect and a session.
//!
//! # Adding New Databases
//!
//! 1. Create a new module under `drivers/`
//! 2. Implement `Dialect` and `Session`
//! 3. Add variants to `Provider` and `DialectImpl`

pub mod common;
pub mod mssql;
pub mod mysql;
pub mod postgres;

#[cfg(test)]
pub(crate) mod test_support;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// Re-export common utilities
pub use common::{SslMode, TlsBuilder};

// Re-export driver types
pub use mssql::{MssqlDialect, MssqlSession};
pub use mysql::{MysqlDialect, MysqlSession};
pub use postgres::{PostgresDialect, PostgresSession};

use crate::core::schema::{CatalogQuery, ExcludeSet};
use crate::core::traits::{Dialect, Session};
use crate::error::{KnockerError, Result};

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Mssql,
    Mysql,
    Postgres,
}

impl Provider {
    /// Every provider, in the order they are listed to operators.
    pub const ALL: [Provider; 3] = [Provider::Mssql, Provider::Mysql, Provider::Postgres];

    pub fn name(&self) -> &'static str {
        match self {
            Provider::Mssql => "mssql",
            Provider::Mysql => "mysql",
            Provider::Postgres => "postgres",
        }
    }

    /// Comma-separated provider names, e.g. for error messages.
    pub fn allowed_names() -> String {
        Self::ALL
            .iter()
            .map(Provider::name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Build the dialect for this provider, optionally targeting `schema`.
    pub fn dialect(&self, schema: Option<&str>) -> DialectImpl {
        match (self, schema) {
            (Provider::Mssql, Some(s)) => DialectImpl::Mssql(MssqlDialect::with_schema(s)),
            (Provider::Mssql, None) => DialectImpl::Mssql(MssqlDialect::new()),
            (Provider::Mysql, Some(s)) => DialectImpl::Mysql(MysqlDialect::with_schema(s)),
            (Provider::Mysql, None) => DialectImpl::Mysql(MysqlDialect::new()),
            (Provider::Postgres, Some(s)) => {
                DialectImpl::Postgres(PostgresDialect::with_schema(s))
            }
            (Provider::Postgres, None) => DialectImpl::Postgres(PostgresDialect::new()),
        }
    }

    /// Open a session for this provider.
    pub async fn connect(&self, conn_str: &str) -> Result<Box<dyn Session>> {
        if conn_str.trim().is_empty() {
            return Err(KnockerError::Config("connection string is empty".into()));
        }

        let session: Box<dyn Session> = match self {
            Provider::Mssql => Box::new(MssqlSession::connect(conn_str).await?),
            Provider::Mysql => Box::new(MysqlSession::connect(conn_str).await?),
            Provider::Postgres => Box::new(PostgresSession::connect(conn_str).await?),
        };
        Ok(session)
    }
}

impl FromStr for Provider {
    type Err = KnockerError;

    /// Provider names are matched exactly: `mssql`, `mysql` or `postgres`.
    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| KnockerError::InvalidProvider {
                provider: s.to_string(),
            })
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Enum-based static dispatch for dialects.
///
/// Note: We use manual impl instead of enum_dispatch macro due to
/// cross-module trait complexities. The performance is identical.
#[derive(Debug, Clone)]
pub enum DialectImpl {
    Mssql(MssqlDialect),
    Mysql(MysqlDialect),
    Postgres(PostgresDialect),
}

impl DialectImpl {
    fn inner(&self) -> &dyn Dialect {
        match self {
            DialectImpl::Mssql(d) => d,
            DialectImpl::Mysql(d) => d,
            DialectImpl::Postgres(d) => d,
        }
    }
}

#[async_trait]
impl Dialect for DialectImpl {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn quote_ident(&self, name: &str) -> Result<String> {
        self.inner().quote_ident(name)
    }

    fn qualify_table(&self, table: &str) -> Result<String> {
        self.inner().qualify_table(table)
    }

    fn param_placeholder(&self, index: usize) -> String {
        self.inner().param_placeholder(index)
    }

    fn case_insensitive_names(&self) -> bool {
        self.inner().case_insensitive_names()
    }

    fn list_tables_query(&self) -> CatalogQuery {
        self.inner().list_tables_query()
    }

    fn identity_columns_query(&self, table: &str) -> CatalogQuery {
        self.inner().identity_columns_query(table)
    }

    fn build_delete(&self, table: &str) -> Result<String> {
        self.inner().build_delete(table)
    }

    fn build_insert(&self, table: &str, columns: &[String]) -> Result<String> {
        self.inner().build_insert(table, columns)
    }

    fn row_params(&self, columns: &[String], row: &[String]) -> Result<Vec<String>> {
        self.inner().row_params(columns, row)
    }

    fn defers_identity_reset(&self) -> bool {
        self.inner().defers_identity_reset()
    }

    async fn list_tables(
        &self,
        session: &mut dyn Session,
        excludes: &ExcludeSet,
    ) -> Result<Vec<String>> {
        self.inner().list_tables(session, excludes).await
    }

    async fn identity_columns(&self, session: &mut dyn Session, table: &str) -> Result<Vec<String>> {
        self.inner().identity_columns(session, table).await
    }

    async fn has_auto_increment(&self, session: &mut dyn Session, table: &str) -> Result<bool> {
        self.inner().has_auto_increment(session, table).await
    }

    async fn disable_constraints(&self, session: &mut dyn Session) -> Result<()> {
        self.inner().disable_constraints(session).await
    }

    async fn enable_constraints(&self, session: &mut dyn Session) -> Result<()> {
        self.inner().enable_constraints(session).await
    }

    async fn reset_auto_increment(&self, session: &mut dyn Session, table: &str) -> Result<()> {
        self.inner().reset_auto_increment(session, table).await
    }

    async fn begin_identity_insert(&self, session: &mut dyn Session, table: &str) -> Result<()> {
        self.inner().begin_identity_insert(session, table).await
    }

    async fn end_identity_insert(&self, session: &mut dyn Session, table: &str) -> Result<()> {
        self.inner().end_identity_insert(session, table).await
    }

    async fn sync_identity(&self, session: &mut dyn Session, table: &str) -> Result<()> {
        self.inner().sync_identity(session, table).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_from_str() {
        assert_eq!("mssql".parse::<Provider>().unwrap(), Provider::Mssql);
        assert_eq!("mysql".parse::<Provider>().unwrap(), Provider::Mysql);
        assert_eq!("postgres".parse::<Provider>().unwrap(), Provider::Postgres);
    }

    #[test]
    fn test_provider_rejects_unknown() {
        for bad in ["oracle", "", "MSSQL", "postgresql"] {
            let err = bad.parse::<Provider>().unwrap_err();
            assert!(matches!(err, KnockerError::InvalidProvider { .. }), "{bad:?}");
        }
    }

    #[test]
    fn test_allowed_names() {
        assert_eq!(Provider::allowed_names(), "mssql, mysql, postgres");
    }

    #[test]
    fn test_provider_default_is_mssql() {
        assert_eq!(Provider::default(), Provider::Mssql);
    }

    #[test]
    fn test_dialect_name_matches_provider() {
        for provider in Provider::ALL {
            assert_eq!(provider.dialect(None).name(), provider.name());
        }
    }

    #[test]
    fn test_dialect_impl_dispatch() {
        let dialect = Provider::Postgres.dialect(None);
        assert_eq!(dialect.quote_ident("table").unwrap(), "\"table\"");
        assert_eq!(dialect.param_placeholder(1), "$1");

        let dialect = Provider::Mssql.dialect(Some("sales"));
        assert_eq!(dialect.qualify_table("t").unwrap(), "[sales].[t]");
        assert_eq!(dialect.param_placeholder(1), "@P1");

        let dialect = Provider::Mysql.dialect(None);
        assert!(dialect.defers_identity_reset());
        assert_eq!(dialect.quote_ident("t").unwrap(), "`t`");
    }

    #[test]
    fn test_invalid_provider_message() {
        let err = "oracle".parse::<Provider>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid database provider: oracle. Allowed values are: mssql, mysql, postgres."
        );
    }

    #[tokio::test]
    async fn test_connect_rejects_empty_connection_string() {
        let err = Provider::Postgres.connect("  ").await.err().unwrap();
        assert!(matches!(err, KnockerError::Config(_)));
    }
}
