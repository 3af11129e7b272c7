//! MySQL/MariaDB SQL dialect (Strategy pattern).
//!
//! Provides MySQL-specific SQL syntax for identifier quoting, catalog lookups,
//! foreign-key toggling and auto-increment handling.
//! Compatible with MySQL 5.7+, 8.0+, and MariaDB 10.2+.

use async_trait::async_trait;

use crate::core::identifier::quote_mysql;
use crate::core::schema::CatalogQuery;
use crate::core::traits::{Dialect, Session};
use crate::error::{KnockerError, Result};

/// MySQL/MariaDB dialect implementation.
///
/// Without an explicit schema the dialect works on the connection's current
/// database (`DATABASE()`).
#[derive(Debug, Clone, Default)]
pub struct MysqlDialect {
    schema: Option<String>,
}

impl MysqlDialect {
    /// Create a new MySQL dialect instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Target a database other than the connection's default.
    pub fn with_schema(schema: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
        }
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    fn schema_filter(&self, column: &str) -> (String, Vec<String>) {
        match &self.schema {
            Some(schema) => (format!("{} = ?", column), vec![schema.clone()]),
            None => (format!("{} = DATABASE()", column), Vec::new()),
        }
    }
}

#[async_trait]
impl Dialect for MysqlDialect {
    fn name(&self) -> &str {
        "mysql"
    }

    fn quote_ident(&self, name: &str) -> Result<String> {
        quote_mysql(name)
    }

    fn qualify_table(&self, table: &str) -> Result<String> {
        match &self.schema {
            Some(schema) => Ok(format!("{}.{}", quote_mysql(schema)?, quote_mysql(table)?)),
            None => quote_mysql(table),
        }
    }

    fn param_placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn case_insensitive_names(&self) -> bool {
        true
    }

    fn list_tables_query(&self) -> CatalogQuery {
        let (filter, params) = self.schema_filter("table_schema");
        CatalogQuery::new(
            format!(
                "SELECT table_name FROM information_schema.tables \
                 WHERE {} AND table_type = 'BASE TABLE' ORDER BY table_name",
                filter
            ),
            params,
        )
    }

    fn identity_columns_query(&self, table: &str) -> CatalogQuery {
        let (filter, mut params) = self.schema_filter("table_schema");
        params.push(table.to_string());
        CatalogQuery::new(
            format!(
                "SELECT column_name FROM information_schema.columns \
                 WHERE {} AND table_name = ? AND extra LIKE '%auto_increment%'",
                filter
            ),
            params,
        )
    }

    fn build_insert(&self, table: &str, columns: &[String]) -> Result<String> {
        if columns.is_empty() {
            return Err(KnockerError::Config(format!(
                "cannot build INSERT for {} without columns",
                table
            )));
        }

        let col_list = columns
            .iter()
            .map(|c| self.quote_ident(c))
            .collect::<Result<Vec<_>>>()?
            .join(", ");
        let placeholders = vec!["?"; columns.len()].join(", ");

        Ok(format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.qualify_table(table)?,
            col_list,
            placeholders
        ))
    }

    /// `ALTER TABLE` commits implicitly in MySQL.
    fn defers_identity_reset(&self) -> bool {
        true
    }

    async fn disable_constraints(&self, session: &mut dyn Session) -> Result<()> {
        session.execute("SET FOREIGN_KEY_CHECKS = 0", &[]).await?;
        Ok(())
    }

    async fn enable_constraints(&self, session: &mut dyn Session) -> Result<()> {
        session.execute("SET FOREIGN_KEY_CHECKS = 1", &[]).await?;
        Ok(())
    }

    async fn reset_auto_increment(&self, session: &mut dyn Session, table: &str) -> Result<()> {
        let sql = format!("ALTER TABLE {} AUTO_INCREMENT = 1", self.qualify_table(table)?);
        session.execute(&sql, &[]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::test_support::RecordingSession;

    #[test]
    fn test_quote_ident() {
        let dialect = MysqlDialect::new();
        assert_eq!(dialect.quote_ident("users").unwrap(), "`users`");
        assert_eq!(dialect.quote_ident("order").unwrap(), "`order`");
        assert!(dialect.quote_ident("bad`name").is_err());
    }

    #[test]
    fn test_param_placeholder() {
        let dialect = MysqlDialect::new();
        assert_eq!(dialect.param_placeholder(1), "?");
        assert_eq!(dialect.param_placeholder(10), "?");
    }

    #[test]
    fn test_qualify_table_defaults_to_current_database() {
        assert_eq!(MysqlDialect::new().qualify_table("users").unwrap(), "`users`");
        assert_eq!(
            MysqlDialect::with_schema("shop").qualify_table("users").unwrap(),
            "`shop`.`users`"
        );
    }

    #[test]
    fn test_catalog_queries() {
        let query = MysqlDialect::new().list_tables_query();
        assert!(query.sql.contains("table_schema = DATABASE()"));
        assert!(query.params.is_empty());

        let query = MysqlDialect::with_schema("shop").identity_columns_query("users");
        assert!(query.sql.contains("auto_increment"));
        assert_eq!(query.params, vec!["shop", "users"]);
    }

    #[test]
    fn test_build_insert() {
        let sql = MysqlDialect::new()
            .build_insert("order", &["id".to_string(), "desc".to_string()])
            .unwrap();
        assert_eq!(sql, "INSERT INTO `order` (`id`, `desc`) VALUES (?, ?)");
    }

    #[test]
    fn test_defers_identity_reset() {
        assert!(MysqlDialect::new().defers_identity_reset());
    }

    #[tokio::test]
    async fn test_statements() {
        let mut session = RecordingSession::new();
        let dialect = MysqlDialect::new();
        dialect.disable_constraints(&mut session).await.unwrap();
        dialect.reset_auto_increment(&mut session, "users").await.unwrap();
        dialect.enable_constraints(&mut session).await.unwrap();

        assert_eq!(
            session.statements(),
            vec![
                "SET FOREIGN_KEY_CHECKS = 0",
                "ALTER TABLE `users` AUTO_INCREMENT = 1",
                "SET FOREIGN_KEY_CHECKS = 1",
            ]
        );
    }
}
