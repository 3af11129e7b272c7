//! PostgreSQL SQL dialect (Strategy pattern).
//!
//! Rows are bound as a single JSON object and expanded server-side with
//! `json_populate_record`, so every value reaches its column through the
//! column type's own input function instead of a client-side conversion.
//!
//! `setval` is not transactional, so sequences are only touched after the
//! data is committed.

use async_trait::async_trait;
use tracing::debug;

use crate::core::identifier::quote_pg;
use crate::core::schema::CatalogQuery;
use crate::core::traits::{Dialect, Session};
use crate::error::{KnockerError, Result};

/// Default schema for PostgreSQL objects.
pub const DEFAULT_SCHEMA: &str = "public";

/// PostgreSQL dialect implementation.
#[derive(Debug, Clone)]
pub struct PostgresDialect {
    schema: String,
}

impl Default for PostgresDialect {
    fn default() -> Self {
        Self {
            schema: DEFAULT_SCHEMA.to_string(),
        }
    }
}

impl PostgresDialect {
    /// Create a new PostgreSQL dialect targeting `public`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Target a different schema.
    pub fn with_schema(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }
}

#[async_trait]
impl Dialect for PostgresDialect {
    fn name(&self) -> &str {
        "postgres"
    }

    fn quote_ident(&self, name: &str) -> Result<String> {
        quote_pg(name)
    }

    fn qualify_table(&self, table: &str) -> Result<String> {
        Ok(format!("{}.{}", quote_pg(&self.schema)?, quote_pg(table)?))
    }

    fn param_placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn case_insensitive_names(&self) -> bool {
        false
    }

    fn defers_identity_reset(&self) -> bool {
        true
    }

    fn list_tables_query(&self) -> CatalogQuery {
        CatalogQuery::new(
            "SELECT tablename::text FROM pg_catalog.pg_tables \
             WHERE schemaname = $1 ORDER BY tablename",
            vec![self.schema.clone()],
        )
    }

    fn identity_columns_query(&self, table: &str) -> CatalogQuery {
        CatalogQuery::new(
            r#"SELECT column_name::text
               FROM information_schema.columns
               WHERE table_schema = $1 AND table_name = $2
                 AND (is_identity = 'YES' OR column_default LIKE 'nextval(%')
               ORDER BY ordinal_position"#,
            vec![self.schema.clone(), table.to_string()],
        )
    }

    fn build_insert(&self, table: &str, columns: &[String]) -> Result<String> {
        if columns.is_empty() {
            return Err(KnockerError::Config(format!(
                "cannot build INSERT for {} without columns",
                table
            )));
        }

        let qualified = self.qualify_table(table)?;
        let col_list = columns
            .iter()
            .map(|c| self.quote_ident(c))
            .collect::<Result<Vec<_>>>()?
            .join(", ");

        Ok(format!(
            "INSERT INTO {qualified} ({col_list}) OVERRIDING SYSTEM VALUE \
             SELECT {col_list} FROM json_populate_record(NULL::{qualified}, $1::text::json)"
        ))
    }

    /// One JSON object per row, keyed by column name.
    fn row_params(&self, columns: &[String], row: &[String]) -> Result<Vec<String>> {
        let record: serde_json::Map<String, serde_json::Value> = columns
            .iter()
            .zip(row)
            .map(|(col, value)| (col.clone(), serde_json::Value::String(value.clone())))
            .collect();
        Ok(vec![serde_json::to_string(&record)?])
    }

    async fn disable_constraints(&self, session: &mut dyn Session) -> Result<()> {
        session
            .execute("SET session_replication_role = 'replica'", &[])
            .await?;
        Ok(())
    }

    async fn enable_constraints(&self, session: &mut dyn Session) -> Result<()> {
        session
            .execute("SET session_replication_role = 'origin'", &[])
            .await?;
        Ok(())
    }

    /// Restart each sequence right after the table's highest key, which is 1
    /// for a table left empty.
    async fn reset_auto_increment(&self, session: &mut dyn Session, table: &str) -> Result<()> {
        self.sync_identity(session, table).await
    }

    /// Explicit keys do not advance the sequence; move it past them.
    async fn sync_identity(&self, session: &mut dyn Session, table: &str) -> Result<()> {
        let qualified = self.qualify_table(table)?;
        for column in self.identity_columns(session, table).await? {
            let sql = format!(
                "SELECT setval(pg_get_serial_sequence($1, $2), \
                 COALESCE((SELECT MAX({}) FROM {}), 0) + 1, false)",
                self.quote_ident(&column)?,
                qualified
            );
            session.execute(&sql, &[qualified.as_str(), column.as_str()]).await?;
            debug!("Synced sequence for {}.{}", qualified, column);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::test_support::RecordingSession;

    #[test]
    fn test_quote_ident() {
        let dialect = PostgresDialect::new();
        assert_eq!(dialect.quote_ident("users").unwrap(), "\"users\"");
        assert_eq!(dialect.quote_ident("User").unwrap(), "\"User\"");
        assert!(dialect.quote_ident("bad\"name").is_err());
    }

    #[test]
    fn test_param_placeholder() {
        let dialect = PostgresDialect::new();
        assert_eq!(dialect.param_placeholder(1), "$1");
        assert_eq!(dialect.param_placeholder(10), "$10");
    }

    #[test]
    fn test_exclusion_is_case_sensitive() {
        assert!(!PostgresDialect::new().case_insensitive_names());
    }

    #[test]
    fn test_build_insert_uses_json_record() {
        let dialect = PostgresDialect::new();
        let sql = dialect
            .build_insert("order", &["id".to_string(), "total".to_string()])
            .unwrap();
        assert_eq!(
            sql,
            "INSERT INTO \"public\".\"order\" (\"id\", \"total\") OVERRIDING SYSTEM VALUE \
             SELECT \"id\", \"total\" FROM json_populate_record(NULL::\"public\".\"order\", $1::text::json)"
        );
    }

    #[test]
    fn test_row_params_single_json_object() {
        let dialect = PostgresDialect::new();
        let columns = vec!["id".to_string(), "note".to_string()];
        let params = dialect
            .row_params(&columns, &["7".to_string(), "say \"hi\"".to_string()])
            .unwrap();
        assert_eq!(params.len(), 1);

        let parsed: serde_json::Value = serde_json::from_str(&params[0]).unwrap();
        assert_eq!(parsed["id"], "7");
        assert_eq!(parsed["note"], "say \"hi\"");
    }

    #[tokio::test]
    async fn test_constraint_toggle_statements() {
        let mut session = RecordingSession::new();
        let dialect = PostgresDialect::new();
        dialect.disable_constraints(&mut session).await.unwrap();
        dialect.enable_constraints(&mut session).await.unwrap();
        assert_eq!(
            session.statements(),
            vec![
                "SET session_replication_role = 'replica'",
                "SET session_replication_role = 'origin'",
            ]
        );
    }

    #[test]
    fn test_sequence_work_waits_for_commit() {
        assert!(PostgresDialect::new().defers_identity_reset());
    }

    #[tokio::test]
    async fn test_reset_per_identity_column() {
        let mut session = RecordingSession::new().with_identity("users", &["id", "ticket"]);
        PostgresDialect::new()
            .reset_auto_increment(&mut session, "users")
            .await
            .unwrap();

        assert_eq!(
            session.statements(),
            vec![
                "SELECT setval(pg_get_serial_sequence($1, $2), \
                 COALESCE((SELECT MAX(\"id\") FROM \"public\".\"users\"), 0) + 1, false)",
                "SELECT setval(pg_get_serial_sequence($1, $2), \
                 COALESCE((SELECT MAX(\"ticket\") FROM \"public\".\"users\"), 0) + 1, false)",
            ]
        );
        assert_eq!(session.params(0), ["\"public\".\"users\"", "id"]);
        assert_eq!(session.params(1), ["\"public\".\"users\"", "ticket"]);
    }

    #[tokio::test]
    async fn test_sync_identity_moves_past_max() {
        let mut session = RecordingSession::new().with_identity("users", &["id"]);
        PostgresDialect::new()
            .sync_identity(&mut session, "users")
            .await
            .unwrap();

        let statements = session.statements();
        assert_eq!(statements.len(), 1);
        assert!(statements[0].contains("MAX(\"id\") FROM \"public\".\"users\""));
    }

    #[tokio::test]
    async fn test_identity_insert_bracket_is_noop() {
        let mut session = RecordingSession::new().with_identity("users", &["id"]);
        let dialect = PostgresDialect::new();
        dialect.begin_identity_insert(&mut session, "users").await.unwrap();
        dialect.end_identity_insert(&mut session, "users").await.unwrap();
        assert!(session.statements().is_empty());
    }
}
