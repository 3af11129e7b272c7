//! MSSQL SQL dialect (Strategy pattern).
//!
//! Provides SQL Server syntax for identifier quoting, catalog lookups,
//! constraint toggling and identity handling.

use async_trait::async_trait;
use tracing::debug;

use crate::core::identifier::{quote_mssql, string_literal};
use crate::core::schema::{CatalogQuery, ExcludeSet};
use crate::core::traits::{Dialect, Session};
use crate::error::{KnockerError, Result};

/// Default schema for SQL Server objects.
pub const DEFAULT_SCHEMA: &str = "dbo";

/// Microsoft SQL Server dialect implementation.
#[derive(Debug, Clone)]
pub struct MssqlDialect {
    schema: String,
}

impl Default for MssqlDialect {
    fn default() -> Self {
        Self {
            schema: DEFAULT_SCHEMA.to_string(),
        }
    }
}

impl MssqlDialect {
    /// Create a new MSSQL dialect targeting `dbo`.
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

    /// Run one statement per table in the schema, excluded tables included:
    /// their foreign keys may point at rows that are about to disappear.
    async fn for_each_table(
        &self,
        session: &mut dyn Session,
        statements: &[&str],
    ) -> Result<()> {
        let tables = self.list_tables(session, &ExcludeSet::new()).await?;
        for table in &tables {
            let qualified = self.qualify_table(table)?;
            for template in statements {
                let sql = template.replace("{}", &qualified);
                session.execute(&sql, &[]).await?;
            }
        }
        debug!("Applied {:?} to {} tables", statements, tables.len());
        Ok(())
    }
}

#[async_trait]
impl Dialect for MssqlDialect {
    fn name(&self) -> &str {
        "mssql"
    }

    fn quote_ident(&self, name: &str) -> Result<String> {
        quote_mssql(name)
    }

    fn qualify_table(&self, table: &str) -> Result<String> {
        Ok(format!("{}.{}", quote_mssql(&self.schema)?, quote_mssql(table)?))
    }

    fn param_placeholder(&self, index: usize) -> String {
        format!("@P{}", index)
    }

    fn case_insensitive_names(&self) -> bool {
        true
    }

    fn list_tables_query(&self) -> CatalogQuery {
        CatalogQuery::new(
            "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES \
             WHERE TABLE_SCHEMA = @P1 AND TABLE_TYPE = 'BASE TABLE' \
             ORDER BY TABLE_NAME",
            vec![self.schema.clone()],
        )
    }

    fn identity_columns_query(&self, table: &str) -> CatalogQuery {
        CatalogQuery::new(
            r#"SELECT c.name
               FROM sys.columns c
               JOIN sys.tables t ON c.object_id = t.object_id
               JOIN sys.schemas s ON t.schema_id = s.schema_id
               WHERE s.name = @P1 AND t.name = @P2 AND c.is_identity = 1"#,
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

        let col_list = columns
            .iter()
            .map(|c| self.quote_ident(c))
            .collect::<Result<Vec<_>>>()?
            .join(", ");
        let placeholders = (1..=columns.len())
            .map(|i| self.param_placeholder(i))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.qualify_table(table)?,
            col_list,
            placeholders
        ))
    }

    async fn disable_constraints(&self, session: &mut dyn Session) -> Result<()> {
        self.for_each_table(
            session,
            &["ALTER TABLE {} NOCHECK CONSTRAINT ALL", "DISABLE TRIGGER ALL ON {}"],
        )
        .await
    }

    async fn enable_constraints(&self, session: &mut dyn Session) -> Result<()> {
        self.for_each_table(
            session,
            &["ALTER TABLE {} CHECK CONSTRAINT ALL", "ENABLE TRIGGER ALL ON {}"],
        )
        .await
    }

    /// Make the next generated value the column's seed. CHECKIDENT adds the
    /// increment only once the identity has handed out a value, so a table
    /// that never held rows is left alone and the rest are reseeded to
    /// `seed - increment`.
    async fn reset_auto_increment(&self, session: &mut dyn Session, table: &str) -> Result<()> {
        let name = string_literal(&self.qualify_table(table)?);
        let sql = format!(
            "IF EXISTS (SELECT 1 FROM sys.identity_columns \
             WHERE object_id = OBJECT_ID({name}) AND last_value IS NOT NULL) \
             BEGIN \
             DECLARE @reseed BIGINT = CAST(IDENT_SEED({name}) - IDENT_INCR({name}) AS BIGINT); \
             DBCC CHECKIDENT ({name}, RESEED, @reseed) \
             END"
        );
        session.execute(&sql, &[]).await?;
        Ok(())
    }

    async fn begin_identity_insert(&self, session: &mut dyn Session, table: &str) -> Result<()> {
        let sql = format!("SET IDENTITY_INSERT {} ON", self.qualify_table(table)?);
        session.execute(&sql, &[]).await?;
        Ok(())
    }

    async fn end_identity_insert(&self, session: &mut dyn Session, table: &str) -> Result<()> {
        let sql = format!("SET IDENTITY_INSERT {} OFF", self.qualify_table(table)?);
        session.execute(&sql, &[]).await?;
        Ok(())
    }
}
