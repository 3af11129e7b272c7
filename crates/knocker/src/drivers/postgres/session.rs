//! PostgreSQL session over a single tokio-postgres connection.

use async_trait::async_trait;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Config as PgConfig, NoTls};
use tracing::{info, warn};

use crate::core::traits::Session;
use crate::drivers::common::{ConnStrFormat, ConnectionParams, SslMode, TlsBuilder};
use crate::error::{KnockerError, Result};

const DEFAULT_PORT: u16 = 5432;

/// One PostgreSQL connection with explicit transaction control.
pub struct PostgresSession {
    client: Client,
}

impl PostgresSession {
    /// Connect using a URL, libpq `key=value` string or ADO.NET keyword string.
    pub async fn connect(conn_str: &str) -> Result<Self> {
        let (config, ssl_mode) = parse_config(conn_str)?;

        let client = match TlsBuilder::new(ssl_mode).build()? {
            None => {
                warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
                let (client, connection) = config
                    .connect(NoTls)
                    .await
                    .map_err(|e| KnockerError::connection(e, "connecting to PostgreSQL"))?;
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        warn!("PostgreSQL connection closed with error: {}", e);
                    }
                });
                client
            }
            Some(tls) => {
                let (client, connection) = config
                    .connect(tls)
                    .await
                    .map_err(|e| KnockerError::connection(e, "connecting to PostgreSQL over TLS"))?;
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        warn!("PostgreSQL connection closed with error: {}", e);
                    }
                });
                client
            }
        };

        info!(
            "Connected to PostgreSQL: {:?}/{}",
            config.get_hosts(),
            config.get_dbname().unwrap_or_default()
        );
        Ok(Self { client })
    }
}

/// Build a tokio-postgres config from any accepted connection string form.
pub fn parse_config(conn_str: &str) -> Result<(PgConfig, SslMode)> {
    match ConnStrFormat::detect(conn_str) {
        ConnStrFormat::Url | ConnStrFormat::KeyValue => {
            let config: PgConfig = conn_str.trim().parse().map_err(|e| {
                KnockerError::Config(format!("invalid PostgreSQL connection string: {}", e))
            })?;
            let ssl_mode = SslMode::from_postgres_mode(config.get_ssl_mode());
            Ok((config, ssl_mode))
        }
        ConnStrFormat::Ado => {
            let params = ConnectionParams::parse_ado(conn_str)?;
            let ssl_mode = match params.ssl_mode.as_deref() {
                Some(mode) => SslMode::parse(mode)?,
                None => SslMode::Prefer,
            };

            let mut config = PgConfig::new();
            config.host(params.host());
            config.port(params.port.unwrap_or(DEFAULT_PORT));
            if let Some(database) = &params.database {
                config.dbname(database);
            }
            if let Some(user) = &params.user {
                config.user(user);
            }
            if let Some(password) = &params.password {
                config.password(password);
            }
            config.ssl_mode(ssl_mode.postgres_mode());
            config.application_name("knocker");
            Ok((config, ssl_mode))
        }
    }
}

fn as_sql_args<'a>(params: &'a [&'a str]) -> Vec<&'a (dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

#[async_trait]
impl Session for PostgresSession {
    fn db_type(&self) -> &str {
        "postgres"
    }

    async fn begin(&mut self) -> Result<()> {
        self.client.batch_execute("BEGIN").await?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.client.batch_execute("COMMIT").await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.client.batch_execute("ROLLBACK").await?;
        Ok(())
    }

    async fn execute(&mut self, sql: &str, params: &[&str]) -> Result<u64> {
        let args = as_sql_args(params);
        Ok(self.client.execute(sql, &args).await?)
    }

    async fn query_strings(&mut self, sql: &str, params: &[&str]) -> Result<Vec<String>> {
        let args = as_sql_args(params);
        let rows = self.client.query(sql, &args).await?;
        rows.iter()
            .map(|row| row.try_get::<_, String>(0).map_err(KnockerError::from))
            .collect()
    }

    async fn execute_batch(&mut self, sql: &str, rows: &[Vec<String>]) -> Result<u64> {
        let statement = self.client.prepare(sql).await?;
        let mut total = 0;
        for row in rows {
            let args: Vec<&(dyn ToSql + Sync)> =
                row.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
            total += self.client.execute(&statement, &args).await?;
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_url() {
        let (config, ssl_mode) =
            parse_config("postgres://app:pw@db.local:6543/shop?sslmode=disable").unwrap();
        assert_eq!(config.get_dbname(), Some("shop"));
        assert_eq!(config.get_user(), Some("app"));
        assert_eq!(config.get_ports(), &[6543]);
        assert_eq!(ssl_mode, SslMode::Disable);
    }

    #[test]
    fn test_parse_key_value() {
        let (config, ssl_mode) = parse_config("host=localhost dbname=shop user=app").unwrap();
        assert_eq!(config.get_dbname(), Some("shop"));
        assert_eq!(ssl_mode, SslMode::Prefer);
    }

    #[test]
    fn test_parse_ado() {
        let (config, ssl_mode) = parse_config(
            "Host=db.local;Port=5433;Database=shop;Username=app;Password=pw;SSL Mode=Require",
        )
        .unwrap();
        assert_eq!(config.get_dbname(), Some("shop"));
        assert_eq!(config.get_user(), Some("app"));
        assert_eq!(config.get_password(), Some(&b"pw"[..]));
        assert_eq!(config.get_ports(), &[5433]);
        assert_eq!(ssl_mode, SslMode::Require);
    }

    #[test]
    fn test_parse_ado_defaults() {
        let (config, ssl_mode) = parse_config("Server=db.local;Database=shop").unwrap();
        assert_eq!(config.get_ports(), &[DEFAULT_PORT]);
        assert_eq!(ssl_mode, SslMode::Prefer);
    }

    #[test]
    fn test_parse_invalid_native_string() {
        let err = parse_config("host=localhost bogus_option=1").unwrap_err();
        assert!(matches!(err, KnockerError::Config(_)));
    }
}
