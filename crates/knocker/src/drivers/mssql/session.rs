//! SQL Server session over a single Tiberius connection.

use async_trait::async_trait;
use tiberius::{Client, Config, ToSql};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

use crate::core::traits::Session;
use crate::error::{KnockerError, Result};

/// One SQL Server connection with explicit transaction control.
///
/// Parameterless statements go out as plain SQL batches rather than through
/// `sp_executesql`, so session-level `SET` options such as
/// `IDENTITY_INSERT` outlive the statement that set them.
pub struct MssqlSession {
    client: Client<Compat<TcpStream>>,
}

impl MssqlSession {
    /// Connect using an ADO.NET connection string.
    pub async fn connect(conn_str: &str) -> Result<Self> {
        let config = Config::from_ado_string(conn_str)
            .map_err(|e| KnockerError::connection(e, "parsing SQL Server connection string"))?;

        let client = match Self::open(config.clone()).await {
            Ok(client) => client,
            // Azure SQL gateways redirect the login to the actual node.
            Err(tiberius::error::Error::Routing { host, port }) => {
                debug!("SQL Server login routed to {}:{}", host, port);
                let mut routed = config.clone();
                routed.host(&host);
                routed.port(port);
                Self::open(routed).await.map_err(|e| {
                    KnockerError::connection(e, format!("connecting to routed SQL Server {}:{}", host, port))
                })?
            }
            Err(e) => {
                return Err(KnockerError::connection(
                    e,
                    format!("connecting to SQL Server at {}", config.get_addr()),
                ))
            }
        };

        info!("Connected to SQL Server: {}", config.get_addr());
        Ok(Self { client })
    }

    async fn open(config: Config) -> std::result::Result<Client<Compat<TcpStream>>, tiberius::error::Error> {
        let tcp = TcpStream::connect(config.get_addr()).await.map_err(|e| {
            tiberius::error::Error::Io {
                kind: e.kind(),
                message: e.to_string(),
            }
        })?;
        tcp.set_nodelay(true).ok();
        Client::connect(config, tcp.compat_write()).await
    }

    /// Run a batch and report the rows touched by its last statement.
    async fn run_batch(&mut self, sql: &str) -> Result<u64> {
        let batch = format!("{}; SELECT CAST(@@ROWCOUNT AS BIGINT)", sql);
        let results = self.client.simple_query(batch).await?.into_results().await?;
        let affected = results
            .last()
            .and_then(|rows| rows.first())
            .and_then(|row| row.get::<i64, _>(0))
            .unwrap_or(0);
        Ok(affected.max(0) as u64)
    }
}

fn as_sql_args<'a>(params: &'a [&'a str]) -> Vec<&'a dyn ToSql> {
    params.iter().map(|p| p as &dyn ToSql).collect()
}

#[async_trait]
impl Session for MssqlSession {
    fn db_type(&self) -> &str {
        "mssql"
    }

    async fn begin(&mut self) -> Result<()> {
        self.client.simple_query("BEGIN TRANSACTION").await?.into_results().await?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.client.simple_query("COMMIT TRANSACTION").await?.into_results().await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.client
            .simple_query("IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION")
            .await?
            .into_results()
            .await?;
        Ok(())
    }

    async fn execute(&mut self, sql: &str, params: &[&str]) -> Result<u64> {
        if params.is_empty() {
            return self.run_batch(sql).await;
        }
        let args = as_sql_args(params);
        let result = self.client.execute(sql, &args).await?;
        Ok(result.total())
    }

    async fn query_strings(&mut self, sql: &str, params: &[&str]) -> Result<Vec<String>> {
        let args = as_sql_args(params);
        let rows = self.client.query(sql, &args).await?.into_first_result().await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get::<&str, _>(0).map(str::to_string))
            .collect())
    }

    async fn execute_batch(&mut self, sql: &str, rows: &[Vec<String>]) -> Result<u64> {
        let mut total = 0;
        for row in rows {
            let args: Vec<&dyn ToSql> = row.iter().map(|v| v as &dyn ToSql).collect();
            total += self.client.execute(sql, &args).await?.total();
        }
        Ok(total)
    }
}
