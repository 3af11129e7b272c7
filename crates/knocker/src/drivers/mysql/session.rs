//! MySQL session over a single mysql_async connection.

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder, Params, SslOpts, Value};
use tracing::{info, warn};

use crate::core::traits::Session;
use crate::drivers::common::{ConnStrFormat, ConnectionParams, SslMode};
use crate::error::{KnockerError, Result};

const DEFAULT_PORT: u16 = 3306;

/// One MySQL connection with explicit transaction control.
pub struct MysqlSession {
    conn: Conn,
}

impl MysqlSession {
    /// Connect using a `mysql://` URL or an ADO.NET keyword string.
    pub async fn connect(conn_str: &str) -> Result<Self> {
        let opts = parse_opts(conn_str)?;
        let host = opts.ip_or_hostname().to_string();
        let conn = Conn::new(opts)
            .await
            .map_err(|e| KnockerError::connection(e, format!("connecting to MySQL at {}", host)))?;

        info!("Connected to MySQL: {}", host);
        Ok(Self { conn })
    }
}

/// Build connection options from either accepted connection string form.
pub fn parse_opts(conn_str: &str) -> Result<Opts> {
    if ConnStrFormat::detect(conn_str) == ConnStrFormat::Url {
        return Opts::from_url(conn_str.trim())
            .map_err(|e| KnockerError::Config(format!("invalid MySQL connection URL: {}", e)));
    }

    let params = ConnectionParams::parse_ado(conn_str)?;
    let ssl_mode = match params.ssl_mode.as_deref() {
        Some(mode) => SslMode::parse(mode)?,
        None => SslMode::Disable,
    };

    let mut builder = OptsBuilder::default()
        .ip_or_hostname(params.host())
        .tcp_port(params.port.unwrap_or(DEFAULT_PORT))
        .db_name(params.database.clone())
        .user(params.user.clone())
        .pass(params.password.clone())
        // Use utf8mb4 for full Unicode support
        .init(vec!["SET NAMES utf8mb4"]);

    match ssl_opts(ssl_mode) {
        Some(ssl) => builder = builder.ssl_opts(ssl),
        None => warn!("MySQL TLS is disabled. Credentials will be transmitted in plaintext."),
    }

    Ok(builder.into())
}

fn ssl_opts(mode: SslMode) -> Option<SslOpts> {
    match mode {
        SslMode::Disable => None,
        SslMode::Prefer | SslMode::Require => {
            Some(SslOpts::default().with_danger_accept_invalid_certs(true))
        }
        SslMode::VerifyCa => Some(SslOpts::default().with_danger_skip_domain_validation(true)),
        SslMode::VerifyFull => Some(SslOpts::default()),
    }
}

fn positional(values: impl IntoIterator<Item = impl AsRef<str>>) -> Params {
    Params::Positional(
        values
            .into_iter()
            .map(|v| Value::Bytes(v.as_ref().as_bytes().to_vec()))
            .collect(),
    )
}

#[async_trait]
impl Session for MysqlSession {
    fn db_type(&self) -> &str {
        "mysql"
    }

    async fn begin(&mut self) -> Result<()> {
        self.conn.query_drop("START TRANSACTION").await?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.conn.query_drop("COMMIT").await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.conn.query_drop("ROLLBACK").await?;
        Ok(())
    }

    async fn execute(&mut self, sql: &str, params: &[&str]) -> Result<u64> {
        if params.is_empty() {
            self.conn.query_drop(sql).await?;
        } else {
            self.conn.exec_drop(sql, positional(params.iter())).await?;
        }
        Ok(self.conn.affected_rows())
    }

    async fn query_strings(&mut self, sql: &str, params: &[&str]) -> Result<Vec<String>> {
        let rows: Vec<String> = if params.is_empty() {
            self.conn.query(sql).await?
        } else {
            self.conn.exec(sql, positional(params.iter())).await?
        };
        Ok(rows)
    }

    async fn execute_batch(&mut self, sql: &str, rows: &[Vec<String>]) -> Result<u64> {
        let mut total = 0;
        for row in rows {
            self.conn.exec_drop(sql, positional(row.iter())).await?;
            total += self.conn.affected_rows();
        }
        Ok(total)
    }
}
