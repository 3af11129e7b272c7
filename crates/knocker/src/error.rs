//! Error types for the reset engine.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for reset and delete operations.
#[derive(Error, Debug)]
pub enum KnockerError {
    /// Provider string is not one of the supported engines.
    #[error(
        "Invalid database provider: {provider}. Allowed values are: {}.",
        crate::drivers::Provider::allowed_names()
    )]
    InvalidProvider { provider: String },

    /// Configuration error (bad flag value, missing input directory, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Identifier rejected before it could reach generated SQL
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Input file missing, unreadable or malformed
    #[error("Failed to read dataset {}: {message}", path.display())]
    DatasetRead { path: PathBuf, message: String },

    /// Connection could not be opened
    #[error("Connection error: {message}\n  Context: {context}")]
    Connection { message: String, context: String },

    /// Suspending or restoring constraint enforcement failed
    #[error("Constraint toggle failed: {source}")]
    ConstraintExecution {
        #[source]
        source: Box<KnockerError>,
    },

    /// Deleting rows (or enumerating tables to delete) failed
    #[error("Delete failed for table {table}: {source}")]
    DeleteExecution {
        table: String,
        #[source]
        source: Box<KnockerError>,
    },

    /// Reseeding an identity/auto-increment column failed
    #[error("Identity reset failed for table {table}: {source}")]
    IdentityReset {
        table: String,
        #[source]
        source: Box<KnockerError>,
    },

    /// Inserting rows from a dataset failed
    #[error("Insert failed for table {table}: {source}")]
    InsertExecution {
        table: String,
        #[source]
        source: Box<KnockerError>,
    },

    /// Transaction control statement failed
    #[error("Transaction {action} failed: {source}")]
    Transaction {
        action: &'static str,
        #[source]
        source: Box<KnockerError>,
    },

    /// SQL Server driver error
    #[error("SQL Server error: {0}")]
    Mssql(#[from] tiberius::error::Error),

    /// PostgreSQL driver error
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// MySQL driver error
    #[error("MySQL error: {0}")]
    Mysql(#[from] mysql_async::Error),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML config deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl KnockerError {
    /// Create a Connection error with context about where it occurred
    pub fn connection(message: impl ToString, context: impl Into<String>) -> Self {
        KnockerError::Connection {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a DatasetRead error
    pub fn dataset(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        KnockerError::DatasetRead {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn constraint(source: KnockerError) -> Self {
        KnockerError::ConstraintExecution {
            source: Box::new(source),
        }
    }

    pub fn delete(table: impl Into<String>, source: KnockerError) -> Self {
        KnockerError::DeleteExecution {
            table: table.into(),
            source: Box::new(source),
        }
    }

    pub fn identity(table: impl Into<String>, source: KnockerError) -> Self {
        KnockerError::IdentityReset {
            table: table.into(),
            source: Box::new(source),
        }
    }

    /// Wrap an error raised while loading rows into `table`.
    ///
    /// Dataset read errors pass through unchanged so the operator sees which
    /// file was at fault rather than a generic insert failure.
    pub fn insert(table: impl Into<String>, source: KnockerError) -> Self {
        match source {
            e @ KnockerError::DatasetRead { .. } | e @ KnockerError::InvalidIdentifier(_) => e,
            other => KnockerError::InsertExecution {
                table: table.into(),
                source: Box::new(other),
            },
        }
    }

    pub fn transaction(action: &'static str, source: KnockerError) -> Self {
        KnockerError::Transaction {
            action,
            source: Box::new(source),
        }
    }

    /// Process exit code for this error.
    ///
    /// Every failure the operator can hit maps to 1; the variants only differ
    /// in their message.
    pub fn exit_code(&self) -> u8 {
        1
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for reset operations.
pub type Result<T> = std::result::Result<T, KnockerError>;
