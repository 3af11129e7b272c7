//! PostgreSQL driver.
//!
//! - [`PostgresDialect`]: SQL syntax strategy for PostgreSQL
//! - [`PostgresSession`]: tokio-postgres connection implementing `Session`

mod dialect;
mod session;

pub use dialect::{PostgresDialect, DEFAULT_SCHEMA};
pub use session::{parse_config, PostgresSession};
