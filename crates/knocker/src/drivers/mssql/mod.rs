//! Microsoft SQL Server driver.
//!
//! - [`MssqlDialect`]: SQL syntax strategy for MSSQL
//! - [`MssqlSession`]: Tiberius connection implementing `Session`

mod dialect;
mod session;

pub use dialect::{MssqlDialect, DEFAULT_SCHEMA};
pub use session::MssqlSession;
