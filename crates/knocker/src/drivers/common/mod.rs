//! Common utilities shared across database drivers.
//!
//! - [`connstr`]: ADO.NET keyword connection strings
//! - [`tls`]: rustls setup for Postgres and MySQL

pub mod connstr;
pub mod tls;

pub use connstr::{ConnStrFormat, ConnectionParams};
pub use tls::{SslMode, TlsBuilder};
