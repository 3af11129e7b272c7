//! Core abstractions for engine-agnostic resets.
//!
//! - [`dataset`]: delimited input files and their parsed contents
//! - [`identifier`]: identifier validation and per-engine quoting
//! - [`schema`]: exclude lists and catalog queries
//! - [`traits`]: the `Session` and `Dialect` seams implemented by drivers
//!
//! # Architecture
//!
//! Nothing in `core` knows about a concrete engine. Driver modules
//! (`drivers/mssql`, `drivers/postgres`, `drivers/mysql`) implement the
//! traits, and the orchestrator drives them through trait objects.

pub mod dataset;
pub mod identifier;
pub mod schema;
pub mod traits;

pub use dataset::{discover_inputs, Dataset, DatasetLoader};
pub use schema::{CatalogQuery, ExcludeSet};
pub use traits::{Dialect, Session};
