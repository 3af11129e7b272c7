//! Configuration type definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::schema::ExcludeSet;
use crate::drivers::Provider;

/// Default field delimiter for input files.
pub const DEFAULT_DELIMITER: &str = ";";

/// Default input file extension.
pub const DEFAULT_EXTENSION: &str = "csv";

/// Settings as written in a YAML file or collected from CLI flags.
///
/// Every field is optional so that a file and the command line can each
/// supply part of the picture; [`Config::merge`] layers them and
/// [`Config::resolve`] applies defaults and validation.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Database provider: mssql, mysql or postgres (default: mssql).
    #[serde(default)]
    pub provider: Option<String>,

    /// Connection string in the provider's accepted form.
    #[serde(default)]
    pub connection_string: Option<String>,

    /// Single-character field delimiter (default: ";").
    #[serde(default)]
    pub delimiter: Option<String>,

    /// Tables to leave untouched.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Schema to operate on (default: dbo / public / current database).
    #[serde(default)]
    pub schema: Option<String>,

    /// Input file extension without the dot (default: csv).
    #[serde(default)]
    pub extension: Option<String>,

    /// Reseed identity/auto-increment columns (default: true).
    #[serde(default)]
    pub reset_identity: Option<bool>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("provider", &self.provider)
            .field(
                "connection_string",
                &self.connection_string.as_ref().map(|_| "[REDACTED]"),
            )
            .field("delimiter", &self.delimiter)
            .field("exclude", &self.exclude)
            .field("schema", &self.schema)
            .field("extension", &self.extension)
            .field("reset_identity", &self.reset_identity)
            .finish()
    }
}

/// Fully resolved settings for one run.
#[derive(Clone)]
pub struct Settings {
    pub provider: Provider,
    pub connection_string: String,
    pub delimiter: u8,
    pub excludes: ExcludeSet,
    pub schema: Option<String>,
    pub extension: String,
    pub reset_identity: bool,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("provider", &self.provider)
            .field("connection_string", &"[REDACTED]")
            .field("delimiter", &(self.delimiter as char))
            .field("excludes", &self.excludes)
            .field("schema", &self.schema)
            .field("extension", &self.extension)
            .field("reset_identity", &self.reset_identity)
            .finish()
    }
}
