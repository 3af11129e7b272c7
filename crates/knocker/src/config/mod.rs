//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;
pub use validation::parse_delimiter;

use std::path::Path;

use tracing::debug;

use crate::error::{KnockerError, Result};

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            KnockerError::Config(format!("cannot read config file {}: {}", path.display(), e))
        })?;
        debug!("Loaded config file {}", path.display());
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Layer `overrides` on top of `self`. Scalar settings from `overrides`
    /// win; exclude lists are combined.
    pub fn merge(mut self, overrides: Config) -> Self {
        self.provider = overrides.provider.or(self.provider);
        self.connection_string = overrides.connection_string.or(self.connection_string);
        self.delimiter = overrides.delimiter.or(self.delimiter);
        self.schema = overrides.schema.or(self.schema);
        self.extension = overrides.extension.or(self.extension);
        self.reset_identity = overrides.reset_identity.or(self.reset_identity);
        self.exclude.extend(overrides.exclude);
        self
    }

    /// Apply defaults and validate into run settings.
    pub fn resolve(&self) -> Result<Settings> {
        validation::resolve(self)
    }
}
