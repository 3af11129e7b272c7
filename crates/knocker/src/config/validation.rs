//! Configuration validation.

use super::types::{Config, Settings, DEFAULT_DELIMITER, DEFAULT_EXTENSION};
use crate::core::identifier::validate_identifier;
use crate::core::schema::ExcludeSet;
use crate::drivers::Provider;
use crate::error::{KnockerError, Result};

/// Apply defaults and validate. The provider is checked first so an unknown
/// provider is reported even when other settings are missing.
pub fn resolve(config: &Config) -> Result<Settings> {
    let provider: Provider = match config.provider.as_deref() {
        Some(name) => name.parse()?,
        None => Provider::default(),
    };

    let connection_string = config
        .connection_string
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| KnockerError::Config("connection string is required".into()))?
        .to_string();

    let delimiter = parse_delimiter(config.delimiter.as_deref().unwrap_or(DEFAULT_DELIMITER))?;

    let extension = config
        .extension
        .as_deref()
        .unwrap_or(DEFAULT_EXTENSION)
        .trim()
        .trim_start_matches('.')
        .to_string();
    if extension.is_empty() {
        return Err(KnockerError::Config("extension cannot be empty".into()));
    }

    if let Some(schema) = &config.schema {
        validate_identifier(schema)
            .map_err(|e| KnockerError::Config(format!("invalid schema: {}", e)))?;
    }

    let excludes: ExcludeSet = config.exclude.iter().map(String::as_str).collect();

    Ok(Settings {
        provider,
        connection_string,
        delimiter,
        excludes,
        schema: config.schema.clone(),
        extension,
        reset_identity: config.reset_identity.unwrap_or(true),
    })
}

/// The delimiter must be exactly one ASCII character.
pub fn parse_delimiter(delimiter: &str) -> Result<u8> {
    let value = match delimiter {
        "\\t" | "tab" => "\t",
        other => other,
    };

    match value.as_bytes() {
        [b] if b.is_ascii() && *b != b'"' && *b != b'\n' && *b != b'\r' => Ok(*b),
        _ => Err(KnockerError::Config(format!(
            "delimiter must be a single ASCII character other than a quote or newline, got {:?}",
            delimiter
        ))),
    }
}
