//! Identifier validation and quoting.
//!
//! Table names come from input file names and column names come from file
//! headers, so neither can be trusted. Identifiers cannot be bound as
//! parameters, which leaves two layers of protection:
//!
//! 1. An allow-list: letters and digits (any script), `_`, `$`, `-` and spaces.
//!    Everything else, quote characters included, is rejected outright.
//! 2. Engine-specific quoting (brackets, backticks, double quotes) with the
//!    closing quote character doubled, so reserved words such as `User` and
//!    mixed-case names stay valid.

use crate::error::{KnockerError, Result};

/// Maximum identifier length (conservative limit across databases).
/// - PostgreSQL: 63 bytes
/// - SQL Server: 128 characters
/// - MySQL: 64 characters
const MAX_IDENTIFIER_LENGTH: usize = 128;

fn is_allowed_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '$' | '-' | ' ')
}

/// Validate an identifier against the allow-list.
///
/// # Errors
///
/// Returns `KnockerError::InvalidIdentifier` naming the offending input.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(KnockerError::InvalidIdentifier(
            "identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(KnockerError::InvalidIdentifier(format!(
            "identifier contains null byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(KnockerError::InvalidIdentifier(format!(
            "identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    if let Some(bad) = name.chars().find(|c| !is_allowed_char(*c)) {
        return Err(KnockerError::InvalidIdentifier(format!(
            "identifier {:?} contains disallowed character {:?}",
            name, bad
        )));
    }

    if name.trim() != name {
        return Err(KnockerError::InvalidIdentifier(format!(
            "identifier {:?} has leading or trailing whitespace",
            name
        )));
    }

    Ok(())
}

/// Quote a PostgreSQL identifier.
///
/// ```ignore
/// assert_eq!(quote_pg("users")?, "\"users\"");
/// ```
pub fn quote_pg(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Quote a MySQL identifier using backticks.
pub fn quote_mysql(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("`{}`", name.replace('`', "``")))
}

/// Quote a SQL Server identifier using brackets.
pub fn quote_mssql(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("[{}]", name.replace(']', "]]")))
}

/// Embed already-quoted SQL text inside a single-quoted string literal.
///
/// Used where an engine takes an object name as a string argument
/// (`DBCC CHECKIDENT`, `pg_get_serial_sequence`).
pub fn string_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}
