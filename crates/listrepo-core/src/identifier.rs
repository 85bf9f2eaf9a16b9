//! SQL identifier validation.
//!
//! Every table, column, and alias that ends up in generated SQL text passes
//! through [`validate_identifier`] first. Caller-supplied values never reach
//! the SQL text; they are bound as parameters.

use crate::defaults::MAX_IDENTIFIER_LEN;
use crate::error::{Error, Result};

/// Keywords rejected as identifiers even though they are lexically valid.
const RESERVED_KEYWORDS: &[&str] = &[
    "select", "insert", "update", "delete", "drop", "create", "alter", "grant", "revoke",
    "truncate", "from", "where", "join", "left", "on", "and", "or", "not", "null", "order",
    "group", "by", "limit", "offset", "as", "union",
];

/// Validate a PostgreSQL identifier for safety and correctness.
///
/// Identifiers must:
/// - Not be empty
/// - Not exceed 63 characters (PostgreSQL identifier limit)
/// - Contain only ASCII alphanumeric characters and underscores
/// - Not start with a digit
/// - Not be a SQL keyword (basic check)
///
/// `what` names the identifier's role in error messages ("column", "prefix", ...).
///
/// # Examples
///
/// ```
/// use listrepo_core::validate_identifier;
///
/// assert!(validate_identifier("contact_email", "table").is_ok());
/// assert!(validate_identifier("1st", "column").is_err());
/// assert!(validate_identifier("u; DROP TABLE x", "prefix").is_err());
/// ```
pub fn validate_identifier(name: &str, what: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidInput(format!("{} name cannot be empty", what)));
    }

    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(Error::InvalidInput(format!(
            "{} name exceeds {} character limit: {} characters",
            what,
            MAX_IDENTIFIER_LEN,
            name.len()
        )));
    }

    if let Some(first) = name.chars().next() {
        if !first.is_ascii_alphabetic() && first != '_' {
            return Err(Error::InvalidInput(format!(
                "{} name must start with a letter or underscore, found: '{}'",
                what, first
            )));
        }
    }

    if let Some(ch) = name
        .chars()
        .find(|ch| !ch.is_ascii_alphanumeric() && *ch != '_')
    {
        return Err(Error::InvalidInput(format!(
            "{} name contains invalid character: '{}'. Only alphanumeric and underscore allowed",
            what, ch
        )));
    }

    let lowercase = name.to_lowercase();
    if RESERVED_KEYWORDS.contains(&lowercase.as_str()) {
        return Err(Error::InvalidInput(format!(
            "{} name '{}' is a reserved SQL keyword",
            what, name
        )));
    }

    Ok(())
}
