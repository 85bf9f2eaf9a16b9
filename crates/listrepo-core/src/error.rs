//! Error types for listrepo.

use thiserror::Error;

/// Result type alias using listrepo's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for listrepo operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A field name did not resolve against the entity metadata
    #[error("Field not found: {0}")]
    FieldNotFound(String),

    /// An association name did not resolve against the entity metadata
    #[error("Association not found: {0}")]
    AssociationNotFound(String),

    /// No metadata registered for the entity
    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    /// Entity metadata failed validation
    #[error("Schema error: {0}")]
    Schema(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
