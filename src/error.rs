// src/error.rs

//! Unified error handling for the indexer.

use std::fmt;

use thiserror::Error;

/// Result type alias for indexer operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request to the index failed
    #[cfg(feature = "elastic")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Inbound event could not be turned into a CI record
    #[error("Event parse error ({msg_type}): {message}")]
    Parse { msg_type: String, message: String },

    /// The index store rejected or failed an operation
    #[error("Index error for {context}: {message}")]
    Index { context: String, message: String },

    /// An external collaborator failed
    #[error("{name} failed: {message}")]
    Collaborator { name: String, message: String },

    /// Work was aborted through its cancellation token
    #[error("Operation cancelled")]
    Cancelled,
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an event parse error for the given type tag.
    pub fn parse(msg_type: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Parse {
            msg_type: msg_type.into(),
            message: message.to_string(),
        }
    }

    /// Create an index error with context.
    pub fn index(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Index {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a collaborator error.
    pub fn collaborator(name: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Collaborator {
            name: name.into(),
            message: message.to_string(),
        }
    }
}
