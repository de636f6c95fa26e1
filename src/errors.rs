//! Error handling for the ballot box

use std::path::PathBuf;

/// Result type alias for the ballot box
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the ballot box
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Bad or missing input: field contents, age, identity format, selections
    #[error("Validation failed: {field}: {reason}")]
    Validation { field: String, reason: String },

    /// The identity digest is already in the voter registry
    #[error("This identity has already voted")]
    DuplicateVote,

    /// I/O failure reading or writing a state file
    #[error("Persistence error on {}: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed JSON found while loading a state file
    #[error("Malformed JSON in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration value
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl Error {
    /// Create a new validation error
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a new persistence error
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }

    /// Create a new parse error
    pub fn parse(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Parse {
            path: path.into(),
            source,
        }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the session can report this error and carry on
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Config { .. } | Self::Internal { .. })
    }
}

/// Convenience macros for creating specific error types
#[macro_export]
macro_rules! validation_error {
    ($field:expr, $msg:expr) => {
        $crate::Error::validation($field, $msg)
    };
    ($field:expr, $fmt:expr, $($arg:tt)*) => {
        $crate::Error::validation($field, format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! persistence_error {
    ($path:expr, $source:expr) => {
        $crate::Error::persistence($path, $source)
    };
}
