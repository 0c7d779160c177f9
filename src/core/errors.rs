//! SCS-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, ScsError>;

/// Top-level error type for the scenario sampler.
#[derive(Debug, Error)]
pub enum ScsError {
    /// A config value failed validation.
    #[error("[SCS-1001] invalid configuration: {details}")]
    InvalidConfig {
        /// What was wrong.
        details: String,
    },

    /// An explicitly requested config file does not exist.
    #[error("[SCS-1002] missing configuration file: {path}")]
    MissingConfig {
        /// Requested path.
        path: PathBuf,
    },

    /// Config text or an env override could not be parsed.
    #[error("[SCS-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        /// Source being parsed.
        context: &'static str,
        /// Parser message.
        details: String,
    },

    /// Caller passed arguments an operation cannot accept.
    #[error("[SCS-1101] invalid input to {operation}: {details}")]
    InvalidInput {
        /// Operation that rejected the input.
        operation: &'static str,
        /// What was wrong.
        details: String,
    },

    /// JSON encoding or decoding failed.
    #[error("[SCS-2101] serialization failure in {context}: {details}")]
    Serialization {
        /// Format or payload involved.
        context: &'static str,
        /// Serializer message.
        details: String,
    },

    /// Filesystem access failed.
    #[error("[SCS-3002] IO failure at {path}: {source}")]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Worker or other runtime failure.
    #[error("[SCS-3900] runtime failure: {details}")]
    Runtime {
        /// What failed.
        details: String,
    },
}

impl ScsError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "SCS-1001",
            Self::MissingConfig { .. } => "SCS-1002",
            Self::ConfigParse { .. } => "SCS-1003",
            Self::InvalidInput { .. } => "SCS-1101",
            Self::Serialization { .. } => "SCS-2101",
            Self::Io { .. } => "SCS-3002",
            Self::Runtime { .. } => "SCS-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    ///
    /// Input errors are caller bugs and never retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Runtime { .. })
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for caller-side argument errors.
    #[must_use]
    pub fn invalid_input(operation: &'static str, details: impl Into<String>) -> Self {
        Self::InvalidInput {
            operation,
            details: details.into(),
        }
    }
}

impl From<serde_json::Error> for ScsError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for ScsError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
