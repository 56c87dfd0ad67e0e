//! Error types for berth.
//!
//! All errors use `thiserror` for ergonomic error handling and proper error chains.

use crate::types::ResourceKind;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for berth operations.
pub type Result<T> = std::result::Result<T, BerthError>;

/// Main error type for berth.
#[derive(Error, Debug)]
pub enum BerthError {
    // Runtime connectivity
    #[error("Container runtime unreachable: {reason}")]
    Connectivity { reason: String },

    // Reconciliation errors
    #[error(
        "{kind} {name} declared as external, but could not be found. \
         Create it manually and try again"
    )]
    ExternalResourceNotFound { kind: ResourceKind, name: String },

    #[error("Cannot translate service '{service}': {reason}")]
    ConfigTranslation { service: String, reason: String },

    #[error("{kind} {name} is still in use: {reason}")]
    ResourceInUse { kind: ResourceKind, name: String, reason: String },

    // Runtime responses
    #[error("{kind} not found: {name}")]
    NotFound { kind: ResourceKind, name: String },

    #[error("Runtime request '{operation}' failed: {reason}")]
    Runtime { operation: String, reason: String },

    // Compose errors
    #[error("Compose parse error: {reason}")]
    ComposeParseError { reason: String },

    #[error("Unsupported compose version: {version}")]
    UnsupportedComposeVersion { version: String },

    #[error("File read error: {path}: {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    // Configuration errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("I/O error at {path:?}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BerthError {
    /// Create an Internal error from any error type.
    pub fn internal(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Internal(err.to_string())
    }

    /// Shorthand for a translation failure on `service`.
    pub fn translation(service: &str, reason: impl Into<String>) -> Self {
        Self::ConfigTranslation { service: service.to_string(), reason: reason.into() }
    }

    /// True when the runtime reported the target as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
