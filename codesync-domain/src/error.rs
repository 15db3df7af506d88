// /////////////////////////////////////////////////////////////////////////////
// codesync
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Error System
//!
//! A single hierarchical error type for the sync pipeline, together with the
//! failure-category taxonomy used by the error classifier, circuit breaker,
//! and retry policy. Every fallible boundary in the system returns
//! `Result<T, SyncError>`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad failure category used to decide retryability, logging severity, and
/// HTTP status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Network,
    Permission,
    Parsing,
    Embedding,
    Database,
    CircuitBreaker,
    Unknown,
}

impl ErrorCategory {
    /// Whether a failure in this category should be retried by the caller.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::Embedding | Self::Database)
    }

    /// Whether a full stack trace should be logged for this category, as
    /// opposed to a terse warning.
    pub fn should_log_full_trace(self) -> bool {
        !matches!(self, Self::Network | Self::CircuitBreaker)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Network => "network",
            Self::Permission => "permission",
            Self::Parsing => "parsing",
            Self::Embedding => "embedding",
            Self::Database => "database",
            Self::CircuitBreaker => "circuit_breaker",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// The single error type threaded through the sync engine and its
/// reliability envelope.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("network error: {0}")]
    Network(String),

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("parsing error: {0}")]
    Parsing(String),

    #[error("embedding provider error: {0}")]
    Embedding(String),

    #[error("knowledge store error: {0}")]
    Database(String),

    #[error("circuit open for project {project_id}")]
    CircuitOpen { project_id: String },

    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("invalid local path: {0}")]
    InvalidPath(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl SyncError {
    /// Classifies this error into the taxonomy used for retry/logging
    /// decisions. Kept in the domain crate because the category is a
    /// property of the error variant itself, not of how it was raised.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Network(_) => ErrorCategory::Network,
            Self::Permission(_) => ErrorCategory::Permission,
            Self::Parsing(_) => ErrorCategory::Parsing,
            Self::Embedding(_) => ErrorCategory::Embedding,
            Self::Database(_) => ErrorCategory::Database,
            Self::CircuitOpen { .. } => ErrorCategory::CircuitBreaker,
            Self::ProjectNotFound(_) | Self::InvalidPath(_) | Self::InvalidConfiguration(_) => {
                ErrorCategory::Unknown
            }
            Self::Unknown(_) => ErrorCategory::Unknown,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// A message safe to surface to a caller (HTTP `detail`, tool result),
    /// independent of the internal `Display` text.
    pub fn user_message(&self) -> String {
        match self {
            Self::CircuitOpen { project_id } => {
                format!("sync for project {project_id} is temporarily disabled after repeated failures")
            }
            Self::ProjectNotFound(id) => format!("project {id} was not found"),
            Self::InvalidPath(p) => format!("local path is not usable: {p}"),
            other => other.to_string(),
        }
    }
}
