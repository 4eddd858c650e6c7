//! Error types for cs-core
//!
//! Every error carries one of the mesh-wide [`ErrorKind`]s so callers can
//! decide between retrying, surfacing, and treating a step as terminal.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure classification shared by every component of the mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or disallowed arguments; never retried
    Validation,
    /// Referenced entity is absent
    NotFound,
    /// Network failure or timeout; eligible for bounded retry
    Transient,
    /// Store state changed underneath the operation
    Consistency,
    /// Anything else (bugs, configuration, serialization)
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Transient => "transient",
            Self::Consistency => "consistency",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for cs-core
#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Consistency error: {0}")]
    Consistency(String),

    /// The request may have reached its target before the deadline expired
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The request never reached its target
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid workflow transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Rebuild an error from a wire `{kind, message}` pair
    pub fn from_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::Validation => Self::Validation(message),
            ErrorKind::NotFound => Self::NotFound(message),
            ErrorKind::Consistency => Self::Consistency(message),
            // A remote transient error is only reported after the remote
            // side rolled back, so nothing was applied.
            ErrorKind::Transient => Self::Unavailable(message),
            ErrorKind::Internal => Self::Other(message),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Consistency(_) => ErrorKind::Consistency,
            Self::Timeout(_) | Self::Unavailable(_) => ErrorKind::Transient,
            Self::Http(e) if e.is_timeout() || e.is_connect() || e.is_request() => {
                ErrorKind::Transient
            }
            Self::Http(_) => ErrorKind::Internal,
            Self::Database(e) => classify_sqlite(e),
            Self::Json(_)
            | Self::InvalidTransition { .. }
            | Self::Config(_)
            | Self::Io(_)
            | Self::Other(_) => ErrorKind::Internal,
        }
    }

    /// Whether a bounded retry may be attempted at all
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Whether a failed write could still have been applied by the store.
    ///
    /// Only `false` when the request provably never reached its target.
    pub fn may_have_applied(&self) -> bool {
        match self {
            Self::Unavailable(_) => false,
            Self::Http(e) => !e.is_connect(),
            Self::Database(e) => classify_sqlite(e) != ErrorKind::Transient,
            _ => true,
        }
    }

    /// Message safe to show outside the process
    pub fn public_message(&self) -> String {
        match self {
            Self::Validation(m)
            | Self::NotFound(m)
            | Self::Consistency(m)
            | Self::Timeout(m)
            | Self::Unavailable(m) => m.clone(),
            _ if self.kind() == ErrorKind::Internal => "internal error".to_string(),
            _ => self.to_string(),
        }
    }
}

fn classify_sqlite(e: &rusqlite::Error) -> ErrorKind {
    match e.sqlite_error_code() {
        Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked) => {
            ErrorKind::Transient
        }
        Some(rusqlite::ErrorCode::ConstraintViolation) => ErrorKind::Consistency,
        _ => ErrorKind::Internal,
    }
}

/// Wire form of an error: `{"kind": ..., "message": ...}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorDetail {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<&Error> for ErrorDetail {
    fn from(err: &Error) -> Self {
        Self::new(err.kind(), err.public_message())
    }
}

impl From<ErrorDetail> for Error {
    fn from(detail: ErrorDetail) -> Self {
        Error::from_kind(detail.kind, detail.message)
    }
}

impl std::fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Error response body of every HTTP surface: `{"error": {...}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

impl From<ErrorDetail> for ErrorBody {
    fn from(error: ErrorDetail) -> Self {
        Self { error }
    }
}

/// Result type alias for cs-core
pub type Result<T> = std::result::Result<T, Error>;
