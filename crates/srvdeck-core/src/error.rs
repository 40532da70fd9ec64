//! Application error types with rich context

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::types::ResourceId;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Application error types organized by layer/domain
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Common/Infrastructure Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // Transport Errors
    // ─────────────────────────────────────────────────────────────
    /// The management server could not be reached at all (connection
    /// refused, DNS failure, reset before a status line was read).
    #[error("Network error: {message}")]
    Network { message: String },

    /// The server answered with a non-2xx status. `message` is the
    /// application message from the body when one could be decoded.
    #[error("{message}")]
    Server { status: u16, message: String },

    /// A 2xx response whose body did not have the expected shape.
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("{operation} timed out after {}s", .elapsed.as_secs())]
    Timeout {
        operation: String,
        elapsed: Duration,
    },

    // ─────────────────────────────────────────────────────────────
    // Lifecycle Errors
    // ─────────────────────────────────────────────────────────────
    /// A status query reported neither readiness nor a running process.
    #[error("{message}")]
    PollAnomaly {
        resource: ResourceId,
        message: String,
    },

    #[error("Unknown server: {id}")]
    NotFound { id: ResourceId },

    // ─────────────────────────────────────────────────────────────
    // Upload Errors
    // ─────────────────────────────────────────────────────────────
    #[error("{message}")]
    Validation { message: String },

    /// The server reported that unpacking an uploaded archive failed.
    #[error("{message}")]
    Extraction { message: String },

    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ─────────────────────────────────────────────────────────────
    // Channel/Communication Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Channel closed unexpectedly")]
    ChannelClosed,
}

// ─────────────────────────────────────────────────────────────────
// Convenience Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, elapsed: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed,
        }
    }

    pub fn poll_anomaly(resource: impl Into<ResourceId>, message: impl Into<String>) -> Self {
        Self::PollAnomaly {
            resource: resource.into(),
            message: message.into(),
        }
    }

    pub fn not_found(id: impl Into<ResourceId>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn extraction(message: impl Into<String>) -> Self {
        Self::Extraction {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Transport could not reach the server (distinct from an
    /// application-level rejection).
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Network { .. })
    }
}

// ─────────────────────────────────────────────────────────────────
// Cloneable Error Reports
// ─────────────────────────────────────────────────────────────────

/// Coarse classification used when an error crosses the message channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    Server,
    Validation,
    PollAnomaly,
    Timeout,
    Protocol,
    Internal,
}

/// Clonable snapshot of an [`Error`], stored in error slots and carried in
/// messages (which must be `Clone`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorReport {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }
}

impl std::fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Network { .. } => ErrorKind::Network,
            Error::Server { .. } | Error::NotFound { .. } | Error::Extraction { .. } => {
                ErrorKind::Server
            }
            Error::Validation { .. } => ErrorKind::Validation,
            Error::PollAnomaly { .. } => ErrorKind::PollAnomaly,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::Protocol { .. } | Error::Json(_) => ErrorKind::Protocol,
            _ => ErrorKind::Internal,
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport::new(self.kind(), self.to_string())
    }
}

impl From<&Error> for ErrorReport {
    fn from(err: &Error) -> Self {
        err.report()
    }
}

impl From<Error> for ErrorReport {
    fn from(err: Error) -> Self {
        err.report()
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Context Extensions
// ─────────────────────────────────────────────────────────────────

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", context.into(), err);
            err
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", f(), err);
            err
        })
    }
}
