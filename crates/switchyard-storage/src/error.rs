use std::time::Duration;

use switchyard_core::BackendKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    /// No backend with this name was initialized
    #[error("backend '{0}' is not configured")]
    BackendNotConfigured(String),

    /// Statement rejected by the statement guard
    #[error("forbidden operation: {0}")]
    ForbiddenOperation(String),

    /// Table not on the allow-list for generic helpers
    #[error("table '{0}' is not allowed")]
    ForbiddenTable(String),

    #[error("operation '{operation}' is not supported by {kind} backend '{backend}'")]
    UnsupportedOperation {
        backend: String,
        kind: BackendKind,
        operation: &'static str,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("operation on backend '{backend}' timed out after {after:?}")]
    Timeout { backend: String, after: Duration },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Failure reported by a REST-backed client
    #[error("upstream error{}: {message}", status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    Upstream { status: Option<u16>, message: String },
}

impl PoolError {
    pub fn upstream(message: impl Into<String>) -> Self {
        PoolError::Upstream {
            status: None,
            message: message.into(),
        }
    }

    /// Suggested HTTP status for a boundary layer
    pub fn http_status(&self) -> u16 {
        match self {
            PoolError::BackendNotConfigured(_) => 404,
            PoolError::ForbiddenOperation(_) | PoolError::ForbiddenTable(_) => 403,
            PoolError::UnsupportedOperation { .. } | PoolError::InvalidInput(_) => 400,
            PoolError::Timeout { .. } => 504,
            PoolError::Database(_) | PoolError::Upstream { .. } => 502,
        }
    }
}
