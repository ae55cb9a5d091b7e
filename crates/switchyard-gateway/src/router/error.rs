use switchyard_core::{RegistryError, ToolStatus};
use thiserror::Error;

/// A failed outbound call: network error, timeout, or non-2xx response
#[derive(Debug, Clone, Error)]
#[error("dispatch to {endpoint} failed: {message}")]
pub struct DispatchFailure {
    pub endpoint: String,
    /// HTTP status, when a response was received
    pub status: Option<u16>,
    pub message: String,
    pub timed_out: bool,
}

impl DispatchFailure {
    pub fn network(endpoint: &str, message: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            status: None,
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn timeout(endpoint: &str, after: std::time::Duration) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            status: None,
            message: format!("timed out after {:?}", after),
            timed_out: true,
        }
    }

    pub fn status(endpoint: &str, status: u16, body: &str) -> Self {
        let snippet: String = body.chars().take(200).collect();
        Self {
            endpoint: endpoint.to_string(),
            status: Some(status),
            message: if snippet.is_empty() {
                format!("upstream returned HTTP {}", status)
            } else {
                format!("upstream returned HTTP {}: {}", status, snippet)
            },
            timed_out: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum RouterError {
    /// No registry entry for the requested name
    #[error("tool '{0}' not found in registry")]
    ToolNotFound(String),

    /// Entry exists but is not active
    #[error("tool '{tool}' is unavailable (status: {status})")]
    ToolUnavailable { tool: String, status: ToolStatus },

    #[error(transparent)]
    DispatchFailure(#[from] DispatchFailure),

    /// Reload failed; the previous registry remains authoritative
    #[error("registry refresh failed: {0}")]
    RegistryRefreshFailure(#[from] RegistryError),
}

impl RouterError {
    /// Suggested HTTP status for a boundary layer
    pub fn http_status(&self) -> u16 {
        match self {
            RouterError::ToolNotFound(_) => 404,
            RouterError::ToolUnavailable { .. } => 403,
            RouterError::DispatchFailure(failure) if failure.timed_out => 504,
            RouterError::DispatchFailure(_) => 502,
            RouterError::RegistryRefreshFailure(_) => 503,
        }
    }

    /// Errors raised before any network call was made
    pub fn is_pre_dispatch(&self) -> bool {
        matches!(
            self,
            RouterError::ToolNotFound(_) | RouterError::ToolUnavailable { .. }
        )
    }
}
