//! Backend kinds owned by the pool manager
//!
//! Each kind exposes `probe()` and `close()`; kind-specific operations live
//! on the inner type and callers dispatch on the `Backend` tag.

mod analytical;
mod document;
mod relational;

use std::sync::Arc;

use serde_json::Value;
use sqlx::pool::PoolConnection;
use sqlx::Any;
use switchyard_core::{BackendKind, BackendSpec};

use crate::error::PoolError;

pub use analytical::{AnalyticalBackend, AnalyticalClient, BigQueryClient};
pub use document::{DocumentBackend, DocumentClient, DocumentFields, FirestoreClient};
pub use relational::RelationalBackend;

pub enum Backend {
    Relational(RelationalBackend),
    Analytical(AnalyticalBackend),
    Document(DocumentBackend),
}

impl Backend {
    /// Construct the client for a configured backend without contacting it.
    pub fn build(spec: &BackendSpec) -> Result<Self, PoolError> {
        match spec {
            BackendSpec::Relational { name, spec } => {
                RelationalBackend::connect_lazy(name, spec).map(Backend::Relational)
            }
            BackendSpec::Analytical { spec, .. } => {
                let client = BigQueryClient::new(spec.clone())?;
                Ok(Backend::Analytical(AnalyticalBackend::new(Arc::new(client))))
            }
            BackendSpec::Document { spec, .. } => {
                let client = FirestoreClient::new(spec.clone())?;
                Ok(Backend::Document(DocumentBackend::new(Arc::new(client))))
            }
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Relational(_) => BackendKind::Relational,
            Backend::Analytical(_) => BackendKind::Analytical,
            Backend::Document(_) => BackendKind::Document,
        }
    }

    pub async fn probe(&self) -> Result<(), PoolError> {
        match self {
            Backend::Relational(b) => b.probe().await,
            Backend::Analytical(b) => b.probe().await,
            Backend::Document(b) => b.probe().await,
        }
    }

    pub async fn close(&self) -> Result<(), PoolError> {
        match self {
            Backend::Relational(b) => b.close().await,
            Backend::Analytical(b) => b.close().await,
            Backend::Document(b) => b.close().await,
        }
    }
}

/// What `get_connection` hands out.
///
/// A relational handle is a checked-out connection that returns to its pool
/// when dropped. The other kinds share one client, with no checkout.
pub enum ConnectionHandle {
    Relational(PoolConnection<Any>),
    Analytical(Arc<dyn AnalyticalClient>),
    Document(Arc<dyn DocumentClient>),
}

impl ConnectionHandle {
    pub fn kind(&self) -> BackendKind {
        match self {
            ConnectionHandle::Relational(_) => BackendKind::Relational,
            ConnectionHandle::Analytical(_) => BackendKind::Analytical,
            ConnectionHandle::Document(_) => BackendKind::Document,
        }
    }
}

/// Map a non-2xx response to `PoolError::Upstream`, preferring the API's
/// own `error.message`.
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, PoolError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.chars().take(200).collect());
    Err(PoolError::Upstream {
        status: Some(status.as_u16()),
        message,
    })
}
