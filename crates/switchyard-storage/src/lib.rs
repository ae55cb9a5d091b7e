//! # Switchyard Storage
//!
//! Connection pool manager: one long-lived client per configured backend,
//! a guarded query surface, and per-backend health and statistics.
//!
//! ## Modules
//!
//! - `backends` - Relational (sqlx), analytical (BigQuery REST) and document (Firestore REST) clients
//! - `manager` - `ConnectionPoolManager`, the public call surface
//! - `policy` - Statement denylist and table allow-list
//! - `stats` - Per-backend counters
//! - `error` - `PoolError`

pub mod backends;
pub mod error;
pub mod manager;
pub mod policy;
pub mod stats;

pub use backends::{
    AnalyticalBackend, AnalyticalClient, Backend, BigQueryClient, ConnectionHandle,
    DocumentBackend, DocumentClient, DocumentFields, FirestoreClient, RelationalBackend,
};
pub use error::PoolError;
pub use manager::{
    BackendHealth, ConnectionPoolManager, DocumentResult, HealthStatus, QueryResult, Row,
    WriteResult,
};
pub use policy::{KeywordDenylist, StatementGuard, TableAllowList, DENIED_KEYWORDS};
pub use stats::BackendStats;
