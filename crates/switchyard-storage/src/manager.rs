//! Connection pool manager
//!
//! Owns one long-lived client per configured backend, keyed by name, and
//! exposes the guarded query surface on top of them. Counters are kept per
//! backend; health checks probe every backend concurrently and report each
//! one independently.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use serde::Serialize;
use serde_json::{Map, Value};
use switchyard_core::{BackendKind, PoolSettings};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backends::{Backend, ConnectionHandle, DocumentFields};
use crate::error::PoolError;
use crate::policy::{check_column, KeywordDenylist, StatementGuard, TableAllowList};
use crate::stats::{BackendStats, StatsCounter};

/// Upper bound for a single liveness probe
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

pub type Row = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub rows: Vec<Row>,
}

/// Outcome of `firestore_get`; serializes as `null`, an object or an array.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DocumentResult {
    Missing,
    Document(Row),
    Collection(Vec<Row>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteResult {
    pub success: bool,
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendHealth {
    #[serde(rename = "type")]
    pub kind: BackendKind,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub stats: BackendStats,
}

impl BackendHealth {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

struct ManagedBackend {
    backend: Backend,
    stats: StatsCounter,
}

pub struct ConnectionPoolManager {
    backends: DashMap<String, Arc<ManagedBackend>>,
    guard: Arc<dyn StatementGuard>,
    allowed_tables: TableAllowList,
}

impl ConnectionPoolManager {
    /// Build and verify every configured backend.
    ///
    /// A backend whose client cannot be constructed is omitted with a
    /// warning. A backend that fails its first probe is kept; it reports
    /// unhealthy until it recovers.
    pub async fn initialize(settings: &PoolSettings) -> Self {
        let mut built = Vec::with_capacity(settings.backends.len());
        for spec in &settings.backends {
            match Backend::build(spec) {
                Ok(backend) => built.push((spec.name().to_string(), backend)),
                Err(e) => warn!(
                    "[PoolManager] Skipping {} backend '{}': {}",
                    spec.kind(),
                    spec.name(),
                    e
                ),
            }
        }

        let manager = Self::from_backends(built, settings.allowed_tables.as_slice()).await;

        let checks = manager.entries().into_iter().map(|(name, managed)| async move {
            match probe(&managed.backend).await {
                Ok(()) => info!(
                    "[PoolManager] {} backend '{}' connected",
                    managed.backend.kind(),
                    name
                ),
                Err(e) => warn!(
                    "[PoolManager] {} backend '{}' failed verification: {}",
                    managed.backend.kind(),
                    name,
                    e
                ),
            }
        });
        join_all(checks).await;

        info!(
            "[PoolManager] Initialized {} of {} configured backends",
            manager.len(),
            settings.backends.len()
        );
        manager
    }

    /// Assemble a manager from already-built backends, without probing.
    ///
    /// Names are unique: the first backend under a name is kept and any
    /// later one is closed and dropped.
    pub async fn from_backends<I, S>(backends: I, allowed_tables: &[S]) -> Self
    where
        I: IntoIterator<Item = (String, Backend)>,
        S: AsRef<str>,
    {
        let map = DashMap::new();
        let mut duplicates = Vec::new();
        for (name, backend) in backends {
            match map.entry(name) {
                Entry::Occupied(entry) => {
                    warn!(
                        "[PoolManager] Duplicate backend name '{}'; keeping the first",
                        entry.key()
                    );
                    duplicates.push((entry.key().clone(), backend));
                }
                Entry::Vacant(entry) => {
                    entry.insert(Arc::new(ManagedBackend {
                        backend,
                        stats: StatsCounter::default(),
                    }));
                }
            }
        }
        join_all(
            duplicates
                .iter()
                .map(|(name, backend)| close_backend(name, backend)),
        )
        .await;

        Self {
            backends: map,
            guard: Arc::new(KeywordDenylist::default()),
            allowed_tables: TableAllowList::new(allowed_tables),
        }
    }

    /// Replace the relational statement guard.
    pub fn with_guard(mut self, guard: Arc<dyn StatementGuard>) -> Self {
        self.guard = guard;
        self
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.backends.contains_key(name)
    }

    pub fn kind_of(&self, name: &str) -> Option<BackendKind> {
        self.backends.get(name).map(|m| m.backend.kind())
    }

    fn backend(&self, name: &str) -> Result<Arc<ManagedBackend>, PoolError> {
        self.backends
            .get(name)
            .map(|m| Arc::clone(m.value()))
            .ok_or_else(|| PoolError::BackendNotConfigured(name.to_string()))
    }

    fn entries(&self) -> Vec<(String, Arc<ManagedBackend>)> {
        self.backends
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect()
    }

    /// Hand out a connection handle.
    ///
    /// Relational backends return a checked-out pooled connection that goes
    /// back to the pool when the handle is dropped.
    pub async fn get_connection(&self, name: &str) -> Result<ConnectionHandle, PoolError> {
        let managed = self.backend(name)?;
        match &managed.backend {
            Backend::Relational(b) => Ok(ConnectionHandle::Relational(b.acquire().await?)),
            Backend::Analytical(b) => Ok(ConnectionHandle::Analytical(b.client())),
            Backend::Document(b) => Ok(ConnectionHandle::Document(b.client())),
        }
    }

    /// Run a statement against a relational or analytical backend.
    ///
    /// Relational statements pass the statement guard first. Document
    /// backends reject generic queries.
    pub async fn query(
        &self,
        name: &str,
        sql: &str,
        params: &[Value],
    ) -> Result<QueryResult, PoolError> {
        let managed = self.backend(name)?;
        let rows = tracked(name, &managed, self.run_query(name, &managed.backend, sql, params))
            .await?;
        Ok(QueryResult { rows })
    }

    async fn run_query(
        &self,
        name: &str,
        backend: &Backend,
        sql: &str,
        params: &[Value],
    ) -> Result<Vec<Row>, PoolError> {
        match backend {
            Backend::Relational(b) => {
                self.guard.check(sql)?;
                b.fetch(sql, params).await
            }
            Backend::Analytical(b) => b.query(sql, params).await,
            Backend::Document(_) => Err(unsupported(name, BackendKind::Document, "query")),
        }
    }

    /// Fetch one document (with its `id` merged in) or a whole collection.
    pub async fn firestore_get(
        &self,
        name: &str,
        collection: &str,
        document_id: Option<&str>,
    ) -> Result<DocumentResult, PoolError> {
        check_path_segment("collection", collection)?;
        if let Some(id) = document_id {
            check_path_segment("document id", id)?;
        }
        let managed = self.backend(name)?;
        tracked(
            name,
            &managed,
            get_documents(name, &managed.backend, collection, document_id),
        )
        .await
    }

    /// Create or replace the document at a known key.
    pub async fn firestore_set(
        &self,
        name: &str,
        collection: &str,
        document_id: &str,
        data: DocumentFields,
    ) -> Result<WriteResult, PoolError> {
        check_path_segment("collection", collection)?;
        check_path_segment("document id", document_id)?;
        let managed = self.backend(name)?;
        tracked(
            name,
            &managed,
            set_document(name, &managed.backend, collection, document_id, &data),
        )
        .await?;
        Ok(WriteResult {
            success: true,
            id: document_id.to_string(),
        })
    }

    /// Insert a document under a generated UUID v4 key.
    pub async fn firestore_add(
        &self,
        name: &str,
        collection: &str,
        data: DocumentFields,
    ) -> Result<WriteResult, PoolError> {
        let id = Uuid::new_v4().to_string();
        self.firestore_set(name, collection, &id, data).await
    }

    /// Insert a row into an allow-listed table and return the stored row.
    pub async fn insert_record(
        &self,
        name: &str,
        table: &str,
        record: &Row,
    ) -> Result<Row, PoolError> {
        self.allowed_tables.check(table)?;
        if record.is_empty() {
            return Err(PoolError::InvalidInput("record has no columns".into()));
        }
        for column in record.keys() {
            check_column(column)?;
        }

        let managed = self.backend(name)?;
        let columns: Vec<&str> = record.keys().map(String::as_str).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${}", i)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
            table,
            columns.join(", "),
            placeholders.join(", ")
        );
        let params: Vec<Value> = record.values().cloned().collect();

        let inserted = tracked(
            name,
            &managed,
            fetch_one_row(name, &managed.backend, "insert_record", &sql, &params),
        )
        .await?;
        inserted.ok_or_else(|| {
            PoolError::upstream(format!("insert into '{}' returned no row", table))
        })
    }

    /// Look up a row by its `id` column in an allow-listed table.
    pub async fn select_by_id(
        &self,
        name: &str,
        table: &str,
        id: &Value,
    ) -> Result<Option<Row>, PoolError> {
        self.allowed_tables.check(table)?;
        let managed = self.backend(name)?;
        let sql = format!("SELECT * FROM {} WHERE id = $1", table);

        tracked(
            name,
            &managed,
            fetch_one_row(
                name,
                &managed.backend,
                "select_by_id",
                &sql,
                std::slice::from_ref(id),
            ),
        )
        .await
    }

    /// Probe every backend concurrently.
    ///
    /// One backend failing or hanging never affects the others' reports.
    pub async fn health_check(&self) -> BTreeMap<String, BackendHealth> {
        let probes = self.entries().into_iter().map(|(name, managed)| async move {
            let outcome = probe(&managed.backend).await;
            if let Err(e) = &outcome {
                debug!("[PoolManager] Backend '{}' unhealthy: {}", name, e);
            }
            let health = BackendHealth {
                kind: managed.backend.kind(),
                status: if outcome.is_ok() {
                    HealthStatus::Healthy
                } else {
                    HealthStatus::Unhealthy
                },
                error: outcome.err().map(|e| e.to_string()),
                stats: managed.stats.snapshot(),
            };
            (name, health)
        });

        join_all(probes).await.into_iter().collect()
    }

    /// Current counters, without probing.
    pub fn get_stats(&self) -> BTreeMap<String, BackendStats> {
        self.backends
            .iter()
            .map(|e| (e.key().clone(), e.value().stats.snapshot()))
            .collect()
    }

    /// Close every backend and empty the map.
    ///
    /// Close failures are logged and never stop the remaining backends from
    /// closing.
    pub async fn shutdown(&self) {
        let names: Vec<String> = self.backends.iter().map(|e| e.key().clone()).collect();
        let removed: Vec<(String, Arc<ManagedBackend>)> = names
            .into_iter()
            .filter_map(|name| self.backends.remove(&name))
            .collect();

        join_all(
            removed
                .iter()
                .map(|(name, managed)| close_backend(name, &managed.backend)),
        )
        .await;

        info!("[PoolManager] Shut down {} backends", removed.len());
    }
}

async fn close_backend(name: &str, backend: &Backend) {
    match backend.close().await {
        Ok(()) => debug!("[PoolManager] Closed backend '{}'", name),
        Err(e) => warn!("[PoolManager] Failed to close backend '{}': {}", name, e),
    }
}

/// Count the call, and count the error if it fails.
async fn tracked<T, F>(name: &str, managed: &ManagedBackend, operation: F) -> Result<T, PoolError>
where
    F: std::future::Future<Output = Result<T, PoolError>>,
{
    managed.stats.record_query();
    let result = operation.await;
    if let Err(e) = &result {
        managed.stats.record_error();
        warn!("[PoolManager] Operation on '{}' failed: {}", name, e);
    }
    result
}

async fn probe(backend: &Backend) -> Result<(), PoolError> {
    tokio::time::timeout(PROBE_TIMEOUT, backend.probe())
        .await
        .map_err(|_| PoolError::upstream(format!("probe timed out after {:?}", PROBE_TIMEOUT)))?
}

async fn fetch_one_row(
    name: &str,
    backend: &Backend,
    operation: &'static str,
    sql: &str,
    params: &[Value],
) -> Result<Option<Row>, PoolError> {
    match backend {
        Backend::Relational(b) => b.fetch_optional(sql, params).await,
        other => Err(unsupported(name, other.kind(), operation)),
    }
}

async fn get_documents(
    name: &str,
    backend: &Backend,
    collection: &str,
    document_id: Option<&str>,
) -> Result<DocumentResult, PoolError> {
    let Backend::Document(b) = backend else {
        return Err(unsupported(name, backend.kind(), "firestore_get"));
    };
    match document_id {
        Some(id) => Ok(match b.get(collection, id).await? {
            Some(fields) => DocumentResult::Document(with_id(id.to_string(), fields)),
            None => DocumentResult::Missing,
        }),
        None => Ok(DocumentResult::Collection(
            b.list(collection)
                .await?
                .into_iter()
                .map(|(id, fields)| with_id(id, fields))
                .collect(),
        )),
    }
}

async fn set_document(
    name: &str,
    backend: &Backend,
    collection: &str,
    document_id: &str,
    data: &DocumentFields,
) -> Result<(), PoolError> {
    match backend {
        Backend::Document(b) => b.set(collection, document_id, data).await,
        other => Err(unsupported(name, other.kind(), "firestore_set")),
    }
}

fn unsupported(name: &str, kind: BackendKind, operation: &'static str) -> PoolError {
    PoolError::UnsupportedOperation {
        backend: name.to_string(),
        kind,
        operation,
    }
}

fn check_path_segment(what: &str, value: &str) -> Result<(), PoolError> {
    if value.is_empty() || value.contains('/') {
        return Err(PoolError::InvalidInput(format!(
            "{} must be a non-empty name without '/'",
            what
        )));
    }
    Ok(())
}

fn with_id(id: String, mut fields: DocumentFields) -> Row {
    fields.insert("id".to_string(), Value::String(id));
    fields
}
