//! Pooled relational backend (sqlx `Any` driver)
//!
//! Postgres in production, SQLite for local runs and tests. Values are
//! exchanged as JSON: parameters are bound positionally (`$1`, `$2`, ...)
//! and rows come back as objects keyed by column name in select order.
//!
//! The `Any` driver decodes integers, floats, booleans, text and blobs.
//! Driver-specific column types (timestamptz, uuid, jsonb, ...) must be cast
//! to text in the statement.

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use serde_json::{Map, Number, Value};
use sqlx::any::{AnyArguments, AnyPoolOptions, AnyRow};
use sqlx::pool::PoolConnection;
use sqlx::query::Query;
use sqlx::{Any, AnyPool, Column, Row, ValueRef};
use switchyard_core::RelationalSpec;
use tracing::debug;

use crate::error::PoolError;

/// Upper bound on waiting for in-flight connections during close
const CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

static INSTALL_DRIVERS: Once = Once::new();

pub struct RelationalBackend {
    name: String,
    pool: AnyPool,
    query_timeout: Option<Duration>,
}

impl RelationalBackend {
    /// Build the pool without opening a connection.
    ///
    /// Fails only when the connection string cannot be parsed.
    pub fn connect_lazy(name: &str, spec: &RelationalSpec) -> Result<Self, PoolError> {
        INSTALL_DRIVERS.call_once(sqlx::any::install_default_drivers);

        let pool = AnyPoolOptions::new()
            .max_connections(spec.max_connections)
            .idle_timeout(spec.idle_timeout)
            .acquire_timeout(spec.connect_timeout)
            .connect_lazy(&spec.url)?;

        debug!(
            "[PoolManager] Relational pool '{}' configured (max_connections={})",
            name, spec.max_connections
        );

        Ok(Self {
            name: name.to_string(),
            pool,
            query_timeout: spec.query_timeout,
        })
    }

    /// Check out a connection; it returns to the pool when dropped.
    pub async fn acquire(&self) -> Result<PoolConnection<Any>, PoolError> {
        Ok(self.pool.acquire().await?)
    }

    pub async fn fetch(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<Vec<Map<String, Value>>, PoolError> {
        let query = bind_params(sqlx::query(sql), params);
        let rows = self.with_timeout(query.fetch_all(&self.pool)).await??;
        rows.iter().map(row_to_json).collect()
    }

    pub async fn fetch_optional(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<Option<Map<String, Value>>, PoolError> {
        let query = bind_params(sqlx::query(sql), params);
        let row = self.with_timeout(query.fetch_optional(&self.pool)).await??;
        row.as_ref().map(row_to_json).transpose()
    }

    pub async fn probe(&self) -> Result<(), PoolError> {
        self.with_timeout(sqlx::query("SELECT 1").execute(&self.pool))
            .await??;
        Ok(())
    }

    pub async fn close(&self) -> Result<(), PoolError> {
        tokio::time::timeout(CLOSE_TIMEOUT, self.pool.close())
            .await
            .map_err(|_| PoolError::Timeout {
                backend: self.name.clone(),
                after: CLOSE_TIMEOUT,
            })
    }

    async fn with_timeout<F, T>(&self, fut: F) -> Result<T, PoolError>
    where
        F: Future<Output = T>,
    {
        match self.query_timeout {
            Some(after) => tokio::time::timeout(after, fut)
                .await
                .map_err(|_| PoolError::Timeout {
                    backend: self.name.clone(),
                    after,
                }),
            None => Ok(fut.await),
        }
    }
}

/// Bind JSON values in order. Arrays and objects are bound as JSON text.
pub(crate) fn bind_params<'q>(
    mut query: Query<'q, Any, AnyArguments<'q>>,
    params: &[Value],
) -> Query<'q, Any, AnyArguments<'q>> {
    for param in params {
        query = match param {
            Value::Null => query.bind(Option::<String>::None),
            Value::Bool(b) => query.bind(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => query.bind(i),
                None => query.bind(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => query.bind(s.clone()),
            other => query.bind(other.to_string()),
        };
    }
    query
}

pub(crate) fn row_to_json(row: &AnyRow) -> Result<Map<String, Value>, PoolError> {
    let mut object = Map::with_capacity(row.columns().len());
    for (index, column) in row.columns().iter().enumerate() {
        object.insert(column.name().to_string(), column_value(row, index)?);
    }
    Ok(object)
}

fn column_value(row: &AnyRow, index: usize) -> Result<Value, PoolError> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(Value::Null);
    }
    if let Ok(v) = row.try_get::<i64, _>(index) {
        return Ok(Value::from(v));
    }
    if let Ok(v) = row.try_get::<i32, _>(index) {
        return Ok(Value::from(v));
    }
    if let Ok(v) = row.try_get::<f64, _>(index) {
        return Ok(Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null));
    }
    if let Ok(v) = row.try_get::<bool, _>(index) {
        return Ok(Value::Bool(v));
    }
    if let Ok(v) = row.try_get::<String, _>(index) {
        return Ok(Value::String(v));
    }
    if let Ok(v) = row.try_get::<Vec<u8>, _>(index) {
        return Ok(Value::Array(v.into_iter().map(Value::from).collect()));
    }
    Err(PoolError::InvalidInput(format!(
        "column '{}' has a type the generic driver cannot decode; cast it to text",
        row.columns()[index].name()
    )))
}
