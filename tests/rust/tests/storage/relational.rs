//! Guarded relational access over a pooled SQLite backend

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};
use switchyard_core::{BackendSpec, PoolSettings};
use switchyard_storage::{ConnectionHandle, ConnectionPoolManager, PoolError, StatementGuard};
use tempfile::TempDir;
use tests::storage::{sqlite_backend, USERS_SCHEMA};

async fn manager_with_users(dir: &TempDir) -> ConnectionPoolManager {
    let settings = PoolSettings {
        backends: vec![sqlite_backend("main", dir.path())],
        ..PoolSettings::default()
    };
    let manager = ConnectionPoolManager::initialize(&settings).await;

    match manager.get_connection("main").await.unwrap() {
        ConnectionHandle::Relational(mut conn) => {
            sqlx::query(USERS_SCHEMA).execute(&mut *conn).await.unwrap();
        }
        _ => panic!("expected a relational connection"),
    }
    manager
}

fn record(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

#[tokio::test]
async fn test_denylisted_statements_never_reach_database() {
    let dir = TempDir::new().unwrap();
    let manager = manager_with_users(&dir).await;

    for sql in [
        "DROP TABLE users",
        "delete from users",
        "Truncate users",
        "ALTER table users ADD COLUMN x INTEGER",
        "create TABLE other (id INTEGER)",
    ] {
        let err = manager.query("main", sql, &[]).await.unwrap_err();
        assert!(
            matches!(err, PoolError::ForbiddenOperation(_)),
            "{sql} was not rejected"
        );
    }

    // table still there
    let result = manager
        .query("main", "SELECT COUNT(*) AS n FROM users", &[])
        .await
        .unwrap();
    assert_eq!(result.rows[0]["n"], json!(0));

    let stats = &manager.get_stats()["main"];
    assert_eq!(stats.queries, 6);
    assert_eq!(stats.errors, 5);
}

#[tokio::test]
async fn test_query_binds_parameters_and_preserves_column_order() {
    let dir = TempDir::new().unwrap();
    let manager = manager_with_users(&dir).await;

    manager
        .query(
            "main",
            "INSERT INTO users (id, email, active) VALUES ($1, $2, $3)",
            &[json!(1), json!("ada@example.com"), json!(true)],
        )
        .await
        .unwrap();

    let result = manager
        .query(
            "main",
            "SELECT email, id FROM users WHERE email = $1",
            &[json!("ada@example.com")],
        )
        .await
        .unwrap();

    assert_eq!(result.rows.len(), 1);
    let columns: Vec<&str> = result.rows[0].keys().map(String::as_str).collect();
    assert_eq!(columns, vec!["email", "id"]);
    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        json!({"rows": [{"email": "ada@example.com", "id": 1}]})
    );
}

#[tokio::test]
async fn test_insert_record_then_select_by_id() {
    let dir = TempDir::new().unwrap();
    let manager = manager_with_users(&dir).await;

    let inserted = manager
        .insert_record(
            "main",
            "users",
            &record(json!({"id": 7, "email": "grace@example.com", "active": 1})),
        )
        .await
        .unwrap();
    assert_eq!(
        Value::Object(inserted),
        json!({"id": 7, "email": "grace@example.com", "active": 1})
    );

    let found = manager
        .select_by_id("main", "users", &json!(7))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found["email"], json!("grace@example.com"));

    let missing = manager
        .select_by_id("main", "users", &json!(99))
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_tables_off_the_allow_list_are_rejected_before_any_query() {
    let dir = TempDir::new().unwrap();
    let manager = manager_with_users(&dir).await;

    let err = manager
        .insert_record("main", "secrets", &record(json!({"id": 1})))
        .await
        .unwrap_err();
    assert!(matches!(err, PoolError::ForbiddenTable(ref t) if t == "secrets"));
    assert_eq!(err.http_status(), 403);

    let err = manager
        .select_by_id("main", "users; DROP TABLE users", &json!(1))
        .await
        .unwrap_err();
    assert!(matches!(err, PoolError::ForbiddenTable(_)));

    assert_eq!(manager.get_stats()["main"].queries, 0);
}

#[tokio::test]
async fn test_insert_record_validates_columns() {
    let dir = TempDir::new().unwrap();
    let manager = manager_with_users(&dir).await;

    let err = manager
        .insert_record(
            "main",
            "users",
            &record(json!({"email) VALUES ('x'); --": "x"})),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PoolError::ForbiddenOperation(_)));

    let err = manager
        .insert_record("main", "users", &Map::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PoolError::InvalidInput(_)));
}

#[tokio::test]
async fn test_unknown_backend_is_not_configured() {
    let dir = TempDir::new().unwrap();
    let manager = manager_with_users(&dir).await;

    let err = manager.query("warehouse", "SELECT 1", &[]).await.unwrap_err();
    assert!(matches!(err, PoolError::BackendNotConfigured(ref n) if n == "warehouse"));
    assert_eq!(err.http_status(), 404);
    assert!(manager.get_connection("warehouse").await.is_err());
}

#[tokio::test]
async fn test_database_errors_are_counted() {
    let dir = TempDir::new().unwrap();
    let manager = manager_with_users(&dir).await;

    let err = manager
        .query("main", "SELECT * FROM no_such_table", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, PoolError::Database(_)));

    let stats = &manager.get_stats()["main"];
    assert_eq!(stats.queries, 1);
    assert_eq!(stats.errors, 1);
    assert!(stats.last_used.is_some());
}

#[tokio::test]
async fn test_connections_return_to_pool_when_dropped() {
    let dir = TempDir::new().unwrap();
    let manager = manager_with_users(&dir).await;

    // pool size is 2; checking out more than that in sequence must not block
    for _ in 0..5 {
        let handle = manager.get_connection("main").await.unwrap();
        assert_eq!(handle.kind(), switchyard_core::BackendKind::Relational);
    }
}

#[tokio::test]
async fn test_query_timeout_cancels_slow_statement_and_counts_error() {
    let dir = TempDir::new().unwrap();
    let backend = match sqlite_backend("main", dir.path()) {
        BackendSpec::Relational { name, spec } => BackendSpec::Relational {
            name,
            spec: spec.with_query_timeout(Duration::from_millis(1)),
        },
        _ => unreachable!(),
    };
    let settings = PoolSettings {
        backends: vec![backend],
        ..PoolSettings::default()
    };
    let manager = ConnectionPoolManager::initialize(&settings).await;

    let slow = "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c WHERE x < 50000000) \
                SELECT COUNT(*) AS n FROM c";
    match manager.query("main", slow, &[]).await.unwrap_err() {
        PoolError::Timeout { backend, after } => {
            assert_eq!(backend, "main");
            assert_eq!(after, Duration::from_millis(1));
        }
        other => panic!("expected timeout, got {other:?}"),
    }

    let stats = &manager.get_stats()["main"];
    assert_eq!(stats.queries, 1);
    assert_eq!(stats.errors, 1);

    manager.shutdown().await;
}

/// Only SELECT statements may run
struct ReadOnly;

impl StatementGuard for ReadOnly {
    fn check(&self, sql: &str) -> Result<(), PoolError> {
        if sql.trim_start().to_uppercase().starts_with("SELECT") {
            Ok(())
        } else {
            Err(PoolError::ForbiddenOperation(sql.to_string()))
        }
    }
}

#[tokio::test]
async fn test_custom_statement_guard_replaces_denylist() {
    let dir = TempDir::new().unwrap();
    let manager = manager_with_users(&dir).await.with_guard(Arc::new(ReadOnly));

    let err = manager
        .query(
            "main",
            "INSERT INTO users (id, email) VALUES ($1, $2)",
            &[json!(1), json!("ada@example.com")],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PoolError::ForbiddenOperation(_)));

    let result = manager
        .query("main", "SELECT COUNT(*) AS n FROM users", &[])
        .await
        .unwrap();
    assert_eq!(result.rows[0]["n"], json!(0));
}
