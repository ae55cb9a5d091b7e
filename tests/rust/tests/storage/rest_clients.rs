//! Analytical and document REST clients against mock endpoints

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};
use switchyard_core::{AnalyticalSpec, BackendSpec, DocumentSpec, PoolSettings};
use switchyard_storage::{
    AnalyticalClient, BigQueryClient, ConnectionPoolManager, DocumentClient, DocumentResult,
    FirestoreClient, PoolError,
};
use wiremock::matchers::{
    body_json, body_partial_json, header, method, path, query_param, query_param_is_missing,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DOCUMENTS: &str = "/projects/acme/databases/main/documents";

fn document_spec(server: &MockServer) -> DocumentSpec {
    DocumentSpec {
        database: "main".into(),
        endpoint: server.uri(),
        ..DocumentSpec::new("acme", "doc-token")
    }
}

fn analytical_spec(server: &MockServer) -> AnalyticalSpec {
    AnalyticalSpec {
        location: "EU".into(),
        endpoint: server.uri(),
        ..AnalyticalSpec::new("acme", "bq-token")
    }
}

// =============================================================================
// FirestoreClient
// =============================================================================

#[tokio::test]
async fn test_firestore_set_encodes_typed_fields() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(format!("{}/users/u1", DOCUMENTS)))
        .and(header("Authorization", "Bearer doc-token"))
        .and(body_json(json!({
            "fields": {
                "name": {"stringValue": "Ada"},
                "age": {"integerValue": "36"}
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = FirestoreClient::new(document_spec(&server)).unwrap();
    let Value::Object(data) = json!({"name": "Ada", "age": 36}) else {
        unreachable!()
    };
    client.set("users", "u1", &data).await.unwrap();
}

#[tokio::test]
async fn test_firestore_get_decodes_and_handles_missing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/users/u1", DOCUMENTS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/acme/databases/main/documents/users/u1",
            "fields": {
                "name": {"stringValue": "Ada"},
                "active": {"booleanValue": true},
                "address": {"mapValue": {"fields": {"city": {"stringValue": "London"}}}}
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/users/ghost", DOCUMENTS)))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": 404, "message": "Document not found"}
        })))
        .mount(&server)
        .await;

    let client = FirestoreClient::new(document_spec(&server)).unwrap();

    let found = client.get("users", "u1").await.unwrap().unwrap();
    assert_eq!(
        Value::Object(found),
        json!({"name": "Ada", "active": true, "address": {"city": "London"}})
    );
    assert!(client.get("users", "ghost").await.unwrap().is_none());
}

#[tokio::test]
async fn test_firestore_list_follows_page_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/events", DOCUMENTS)))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documents": [{
                "name": "projects/acme/databases/main/documents/events/e2",
                "fields": {"n": {"integerValue": "2"}}
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/events", DOCUMENTS)))
        .and(query_param_is_missing("pageToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documents": [{
                "name": "projects/acme/databases/main/documents/events/e1",
                "fields": {"n": {"integerValue": "1"}}
            }],
            "nextPageToken": "page-2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = FirestoreClient::new(document_spec(&server)).unwrap();
    let docs = client.list("events").await.unwrap();

    let ids: Vec<&str> = docs.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(ids, vec!["e1", "e2"]);
    assert_eq!(docs[1].1["n"], json!(2));
}

#[tokio::test]
async fn test_firestore_errors_carry_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}:listCollectionIds", DOCUMENTS)))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {"code": 403, "message": "Missing or insufficient permissions."}
        })))
        .mount(&server)
        .await;

    let client = FirestoreClient::new(document_spec(&server)).unwrap();
    match client.list_collections().await.unwrap_err() {
        PoolError::Upstream { status, message } => {
            assert_eq!(status, Some(403));
            assert_eq!(message, "Missing or insufficient permissions.");
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
}

// =============================================================================
// BigQueryClient
// =============================================================================

#[tokio::test]
async fn test_bigquery_query_decodes_rows_by_schema() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/projects/acme/queries"))
        .and(header("Authorization", "Bearer bq-token"))
        .and(body_partial_json(json!({
            "useLegacySql": false,
            "location": "EU",
            "parameterMode": "POSITIONAL"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jobComplete": true,
            "schema": {"fields": [
                {"name": "day", "type": "STRING"},
                {"name": "total", "type": "INTEGER"}
            ]},
            "rows": [
                {"f": [{"v": "2024-01-01"}, {"v": "12"}]},
                {"f": [{"v": "2024-01-02"}, {"v": null}]}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = BigQueryClient::new(analytical_spec(&server)).unwrap();
    let rows = client
        .query("SELECT day, total FROM ds.daily WHERE total > ?", &[json!(10)])
        .await
        .unwrap();

    let rows: Vec<Value> = rows.into_iter().map(Value::Object).collect();
    assert_eq!(
        rows,
        vec![
            json!({"day": "2024-01-01", "total": 12}),
            json!({"day": "2024-01-02", "total": null}),
        ]
    );
}

#[tokio::test]
async fn test_bigquery_query_follows_page_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/projects/acme/queries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jobReference": {"projectId": "acme", "jobId": "job-1", "location": "EU"},
            "jobComplete": true,
            "totalRows": "3",
            "pageToken": "next-page",
            "schema": {"fields": [{"name": "n", "type": "INTEGER"}]},
            "rows": [{"f": [{"v": "1"}]}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/projects/acme/queries/job-1"))
        .and(query_param("pageToken", "next-page"))
        .and(query_param("location", "EU"))
        .and(header("Authorization", "Bearer bq-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jobReference": {"projectId": "acme", "jobId": "job-1", "location": "EU"},
            "jobComplete": true,
            "totalRows": "3",
            "rows": [{"f": [{"v": "2"}]}, {"f": [{"v": "3"}]}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = BigQueryClient::new(analytical_spec(&server)).unwrap();
    let rows = client.query("SELECT n FROM ds.numbers", &[]).await.unwrap();

    let rows: Vec<Value> = rows.into_iter().map(Value::Object).collect();
    assert_eq!(rows, vec![json!({"n": 1}), json!({"n": 2}), json!({"n": 3})]);
}

#[tokio::test]
async fn test_bigquery_waits_for_running_job() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/projects/acme/queries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jobReference": {"projectId": "acme", "jobId": "job-2", "location": "EU"},
            "jobComplete": false
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/projects/acme/queries/job-2"))
        .and(query_param_is_missing("pageToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jobReference": {"projectId": "acme", "jobId": "job-2", "location": "EU"},
            "jobComplete": true,
            "totalRows": "1",
            "schema": {"fields": [{"name": "ok", "type": "BOOLEAN"}]},
            "rows": [{"f": [{"v": "true"}]}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = BigQueryClient::new(analytical_spec(&server)).unwrap();
    let rows = client.query("SELECT TRUE AS ok", &[]).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["ok"], json!(true));
}

#[tokio::test]
async fn test_bigquery_job_that_never_completes_is_an_error() {
    let server = MockServer::start().await;
    let running = json!({
        "jobReference": {"projectId": "acme", "jobId": "job-3", "location": "EU"},
        "jobComplete": false
    });
    Mock::given(method("POST"))
        .and(path("/projects/acme/queries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(running.clone()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/projects/acme/queries/job-3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(running))
        .expect(4)
        .mount(&server)
        .await;

    let client = BigQueryClient::new(analytical_spec(&server)).unwrap();
    let err = client.query("SELECT 1", &[]).await.unwrap_err();
    assert!(matches!(err, PoolError::Upstream { status: None, .. }));
}

#[tokio::test]
async fn test_bigquery_short_result_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/projects/acme/queries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jobReference": {"projectId": "acme", "jobId": "job-4"},
            "jobComplete": true,
            "totalRows": "3",
            "schema": {"fields": [{"name": "n", "type": "INTEGER"}]},
            "rows": [{"f": [{"v": "1"}]}]
        })))
        .mount(&server)
        .await;

    let client = BigQueryClient::new(analytical_spec(&server)).unwrap();
    match client.query("SELECT n FROM ds.numbers", &[]).await.unwrap_err() {
        PoolError::Upstream { message, .. } => assert_eq!(message, "query returned 1 of 3 rows"),
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_bigquery_request_timeout_is_configurable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/projects/acme/datasets"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"datasets": []}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let spec = AnalyticalSpec {
        request_timeout: Duration::from_millis(50),
        ..analytical_spec(&server)
    };
    let client = BigQueryClient::new(spec).unwrap();
    let err = client.probe().await.unwrap_err();
    assert!(matches!(err, PoolError::Upstream { status: None, .. }));
}

// =============================================================================
// Manager over REST backends
// =============================================================================

#[tokio::test]
async fn test_initialize_verifies_rest_backends() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}:listCollectionIds", DOCUMENTS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"collectionIds": ["users"]})))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/projects/acme/datasets"))
        .and(query_param("maxResults", "1"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/users/u1", DOCUMENTS)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let settings = PoolSettings {
        backends: vec![
            BackendSpec::Document {
                name: "documents".into(),
                spec: document_spec(&server),
            },
            BackendSpec::Analytical {
                name: "warehouse".into(),
                spec: analytical_spec(&server),
            },
        ],
        ..PoolSettings::default()
    };

    // one probe each at startup, one each in health_check
    let manager = ConnectionPoolManager::initialize(&settings).await;
    assert_eq!(manager.len(), 2);

    let health = manager.health_check().await;
    assert!(health["documents"].is_healthy());
    assert!(!health["warehouse"].is_healthy());

    let missing = manager
        .firestore_get("documents", "users", Some("u1"))
        .await
        .unwrap();
    assert_eq!(missing, DocumentResult::Missing);

    let empty: Map<String, Value> = Map::new();
    assert!(manager
        .insert_record("documents", "users", &empty)
        .await
        .is_err());
}
