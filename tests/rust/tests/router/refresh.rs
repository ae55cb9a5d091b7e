//! Registry loading, atomic refresh and the refresh scheduler

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use switchyard_core::{FileRegistrySource, HttpRegistrySource, RegistryError};
use switchyard_gateway::{IntegrationRouter, RefreshScheduler, RouteOptions, RouterError};
use tempfile::NamedTempFile;
use tests::router::test_settings;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn registry_json(server: &MockServer, tools: &[&str]) -> String {
    let entries: Vec<_> = tools
        .iter()
        .map(|tool| {
            json!({
                "tool": tool,
                "type": "Gateway",
                "status": "active",
                "endpoint": format!("{}/{}", server.uri(), tool.to_lowercase()),
            })
        })
        .collect();
    json!({ "tools": entries }).to_string()
}

async fn accept_posts(server: &MockServer, route: &str, times: u64) {
    Mock::given(method("POST"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(times)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_registry() {
    let server = MockServer::start().await;
    accept_posts(&server, "/neon", 2).await;

    let file = NamedTempFile::new().unwrap();
    std::fs::write(file.path(), registry_json(&server, &["Neon"])).unwrap();

    let source = Arc::new(FileRegistrySource::new(file.path()));
    let router = IntegrationRouter::load(test_settings(), source).await.unwrap();

    router
        .route_integration("neon", json!({}), RouteOptions::default())
        .await
        .unwrap();

    std::fs::write(file.path(), "{ not json").unwrap();
    let err = router.refresh_registry().await.unwrap_err();
    assert!(matches!(
        err,
        RouterError::RegistryRefreshFailure(RegistryError::Parse(_))
    ));
    assert_eq!(err.http_status(), 503);

    assert_eq!(router.registry().len(), 1);
    router
        .route_integration("neon", json!({}), RouteOptions::default())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_invalid_entry_rejects_whole_refresh() {
    let server = MockServer::start().await;

    let file = NamedTempFile::new().unwrap();
    std::fs::write(file.path(), registry_json(&server, &["Neon", "Stripe"])).unwrap();

    let source = Arc::new(FileRegistrySource::new(file.path()));
    let router = IntegrationRouter::load(test_settings(), source).await.unwrap();

    std::fs::write(
        file.path(),
        json!({"tools": [
            {"tool": "Neon", "type": "Gateway", "endpoint": format!("{}/neon", server.uri())},
            {"tool": "neon", "type": "Direct", "endpoint": format!("{}/dup", server.uri())}
        ]})
        .to_string(),
    )
    .unwrap();

    assert!(router.refresh_registry().await.is_err());
    let registry = router.registry();
    assert_eq!(registry.len(), 2);
    assert!(registry.get("stripe").is_some());
}

#[tokio::test]
async fn test_successful_refresh_swaps_registry() {
    let server = MockServer::start().await;
    accept_posts(&server, "/stripe", 1).await;

    let file = NamedTempFile::new().unwrap();
    std::fs::write(file.path(), registry_json(&server, &["Neon"])).unwrap();

    let source = Arc::new(FileRegistrySource::new(file.path()));
    let router = IntegrationRouter::load(test_settings(), source).await.unwrap();

    let before = router.registry();
    std::fs::write(file.path(), registry_json(&server, &["Stripe"])).unwrap();
    assert_eq!(router.refresh_registry().await.unwrap(), 1);

    // a snapshot taken before the swap is unaffected
    assert!(before.get("neon").is_some());

    assert!(matches!(
        router
            .route_integration("neon", json!({}), RouteOptions::default())
            .await,
        Err(RouterError::ToolNotFound(_))
    ));
    router
        .route_integration("stripe", json!({}), RouteOptions::default())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_initial_load_failure_is_an_error() {
    let file = NamedTempFile::new().unwrap();
    std::fs::write(file.path(), "[{\"tool\": \"\"}]").unwrap();

    let source = Arc::new(FileRegistrySource::new(file.path()));
    let result = IntegrationRouter::load(test_settings(), source).await;
    assert!(matches!(result, Err(RouterError::RegistryRefreshFailure(_))));
}

#[tokio::test]
async fn test_http_registry_source() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/registry.json"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(registry_json(&server, &["Neon", "n8n"])),
        )
        .expect(2)
        .mount(&server)
        .await;

    let source = Arc::new(HttpRegistrySource::new(format!(
        "{}/registry.json",
        server.uri()
    )));
    let router = IntegrationRouter::load(test_settings(), source).await.unwrap();
    assert_eq!(router.registry().len(), 2);
    assert_eq!(router.refresh_registry().await.unwrap(), 2);
}

#[tokio::test]
async fn test_scheduler_refreshes_until_cancelled() {
    let server = MockServer::start().await;

    let file = NamedTempFile::new().unwrap();
    std::fs::write(file.path(), registry_json(&server, &["Neon"])).unwrap();

    let source = Arc::new(FileRegistrySource::new(file.path()));
    let router = Arc::new(IntegrationRouter::load(test_settings(), source).await.unwrap());

    let cancel = CancellationToken::new();
    let handle = RefreshScheduler::spawn(
        Arc::clone(&router),
        Duration::from_millis(50),
        cancel.clone(),
    );

    std::fs::write(file.path(), registry_json(&server, &["Neon", "Stripe"])).unwrap();

    let mut refreshed = false;
    for _ in 0..40 {
        tokio::time::sleep(Duration::from_millis(25)).await;
        if router.registry().len() == 2 {
            refreshed = true;
            break;
        }
    }
    assert!(refreshed, "scheduler never picked up the new registry");

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("scheduler did not stop")
        .unwrap();
}
