//! Coordinator requests through handles.

use std::sync::Arc;

use pagegenie_client::{BackendApi, Coordinator, CoordinatorHandle, Gateway};
use pagegenie_core::{Error, Settings, SettingsStore};
use serde_json::json;
use tokio::task::JoinHandle;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings(backend_url: &str) -> Arc<SettingsStore> {
    Arc::new(SettingsStore::in_memory(Settings {
        backend_url: backend_url.to_string(),
        ..Settings::default()
    }))
}

fn start(backend_url: &str) -> (CoordinatorHandle, JoinHandle<()>) {
    Coordinator::new(Gateway::new(settings(backend_url)).unwrap()).start()
}

#[tokio::test]
async fn test_persist_and_fetch_through_handle() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/notes"))
        .and(body_partial_json(json!({"source": "https://example.com"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "categoriesJson": "{\"topic\":\"Rust\",\"tags\":[\"async\"]}"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/notes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}, {"id": 2}])))
        .mount(&server)
        .await;

    let (handle, _task) = start(&server.uri());
    let api = BackendApi::new(Arc::new(handle.clone()));

    let saved = api
        .save_note("https://example.com", "tokio tasks are cheap")
        .await
        .unwrap();
    let categories = saved.categories.unwrap();
    assert_eq!(categories.topic.as_deref(), Some("Rust"));
    assert_eq!(categories.tags, vec!["async".to_string()]);

    assert_eq!(api.notes().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_concurrent_requests_from_clones() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/reading/recent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .expect(4)
        .mount(&server)
        .await;

    let (handle, _task) = start(&server.uri());
    let calls: Vec<_> = (0..4)
        .map(|_| {
            let handle = handle.clone();
            tokio::spawn(async move { handle.fetch("/api/v1/reading/recent").await })
        })
        .collect();

    for call in calls {
        assert_eq!(call.await.unwrap().unwrap(), json!({"items": []}));
    }
}

#[tokio::test]
async fn test_stopped_coordinator_is_invalidated() {
    let (handle, task) = start("http://127.0.0.1:9");
    let other = handle.clone();

    handle.shutdown().await;
    task.await.unwrap();

    assert!(!other.is_alive());
    assert!(matches!(
        other.fetch("/api/health").await,
        Err(Error::ExtensionContextInvalidated)
    ));
    assert!(matches!(
        other.logout().await,
        Err(Error::ExtensionContextInvalidated)
    ));
}

#[tokio::test]
async fn test_backend_errors_pass_through_unchanged() {
    let (handle, _task) = start("");
    assert!(matches!(
        handle.persist("/api/v1/ai", json!({})).await,
        Err(Error::BackendNotConfigured)
    ));
}
