//! Integration tests for the Remora HTTP host.
//!
//! Uses axum-test to drive the router without starting a real server.

// Allow unwrap and panic in tests - these are standard for test code
// Allow holding MutexGuard across await in auth tests - tests are serialized
// intentionally to avoid env var conflicts
#![allow(clippy::unwrap_used, clippy::panic, clippy::await_holding_lock)]

use axum::http::{HeaderValue, StatusCode};
use axum_test::TestServer;
use remora::api::{
    AppState, ComponentsResponse, HealthResponse, RefreshResponse, StatusResponse, create_router,
};
use remora::config::Settings;
use remora::kit::Kit;
use remora::pages;
use remora::registry_client::RegistryClient;
use remora_core::{ComponentDefinition, Manifest, RegistryStore};
use std::sync::Mutex;

/// Mutex to serialize tests since auth tests modify env vars.
static AUTH_TEST_MUTEX: Mutex<()> = Mutex::new(());

const SITES: &str = r#"
[[site]]
id = "greeting"
component = "Greeting"
host = ["Button"]

[[site]]
id = "card"
component = "Card"
uses = { Greeting = "greeting" }

[[site]]
id = "broken"
component = "Broken"
"#;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Guard wrapper that holds the mutex and ensures cleanup on drop.
struct TestGuard {
    _guard: std::sync::MutexGuard<'static, ()>,
}

impl Drop for TestGuard {
    fn drop(&mut self) {
        // SAFETY: Tests run sequentially under AUTH_TEST_MUTEX, so no concurrent env access.
        unsafe { std::env::remove_var("REMORA_API_KEY") };
    }
}

fn full_manifest() -> Manifest {
    Manifest::from_definitions([
        ComponentDefinition::new("Greeting", "({ name }) => <Button>Hello {name}</Button>"),
        ComponentDefinition::new("Card", "() => <section><Greeting name=\"card\" /></section>"),
        ComponentDefinition::new("Broken", "() => <div>{missing()}</div>"),
    ])
}

/// Test server over an unconfigured registry client, so the store only
/// changes when a test drives it. Returns the shared store.
fn create_test_server(api_key: Option<&str>) -> (TestServer, RegistryStore, TestGuard) {
    let guard = AUTH_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    // SAFETY: Tests run sequentially under AUTH_TEST_MUTEX, so no concurrent env access.
    unsafe {
        match api_key {
            Some(key) => std::env::set_var("REMORA_API_KEY", key),
            None => std::env::remove_var("REMORA_API_KEY"),
        }
    }

    let settings = Settings::from_toml_str(SITES).unwrap();
    let store = RegistryStore::new();
    let client = RegistryClient::new(None, None, store.clone()).unwrap();
    let graph = pages::build_graph(&settings.sites, &Kit::standard()).unwrap();
    let router = create_router(AppState::new(client, graph));
    (
        TestServer::new(router).unwrap(),
        store,
        TestGuard { _guard: guard },
    )
}

fn loaded_test_server() -> (TestServer, RegistryStore, TestGuard) {
    let (server, store, guard) = create_test_server(None);
    store.replace(full_manifest());
    (server, store, guard)
}

// =============================================================================
// HEALTH AND STATUS
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (server, _store, _guard) = create_test_server(None);

    let response = server.get("/health").await;

    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_status_before_first_fetch() {
    let (server, _store, _guard) = create_test_server(None);

    let status: StatusResponse = server.get("/status").await.json();

    assert!(status.is_loading);
    assert!(status.error.is_none());
    assert_eq!(status.definitions, 0);
    assert_eq!(status.generation, 0);
    assert_eq!(status.compilations, 0);
}

#[tokio::test]
async fn test_components_lists_manifest_names() {
    let (server, _store, _guard) = loaded_test_server();

    let response = server.get("/components").await;

    response.assert_status_ok();
    let components: ComponentsResponse = response.json();
    assert_eq!(components.generation, 1);
    assert_eq!(components.components, vec!["Broken", "Card", "Greeting"]);
}

// =============================================================================
// ROOT GATE
// =============================================================================

#[tokio::test]
async fn test_render_while_loading_shows_loading_page() {
    let (server, _store, _guard) = create_test_server(None);

    let response = server.get("/render/greeting").await;

    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    let body = response.text();
    assert!(body.contains("Loading components..."));
    assert!(!body.contains("data-slot"));
}

#[tokio::test]
async fn test_render_after_failure_offers_retry() {
    let (server, store, _guard) = create_test_server(None);
    store.fail("registry returned HTTP 500 Internal Server Error");

    let response = server.get("/render/greeting").await;

    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    let body = response.text();
    assert!(body.contains("registry returned HTTP 500"));
    assert!(body.contains("/refresh?redirect=/render/greeting"));
    assert!(body.contains("Retry"));
}

#[tokio::test]
async fn test_failure_retry_keeps_query_props() {
    let (server, store, _guard) = create_test_server(None);
    store.fail("connection reset");

    let response = server
        .get("/render/greeting")
        .add_query_param("name", "Ada")
        .await;

    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(
        response
            .text()
            .contains("/refresh?redirect=/render/greeting%3Fname%3DAda")
    );
}

#[tokio::test]
async fn test_failure_after_success_still_gates() {
    let (server, store, _guard) = loaded_test_server();
    store.fail("connection reset");

    let response = server.get("/render/greeting").await;
    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);

    let status: StatusResponse = server.get("/status").await.json();
    assert_eq!(status.definitions, 3);
    assert_eq!(status.error.as_deref(), Some("connection reset"));
}

// =============================================================================
// RENDERING
// =============================================================================

#[tokio::test]
async fn test_render_leaf_site_with_query_props() {
    let (server, _store, _guard) = loaded_test_server();

    let response = server
        .get("/render/greeting")
        .add_query_param("name", "Ada")
        .await;

    response.assert_status_ok();
    let body = response.text();
    assert!(body.starts_with("<!doctype html>"));
    assert!(body.contains("data-slot=\"button\""));
    assert!(body.contains("Ada"));
}

#[tokio::test]
async fn test_render_composite_site() {
    let (server, _store, _guard) = loaded_test_server();

    let response = server.get("/render/card").await;

    response.assert_status_ok();
    let body = response.text();
    assert!(body.contains("<section><button"));
    assert!(body.contains("card"));
}

#[tokio::test]
async fn test_repeated_renders_do_not_recompile() {
    let (server, _store, _guard) = loaded_test_server();

    server.get("/render/card").await.assert_status_ok();
    let first: StatusResponse = server.get("/status").await.json();
    server.get("/render/card").await.assert_status_ok();
    server.get("/render/greeting").await.assert_status_ok();
    let second: StatusResponse = server.get("/status").await.json();

    assert!(first.compilations > 0);
    assert_eq!(first.compilations, second.compilations);
}

#[tokio::test]
async fn test_missing_dependency_renders_skeleton() {
    let (server, store, _guard) = create_test_server(None);
    store.replace(Manifest::from_definitions([ComponentDefinition::new(
        "Card",
        "() => <section><Greeting /></section>",
    )]));

    for site in ["greeting", "card"] {
        let response = server.get(&format!("/render/{site}")).await;
        response.assert_status_ok();
        let body = response.text();
        assert!(body.contains("remora-skeleton"), "{site} should be a skeleton");
        assert!(!body.contains("<section>"));
    }
}

#[tokio::test]
async fn test_replacement_is_picked_up() {
    let (server, store, _guard) = loaded_test_server();
    server.get("/render/greeting").await.assert_status_ok();

    store.replace(Manifest::from_definitions([ComponentDefinition::new(
        "Greeting",
        "() => <em>v2</em>",
    )]));

    let body = server.get("/render/greeting").await.text();
    assert!(body.contains("<em>v2</em>"));
}

#[tokio::test]
async fn test_render_error_is_reported() {
    let (server, _store, _guard) = loaded_test_server();

    let response = server.get("/render/broken").await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.text().contains("missing is not defined"));
}

#[tokio::test]
async fn test_unknown_site_is_not_found() {
    let (server, _store, _guard) = loaded_test_server();

    let response = server.get("/render/nowhere").await;

    response.assert_status_not_found();
}

// =============================================================================
// REFRESH
// =============================================================================

#[tokio::test]
async fn test_refresh_without_registry_reports_error() {
    let (server, _store, _guard) = loaded_test_server();

    let response = server.post("/refresh").await;

    assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
    let result: RefreshResponse = response.json();
    assert!(!result.success);
    assert!(result.error.unwrap().contains("no registry URL configured"));

    let status: StatusResponse = server.get("/status").await.json();
    assert!(!status.is_loading);
    assert!(status.error.is_some());
    assert_eq!(status.definitions, 3, "prior definitions are retained");
}

#[tokio::test]
async fn test_refresh_redirects_to_local_path() {
    let (server, _store, _guard) = create_test_server(None);

    let response = server
        .post("/refresh")
        .add_query_param("redirect", "/render/greeting")
        .await;

    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.header("location"),
        HeaderValue::from_static("/render/greeting")
    );
}

#[tokio::test]
async fn test_refresh_redirect_keeps_query() {
    let (server, _store, _guard) = create_test_server(None);

    let response = server
        .post("/refresh")
        .add_query_param("redirect", "/render/greeting?name=Ada")
        .await;

    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.header("location"),
        HeaderValue::from_static("/render/greeting?name=Ada")
    );
}

#[tokio::test]
async fn test_refresh_ignores_control_character_redirect() {
    let (server, _store, _guard) = create_test_server(None);

    for target in ["/\t/evil.example", "/\n/evil.example"] {
        let response = server
            .post("/refresh")
            .add_query_param("redirect", target)
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY, "{target:?}");
    }
}

#[tokio::test]
async fn test_refresh_ignores_foreign_redirect() {
    let (server, _store, _guard) = create_test_server(None);

    let response = server
        .post("/refresh")
        .add_query_param("redirect", "https://evil.example/")
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
}

// =============================================================================
// AUTHENTICATION
// =============================================================================

#[tokio::test]
async fn test_auth_missing_header_rejected() {
    let (server, _store, _guard) = create_test_server(Some("test-secret-key-12345"));

    let response = server.get("/status").await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_health_is_public() {
    let (server, _store, _guard) = create_test_server(Some("test-secret-key-12345"));

    server.get("/health").await.assert_status_ok();
}

#[tokio::test]
async fn test_auth_valid_bearer_token() {
    let api_key = "test-secret-key-12345";
    let (server, _store, _guard) = create_test_server(Some(api_key));

    let response = server
        .get("/status")
        .add_header(
            axum::http::header::AUTHORIZATION,
            format!("Bearer {}", api_key)
                .parse::<HeaderValue>()
                .unwrap(),
        )
        .await;

    response.assert_status_ok();
}

#[tokio::test]
async fn test_auth_invalid_token_rejected() {
    let (server, _store, _guard) = create_test_server(Some("correct-key"));

    let response = server
        .get("/render/greeting")
        .add_header(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer wrong-key"),
        )
        .await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}
