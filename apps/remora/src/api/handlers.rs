//! # API Endpoint Handlers
//!
//! This module implements the HTTP endpoint handlers.
//!
//! `GET /render/{site}` is the root gate: nothing below it renders while the
//! registry is loading or failed, and an unresolved site renders as a
//! skeleton placeholder instead of an error.

use super::{
    AppState,
    types::{
        ComponentsResponse, HealthResponse, RefreshQuery, RefreshResponse, StatusResponse,
    },
    views,
};
use axum::{
    Json,
    extract::{Path, Query, RawQuery, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use remora_core::{Value, primitives::DEFAULT_RESOLVE_PASSES};
use std::collections::BTreeMap;

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// STATUS HANDLER
// =============================================================================

/// Registry lifecycle and compilation counters.
pub async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let registry = state.client.store().snapshot();
    let compilations = state.graph.lock().await.compile_count();
    (
        StatusCode::OK,
        Json(StatusResponse::new(&registry, compilations)),
    )
}

// =============================================================================
// COMPONENTS HANDLER
// =============================================================================

/// Component names in the current manifest.
pub async fn components_handler(State(state): State<AppState>) -> impl IntoResponse {
    let registry = state.client.store().snapshot();
    Json(ComponentsResponse {
        generation: registry.generation,
        components: registry.definitions.names().map(str::to_string).collect(),
    })
}

// =============================================================================
// REFRESH HANDLER
// =============================================================================

/// Manual retry: re-issue exactly one manifest fetch.
pub async fn refresh_handler(
    State(state): State<AppState>,
    Query(query): Query<RefreshQuery>,
) -> Response {
    let result = state.client.refresh().await;

    if let Some(target) = query.redirect.as_deref().filter(|t| is_local_path(t)) {
        return Redirect::to(target).into_response();
    }
    match result {
        Ok(count) => (StatusCode::OK, Json(RefreshResponse::success(count))).into_response(),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(RefreshResponse::error(e.to_string())),
        )
            .into_response(),
    }
}

/// Only same-origin absolute paths are valid redirect targets.
///
/// Browsers strip tabs and newlines from URLs, so `/\t/host` would act as
/// `//host`. Control characters are refused outright.
fn is_local_path(target: &str) -> bool {
    target.starts_with('/')
        && !target.starts_with("//")
        && !target.contains('\\')
        && !target.chars().any(|c| c.is_ascii_control())
}

// =============================================================================
// RENDER HANDLER
// =============================================================================

/// Render one site. Query parameters become string props.
pub async fn render_handler(
    State(state): State<AppState>,
    Path(site): Path<String>,
    Query(params): Query<BTreeMap<String, String>>,
    RawQuery(query): RawQuery,
) -> Response {
    let registry = state.client.store().snapshot();
    if registry.is_loading {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Html(views::loading_page()),
        )
            .into_response();
    }
    if let Some(error) = &registry.error {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Html(views::failure_page(error, &return_to(&site, query.as_deref()))),
        )
            .into_response();
    }

    let unit = {
        let mut graph = state.graph.lock().await;
        if !graph.contains(&site) {
            return (
                StatusCode::NOT_FOUND,
                Html(views::render_failed(&site, "unknown site")),
            )
                .into_response();
        }
        let report = graph.resolve(&registry, &state.compiler, DEFAULT_RESOLVE_PASSES);
        if !report.stable {
            tracing::warn!(passes = report.passes, "scope graph did not settle");
        }
        graph.output(&site)
    };

    let Some(unit) = unit else {
        tracing::debug!(site = %site, "site unresolved, serving skeleton");
        return (StatusCode::OK, Html(views::skeleton(&site))).into_response();
    };

    let props = params
        .into_iter()
        .map(|(key, value)| (key, Value::str(value)))
        .collect();
    match unit.render(props) {
        Ok(tree) => (StatusCode::OK, Html(views::page(&site, &tree))).into_response(),
        Err(e) => {
            tracing::error!(site = %site, component = unit.name(), error = %e, "render failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(views::render_failed(&site, &e.to_string())),
            )
                .into_response()
        }
    }
}

/// The page a retry should land back on, props included.
fn return_to(site: &str, query: Option<&str>) -> String {
    match query.filter(|q| !q.is_empty()) {
        Some(query) => format!("/render/{site}?{query}"),
        None => format!("/render/{site}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_targets_must_be_local() {
        assert!(is_local_path("/render/navbar"));
        assert!(!is_local_path("//evil.example"));
        assert!(!is_local_path("https://evil.example"));
        assert!(!is_local_path("/\\evil"));
        assert!(!is_local_path("/\t/evil.example"));
        assert!(!is_local_path("/\n/evil.example"));
        assert!(!is_local_path("/render/a\r\nSet-Cookie: x=1"));
    }

    #[test]
    fn retry_returns_to_the_same_props() {
        assert_eq!(return_to("greeting", None), "/render/greeting");
        assert_eq!(return_to("greeting", Some("")), "/render/greeting");
        assert_eq!(
            return_to("greeting", Some("name=Ada&tone=warm")),
            "/render/greeting?name=Ada&tone=warm"
        );
    }
}
