//! # Remora HTTP API Module
//!
//! The HTTP host: renders scope-graph sites as HTML and exposes the
//! registry lifecycle.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /status` - Registry state and compilation count
//! - `GET /components` - Names in the current manifest
//! - `POST /refresh` - Manual retry of the manifest fetch
//! - `GET /render/{site}` - Render a site (query parameters become props)
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `REMORA_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `REMORA_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)
//! - `REMORA_API_KEY`: If set, requires Bearer token authentication

mod auth;
mod handlers;
mod middleware;
mod types;
mod views;

pub use auth::{get_api_key_from_env, keys_match};
pub use middleware::{create_rate_limiter, get_rate_limit_from_env};
pub use types::{
    ComponentsResponse, HealthResponse, RefreshQuery, RefreshResponse, StatusResponse,
};

use crate::config::Settings;
use crate::kit::Kit;
use crate::pages;
use crate::registry_client::RegistryClient;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use remora_core::{Compiler, RegistryStore, RemoraError, ScopeGraph};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    /// Registry client; its store is the process-wide registry state.
    pub client: RegistryClient,
    pub compiler: Compiler,
    /// Every request site the host serves, with their loaders.
    pub graph: Arc<Mutex<ScopeGraph>>,
}

impl AppState {
    #[must_use]
    pub fn new(client: RegistryClient, graph: ScopeGraph) -> Self {
        Self {
            client,
            compiler: Compiler::new(),
            graph: Arc::new(Mutex::new(graph)),
        }
    }

    /// Build client, kit and graph from settings.
    pub fn from_settings(settings: &Settings) -> Result<Self, RemoraError> {
        let client = RegistryClient::from_settings(&settings.registry, RegistryStore::new())?;
        let graph = pages::build_graph(&settings.sites, &Kit::standard())?;
        Ok(Self::new(client, graph))
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build the CORS layer from `REMORA_CORS_ORIGINS`.
///
/// - `*`: any origin (logged as a warning)
/// - unset or no valid entries: localhost only
/// - otherwise: the comma-separated origins
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("REMORA_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!("CORS: allowing ALL origins (REMORA_CORS_ORIGINS=*)");
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(hv) => Some(hv),
                    Err(e) => {
                        tracing::warn!("CORS: invalid origin '{}': {}", origin, e);
                        None
                    }
                })
                .collect();
            if allowed.is_empty() {
                tracing::warn!("CORS: no valid origins in REMORA_CORS_ORIGINS, using localhost");
                build_localhost_cors()
            } else {
                tracing::info!("CORS: allowing {} configured origin(s)", allowed.len());
                cors_for(allowed)
            }
        }
        None => build_localhost_cors(),
    }
}

fn build_localhost_cors() -> CorsLayer {
    let origins = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();
    cors_for(origins)
}

fn cors_for(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Rate Limiting (if enabled)
/// 4. Authentication (if configured)
pub fn create_router(state: AppState) -> Router {
    let rate_limiter = create_rate_limiter(get_rate_limit_from_env());
    if rate_limiter.is_none() {
        tracing::info!("Rate limiting disabled");
    }

    let has_auth = get_api_key_from_env().is_some();
    if has_auth {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "API key authentication DISABLED - set REMORA_API_KEY to protect the host"
        );
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route("/components", get(handlers::components_handler))
        .route("/refresh", post(handlers::refresh_handler))
        .route("/render/{site}", get(handlers::render_handler));

    if has_auth {
        router = router.layer(axum_middleware::from_fn(auth::api_key_auth_middleware));
    }
    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer()),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the host: bind, kick off the session-start fetch, serve until
/// Ctrl+C.
pub async fn run_server(addr: &str, state: AppState) -> Result<(), RemoraError> {
    let router = create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| RemoraError::Io(format!("Bind failed: {}", e)))?;
    tracing::info!("Remora host listening on {}", addr);

    let client = state.client.clone();
    tokio::spawn(async move {
        if let Err(e) = client.initialize().await {
            tracing::error!(error = %e, "initial manifest fetch failed");
        }
    });

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| RemoraError::Io(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("cannot listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
