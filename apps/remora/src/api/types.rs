//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use remora_core::RegistryState;
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// STATUS RESPONSE
// =============================================================================

/// Registry and resolution status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub is_loading: bool,
    pub error: Option<String>,
    pub definitions: usize,
    pub generation: u64,
    /// Compilations run by the host's scope graph so far.
    pub compilations: usize,
}

impl StatusResponse {
    #[must_use]
    pub fn new(state: &RegistryState, compilations: usize) -> Self {
        Self {
            is_loading: state.is_loading,
            error: state.error.clone(),
            definitions: state.definitions.len(),
            generation: state.generation,
            compilations,
        }
    }
}

// =============================================================================
// COMPONENTS RESPONSE
// =============================================================================

/// Names in the current manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentsResponse {
    pub generation: u64,
    pub components: Vec<String>,
}

// =============================================================================
// REFRESH
// =============================================================================

/// Query string of `POST /refresh`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefreshQuery {
    /// Local path to redirect to after the fetch, used by the retry form.
    pub redirect: Option<String>,
}

/// Outcome of a manual refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub success: bool,
    pub definitions: Option<usize>,
    pub error: Option<String>,
}

impl RefreshResponse {
    #[must_use]
    pub fn success(definitions: usize) -> Self {
        Self {
            success: true,
            definitions: Some(definitions),
            error: None,
        }
    }

    #[must_use]
    pub fn error(message: String) -> Self {
        Self {
            success: false,
            definitions: None,
            error: Some(message),
        }
    }
}
