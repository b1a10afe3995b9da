//! # Registry Client
//!
//! Fetches the component manifest and publishes it to a `RegistryStore`.
//!
//! One call to `initialize` or `refresh` issues exactly one GET of
//! `{base_url}/components.json` with caching disabled. Success replaces
//! every definition at once; failure records the error and keeps the prior
//! definitions. There is no automatic retry.

use crate::config::RegistrySettings;
use remora_core::primitives::{MANIFEST_FILE, MAX_MANIFEST_BYTES};
use remora_core::{ComponentDefinition, Manifest, RegistryStore, RemoraError};
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use std::time::Duration;
use thiserror::Error;

/// Errors from one manifest fetch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// No base URL was configured.
    #[error("no registry URL configured (set REMORA_REGISTRY_URL or registry.base_url)")]
    NotConfigured,

    /// The HTTP client could not be built.
    #[error("cannot build HTTP client: {0}")]
    Client(String),

    /// Transport failure: DNS, connect, timeout, reset.
    #[error("cannot reach registry at {url}: {message}")]
    Connection { url: String, message: String },

    /// The registry answered with a non-2xx status.
    #[error("registry returned HTTP {status} {reason}")]
    Status { status: u16, reason: String },

    /// The body exceeded `MAX_MANIFEST_BYTES`.
    #[error("manifest exceeds {limit} bytes")]
    TooLarge { limit: usize },

    /// The body was not a JSON array of definitions.
    #[error("manifest is not valid JSON: {0}")]
    Decode(String),
}

impl From<FetchError> for RemoraError {
    fn from(err: FetchError) -> Self {
        Self::Registry(err.to_string())
    }
}

/// `{base_url}/components.json`, tolerating a trailing slash.
#[must_use]
pub fn manifest_url(base_url: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), MANIFEST_FILE)
}

// =============================================================================
// CLIENT
// =============================================================================

/// HTTP client bound to one registry and one store.
#[derive(Clone)]
pub struct RegistryClient {
    http: reqwest::Client,
    manifest_url: Option<String>,
    store: RegistryStore,
}

impl RegistryClient {
    /// Create a client for `base_url` that publishes into `store`.
    ///
    /// A missing `base_url` is not an error here; every fetch then fails
    /// with `FetchError::NotConfigured`.
    pub fn new(
        base_url: Option<&str>,
        timeout: Option<Duration>,
        store: RegistryStore,
    ) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self {
            http,
            manifest_url: base_url.map(manifest_url),
            store,
        })
    }

    /// Create a client from `[registry]` settings.
    pub fn from_settings(
        settings: &RegistrySettings,
        store: RegistryStore,
    ) -> Result<Self, FetchError> {
        Self::new(settings.base_url.as_deref(), settings.timeout(), store)
    }

    /// The store this client publishes into.
    #[must_use]
    pub fn store(&self) -> &RegistryStore {
        &self.store
    }

    #[must_use]
    pub fn manifest_url(&self) -> Option<&str> {
        self.manifest_url.as_deref()
    }

    /// Session-start fetch.
    pub async fn initialize(&self) -> Result<usize, FetchError> {
        tracing::info!(url = ?self.manifest_url, "fetching component manifest");
        self.load().await
    }

    /// Manual retry. Same semantics as `initialize`.
    pub async fn refresh(&self) -> Result<usize, FetchError> {
        tracing::info!(url = ?self.manifest_url, "manual registry refresh");
        self.load().await
    }

    async fn load(&self) -> Result<usize, FetchError> {
        self.store.begin_fetch();
        match self.fetch().await {
            Ok(manifest) => {
                let count = manifest.len();
                self.store.replace(manifest);
                Ok(count)
            }
            Err(err) => {
                self.store.fail(err.to_string());
                Err(err)
            }
        }
    }

    /// Fetch and decode the manifest without touching the store.
    pub async fn fetch(&self) -> Result<Manifest, FetchError> {
        let url = self.manifest_url.as_deref().ok_or(FetchError::NotConfigured)?;

        let mut response = self
            .http
            .get(url)
            .header(CACHE_CONTROL, "no-cache, no-store")
            .header(PRAGMA, "no-cache")
            .send()
            .await
            .map_err(|e| FetchError::Connection {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }
        if response
            .content_length()
            .is_some_and(|len| len > MAX_MANIFEST_BYTES as u64)
        {
            return Err(FetchError::TooLarge {
                limit: MAX_MANIFEST_BYTES,
            });
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| FetchError::Connection {
            url: url.to_string(),
            message: e.to_string(),
        })? {
            if body.len() + chunk.len() > MAX_MANIFEST_BYTES {
                return Err(FetchError::TooLarge {
                    limit: MAX_MANIFEST_BYTES,
                });
            }
            body.extend_from_slice(&chunk);
        }

        decode_manifest(&body)
    }
}

/// Decode a manifest body: a JSON array of `{name, source}` records.
pub fn decode_manifest(body: &[u8]) -> Result<Manifest, FetchError> {
    let records: Vec<ComponentDefinition> =
        serde_json::from_slice(body).map_err(|e| FetchError::Decode(e.to_string()))?;
    Ok(Manifest::from_definitions(records))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_url_joins_base() {
        assert_eq!(
            manifest_url("http://localhost:4000"),
            "http://localhost:4000/components.json"
        );
        assert_eq!(
            manifest_url("http://localhost:4000/ui/"),
            "http://localhost:4000/ui/components.json"
        );
    }

    #[test]
    fn decodes_records_and_alias() {
        let manifest = decode_manifest(
            br#"[{"name":"A","source":"() => null"},{"name":"B","jsx":"() => 1"}]"#,
        )
        .expect("decode");
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.get("B").map(|d| d.source.as_str()), Some("() => 1"));
    }

    #[test]
    fn rejects_non_array_bodies() {
        assert!(matches!(
            decode_manifest(br#"{"name":"A"}"#),
            Err(FetchError::Decode(_))
        ));
        assert!(matches!(decode_manifest(b"<html>"), Err(FetchError::Decode(_))));
    }

    #[test]
    fn status_messages_are_distinct() {
        let status = FetchError::Status {
            status: 500,
            reason: "Internal Server Error".to_string(),
        };
        assert_eq!(
            status.to_string(),
            "registry returned HTTP 500 Internal Server Error"
        );
        let remora: RemoraError = FetchError::NotConfigured.into();
        assert!(remora.to_string().starts_with("Registry error: no registry URL"));
    }

    #[tokio::test]
    async fn missing_url_fails_closed() {
        let store = RegistryStore::new();
        let client = RegistryClient::new(None, None, store.clone()).expect("client");
        assert_eq!(client.initialize().await, Err(FetchError::NotConfigured));

        let state = store.snapshot();
        assert!(!state.is_loading);
        assert!(state.error.is_some());
        assert!(!state.is_loaded());
    }
}
