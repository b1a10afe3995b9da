//! # Registry State
//!
//! The process-wide, read-mostly state populated from the remote manifest.
//!
//! `RegistryStore` is the only writer. It replaces the whole manifest in one
//! step: readers take an `Arc` snapshot of the current state and never see a
//! partially applied fetch.
//!
//! ## Lifecycle
//!
//! ```text
//! created ── begin_fetch ──▶ loading ──┬── replace ──▶ loaded (generation += 1)
//!                                      └── fail    ──▶ error  (definitions kept)
//! ```

use crate::types::ComponentDefinition;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

// =============================================================================
// MANIFEST
// =============================================================================

/// Definitions keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    definitions: Arc<BTreeMap<String, ComponentDefinition>>,
}

impl Manifest {
    /// Build a manifest from fetched records. On duplicate names the last
    /// record wins.
    #[must_use]
    pub fn from_definitions(records: impl IntoIterator<Item = ComponentDefinition>) -> Self {
        let mut definitions = BTreeMap::new();
        for record in records {
            if let Some(previous) = definitions.insert(record.name.clone(), record) {
                warn!(name = %previous.name, "duplicate component name in manifest; keeping the last");
            }
        }
        Self {
            definitions: Arc::new(definitions),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ComponentDefinition> {
        self.definitions.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComponentDefinition> {
        self.definitions.values()
    }
}

// =============================================================================
// REGISTRY STATE
// =============================================================================

/// One immutable snapshot of the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryState {
    pub definitions: Manifest,
    pub is_loading: bool,
    pub error: Option<String>,
    /// Number of successful replacements so far.
    pub generation: u64,
}

impl Default for RegistryState {
    fn default() -> Self {
        Self {
            definitions: Manifest::default(),
            is_loading: true,
            error: None,
            generation: 0,
        }
    }
}

impl RegistryState {
    /// A state that already holds `definitions`, for hosts and tests that do
    /// not fetch.
    #[must_use]
    pub fn loaded(definitions: Manifest) -> Self {
        Self {
            definitions,
            is_loading: false,
            error: None,
            generation: 1,
        }
    }

    /// At least one fetch has succeeded.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.generation > 0
    }
}

// =============================================================================
// REGISTRY STORE
// =============================================================================

/// Shared handle to the current registry state.
///
/// Cloning the store shares the underlying state.
#[derive(Debug, Clone, Default)]
pub struct RegistryStore {
    state: Arc<RwLock<Arc<RegistryState>>>,
}

impl RegistryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current state.
    #[must_use]
    pub fn snapshot(&self) -> Arc<RegistryState> {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    /// Mark a fetch as in flight.
    pub fn begin_fetch(&self) {
        self.update(|state| RegistryState {
            is_loading: true,
            ..state.clone()
        });
    }

    /// Replace every definition at once and clear any error.
    pub fn replace(&self, definitions: Manifest) {
        let count = definitions.len();
        let next = self.update(|state| RegistryState {
            definitions,
            is_loading: false,
            error: None,
            generation: state.generation.saturating_add(1),
        });
        info!(count, generation = next.generation, "registry replaced");
    }

    /// Record a failed fetch. Prior definitions stay available.
    pub fn fail(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(error = %message, "registry fetch failed");
        self.update(|state| RegistryState {
            is_loading: false,
            error: Some(message),
            ..state.clone()
        });
    }

    fn update(&self, f: impl FnOnce(&RegistryState) -> RegistryState) -> Arc<RegistryState> {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let next = Arc::new(f(&guard));
        *guard = Arc::clone(&next);
        next
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(names: &[&str]) -> Manifest {
        Manifest::from_definitions(
            names
                .iter()
                .map(|n| ComponentDefinition::new(*n, "() => null")),
        )
    }

    #[test]
    fn starts_loading_and_empty() {
        let state = RegistryStore::new().snapshot();
        assert!(state.is_loading);
        assert!(!state.is_loaded());
        assert!(state.definitions.is_empty());
    }

    #[test]
    fn replace_bumps_generation_and_clears_error() {
        let store = RegistryStore::new();
        store.fail("boom");
        store.replace(manifest(&["A"]));
        let state = store.snapshot();
        assert_eq!(state.generation, 1);
        assert!(state.error.is_none());
        assert!(!state.is_loading);
    }

    #[test]
    fn failure_keeps_previous_definitions() {
        let store = RegistryStore::new();
        store.replace(manifest(&["A", "B"]));
        store.begin_fetch();
        store.fail("timeout");
        let state = store.snapshot();
        assert_eq!(state.definitions.len(), 2);
        assert_eq!(state.error.as_deref(), Some("timeout"));
        assert_eq!(state.generation, 1);
    }

    #[test]
    fn snapshots_are_isolated_from_later_replaces() {
        let store = RegistryStore::new();
        store.replace(manifest(&["A"]));
        let before = store.snapshot();
        store.replace(manifest(&["B"]));
        assert!(before.definitions.contains("A"));
        assert!(store.snapshot().definitions.contains("B"));
        assert!(!store.snapshot().definitions.contains("A"));
    }

    #[test]
    fn duplicate_names_keep_last_record() {
        let manifest = Manifest::from_definitions([
            ComponentDefinition::new("A", "first"),
            ComponentDefinition::new("A", "second"),
        ]);
        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest.get("A").map(|d| d.source.as_str()), Some("second"));
    }
}
