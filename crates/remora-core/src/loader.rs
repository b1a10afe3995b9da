//! # Loader
//!
//! Resolves one (component name, scope) request site.
//!
//! A `Loader` is split into two phases, mirroring a render/effect cycle:
//!
//! - `request` is called on every render. It never fails and never compiles.
//!   It answers from the cache, or records a pending job when the request
//!   key changed, and returns `None` until that job has settled.
//! - `settle` runs the pending job, if any: the definition lookup and the
//!   compilation.
//!
//! ## Request Key
//!
//! The cache is keyed by (name, scope fingerprint, registry generation).
//! Any change to the key discards the cached unit. A failure is kept until
//! the key changes again.

use crate::compiler::{CompileError, CompiledUnit, Compiler};
use crate::registry::RegistryState;
use crate::scope::{Scope, ScopeFingerprint};
use crate::types::ComponentDefinition;
use crate::value::Value;
use tracing::{debug, error, warn};

/// Why a request site settled without a unit.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadFailure {
    /// The name is not in the manifest.
    NotFound,
    /// The definition did not compile.
    Compile(CompileError),
}

/// Per-site lifecycle.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LoaderState {
    /// Nothing requested yet, or the registry has not loaded.
    #[default]
    Idle,
    /// At least one capability is not yet available.
    ScopeIncomplete { missing: Vec<String> },
    /// A compilation is pending for the current key.
    Compiling,
    Ready(CompiledUnit),
    Failed(LoadFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RequestKey {
    name: String,
    fingerprint: ScopeFingerprint,
    generation: u64,
}

struct PendingJob {
    name: String,
    definition: Option<ComponentDefinition>,
    names: Vec<String>,
    values: Vec<Value>,
}

/// Memoizing resolver for one request site.
#[derive(Default)]
pub struct Loader {
    key: Option<RequestKey>,
    state: LoaderState,
    pending: Option<PendingJob>,
    compile_count: usize,
}

impl Loader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for the unit for `name` under `scope`.
    ///
    /// Returns `None` while the registry is loading, while the scope is
    /// incomplete, after an invalidating change until the next `settle`, and
    /// whenever the site failed.
    pub fn request(
        &mut self,
        registry: &RegistryState,
        name: &str,
        scope: &Scope,
    ) -> Option<CompiledUnit> {
        if !registry.is_loaded() {
            return None;
        }

        if !scope.is_complete() {
            let missing = scope.missing();
            if !matches!(&self.state, LoaderState::ScopeIncomplete { missing: m } if *m == missing)
            {
                debug!(component = name, ?missing, "scope incomplete");
            }
            self.key = None;
            self.pending = None;
            self.state = LoaderState::ScopeIncomplete { missing };
            return None;
        }

        let key = RequestKey {
            name: name.to_string(),
            fingerprint: scope.fingerprint(),
            generation: registry.generation,
        };
        if self.key.as_ref() == Some(&key) {
            return self.unit();
        }

        // Invalidating change: drop the cached unit and queue a new job.
        debug!(
            component = name,
            fingerprint = ?key.fingerprint,
            generation = key.generation,
            "request key changed"
        );
        let (names, values) = (scope.names(), scope.values().unwrap_or_default());
        self.pending = Some(PendingJob {
            name: name.to_string(),
            definition: registry.definitions.get(name).cloned(),
            names,
            values,
        });
        self.key = Some(key);
        self.state = LoaderState::Compiling;
        None
    }

    /// Run the pending job, if any. Returns `true` when the state changed.
    pub fn settle(&mut self, compiler: &Compiler) -> bool {
        let Some(job) = self.pending.take() else {
            return false;
        };
        let Some(definition) = job.definition else {
            warn!(component = %job.name, "component not found in manifest");
            self.state = LoaderState::Failed(LoadFailure::NotFound);
            return true;
        };

        self.compile_count = self.compile_count.saturating_add(1);
        self.state = match compiler.compile_definition(&definition, &job.names, &job.values) {
            Ok(unit) => {
                debug!(component = %job.name, unit = unit.id(), "component compiled");
                LoaderState::Ready(unit)
            }
            Err(err) => {
                error!(component = %job.name, error = %err, "component failed to compile");
                LoaderState::Failed(LoadFailure::Compile(err))
            }
        };
        true
    }

    #[must_use]
    pub fn state(&self) -> &LoaderState {
        &self.state
    }

    /// The cached unit, if the site is ready.
    #[must_use]
    pub fn unit(&self) -> Option<CompiledUnit> {
        match &self.state {
            LoaderState::Ready(unit) => Some(unit.clone()),
            _ => None,
        }
    }

    /// Whether a job is waiting for `settle`.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// How many compilations this loader has run.
    #[must_use]
    pub fn compile_count(&self) -> usize {
        self.compile_count
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Manifest;

    fn registry(defs: &[(&str, &str)]) -> RegistryState {
        RegistryState::loaded(Manifest::from_definitions(
            defs.iter().map(|(n, s)| ComponentDefinition::new(*n, *s)),
        ))
    }

    #[test]
    fn unloaded_registry_yields_nothing() {
        let mut loader = Loader::new();
        let unloaded = RegistryState::default();
        assert!(loader.request(&unloaded, "Btn", &Scope::new()).is_none());
        assert_eq!(loader.state(), &LoaderState::Idle);
        assert!(!loader.is_pending());
    }

    #[test]
    fn resolves_after_one_settle() {
        let registry = registry(&[("Btn", "(props) => null")]);
        let compiler = Compiler::new();
        let mut loader = Loader::new();
        assert!(loader.request(&registry, "Btn", &Scope::new()).is_none());
        assert_eq!(loader.state(), &LoaderState::Compiling);
        assert!(loader.settle(&compiler));
        assert!(loader.request(&registry, "Btn", &Scope::new()).is_some());
        assert!(!loader.settle(&compiler));
    }

    #[test]
    fn compile_failure_is_sticky_until_key_changes() {
        let registry = registry(&[("Bad", "() => <div>")]);
        let compiler = Compiler::new();
        let mut loader = Loader::new();
        loader.request(&registry, "Bad", &Scope::new());
        loader.settle(&compiler);
        assert!(matches!(
            loader.state(),
            LoaderState::Failed(LoadFailure::Compile(_))
        ));
        assert!(loader.request(&registry, "Bad", &Scope::new()).is_none());
        assert!(!loader.settle(&compiler));
        assert_eq!(loader.compile_count(), 1);

        let changed = Scope::new().with("x", 1_i64);
        loader.request(&registry, "Bad", &changed);
        loader.settle(&compiler);
        assert_eq!(loader.compile_count(), 2);
    }

    #[test]
    fn name_change_invalidates() {
        let registry = registry(&[("A", "() => null"), ("B", "() => null")]);
        let compiler = Compiler::new();
        let mut loader = Loader::new();
        loader.request(&registry, "A", &Scope::new());
        loader.settle(&compiler);
        let a = loader.request(&registry, "A", &Scope::new());
        assert!(loader.request(&registry, "B", &Scope::new()).is_none());
        loader.settle(&compiler);
        let b = loader.request(&registry, "B", &Scope::new());
        assert!(a.is_some() && b.is_some());
        assert_ne!(a, b);
    }
}
