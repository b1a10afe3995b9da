//! # Scope Graph
//!
//! Typed dependency resolution between request sites.
//!
//! A site asks for one component. Its bindings are either host capabilities
//! or references to other sites, in which case the capability is that site's
//! current output. Sites are validated and ordered once at build time; every
//! pass then requests them leaves-first, so a composite always sees the
//! freshest output of its dependencies.
//!
//! An unresolved dependency leaves its binding empty, which keeps every
//! dependent composite unresolved as well.

use crate::compiler::{CompiledUnit, Compiler};
use crate::loader::{Loader, LoaderState};
use crate::registry::RegistryState;
use crate::scope::Scope;
use crate::value::Value;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::debug;

// =============================================================================
// SITE SPECIFICATION
// =============================================================================

/// Where a capability comes from.
#[derive(Debug, Clone)]
pub enum Binding {
    /// A host-provided value.
    Host(Value),
    /// The output of another site.
    Site(String),
}

/// Declaration of one request site.
#[derive(Debug, Clone)]
pub struct SiteSpec {
    id: String,
    component: String,
    bindings: BTreeMap<String, Binding>,
}

impl SiteSpec {
    #[must_use]
    pub fn new(id: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            component: component.into(),
            bindings: BTreeMap::new(),
        }
    }

    /// Builder: bind a host capability.
    #[must_use]
    pub fn host(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.bindings
            .insert(name.into(), Binding::Host(value.into()));
        self
    }

    /// Builder: bind another site's output.
    #[must_use]
    pub fn uses(mut self, name: impl Into<String>, site: impl Into<String>) -> Self {
        self.bindings.insert(name.into(), Binding::Site(site.into()));
        self
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn component(&self) -> &str {
        &self.component
    }

    #[must_use]
    pub fn bindings(&self) -> &BTreeMap<String, Binding> {
        &self.bindings
    }

    fn dependencies(&self) -> BTreeSet<&str> {
        self.bindings
            .values()
            .filter_map(|b| match b {
                Binding::Site(site) => Some(site.as_str()),
                Binding::Host(_) => None,
            })
            .collect()
    }
}

/// Invalid graph configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("site `{0}` is declared more than once")]
    DuplicateSite(String),

    #[error("site `{site}` binds `{binding}` to unknown site `{target}`")]
    UnknownSite {
        site: String,
        binding: String,
        target: String,
    },

    #[error("sites form a cycle: {}", .0.join(", "))]
    Cycle(Vec<String>),
}

// =============================================================================
// SCOPE GRAPH
// =============================================================================

struct Site {
    spec: SiteSpec,
    loader: Loader,
    output: Option<CompiledUnit>,
}

/// Outcome of `ScopeGraph::resolve`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveReport {
    /// Passes run, including the final quiet one.
    pub passes: usize,
    /// True if the graph stopped changing within the pass budget.
    pub stable: bool,
    pub resolved: Vec<String>,
    pub unresolved: Vec<String>,
}

/// Request sites in dependency order.
pub struct ScopeGraph {
    /// Topological order, leaves first.
    sites: Vec<Site>,
    index: BTreeMap<String, usize>,
}

impl std::fmt::Debug for ScopeGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeGraph")
            .field("sites", &self.index.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl ScopeGraph {
    /// Validate and order `specs`.
    pub fn build(specs: impl IntoIterator<Item = SiteSpec>) -> Result<Self, GraphError> {
        let mut by_id: BTreeMap<String, SiteSpec> = BTreeMap::new();
        for spec in specs {
            if by_id.contains_key(&spec.id) {
                return Err(GraphError::DuplicateSite(spec.id));
            }
            by_id.insert(spec.id.clone(), spec);
        }

        for spec in by_id.values() {
            for (binding, source) in &spec.bindings {
                if let Binding::Site(target) = source
                    && !by_id.contains_key(target)
                {
                    return Err(GraphError::UnknownSite {
                        site: spec.id.clone(),
                        binding: binding.clone(),
                        target: target.clone(),
                    });
                }
            }
        }

        // Kahn's algorithm; the ready set is ordered so the result is stable.
        let mut remaining: BTreeMap<&str, BTreeSet<&str>> = by_id
            .values()
            .map(|spec| (spec.id.as_str(), spec.dependencies()))
            .collect();
        let mut order: Vec<String> = Vec::with_capacity(by_id.len());
        loop {
            let ready: Vec<&str> = remaining
                .iter()
                .filter(|(_, deps)| deps.is_empty())
                .map(|(id, _)| *id)
                .collect();
            if ready.is_empty() {
                break;
            }
            for id in &ready {
                remaining.remove(id);
                order.push((*id).to_string());
            }
            for deps in remaining.values_mut() {
                for id in &ready {
                    deps.remove(id);
                }
            }
        }
        if !remaining.is_empty() {
            return Err(GraphError::Cycle(
                remaining.keys().map(|id| (*id).to_string()).collect(),
            ));
        }

        let mut sites = Vec::with_capacity(order.len());
        let mut index = BTreeMap::new();
        for id in order {
            if let Some(spec) = by_id.remove(&id) {
                index.insert(id, sites.len());
                sites.push(Site {
                    spec,
                    loader: Loader::new(),
                    output: None,
                });
            }
        }
        Ok(Self { sites, index })
    }

    /// Site ids, leaves first.
    #[must_use]
    pub fn order(&self) -> Vec<&str> {
        self.sites.iter().map(|s| s.spec.id.as_str()).collect()
    }

    #[must_use]
    pub fn contains(&self, site: &str) -> bool {
        self.index.contains_key(site)
    }

    #[must_use]
    pub fn spec(&self, site: &str) -> Option<&SiteSpec> {
        self.site(site).map(|s| &s.spec)
    }

    /// Output of `site` as of the last pass.
    #[must_use]
    pub fn output(&self, site: &str) -> Option<CompiledUnit> {
        self.site(site).and_then(|s| s.output.clone())
    }

    #[must_use]
    pub fn state(&self, site: &str) -> Option<&LoaderState> {
        self.site(site).map(|s| s.loader.state())
    }

    /// Total compilations across all sites.
    #[must_use]
    pub fn compile_count(&self) -> usize {
        self.sites.iter().map(|s| s.loader.compile_count()).sum()
    }

    fn site(&self, id: &str) -> Option<&Site> {
        self.index.get(id).and_then(|i| self.sites.get(*i))
    }

    /// One render pass: request every site, leaves first. Returns how many
    /// outputs changed.
    pub fn pass(&mut self, registry: &RegistryState) -> usize {
        let mut changed = 0;
        for i in 0..self.sites.len() {
            let mut scope = Scope::new();
            for (name, binding) in &self.sites[i].spec.bindings {
                let value = match binding {
                    Binding::Host(value) => Some(value.clone()),
                    Binding::Site(target) => self
                        .index
                        .get(target)
                        .and_then(|j| self.sites[*j].output.as_ref())
                        .map(CompiledUnit::as_value),
                };
                scope.bind(name.clone(), value);
            }

            let site = &mut self.sites[i];
            let output = site.loader.request(registry, &site.spec.component, &scope);
            if output != site.output {
                debug!(site = %site.spec.id, resolved = output.is_some(), "site output changed");
                changed += 1;
            }
            site.output = output;
        }
        changed
    }

    /// Run every site's pending job. Returns `true` if any site changed.
    pub fn settle(&mut self, compiler: &Compiler) -> bool {
        let mut any = false;
        for site in &mut self.sites {
            any |= site.loader.settle(compiler);
        }
        any
    }

    /// Alternate `pass` and `settle` until nothing changes or `max_passes`
    /// is reached.
    pub fn resolve(
        &mut self,
        registry: &RegistryState,
        compiler: &Compiler,
        max_passes: usize,
    ) -> ResolveReport {
        let mut passes = 0;
        let mut stable = false;
        while passes < max_passes {
            passes += 1;
            self.pass(registry);
            if !self.settle(compiler) {
                stable = true;
                break;
            }
        }

        let (resolved, unresolved) = self
            .sites
            .iter()
            .map(|s| (s.spec.id.clone(), s.output.is_some()))
            .partition::<Vec<_>, _>(|(_, ok)| *ok);
        ResolveReport {
            passes,
            stable,
            resolved: resolved.into_iter().map(|(id, _)| id).collect(),
            unresolved: unresolved.into_iter().map(|(id, _)| id).collect(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
