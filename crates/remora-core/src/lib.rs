//! # remora-core
//!
//! The remote-component runtime for Remora - THE RUNTIME.
//!
//! This crate turns a manifest of named component definitions, fetched from
//! a remote registry by the host, into renderable units bound to explicit
//! capability scopes.
//!
//! ## Components
//!
//! - `registry`: the shared manifest state and its lifecycle
//! - `compiler`: parses and evaluates one definition against a scope
//! - `loader`: per-site memoization keyed by structural scope identity
//! - `graph`: dependency-ordered resolution of composite components
//! - `html`: serialization of rendered trees
//!
//! ## Architectural Constraints
//!
//! The runtime:
//! - Has NO async and NO network dependencies (pure Rust)
//! - Uses integer arithmetic only
//! - Degrades everything below registry level to "absent", never panics
//! - Lets a definition reach only the values named in its scope

// =============================================================================
// MODULES
// =============================================================================

pub mod compiler;
pub mod graph;
pub mod html;
pub mod loader;
pub mod primitives;
pub mod registry;
pub mod scope;
pub mod types;
pub mod value;

// =============================================================================
// RE-EXPORTS
// =============================================================================

pub use compiler::{CompileError, CompiledUnit, Compiler, EvalError, SyntaxError};
pub use graph::{Binding, GraphError, ResolveReport, ScopeGraph, SiteSpec};
pub use html::render_html;
pub use loader::{LoadFailure, Loader, LoaderState};
pub use registry::{Manifest, RegistryState, RegistryStore};
pub use scope::{Scope, ScopeFingerprint};
pub use types::{ComponentDefinition, RemoraError};
pub use value::{Element, Function, HostFn, Value};
