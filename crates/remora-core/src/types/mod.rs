//! # Core Type Definitions
//!
//! This module contains the types shared across the Remora runtime:
//! - Manifest records (`ComponentDefinition`)
//! - Error types (`RemoraError`)
//!
//! The value model lives in `value`; compiler and graph errors live next to
//! the code that raises them and convert into `RemoraError`.

use crate::compiler::{CompileError, EvalError};
use crate::graph::GraphError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// COMPONENT DEFINITION
// =============================================================================

/// One named component definition from the manifest.
///
/// `source` is the definition text; manifests written for older hosts name
/// the same field `jsx`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDefinition {
    /// Unique name within one fetched manifest.
    pub name: String,
    /// Definition source text.
    #[serde(alias = "jsx")]
    pub source: String,
}

impl ComponentDefinition {
    #[must_use]
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Remora runtime.
///
/// Below registry level these are logged and downgraded to an absent
/// component; they surface directly only from tooling and explicit renders.
#[derive(Debug, Error)]
pub enum RemoraError {
    /// The manifest could not be fetched or decoded.
    #[error("Registry error: {0}")]
    Registry(String),

    /// The requested component is not in the manifest.
    #[error("Component not found: {0}")]
    ComponentNotFound(String),

    /// A definition failed to compile.
    #[error("Compilation failed: {0}")]
    Compile(#[from] CompileError),

    /// A compiled component failed while rendering.
    #[error("Render failed: {0}")]
    Render(#[from] EvalError),

    /// The scope graph configuration is invalid.
    #[error("Scope graph error: {0}")]
    Graph(#[from] GraphError),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<serde_json::Error> for RemoraError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for RemoraError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definition_accepts_jsx_alias() {
        let def: ComponentDefinition =
            serde_json::from_str(r#"{"name":"Navbar","jsx":"() => null"}"#).expect("decode");
        assert_eq!(def, ComponentDefinition::new("Navbar", "() => null"));
    }

    #[test]
    fn definition_serializes_as_source() {
        let json = serde_json::to_string(&ComponentDefinition::new("A", "x")).expect("encode");
        assert_eq!(json, r#"{"name":"A","source":"x"}"#);
    }

    #[test]
    fn errors_convert_into_remora_error() {
        let err: RemoraError = EvalError::Unresolved("Button".to_string()).into();
        assert_eq!(err.to_string(), "Render failed: Button is not defined");
    }
}
