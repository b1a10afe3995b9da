//! # Capability Scope
//!
//! The named capabilities a definition is compiled against.
//!
//! Each binding is either an available `Value` or `None` ("not yet
//! available"). A scope with any `None` entry must never be compiled.
//!
//! ## Structural Identity
//!
//! Loaders decide whether to recompile by comparing scope fingerprints, not
//! scope instances. The fingerprint is a BLAKE3 digest of a canonical
//! encoding: bindings in name order, primitives and containers by content,
//! functions by identity. Rebuilding an equal scope from fresh containers
//! therefore yields the same fingerprint.

use crate::primitives::FINGERPRINT_VERSION;
use crate::value::{Element, Value};
use std::collections::BTreeMap;
use std::fmt;

/// A set of named capability bindings.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    bindings: BTreeMap<String, Option<Value>>,
}

impl Scope {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: bind an available value.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.bindings.insert(name.into(), Some(value.into()));
        self
    }

    /// Builder: declare a capability that is not yet available.
    #[must_use]
    pub fn with_pending(mut self, name: impl Into<String>) -> Self {
        self.bindings.insert(name.into(), None);
        self
    }

    /// Bind `name`, replacing any previous binding.
    pub fn bind(&mut self, name: impl Into<String>, value: Option<Value>) {
        self.bindings.insert(name.into(), value);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// True when every binding has a value.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.bindings.values().all(Option::is_some)
    }

    /// Names whose values are not yet available.
    #[must_use]
    pub fn missing(&self) -> Vec<String> {
        self.bindings
            .iter()
            .filter(|(_, v)| v.is_none())
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Binding names in canonical order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.bindings.keys().cloned().collect()
    }

    /// Binding values in the same order as `names`, if all are available.
    #[must_use]
    pub fn values(&self) -> Option<Vec<Value>> {
        self.bindings.values().cloned().collect()
    }

    /// Structural identity of this scope.
    #[must_use]
    pub fn fingerprint(&self) -> ScopeFingerprint {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&[FINGERPRINT_VERSION]);
        write_len(&mut hasher, self.bindings.len());
        for (name, value) in &self.bindings {
            write_str(&mut hasher, name);
            match value {
                Some(value) => write_value(&mut hasher, value),
                None => {
                    hasher.update(&[tag::PENDING]);
                }
            }
        }
        ScopeFingerprint(*hasher.finalize().as_bytes())
    }
}

// =============================================================================
// FINGERPRINT
// =============================================================================

/// A 32-byte digest of a scope's canonical encoding.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeFingerprint([u8; 32]);

impl ScopeFingerprint {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ScopeFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ScopeFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to tell scopes apart in logs.
        let short: String = self.0[..6].iter().map(|b| format!("{b:02x}")).collect();
        write!(f, "ScopeFingerprint({short})")
    }
}

mod tag {
    pub const UNDEFINED: u8 = 0;
    pub const NULL: u8 = 1;
    pub const BOOL: u8 = 2;
    pub const INT: u8 = 3;
    pub const STR: u8 = 4;
    pub const ARRAY: u8 = 5;
    pub const OBJECT: u8 = 6;
    pub const FUNCTION: u8 = 7;
    pub const ELEMENT: u8 = 8;
    pub const PENDING: u8 = 0xFF;
}

fn write_len(hasher: &mut blake3::Hasher, len: usize) {
    hasher.update(&(len as u64).to_le_bytes());
}

fn write_str(hasher: &mut blake3::Hasher, s: &str) {
    write_len(hasher, s.len());
    hasher.update(s.as_bytes());
}

fn write_map(hasher: &mut blake3::Hasher, entries: &BTreeMap<String, Value>) {
    write_len(hasher, entries.len());
    for (key, value) in entries {
        write_str(hasher, key);
        write_value(hasher, value);
    }
}

fn write_value(hasher: &mut blake3::Hasher, value: &Value) {
    match value {
        Value::Undefined => {
            hasher.update(&[tag::UNDEFINED]);
        }
        Value::Null => {
            hasher.update(&[tag::NULL]);
        }
        Value::Bool(b) => {
            hasher.update(&[tag::BOOL, u8::from(*b)]);
        }
        Value::Int(n) => {
            hasher.update(&[tag::INT]);
            hasher.update(&n.to_le_bytes());
        }
        Value::Str(s) => {
            hasher.update(&[tag::STR]);
            write_str(hasher, s);
        }
        Value::Array(items) => {
            hasher.update(&[tag::ARRAY]);
            write_len(hasher, items.len());
            for item in items.iter() {
                write_value(hasher, item);
            }
        }
        Value::Object(entries) => {
            hasher.update(&[tag::OBJECT]);
            write_map(hasher, entries);
        }
        Value::Function(function) => {
            hasher.update(&[tag::FUNCTION]);
            hasher.update(&function.id().to_le_bytes());
        }
        Value::Element(element) => {
            hasher.update(&[tag::ELEMENT]);
            write_element(hasher, element);
        }
    }
}

fn write_element(hasher: &mut blake3::Hasher, element: &Element) {
    write_str(hasher, &element.tag);
    write_map(hasher, &element.props);
    write_len(hasher, element.children.len());
    for child in &element.children {
        write_value(hasher, child);
    }
}

// =============================================================================
// TESTS
// =============================================================================
