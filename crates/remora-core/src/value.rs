//! # Runtime Values
//!
//! The value model shared by compiled definitions and the host.
//!
//! A `Value` is what flows through a scope: host functions, constants, other
//! components' compiled units, and whatever a definition produces when it
//! renders. Numbers are 64-bit integers only; the runtime performs no
//! floating-point arithmetic.
//!
//! ## Identity vs Structure
//!
//! Primitives, arrays, objects and elements compare structurally when a scope
//! is fingerprinted. Functions compare by identity: every function value
//! carries a process-unique id assigned when it is created.

use crate::compiler::EvalError;
use crate::compiler::eval::{self, Closure};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Signature of a host-native function exposed to definitions.
pub type HostFn = Arc<dyn Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync>;

static NEXT_FUNCTION_ID: AtomicU64 = AtomicU64::new(1);

fn next_function_id() -> u64 {
    NEXT_FUNCTION_ID.fetch_add(1, Ordering::Relaxed)
}

// =============================================================================
// VALUE
// =============================================================================

/// A runtime value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    Str(Arc<str>),
    Array(Arc<Vec<Value>>),
    Object(Arc<BTreeMap<String, Value>>),
    Function(Function),
    Element(Arc<Element>),
}

impl Value {
    /// Build a string value.
    #[must_use]
    pub fn str(s: impl AsRef<str>) -> Self {
        Self::Str(Arc::from(s.as_ref()))
    }

    /// Build an array value.
    #[must_use]
    pub fn array(items: Vec<Value>) -> Self {
        Self::Array(Arc::new(items))
    }

    /// Build an object value.
    #[must_use]
    pub fn object(entries: BTreeMap<String, Value>) -> Self {
        Self::Object(Arc::new(entries))
    }

    /// Build an object value from `(key, value)` pairs.
    #[must_use]
    pub fn object_from<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self::object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Wrap a host closure as a function value.
    #[must_use]
    pub fn host_fn(
        name: &str,
        f: impl Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    ) -> Self {
        Self::Function(Function::host(name, f))
    }

    /// The JavaScript-style type name, used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "number",
            Self::Str(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
            Self::Function(_) => "function",
            Self::Element(_) => "element",
        }
    }

    /// The result of `typeof`.
    #[must_use]
    pub fn typeof_name(&self) -> &'static str {
        match self {
            Self::Null | Self::Array(_) | Self::Object(_) | Self::Element(_) => "object",
            other => other.type_name(),
        }
    }

    /// How many containers deep the value goes. Scalars and functions are 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        fn deepest<'a>(values: impl Iterator<Item = &'a Value>) -> usize {
            values.map(Value::depth).max().unwrap_or(0) + 1
        }
        match self {
            Self::Array(items) => deepest(items.iter()),
            Self::Object(entries) => deepest(entries.values()),
            Self::Element(element) => deepest(element.props.values().chain(&element.children)),
            _ => 0,
        }
    }

    /// `null` or `undefined`.
    #[must_use]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    /// JavaScript truthiness.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(n) => *n != 0,
            Self::Str(s) => !s.is_empty(),
            Self::Array(_) | Self::Object(_) | Self::Function(_) | Self::Element(_) => true,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Self::Function(f) => Some(f),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Self::Element(e) => Some(e),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Object(entries) => Some(entries),
            _ => None,
        }
    }

    /// Look up a key on an object value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|entries| entries.get(key))
    }

    /// String conversion used by template literals, `+` and text nodes.
    #[must_use]
    pub fn to_display_string(&self) -> String {
        match self {
            Self::Undefined => "undefined".to_string(),
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Int(n) => n.to_string(),
            Self::Str(s) => s.to_string(),
            Self::Array(items) => items
                .iter()
                .map(|item| {
                    if item.is_nullish() {
                        String::new()
                    } else {
                        item.to_display_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(","),
            Self::Object(_) | Self::Element(_) => "[object Object]".to_string(),
            Self::Function(f) => format!("function {}", f.name()),
        }
    }

    /// `===`: primitives by value, everything else by identity.
    #[must_use]
    pub fn strict_equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => Arc::ptr_eq(a, b),
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            (Self::Element(a), Self::Element(b)) => Arc::ptr_eq(a, b),
            (Self::Function(a), Self::Function(b)) => a.id() == b.id(),
            _ => false,
        }
    }

    /// `==`: like `===`, except that `null` and `undefined` are equal.
    #[must_use]
    pub fn loose_equals(&self, other: &Self) -> bool {
        (self.is_nullish() && other.is_nullish()) || self.strict_equals(other)
    }

    /// Convert decoded JSON into a runtime value.
    ///
    /// Numbers that do not fit an `i64` are kept as their decimal text.
    #[must_use]
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::str(n.to_string()),
            },
            serde_json::Value::String(s) => Self::str(s),
            serde_json::Value::Array(items) => {
                Self::array(items.into_iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(entries) => Self::object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Self::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Array(items) => f.debug_list().entries(items.iter()).finish(),
            Self::Object(entries) => f.debug_map().entries(entries.iter()).finish(),
            Self::Function(func) => write!(f, "{func:?}"),
            Self::Element(element) => write!(f, "{element:?}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::str(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::array(items)
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Self::Function(f)
    }
}

impl From<Element> for Value {
    fn from(e: Element) -> Self {
        Self::Element(Arc::new(e))
    }
}

// =============================================================================
// ELEMENT
// =============================================================================

/// An intrinsic UI element, the leaf output of rendering.
///
/// `children` holds the rendered children in order; `props` never contains a
/// `children` key.
#[derive(Debug, Clone, Default)]
pub struct Element {
    pub tag: String,
    pub props: BTreeMap<String, Value>,
    pub children: Vec<Value>,
}

impl Element {
    /// Create an element with no props and no children.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// Builder: set a prop.
    #[must_use]
    pub fn prop(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(name.into(), value.into());
        self
    }

    /// Builder: append a child.
    #[must_use]
    pub fn child(mut self, child: impl Into<Value>) -> Self {
        self.children.push(child.into());
        self
    }
}

// =============================================================================
// FUNCTION
// =============================================================================

/// A callable value: either host-native or a closure from a definition.
#[derive(Clone)]
pub struct Function {
    id: u64,
    name: Arc<str>,
    kind: FunctionKind,
}

#[derive(Clone)]
enum FunctionKind {
    Host(HostFn),
    Closure(Arc<Closure>),
}

impl Function {
    /// Wrap a host closure.
    #[must_use]
    pub fn host(
        name: &str,
        f: impl Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: next_function_id(),
            name: Arc::from(name),
            kind: FunctionKind::Host(Arc::new(f)),
        }
    }

    pub(crate) fn closure(name: &str, closure: Closure) -> Self {
        Self {
            id: next_function_id(),
            name: Arc::from(name),
            kind: FunctionKind::Closure(Arc::new(closure)),
        }
    }

    /// Process-unique identity of this function value.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_host(&self) -> bool {
        matches!(self.kind, FunctionKind::Host(_))
    }

    /// Invoke the function.
    ///
    /// Every call, host or closure, counts against `MAX_CALL_DEPTH`.
    pub fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        let _depth = eval::CallDepthGuard::enter()?;
        match &self.kind {
            FunctionKind::Host(f) => f(args),
            FunctionKind::Closure(closure) => eval::call_closure(self, closure, args),
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            FunctionKind::Host(_) => "host",
            FunctionKind::Closure(_) => "closure",
        };
        write!(f, "[{kind} function {} #{}]", self.name, self.id)
    }
}

// =============================================================================
// TESTS
// =============================================================================
