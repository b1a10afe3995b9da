//! # Compiler Module
//!
//! Turns a definition's source text plus a capability scope into a
//! callable `CompiledUnit`.
//!
//! Compilation parses the source as a single expression, evaluates it in an
//! environment containing exactly the scope's `names` bound to `values`, and
//! requires the result to be a function. The unit is then rendered by calling
//! that function with a props object.
//!
//! ## Failure
//!
//! Every failure is a `CompileError`. Syntax errors carry spans and can be
//! rendered as annotated reports; nothing here panics on bad input.
//!
//! ## Stack
//!
//! Parsing, evaluation and rendering recurse. Each entry point runs on a
//! dedicated thread with `EVAL_STACK_SIZE` bytes of stack, and sources
//! nesting deeper than `MAX_NESTING_DEPTH` are rejected before parsing.

mod ast;
mod builtins;
pub(crate) mod eval;
mod parser;

use crate::primitives::{EVAL_STACK_SIZE, MAX_NESTING_DEPTH, MAX_SOURCE_LENGTH, MAX_VALUE_DEPTH};
use crate::types::ComponentDefinition;
use crate::value::{Function, Value};
use ariadne::{Config, Label, Report, ReportKind, Source};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::Range;
use std::sync::Arc;
use thiserror::Error;

// =============================================================================
// ERRORS
// =============================================================================

/// A failure while evaluating definition code.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EvalError {
    #[error("{0} is not defined")]
    Unresolved(String),

    #[error("{0} is not a function")]
    NotCallable(String),

    #[error("cannot read property `{0}` of null or undefined")]
    PropertyOfNullish(String),

    #[error("element type `{name}` is invalid: expected a component, got {found}")]
    InvalidComponent { name: String, found: &'static str },

    #[error("type error: {0}")]
    Type(String),

    #[error("integer overflow")]
    Overflow,

    #[error("division by zero")]
    DivisionByZero,

    #[error("maximum call depth of {0} exceeded")]
    CallDepth(usize),

    #[error("rendered value nests deeper than {0} levels")]
    TooDeep(usize),

    #[error("{name}: {message}")]
    Host { name: String, message: String },
}

/// A single syntax error with its location in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
    pub span: Range<usize>,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}..{}", self.message, self.span.start, self.span.end)
    }
}

/// Why a definition failed to compile.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompileError {
    #[error("source is {len} bytes, limit is {limit}")]
    SourceTooLarge { len: usize, limit: usize },

    #[error("syntax error: {}", .0.first().map(ToString::to_string).unwrap_or_default())]
    Syntax(Vec<SyntaxError>),

    #[error("scope has {names} names but {values} values")]
    ArityMismatch { names: usize, values: usize },

    #[error("evaluation failed: {0}")]
    Evaluation(#[from] EvalError),

    #[error("definition evaluated to {0}, expected a function")]
    NotCallable(&'static str),
}

impl CompileError {
    /// Render the error as a plain-text diagnostic for `name`'s `source`.
    ///
    /// Syntax errors get one annotated report per error; everything else is
    /// a single line.
    pub fn report(&self, name: &str, source: &str) -> String {
        let Self::Syntax(errors) = self else {
            return format!("{name}: {self}\n");
        };
        let mut out = Vec::new();
        for error in errors {
            let written = Report::build(ReportKind::Error, (name, error.span.clone()))
                .with_config(Config::default().with_color(false))
                .with_message(&error.message)
                .with_label(Label::new((name, error.span.clone())).with_message(&error.message))
                .finish()
                .write((name, Source::from(source)), &mut out);
            if written.is_err() {
                return format!("{name}: {self}\n");
            }
        }
        String::from_utf8_lossy(&out).into_owned()
    }
}

// =============================================================================
// COMPILED UNIT
// =============================================================================

/// A compiled, callable component.
///
/// Cloning is cheap and clones compare equal; two separate compilations of
/// the same source never do.
#[derive(Clone)]
pub struct CompiledUnit {
    inner: Arc<UnitInner>,
}

struct UnitInner {
    name: String,
    root: Function,
}

impl CompiledUnit {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Identity of the underlying function value.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.root.id()
    }

    /// Call the component with a props object.
    ///
    /// Results nesting deeper than `MAX_VALUE_DEPTH` are dropped and
    /// reported as `EvalError::TooDeep`.
    pub fn render(&self, props: BTreeMap<String, Value>) -> Result<Value, EvalError> {
        let args = [Value::object(props)];
        on_eval_stack(|| {
            let value = self.inner.root.call(&args)?;
            if value.depth() > MAX_VALUE_DEPTH {
                return Err(EvalError::TooDeep(MAX_VALUE_DEPTH));
            }
            Ok(value)
        })
    }

    /// The unit as a function value, for binding into another scope.
    #[must_use]
    pub fn as_value(&self) -> Value {
        Value::Function(self.inner.root.clone())
    }
}

impl PartialEq for CompiledUnit {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for CompiledUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledUnit")
            .field("name", &self.inner.name)
            .field("id", &self.id())
            .finish()
    }
}

impl From<CompiledUnit> for Value {
    fn from(unit: CompiledUnit) -> Self {
        unit.as_value()
    }
}

// =============================================================================
// EVALUATION STACK
// =============================================================================

/// Run `task` on a thread with `EVAL_STACK_SIZE` bytes of stack.
///
/// Falls back to the calling thread if no thread can be spawned. A panic
/// inside `task` resumes on the caller.
pub(crate) fn on_eval_stack<T: Send>(task: impl Fn() -> T + Sync) -> T {
    let spawned = std::thread::scope(|scope| {
        std::thread::Builder::new()
            .name("remora-eval".to_string())
            .stack_size(EVAL_STACK_SIZE)
            .spawn_scoped(scope, &task)
            .map(|handle| handle.join())
    });
    match spawned {
        Ok(Ok(value)) => value,
        Ok(Err(payload)) => std::panic::resume_unwind(payload),
        Err(error) => {
            tracing::warn!(error = %error, "evaluation thread unavailable, running inline");
            task()
        }
    }
}

// =============================================================================
// COMPILER
// =============================================================================

/// Compiles definition source against a capability scope.
#[derive(Debug, Clone)]
pub struct Compiler {
    max_source_length: usize,
}

impl Default for Compiler {
    fn default() -> Self {
        Self {
            max_source_length: MAX_SOURCE_LENGTH,
        }
    }
}

impl Compiler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: override the source length limit.
    #[must_use]
    pub fn with_max_source_length(mut self, limit: usize) -> Self {
        self.max_source_length = limit;
        self
    }

    /// Compile `source` with `names[i]` bound to `values[i]`.
    pub fn compile(
        &self,
        source: &str,
        names: &[impl AsRef<str>],
        values: &[Value],
    ) -> Result<CompiledUnit, CompileError> {
        self.compile_named("anonymous", source, names, values)
    }

    /// Compile a registry definition against a scope.
    pub fn compile_definition(
        &self,
        definition: &ComponentDefinition,
        names: &[impl AsRef<str>],
        values: &[Value],
    ) -> Result<CompiledUnit, CompileError> {
        self.compile_named(&definition.name, &definition.source, names, values)
    }

    fn compile_named(
        &self,
        name: &str,
        source: &str,
        names: &[impl AsRef<str>],
        values: &[Value],
    ) -> Result<CompiledUnit, CompileError> {
        if names.len() != values.len() {
            return Err(CompileError::ArityMismatch {
                names: names.len(),
                values: values.len(),
            });
        }
        let scope = names
            .iter()
            .map(|n| n.as_ref().to_string())
            .zip(values.iter().cloned())
            .collect();
        let env = eval::Environment::default().extend(scope);
        let root = on_eval_stack(|| {
            let expr = self.parse(source)?;
            match eval::evaluate(&expr, &env)? {
                Value::Function(root) => Ok(root),
                other => Err(CompileError::NotCallable(other.type_name())),
            }
        })?;
        Ok(CompiledUnit {
            inner: Arc::new(UnitInner {
                name: name.to_string(),
                root,
            }),
        })
    }

    /// Syntax-check `source` without evaluating it.
    pub fn check(&self, source: &str) -> Result<(), CompileError> {
        on_eval_stack(|| self.parse(source).map(|_| ()))
    }

    /// Names `source` reads without binding them itself.
    ///
    /// Every one of these must be supplied by the scope for the definition to
    /// render.
    pub fn free_references(&self, source: &str) -> Result<BTreeSet<String>, CompileError> {
        on_eval_stack(|| Ok(ast::free_references(&self.parse(source)?)))
    }

    fn parse(&self, source: &str) -> Result<ast::Expr, CompileError> {
        if source.len() > self.max_source_length {
            return Err(CompileError::SourceTooLarge {
                len: source.len(),
                limit: self.max_source_length,
            });
        }
        if let Err(span) = parser::check_nesting(source, MAX_NESTING_DEPTH) {
            return Err(CompileError::Syntax(vec![SyntaxError {
                message: format!("nesting exceeds {MAX_NESTING_DEPTH} levels"),
                span,
            }]));
        }
        parser::parse(source).map_err(|errors| {
            CompileError::Syntax(
                errors
                    .into_iter()
                    .map(|e| SyntaxError {
                        message: e.reason().to_string(),
                        span: e.span().into_range(),
                    })
                    .collect(),
            )
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const NO_NAMES: [&str; 0] = [];

    #[test]
    fn compiles_and_renders_with_scope() {
        let compiler = Compiler::new();
        let unit = compiler
            .compile(
                "({ label }) => <Button variant={variant}>{label}</Button>",
                &["Button", "variant"],
                &[Value::str("button"), Value::str("primary")],
            )
            .expect("compile");
        let mut props = BTreeMap::new();
        props.insert("label".to_string(), Value::str("Save"));
        let rendered = unit.render(props).expect("render");
        let element = rendered.as_element().expect("element");
        assert_eq!(element.tag, "button");
        assert_eq!(element.props.get("variant").and_then(Value::as_str), Some("primary"));
        assert_eq!(element.children.len(), 1);
    }

    #[test]
    fn arity_mismatch_is_rejected() {
        let err = Compiler::new()
            .compile("() => null", &["a", "b"], &[Value::Null])
            .err();
        assert_eq!(err, Some(CompileError::ArityMismatch { names: 2, values: 1 }));
    }

    #[test]
    fn non_function_result_is_rejected() {
        let err = Compiler::new().compile("42", &NO_NAMES, &[]).err();
        assert_eq!(err, Some(CompileError::NotCallable("number")));
    }

    #[test]
    fn oversized_source_is_rejected() {
        let compiler = Compiler::new().with_max_source_length(8);
        let err = compiler.compile("() => 'too long'", &NO_NAMES, &[]).err();
        assert!(matches!(err, Some(CompileError::SourceTooLarge { .. })));
    }

    #[test]
    fn unbound_reference_fails_at_render_not_compile() {
        let unit = Compiler::new()
            .compile("() => <Missing />", &NO_NAMES, &[])
            .expect("compile");
        assert_eq!(
            unit.render(BTreeMap::new()).err(),
            Some(EvalError::Unresolved("Missing".to_string()))
        );
    }

    #[test]
    fn free_references_exclude_bound_names() {
        let refs = Compiler::new()
            .free_references("({ items }) => { const n = items.length; return <List n={n} theme={useTheme()} />; }")
            .expect("parse");
        let refs: Vec<&str> = refs.iter().map(String::as_str).collect();
        assert_eq!(refs, vec!["List", "useTheme"]);
    }

    #[test]
    fn syntax_report_names_the_component() {
        let source = "() => <div>";
        let err = Compiler::new().check(source).err().expect("syntax error");
        let report = err.report("Navbar", source);
        assert!(report.contains("Navbar"));
    }

    #[test]
    fn recursive_helpers_render_trees() {
        let source = "({ items }) => { const renderItem = (item) => <li>{item.label}{item.children ? <ul>{item.children.map(renderItem)}</ul> : null}</li>; return <ul>{items.map(renderItem)}</ul>; }";
        let compiler = Compiler::new();
        assert!(compiler.free_references(source).expect("parse").is_empty());
        let unit = compiler.compile(source, &NO_NAMES, &[]).expect("compile");
        let items = Value::from_json(serde_json::json!([
            { "label": "a", "children": [{ "label": "a1" }, { "label": "a2" }] },
            { "label": "b" }
        ]));
        let mut props = BTreeMap::new();
        props.insert("items".to_string(), items);
        let rendered = unit.render(props).expect("render");
        assert_eq!(
            crate::render_html(&rendered),
            "<ul><li>a<ul><li>a1</li><li>a2</li></ul></li><li>b</li></ul>"
        );
    }

    #[test]
    fn type_annotations_are_ignored() {
        let source = "({ items, title }: Props): JSX.Element => { const count: number = items.length as number; return <p>{title}: {typeof count} {count}</p>; }";
        let unit = Compiler::new()
            .compile(source, &NO_NAMES, &[])
            .expect("compile");
        let mut props = BTreeMap::new();
        props.insert("items".to_string(), Value::array(vec![Value::Int(1), Value::Int(2)]));
        props.insert("title".to_string(), Value::str("Items"));
        let rendered = unit.render(props).expect("render");
        assert_eq!(crate::render_html(&rendered), "<p>Items: number 2</p>");
    }

    #[test]
    fn spread_props_cannot_inject_markup() {
        let unit = Compiler::new()
            .compile("(props) => <div {...props} />", &NO_NAMES, &[])
            .expect("compile");
        let mut props = BTreeMap::new();
        props.insert("x><script>alert(1)</script><i".to_string(), Value::str("1"));
        props.insert("title".to_string(), Value::str("ok"));
        let html = crate::render_html(&unit.render(props).expect("render"));
        assert_eq!(html, "<div title=\"ok\"></div>");
        assert!(!html.contains("<script"));
    }

    fn is_nesting_error(result: Result<(), CompileError>) -> bool {
        matches!(
            result,
            Err(CompileError::Syntax(errors))
                if errors.iter().any(|e| e.message.contains("nesting exceeds"))
        )
    }

    #[test]
    fn deeply_nested_sources_are_syntax_errors() {
        let compiler = Compiler::new();
        let negations = format!("() => {}true", "!".repeat(200_000));
        assert!(is_nesting_error(compiler.check(&negations)));

        let arrays = format!("() => {}1{}", "[".repeat(100_000), "]".repeat(100_000));
        let err = compiler.compile(&arrays, &NO_NAMES, &[]).err();
        assert!(matches!(err, Some(CompileError::Syntax(_))));

        let elements = format!("() => {}x{}", "<b>".repeat(5_000), "</b>".repeat(5_000));
        assert!(is_nesting_error(compiler.check(&elements)));

        let sums = format!("() => 1{}", " + 1".repeat(50_000));
        assert!(is_nesting_error(compiler.check(&sums)));
        assert!(compiler.free_references(&sums).is_err());
    }

    #[test]
    fn moderate_nesting_is_accepted() {
        let compiler = Compiler::new();
        let source = format!("() => {}1{}", "[".repeat(40), "]".repeat(40));
        compiler.compile(&source, &NO_NAMES, &[]).expect("compile");
        let elements = format!("() => {}x{}", "<b>".repeat(40), "</b>".repeat(40));
        compiler.compile(&elements, &NO_NAMES, &[]).expect("compile");
    }

    #[test]
    fn self_rendering_component_stops_at_call_depth() {
        let unit = Compiler::new()
            .compile(
                "({ Me, n }) => n > 0 ? <div><Me Me={Me} n={n - 1} /></div> : <b>done</b>",
                &NO_NAMES,
                &[],
            )
            .expect("compile");
        let props = |n: i64| {
            let mut props = BTreeMap::new();
            props.insert("Me".to_string(), unit.as_value());
            props.insert("n".to_string(), Value::Int(n));
            props
        };
        assert_eq!(
            unit.render(props(1_000_000)).err(),
            Some(EvalError::CallDepth(crate::primitives::MAX_CALL_DEPTH))
        );
        let shallow = unit.render(props(3)).expect("render");
        assert_eq!(shallow.depth(), 4);
    }

    #[test]
    fn separate_compilations_are_distinct_units() {
        let compiler = Compiler::new();
        let a = compiler.compile("() => null", &NO_NAMES, &[]).expect("a");
        let b = compiler.compile("() => null", &NO_NAMES, &[]).expect("b");
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }
}
