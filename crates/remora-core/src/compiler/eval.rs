//! # Evaluator
//!
//! Tree-walking evaluation of parsed definitions.
//!
//! A definition only sees the names bound in its `Environment`. The root
//! environment is exactly the capability scope it was compiled against;
//! nothing else from the host is reachable.

use super::EvalError;
use super::ast::{
    ArrowBody, ArrowFunction, BinaryOp, Expr, Item, JsxAttrValue, JsxAttribute, JsxChild,
    JsxElement, JsxName, Literal, Param, Pattern, Property, Stmt, TemplatePart, UnaryOp,
};
use super::builtins;
use crate::primitives::MAX_CALL_DEPTH;
use crate::value::{Element, Function, Value};
use std::cell::Cell;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

// =============================================================================
// ENVIRONMENT
// =============================================================================

/// A persistent chain of binding frames.
#[derive(Clone, Default)]
pub struct Environment {
    frame: Option<Arc<Frame>>,
}

struct Frame {
    bindings: BTreeMap<String, Value>,
    parent: Option<Arc<Frame>>,
}

impl Drop for Frame {
    // Unlink long chains one frame at a time.
    fn drop(&mut self) {
        let mut parent = self.parent.take();
        while let Some(frame) = parent {
            parent = match Arc::try_unwrap(frame) {
                Ok(mut frame) => frame.parent.take(),
                Err(_) => None,
            };
        }
    }
}

impl Environment {
    /// A new environment with `bindings` layered over `self`.
    #[must_use]
    pub fn extend(&self, bindings: BTreeMap<String, Value>) -> Self {
        if bindings.is_empty() {
            return self.clone();
        }
        Self {
            frame: Some(Arc::new(Frame {
                bindings,
                parent: self.frame.clone(),
            })),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        let mut frame = self.frame.as_deref();
        while let Some(current) = frame {
            if let Some(value) = current.bindings.get(name) {
                return Some(value);
            }
            frame = current.parent.as_deref();
        }
        None
    }
}

/// An arrow function together with the environment it closed over.
///
/// A `recursive` closure sees itself under its own name, so
/// `const walk = (node) => ... walk(child) ...` works.
pub struct Closure {
    pub(crate) function: Arc<ArrowFunction>,
    pub(crate) env: Environment,
    pub(crate) recursive: bool,
}

// =============================================================================
// CALL DEPTH
// =============================================================================

thread_local! {
    static CALL_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Counts one level of function nesting for as long as it is alive.
pub struct CallDepthGuard(());

impl CallDepthGuard {
    pub fn enter() -> Result<Self, EvalError> {
        CALL_DEPTH.with(|depth| {
            let current = depth.get();
            if current >= MAX_CALL_DEPTH {
                return Err(EvalError::CallDepth(MAX_CALL_DEPTH));
            }
            depth.set(current + 1);
            Ok(Self(()))
        })
    }
}

impl Drop for CallDepthGuard {
    fn drop(&mut self) {
        CALL_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

// =============================================================================
// FUNCTIONS
// =============================================================================

pub(crate) fn call_closure(
    callee: &Function,
    closure: &Closure,
    args: &[Value],
) -> Result<Value, EvalError> {
    let mut env = closure.env.clone();
    if closure.recursive {
        let mut own = BTreeMap::new();
        own.insert(callee.name().to_string(), Value::Function(callee.clone()));
        env = env.extend(own);
    }
    for (i, param) in closure.function.params.iter().enumerate() {
        let arg = args.get(i).cloned().unwrap_or_default();
        env = bind_param(param, arg, &env)?;
    }
    match &closure.function.body {
        ArrowBody::Expr(expr) => evaluate(expr, &env),
        ArrowBody::Block(stmts) => Ok(execute(stmts, &env)?.unwrap_or_default()),
    }
}

fn make_closure(function: &Arc<ArrowFunction>, env: &Environment, name: &str) -> Value {
    closure_value(function, env, name, false)
}

fn closure_value(
    function: &Arc<ArrowFunction>,
    env: &Environment,
    name: &str,
    recursive: bool,
) -> Value {
    Value::Function(Function::closure(
        name,
        Closure {
            function: Arc::clone(function),
            env: env.clone(),
            recursive,
        },
    ))
}

fn bind_param(param: &Param, value: Value, env: &Environment) -> Result<Environment, EvalError> {
    let value = with_default(value, param.default.as_ref(), env)?;
    let mut bindings = BTreeMap::new();
    bind_pattern(&param.pattern, value, env, &mut bindings)?;
    Ok(env.extend(bindings))
}

fn with_default(
    value: Value,
    default: Option<&Expr>,
    env: &Environment,
) -> Result<Value, EvalError> {
    match (value, default) {
        (Value::Undefined, Some(default)) => evaluate(default, env),
        (value, _) => Ok(value),
    }
}

fn bind_pattern(
    pattern: &Pattern,
    value: Value,
    env: &Environment,
    bindings: &mut BTreeMap<String, Value>,
) -> Result<(), EvalError> {
    match pattern {
        Pattern::Ident(name) => {
            bindings.insert(name.clone(), value);
        }
        Pattern::Object { properties, rest } => {
            if value.is_nullish() {
                return Err(EvalError::Type(format!(
                    "cannot destructure {}",
                    value.type_name()
                )));
            }
            for property in properties {
                let field = member(&value, &property.key)?;
                let field = with_default(field, property.default.as_ref(), env)?;
                bind_pattern(&property.binding, field, env, bindings)?;
            }
            if let Some(rest) = rest {
                let remaining = value
                    .as_object()
                    .map(|entries| {
                        entries
                            .iter()
                            .filter(|(k, _)| !properties.iter().any(|p| &p.key == *k))
                            .map(|(k, v)| (k.clone(), v.clone()))
                            .collect()
                    })
                    .unwrap_or_default();
                bindings.insert(rest.clone(), Value::object(remaining));
            }
        }
        Pattern::Array(params) => {
            let Some(items) = value.as_array() else {
                return Err(EvalError::Type(format!(
                    "{} is not iterable",
                    value.type_name()
                )));
            };
            for (i, param) in params.iter().enumerate() {
                let item = items.get(i).cloned().unwrap_or_default();
                let item = with_default(item, param.default.as_ref(), env)?;
                bind_pattern(&param.pattern, item, env, bindings)?;
            }
        }
    }
    Ok(())
}

/// Run a statement list. `Some` carries the value of an executed `return`.
fn execute(stmts: &[Stmt], env: &Environment) -> Result<Option<Value>, EvalError> {
    let mut env = env.clone();
    for stmt in stmts {
        match stmt {
            Stmt::Declare { pattern, init } => {
                let value = match (pattern, init) {
                    (Pattern::Ident(name), Expr::Arrow(function)) => {
                        closure_value(function, &env, name, true)
                    }
                    _ => evaluate(init, &env)?,
                };
                let mut bindings = BTreeMap::new();
                bind_pattern(pattern, value, &env, &mut bindings)?;
                env = env.extend(bindings);
            }
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => evaluate(expr, &env)?,
                    None => Value::Undefined,
                };
                return Ok(Some(value));
            }
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                let branch = if evaluate(test, &env)?.is_truthy() {
                    Some(consequent)
                } else {
                    alternate.as_ref()
                };
                if let Some(branch) = branch
                    && let Some(value) = execute(branch, &env)?
                {
                    return Ok(Some(value));
                }
            }
            Stmt::Expr(expr) => {
                evaluate(expr, &env)?;
            }
        }
    }
    Ok(None)
}

// =============================================================================
// EXPRESSIONS
// =============================================================================

pub(crate) fn evaluate(expr: &Expr, env: &Environment) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(literal) => Ok(match literal {
            Literal::Undefined => Value::Undefined,
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Int(n) => Value::Int(*n),
            Literal::Str(s) => Value::str(s),
        }),
        Expr::Ident(name) => env
            .lookup(name)
            .cloned()
            .ok_or_else(|| EvalError::Unresolved(name.clone())),
        Expr::Template(parts) => {
            let mut out = String::new();
            for part in parts {
                match part {
                    TemplatePart::Text(text) => out.push_str(text),
                    TemplatePart::Expr(e) => out.push_str(&evaluate(e, env)?.to_display_string()),
                }
            }
            Ok(Value::str(out))
        }
        Expr::Array(items) => Ok(Value::array(evaluate_items(items, env)?)),
        Expr::Object(properties) => {
            let mut entries = BTreeMap::new();
            for property in properties {
                match property {
                    Property::KeyValue(key, value) => {
                        let value = match value {
                            Expr::Arrow(function) => make_closure(function, env, key),
                            _ => evaluate(value, env)?,
                        };
                        entries.insert(key.clone(), value);
                    }
                    Property::Shorthand(name) => {
                        let value = evaluate(&Expr::Ident(name.clone()), env)?;
                        entries.insert(name.clone(), value);
                    }
                    Property::Spread(e) => spread_into(&mut entries, evaluate(e, env)?)?,
                }
            }
            Ok(Value::object(entries))
        }
        Expr::Member {
            object,
            property,
            optional,
        } => {
            let object = evaluate(object, env)?;
            if *optional && object.is_nullish() {
                return Ok(Value::Undefined);
            }
            member(&object, property)
        }
        Expr::Index {
            object,
            index,
            optional,
        } => {
            let object = evaluate(object, env)?;
            if *optional && object.is_nullish() {
                return Ok(Value::Undefined);
            }
            let index = evaluate(index, env)?;
            match (&object, &index) {
                (Value::Array(items), Value::Int(i)) => Ok(usize::try_from(*i)
                    .ok()
                    .and_then(|i| items.get(i))
                    .cloned()
                    .unwrap_or_default()),
                _ => member(&object, &index.to_display_string()),
            }
        }
        Expr::Call {
            callee,
            args,
            optional,
        } => {
            let function = evaluate(callee, env)?;
            if *optional && function.is_nullish() {
                return Ok(Value::Undefined);
            }
            let Value::Function(function) = function else {
                return Err(EvalError::NotCallable(describe(callee)));
            };
            function.call(&evaluate_items(args, env)?)
        }
        Expr::Unary { op, operand } => {
            let value = match (op, operand.as_ref()) {
                (UnaryOp::TypeOf, Expr::Ident(name)) => env.lookup(name).cloned().unwrap_or_default(),
                _ => evaluate(operand, env)?,
            };
            unary(*op, value)
        }
        Expr::Binary { op, left, right } => {
            let left = evaluate(left, env)?;
            match op {
                BinaryOp::And if !left.is_truthy() => Ok(left),
                BinaryOp::Or if left.is_truthy() => Ok(left),
                BinaryOp::Coalesce if !left.is_nullish() => Ok(left),
                BinaryOp::And | BinaryOp::Or | BinaryOp::Coalesce => evaluate(right, env),
                _ => binary(*op, &left, &evaluate(right, env)?),
            }
        }
        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => {
            if evaluate(test, env)?.is_truthy() {
                evaluate(consequent, env)
            } else {
                evaluate(alternate, env)
            }
        }
        Expr::Arrow(function) => Ok(make_closure(function, env, "anonymous")),
        Expr::Element(element) => render_element(element, env),
        Expr::Fragment(children) => Ok(Value::array(evaluate_children(children, env)?)),
    }
}

fn evaluate_items(items: &[Item], env: &Environment) -> Result<Vec<Value>, EvalError> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Item::Single(e) => out.push(evaluate(e, env)?),
            Item::Spread(e) => match evaluate(e, env)? {
                Value::Array(spread) => out.extend(spread.iter().cloned()),
                other => {
                    return Err(EvalError::Type(format!(
                        "{} is not iterable",
                        other.type_name()
                    )));
                }
            },
        }
    }
    Ok(out)
}

fn spread_into(entries: &mut BTreeMap<String, Value>, value: Value) -> Result<(), EvalError> {
    match value {
        Value::Object(source) => {
            entries.extend(source.iter().map(|(k, v)| (k.clone(), v.clone())));
            Ok(())
        }
        Value::Undefined | Value::Null => Ok(()),
        other => Err(EvalError::Type(format!(
            "cannot spread {} into an object",
            other.type_name()
        ))),
    }
}

/// Property access on any value.
pub(crate) fn member(object: &Value, property: &str) -> Result<Value, EvalError> {
    match object {
        Value::Undefined | Value::Null => {
            Err(EvalError::PropertyOfNullish(property.to_string()))
        }
        Value::Object(entries) => Ok(entries.get(property).cloned().unwrap_or_default()),
        Value::Array(items) => Ok(builtins::array_member(items, property)),
        Value::Str(s) => Ok(builtins::string_member(s, property)),
        Value::Element(element) => Ok(match property {
            "type" => Value::str(&element.tag),
            "props" => Value::object(element.props.clone()),
            _ => Value::Undefined,
        }),
        Value::Function(function) => Ok(match property {
            "name" => Value::str(function.name()),
            _ => Value::Undefined,
        }),
        Value::Bool(_) | Value::Int(_) => Ok(Value::Undefined),
    }
}

fn describe(callee: &Expr) -> String {
    match callee {
        Expr::Ident(name) => name.clone(),
        Expr::Member {
            object, property, ..
        } => format!("{}.{property}", describe(object)),
        _ => "expression".to_string(),
    }
}

fn unary(op: UnaryOp, operand: Value) -> Result<Value, EvalError> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!operand.is_truthy())),
        UnaryOp::TypeOf => Ok(Value::str(operand.typeof_name())),
        UnaryOp::Negate => match operand {
            Value::Int(n) => n.checked_neg().map(Value::Int).ok_or(EvalError::Overflow),
            other => Err(EvalError::Type(format!("cannot negate {}", other.type_name()))),
        },
        UnaryOp::Plus => match &operand {
            Value::Int(_) => Ok(operand),
            Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
            Value::Str(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| EvalError::Type(format!("cannot convert {s:?} to a number"))),
            other => Err(EvalError::Type(format!(
                "cannot convert {} to a number",
                other.type_name()
            ))),
        },
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    let integers = || match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok((*a, *b)),
        _ => Err(EvalError::Type(format!(
            "unsupported operands {} and {}",
            left.type_name(),
            right.type_name()
        ))),
    };
    match op {
        BinaryOp::Add => match (left, right) {
            (Value::Int(a), Value::Int(b)) => {
                a.checked_add(*b).map(Value::Int).ok_or(EvalError::Overflow)
            }
            (Value::Str(_), _)
            | (_, Value::Str(_))
            | (Value::Array(_) | Value::Object(_), _)
            | (_, Value::Array(_) | Value::Object(_)) => Ok(Value::str(format!(
                "{}{}",
                left.to_display_string(),
                right.to_display_string()
            ))),
            _ => Err(EvalError::Type(format!(
                "cannot add {} and {}",
                left.type_name(),
                right.type_name()
            ))),
        },
        BinaryOp::Subtract => {
            let (a, b) = integers()?;
            a.checked_sub(b).map(Value::Int).ok_or(EvalError::Overflow)
        }
        BinaryOp::Multiply => {
            let (a, b) = integers()?;
            a.checked_mul(b).map(Value::Int).ok_or(EvalError::Overflow)
        }
        BinaryOp::Divide => {
            let (a, b) = integers()?;
            if b == 0 {
                return Err(EvalError::DivisionByZero);
            }
            a.checked_div(b).map(Value::Int).ok_or(EvalError::Overflow)
        }
        BinaryOp::Remainder => {
            let (a, b) = integers()?;
            if b == 0 {
                return Err(EvalError::DivisionByZero);
            }
            a.checked_rem(b).map(Value::Int).ok_or(EvalError::Overflow)
        }
        BinaryOp::Less => Ok(Value::Bool(compare(left, right) == Some(Ordering::Less))),
        BinaryOp::LessOrEqual => Ok(Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Less | Ordering::Equal)
        ))),
        BinaryOp::Greater => Ok(Value::Bool(compare(left, right) == Some(Ordering::Greater))),
        BinaryOp::GreaterOrEqual => Ok(Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        ))),
        BinaryOp::StrictEqual => Ok(Value::Bool(left.strict_equals(right))),
        BinaryOp::StrictNotEqual => Ok(Value::Bool(!left.strict_equals(right))),
        BinaryOp::LooseEqual => Ok(Value::Bool(left.loose_equals(right))),
        BinaryOp::LooseNotEqual => Ok(Value::Bool(!left.loose_equals(right))),
        // Short-circuiting operators never reach here.
        BinaryOp::And | BinaryOp::Or | BinaryOp::Coalesce => Ok(Value::Undefined),
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

// =============================================================================
// ELEMENTS
// =============================================================================

fn evaluate_children(children: &[JsxChild], env: &Environment) -> Result<Vec<Value>, EvalError> {
    let mut out = Vec::new();
    for child in children {
        match child {
            JsxChild::Text(text) => out.push(Value::str(text)),
            JsxChild::Expr(e) => flatten_child(evaluate(e, env)?, &mut out),
        }
    }
    Ok(out)
}

/// Arrays are spliced in place; `null`, `undefined` and booleans render nothing.
fn flatten_child(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => {
            for item in items.iter() {
                flatten_child(item.clone(), out);
            }
        }
        Value::Undefined | Value::Null | Value::Bool(_) => {}
        other => out.push(other),
    }
}

fn render_element(element: &JsxElement, env: &Environment) -> Result<Value, EvalError> {
    let mut props = BTreeMap::new();
    for attribute in &element.attributes {
        match attribute {
            JsxAttribute::Named { name, value } => {
                let value = match value {
                    None => Value::Bool(true),
                    Some(JsxAttrValue::Str(s)) => Value::str(s),
                    Some(JsxAttrValue::Expr(e)) => evaluate(e, env)?,
                };
                props.insert(name.clone(), value);
            }
            JsxAttribute::Spread(e) => spread_into(&mut props, evaluate(e, env)?)?,
        }
    }
    let children = evaluate_children(&element.children, env)?;

    let component = match &element.name {
        JsxName::Intrinsic(tag) => return Ok(intrinsic(tag, props, children)),
        JsxName::Component(parts) => resolve_component(parts, env)?,
    };
    match component {
        Value::Function(function) => {
            match children.len() {
                0 => {}
                1 => {
                    let only = children.into_iter().next().unwrap_or_default();
                    props.insert("children".to_string(), only);
                }
                _ => {
                    props.insert("children".to_string(), Value::array(children));
                }
            }
            function.call(&[Value::object(props)])
        }
        Value::Str(tag) => Ok(intrinsic(&tag, props, children)),
        other => Err(EvalError::InvalidComponent {
            name: element.name.display(),
            found: other.type_name(),
        }),
    }
}

fn resolve_component(parts: &[String], env: &Environment) -> Result<Value, EvalError> {
    let Some((head, rest)) = parts.split_first() else {
        return Err(EvalError::Unresolved(String::new()));
    };
    let mut value = env
        .lookup(head)
        .cloned()
        .ok_or_else(|| EvalError::Unresolved(head.clone()))?;
    for part in rest {
        value = member(&value, part)?;
    }
    Ok(value)
}

fn intrinsic(tag: &str, mut props: BTreeMap<String, Value>, children: Vec<Value>) -> Value {
    let children = if children.is_empty() {
        let mut out = Vec::new();
        if let Some(explicit) = props.remove("children") {
            flatten_child(explicit, &mut out);
        }
        out
    } else {
        props.remove("children");
        children
    };
    Value::Element(Arc::new(Element {
        tag: tag.to_string(),
        props,
        children,
    }))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::parser::parse;

    fn eval_source(source: &str, bindings: &[(&str, Value)]) -> Result<Value, EvalError> {
        let expr = match parse(source) {
            Ok(expr) => expr,
            Err(errors) => unreachable!("parse failed: {errors:?}"),
        };
        let env = Environment::default().extend(
            bindings
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect(),
        );
        crate::compiler::on_eval_stack(|| evaluate(&expr, &env))
    }

    #[test]
    fn arithmetic_is_integer_only() {
        let value = eval_source("7 / 2 + 10 % 4", &[]).expect("eval");
        assert_eq!(value.as_int(), Some(5));
        assert_eq!(eval_source("1 / 0", &[]).err(), Some(EvalError::DivisionByZero));
        assert_eq!(
            eval_source("9223372036854775807 + 1", &[]).err(),
            Some(EvalError::Overflow)
        );
    }

    #[test]
    fn logical_operators_short_circuit() {
        let boom = Value::host_fn("boom", |_| Err(EvalError::Type("called".to_string())));
        let value = eval_source("false && boom()", &[("boom", boom.clone())]).expect("eval");
        assert!(matches!(value, Value::Bool(false)));
        let value = eval_source("'x' ?? boom()", &[("boom", boom)]).expect("eval");
        assert_eq!(value.as_str(), Some("x"));
    }

    #[test]
    fn unbound_identifier_is_an_error() {
        assert_eq!(
            eval_source("missing + 1", &[]).err(),
            Some(EvalError::Unresolved("missing".to_string()))
        );
    }

    #[test]
    fn components_receive_props_and_children() {
        let source = "(() => { const Card = ({ title, children }) => <section><h2>{title}</h2>{children}</section>; return <Card title=\"T\"><p>body</p></Card>; })()";
        let value = eval_source(source, &[]).expect("eval");
        let element = value.as_element().expect("element");
        assert_eq!(element.tag, "section");
        assert_eq!(element.children.len(), 2);
    }

    #[test]
    fn jsx_children_flatten_and_drop_empty_values() {
        let value = eval_source(
            "<ul>{[1, 2].map((n) => <li>{n}</li>)}{null}{false}</ul>",
            &[],
        )
        .expect("eval");
        assert_eq!(value.as_element().map(|e| e.children.len()), Some(2));
    }

    #[test]
    fn string_component_binding_renders_intrinsic() {
        let value = eval_source("<Box id=\"b\" />", &[("Box", Value::str("div"))]).expect("eval");
        assert_eq!(value.as_element().map(|e| e.tag.as_str()), Some("div"));
    }

    #[test]
    fn non_component_binding_is_invalid() {
        let err = eval_source("<Box />", &[("Box", Value::Int(1))]).err();
        assert!(matches!(err, Some(EvalError::InvalidComponent { .. })));
    }

    #[test]
    fn destructuring_defaults_and_rest() {
        let value = eval_source(
            "(({ a = 1, ...rest }) => a + rest.b)({ b: 2 })",
            &[],
        )
        .expect("eval");
        assert_eq!(value.as_int(), Some(3));
    }

    #[test]
    fn runaway_recursion_hits_depth_limit() {
        let source = "(() => { const loop = (f) => f(f); return loop(loop); })()";
        assert_eq!(
            eval_source(source, &[]).err(),
            Some(EvalError::CallDepth(MAX_CALL_DEPTH))
        );
    }

    #[test]
    fn declared_arrows_can_call_themselves() {
        let source = "(() => { const fact = (n) => n < 2 ? 1 : n * fact(n - 1); return fact(5); })()";
        assert_eq!(eval_source(source, &[]).expect("eval").as_int(), Some(120));
    }

    #[test]
    fn typeof_never_fails_on_unbound_names() {
        let value = eval_source("typeof missing", &[]).expect("eval");
        assert_eq!(value.as_str(), Some("undefined"));
        let value = eval_source("typeof f === 'function'", &[("f", Value::host_fn("f", |_| Ok(Value::Null)))])
            .expect("eval");
        assert!(matches!(value, Value::Bool(true)));
        let value = eval_source("typeof [1]", &[]).expect("eval");
        assert_eq!(value.as_str(), Some("object"));
    }

    #[test]
    fn long_declaration_chains_drop_cleanly() {
        let mut env = Environment::default();
        for i in 0..200_000 {
            let mut bindings = BTreeMap::new();
            bindings.insert(format!("v{i}"), Value::Int(i));
            env = env.extend(bindings);
        }
        assert_eq!(env.lookup("v0").and_then(Value::as_int), Some(0));
        drop(env);
    }

    #[test]
    fn optional_chaining_stops_at_nullish() {
        let value = eval_source("user?.profile.name", &[("user", Value::Null)]).expect("eval");
        assert!(matches!(value, Value::Undefined));
        assert!(matches!(
            eval_source("user.name", &[("user", Value::Null)]).err(),
            Some(EvalError::PropertyOfNullish(_))
        ));
    }
}
