//! # Definition Syntax Tree
//!
//! The parsed form of a component definition, plus the free-reference
//! analysis used to check scope wiring before anything is evaluated.

use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Literal),
    Ident(String),
    Template(Vec<TemplatePart>),
    Array(Vec<Item>),
    Object(Vec<Property>),
    Member {
        object: Box<Expr>,
        property: String,
        optional: bool,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        optional: bool,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Item>,
        optional: bool,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Arrow(Arc<ArrowFunction>),
    Element(Box<JsxElement>),
    Fragment(Vec<JsxChild>),
}

#[derive(Debug, Clone)]
pub enum Literal {
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
}

#[derive(Debug, Clone)]
pub enum TemplatePart {
    Text(String),
    Expr(Expr),
}

/// An array element or call argument.
#[derive(Debug, Clone)]
pub enum Item {
    Single(Expr),
    Spread(Expr),
}

#[derive(Debug, Clone)]
pub enum Property {
    KeyValue(String, Expr),
    Shorthand(String),
    Spread(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
    Plus,
    TypeOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    StrictEqual,
    StrictNotEqual,
    LooseEqual,
    LooseNotEqual,
    And,
    Or,
    Coalesce,
}

// =============================================================================
// FUNCTIONS & PATTERNS
// =============================================================================

#[derive(Debug, Clone)]
pub struct ArrowFunction {
    pub params: Vec<Param>,
    pub body: ArrowBody,
}

#[derive(Debug, Clone)]
pub enum ArrowBody {
    Expr(Expr),
    Block(Vec<Stmt>),
}

#[derive(Debug, Clone)]
pub struct Param {
    pub pattern: Pattern,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone)]
pub enum Pattern {
    Ident(String),
    Object {
        properties: Vec<PatternProperty>,
        rest: Option<String>,
    },
    Array(Vec<Param>),
}

#[derive(Debug, Clone)]
pub struct PatternProperty {
    pub key: String,
    pub binding: Pattern,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Declare { pattern: Pattern, init: Expr },
    Return(Option<Expr>),
    If {
        test: Expr,
        consequent: Vec<Stmt>,
        alternate: Option<Vec<Stmt>>,
    },
    Expr(Expr),
}

// =============================================================================
// JSX
// =============================================================================

#[derive(Debug, Clone)]
pub struct JsxElement {
    pub name: JsxName,
    pub attributes: Vec<JsxAttribute>,
    pub children: Vec<JsxChild>,
}

/// `div` is intrinsic; `Button` and `Menu.Item` are resolved from scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsxName {
    Intrinsic(String),
    Component(Vec<String>),
}

impl JsxName {
    pub fn from_parts(parts: Vec<String>) -> Self {
        let is_intrinsic = parts.len() == 1
            && parts[0]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_lowercase());
        if is_intrinsic {
            Self::Intrinsic(parts.concat())
        } else {
            Self::Component(parts)
        }
    }

    pub fn display(&self) -> String {
        match self {
            Self::Intrinsic(tag) => tag.clone(),
            Self::Component(parts) => parts.join("."),
        }
    }
}

#[derive(Debug, Clone)]
pub enum JsxAttribute {
    Named {
        name: String,
        value: Option<JsxAttrValue>,
    },
    Spread(Expr),
}

#[derive(Debug, Clone)]
pub enum JsxAttrValue {
    Str(String),
    Expr(Expr),
}

#[derive(Debug, Clone)]
pub enum JsxChild {
    Text(String),
    Expr(Expr),
}

// =============================================================================
// FREE REFERENCES
// =============================================================================

/// Collect every identifier the expression reads without binding it.
pub fn free_references(expr: &Expr) -> BTreeSet<String> {
    let mut walker = FreeReferences::default();
    walker.expr(expr);
    walker.free
}

#[derive(Default)]
struct FreeReferences {
    bound: Vec<BTreeSet<String>>,
    free: BTreeSet<String>,
}

impl FreeReferences {
    fn reference(&mut self, name: &str) {
        if !self.bound.iter().any(|frame| frame.contains(name)) {
            self.free.insert(name.to_string());
        }
    }

    fn bind(&mut self, pattern: &Pattern) {
        let mut names = BTreeSet::new();
        pattern_names(pattern, &mut names);
        if let Some(frame) = self.bound.last_mut() {
            frame.extend(names);
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(_) => {}
            Expr::Ident(name) => self.reference(name),
            Expr::Template(parts) => {
                for part in parts {
                    if let TemplatePart::Expr(e) = part {
                        self.expr(e);
                    }
                }
            }
            Expr::Array(items) => self.items(items),
            Expr::Object(properties) => {
                for property in properties {
                    match property {
                        Property::KeyValue(_, value) | Property::Spread(value) => self.expr(value),
                        Property::Shorthand(name) => self.reference(name),
                    }
                }
            }
            Expr::Member { object, .. } => self.expr(object),
            Expr::Index { object, index, .. } => {
                self.expr(object);
                self.expr(index);
            }
            Expr::Call { callee, args, .. } => {
                self.expr(callee);
                self.items(args);
            }
            // `typeof name` tests for an optional binding without needing it.
            Expr::Unary {
                op: UnaryOp::TypeOf,
                operand,
            } if matches!(**operand, Expr::Ident(_)) => {}
            Expr::Unary { operand, .. } => self.expr(operand),
            Expr::Binary { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                self.expr(test);
                self.expr(consequent);
                self.expr(alternate);
            }
            Expr::Arrow(function) => self.arrow(function),
            Expr::Element(element) => self.element(element),
            Expr::Fragment(children) => self.children(children),
        }
    }

    fn items(&mut self, items: &[Item]) {
        for item in items {
            match item {
                Item::Single(e) | Item::Spread(e) => self.expr(e),
            }
        }
    }

    fn arrow(&mut self, function: &ArrowFunction) {
        self.bound.push(BTreeSet::new());
        for param in &function.params {
            // Defaults see the parameters declared before them.
            self.param_defaults(param);
            self.bind(&param.pattern);
        }
        match &function.body {
            ArrowBody::Expr(e) => self.expr(e),
            ArrowBody::Block(stmts) => self.stmts(stmts),
        }
        self.bound.pop();
    }

    fn param_defaults(&mut self, param: &Param) {
        if let Some(default) = &param.default {
            self.expr(default);
        }
        self.pattern_defaults(&param.pattern);
    }

    fn pattern_defaults(&mut self, pattern: &Pattern) {
        match pattern {
            Pattern::Ident(_) => {}
            Pattern::Object { properties, .. } => {
                for property in properties {
                    if let Some(default) = &property.default {
                        self.expr(default);
                    }
                    self.pattern_defaults(&property.binding);
                }
            }
            Pattern::Array(params) => {
                for param in params {
                    self.param_defaults(param);
                }
            }
        }
    }

    fn stmts(&mut self, stmts: &[Stmt]) {
        self.bound.push(BTreeSet::new());
        for stmt in stmts {
            match stmt {
                // A declared arrow is in scope inside its own body.
                Stmt::Declare {
                    pattern: pattern @ Pattern::Ident(_),
                    init: init @ Expr::Arrow(_),
                } => {
                    self.bind(pattern);
                    self.expr(init);
                }
                Stmt::Declare { pattern, init } => {
                    self.expr(init);
                    self.pattern_defaults(pattern);
                    self.bind(pattern);
                }
                Stmt::Return(value) => {
                    if let Some(e) = value {
                        self.expr(e);
                    }
                }
                Stmt::If {
                    test,
                    consequent,
                    alternate,
                } => {
                    self.expr(test);
                    self.stmts(consequent);
                    if let Some(alternate) = alternate {
                        self.stmts(alternate);
                    }
                }
                Stmt::Expr(e) => self.expr(e),
            }
        }
        self.bound.pop();
    }

    fn element(&mut self, element: &JsxElement) {
        if let JsxName::Component(parts) = &element.name
            && let Some(head) = parts.first()
        {
            self.reference(head);
        }
        for attribute in &element.attributes {
            match attribute {
                JsxAttribute::Named { value, .. } => match value {
                    Some(JsxAttrValue::Expr(e)) => self.expr(e),
                    Some(JsxAttrValue::Str(_)) | None => {}
                },
                JsxAttribute::Spread(e) => self.expr(e),
            }
        }
        self.children(&element.children);
    }

    fn children(&mut self, children: &[JsxChild]) {
        for child in children {
            if let JsxChild::Expr(e) = child {
                self.expr(e);
            }
        }
    }
}

fn pattern_names(pattern: &Pattern, names: &mut BTreeSet<String>) {
    match pattern {
        Pattern::Ident(name) => {
            names.insert(name.clone());
        }
        Pattern::Object { properties, rest } => {
            for property in properties {
                pattern_names(&property.binding, names);
            }
            if let Some(rest) = rest {
                names.insert(rest.clone());
            }
        }
        Pattern::Array(params) => {
            for param in params {
                pattern_names(&param.pattern, names);
            }
        }
    }
}
