//! # Definition Parser
//!
//! A character-level chumsky parser for the definition language: a single
//! expression (usually an arrow function) built from a small JavaScript
//! subset with JSX.
//!
//! Every lexeme parser consumes the whitespace and comments that follow it.
//! JSX tag ends and text do not, since whitespace inside element children
//! is significant.
//!
//! TypeScript annotations on parameters, declarations and return types, and
//! `as` casts, are accepted and discarded.
//!
//! Before any of that, `check_nesting` bounds how deeply a source can nest,
//! so the recursive parser and evaluator never see unbounded input.

use super::ast::{
    ArrowBody, ArrowFunction, BinaryOp, Expr, Item, JsxAttrValue, JsxAttribute, JsxChild,
    JsxElement, JsxName, Literal, Param, Pattern, PatternProperty, Property, Stmt, TemplatePart,
    UnaryOp,
};
use chumsky::{pratt::*, prelude::*};
use std::ops::Range;
use std::sync::Arc;

pub type ParseError<'src> = Rich<'src, char>;
type Extra<'src> = extra::Err<ParseError<'src>>;

/// Words that can never name a binding.
const RESERVED: &[&str] = &[
    "const",
    "let",
    "var",
    "return",
    "if",
    "else",
    "function",
    "true",
    "false",
    "null",
    "undefined",
    "new",
    "this",
    "typeof",
];

/// Parse a complete definition source into its root expression.
pub fn parse(source: &str) -> Result<Expr, Vec<ParseError<'_>>> {
    program().parse(source).into_result()
}

fn program<'src>() -> impl Parser<'src, &'src str, Expr, Extra<'src>> {
    ws().ignore_then(expression())
        .then_ignore(sym(";").or_not())
        .then_ignore(end())
}

// =============================================================================
// LEXEMES
// =============================================================================

fn ws<'src>() -> impl Parser<'src, &'src str, (), Extra<'src>> + Clone {
    let line_comment = just("//")
        .then(any().and_is(just('\n').not()).repeated())
        .ignored();
    let block_comment = just("/*")
        .then(any().and_is(just("*/").not()).repeated())
        .then(just("*/"))
        .ignored();
    choice((
        any().filter(|c: &char| c.is_whitespace()).ignored(),
        line_comment,
        block_comment,
    ))
    .repeated()
}

fn sym<'src>(s: &'static str) -> impl Parser<'src, &'src str, (), Extra<'src>> + Clone {
    just(s).ignored().then_ignore(ws())
}

/// `=` that is not the start of `==` or `=>`.
fn assign<'src>() -> impl Parser<'src, &'src str, (), Extra<'src>> + Clone {
    just('=')
        .then_ignore(one_of("=>").not())
        .ignored()
        .then_ignore(ws())
}

fn ident_raw<'src>() -> impl Parser<'src, &'src str, &'src str, Extra<'src>> + Clone {
    any()
        .filter(|c: &char| c.is_ascii_alphabetic() || *c == '_' || *c == '$')
        .then(
            any()
                .filter(|c: &char| c.is_ascii_alphanumeric() || *c == '_' || *c == '$')
                .repeated(),
        )
        .to_slice()
}

fn keyword<'src>(word: &'static str) -> impl Parser<'src, &'src str, (), Extra<'src>> + Clone {
    ident_raw()
        .filter(move |s: &&str| *s == word)
        .ignored()
        .then_ignore(ws())
}

/// An identifier usable as a binding or reference.
fn name<'src>() -> impl Parser<'src, &'src str, String, Extra<'src>> + Clone {
    ident_raw()
        .try_map(|s: &str, span| {
            if RESERVED.contains(&s) {
                Err(ParseError::custom(span, format!("`{s}` is a reserved word")))
            } else {
                Ok(s.to_string())
            }
        })
        .then_ignore(ws())
}

/// Any identifier, reserved or not; used after `.` and as object keys.
fn property_name<'src>() -> impl Parser<'src, &'src str, String, Extra<'src>> + Clone {
    ident_raw().map(str::to_string).then_ignore(ws())
}

fn number<'src>() -> impl Parser<'src, &'src str, i64, Extra<'src>> + Clone {
    text::digits(10)
        .to_slice()
        .then(just('.').then(text::digits(10)).or_not())
        .validate(|(digits, fraction): (&str, Option<_>), e, emitter| {
            if fraction.is_some() {
                emitter.emit(ParseError::custom(
                    e.span(),
                    "fractional numbers are not supported",
                ));
                return 0;
            }
            digits.parse::<i64>().unwrap_or_else(|_| {
                emitter.emit(ParseError::custom(e.span(), "number literal out of range"));
                0
            })
        })
        .then_ignore(ws())
}

fn escape<'src>() -> impl Parser<'src, &'src str, char, Extra<'src>> + Clone {
    let unicode = just('u')
        .ignore_then(
            any()
                .filter(char::is_ascii_hexdigit)
                .repeated()
                .exactly(4)
                .to_slice(),
        )
        .try_map(|hex: &str, span| {
            u32::from_str_radix(hex, 16)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| ParseError::custom(span, "invalid unicode escape"))
        });
    let simple = any().map(|c| match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '0' => '\0',
        other => other,
    });
    just('\\').ignore_then(choice((unicode, simple)))
}

fn string_literal<'src>() -> impl Parser<'src, &'src str, String, Extra<'src>> + Clone {
    let quoted = |q: char| {
        just(q)
            .ignore_then(
                choice((
                    escape(),
                    any().filter(move |c: &char| *c != q && *c != '\\' && *c != '\n'),
                ))
                .repeated()
                .collect::<String>(),
            )
            .then_ignore(just(q))
    };
    choice((quoted('"'), quoted('\''))).then_ignore(ws())
}

/// Collapse JSX text the way JSX does: lines are trimmed, blank lines are
/// dropped, and the remaining lines are joined with a single space.
pub(crate) fn normalize_jsx_text(raw: &str) -> Option<String> {
    if !raw.contains('\n') {
        return Some(raw.to_string());
    }
    let lines: Vec<&str> = raw.split('\n').collect();
    let last = lines.len() - 1;
    let kept: Vec<&str> = lines
        .into_iter()
        .enumerate()
        .map(|(i, line)| {
            let line = if i == 0 { line } else { line.trim_start() };
            if i == last { line } else { line.trim_end() }
        })
        .filter(|line| !line.is_empty())
        .collect();
    if kept.is_empty() {
        None
    } else {
        Some(kept.join(" "))
    }
}

// =============================================================================
// TYPES
// =============================================================================

/// A TypeScript type, parsed only to be skipped.
fn type_expr<'src>() -> impl Parser<'src, &'src str, (), Extra<'src>> + Clone {
    recursive(|ty| {
        let arguments = ty
            .clone()
            .separated_by(sym(","))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(sym("<"), sym(">"));
        let named = property_name()
            .separated_by(sym("."))
            .at_least(1)
            .collect::<Vec<_>>()
            .then(arguments.or_not())
            .ignored();
        let literal = choice((string_literal().ignored(), number().ignored()));
        let member = choice((property_name(), string_literal()))
            .then(sym("?").or_not())
            .then(sym(":"))
            .then(ty.clone());
        let object = member
            .separated_by(one_of(",;").then(ws()))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(sym("{"), sym("}"))
            .ignored();
        let tuple = ty
            .clone()
            .separated_by(sym(","))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(sym("["), sym("]"))
            .ignored();
        let function_param = property_name()
            .then(sym("?").or_not())
            .then(sym(":"))
            .then(ty.clone());
        let function = function_param
            .separated_by(sym(","))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(sym("("), sym(")"))
            .then(sym("=>"))
            .then(ty.clone())
            .ignored();
        let group = ty.clone().delimited_by(sym("("), sym(")"));

        let array_suffix = just('[').then(ws()).then(just(']')).then(ws());
        let operand = choice((keyword("typeof"), keyword("keyof"), keyword("readonly")))
            .repeated()
            .ignore_then(choice((literal, object, tuple, function, group, named)))
            .then_ignore(array_suffix.repeated());
        let separator = one_of("|&").then_ignore(one_of("|&").not()).then(ws());

        separator
            .clone()
            .or_not()
            .ignore_then(
                operand
                    .separated_by(separator)
                    .at_least(1)
                    .collect::<Vec<_>>(),
            )
            .ignored()
    })
}

/// `: Type` after a binding, or `?: Type` for an optional one.
fn annotation<'src>() -> impl Parser<'src, &'src str, (), Extra<'src>> + Clone {
    sym("?")
        .or_not()
        .then(sym(":"))
        .ignore_then(type_expr())
        .or_not()
        .ignored()
}

// =============================================================================
// EXPRESSIONS
// =============================================================================

enum Postfix {
    Member(String, bool),
    Index(Expr, bool),
    Call(Vec<Item>, bool),
    Cast,
}

fn expression<'src>() -> impl Parser<'src, &'src str, Expr, Extra<'src>> + Clone {
    recursive(|expr| {
        let item = choice((
            sym("...").ignore_then(expr.clone()).map(Item::Spread),
            expr.clone().map(Item::Single),
        ));
        let items = |open: &'static str, close: &'static str| {
            item.clone()
                .separated_by(sym(","))
                .allow_trailing()
                .collect::<Vec<_>>()
                .delimited_by(sym(open), sym(close))
        };

        // ---------------------------------------------------------------------
        // Literals
        // ---------------------------------------------------------------------

        let literal = choice((
            keyword("true").to(Literal::Bool(true)),
            keyword("false").to(Literal::Bool(false)),
            keyword("null").to(Literal::Null),
            keyword("undefined").to(Literal::Undefined),
            number().map(Literal::Int),
            string_literal().map(Literal::Str),
        ))
        .map(Expr::Literal);

        let template_text = choice((
            escape(),
            any()
                .and_is(just("${").not())
                .filter(|c: &char| *c != '`' && *c != '\\'),
        ))
        .repeated()
        .at_least(1)
        .collect::<String>()
        .map(TemplatePart::Text);
        let template_expr = just("${")
            .ignore_then(ws())
            .ignore_then(expr.clone())
            .then_ignore(just('}'))
            .map(TemplatePart::Expr);
        let template = just('`')
            .ignore_then(
                choice((template_expr, template_text))
                    .repeated()
                    .collect::<Vec<_>>(),
            )
            .then_ignore(just('`'))
            .then_ignore(ws())
            .map(Expr::Template);

        let array = items("[", "]").map(Expr::Array);

        let property = choice((
            sym("...").ignore_then(expr.clone()).map(Property::Spread),
            choice((property_name(), string_literal()))
                .then_ignore(sym(":"))
                .then(expr.clone())
                .map(|(key, value)| Property::KeyValue(key, value)),
            name().map(Property::Shorthand),
        ));
        let object = property
            .separated_by(sym(","))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(sym("{"), sym("}"))
            .map(Expr::Object);

        // ---------------------------------------------------------------------
        // JSX
        // ---------------------------------------------------------------------

        let element = recursive(|element| {
            let tag_name = ident_raw()
                .map(str::to_string)
                .separated_by(just('.'))
                .at_least(1)
                .collect::<Vec<String>>();

            let attr_name = any()
                .filter(|c: &char| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ':'))
                .repeated()
                .at_least(1)
                .to_slice()
                .map(str::to_string);
            let attr_string = |q: char| {
                just(q)
                    .ignore_then(none_of(q).repeated().to_slice())
                    .then_ignore(just(q))
                    .map(|s: &str| JsxAttrValue::Str(s.to_string()))
            };
            let attr_value = choice((
                attr_string('"'),
                attr_string('\''),
                just('{')
                    .ignore_then(ws())
                    .ignore_then(expr.clone())
                    .then_ignore(just('}'))
                    .map(JsxAttrValue::Expr),
                element.clone().map(JsxAttrValue::Expr),
            ));
            let attribute = choice((
                just('{')
                    .ignore_then(ws())
                    .ignore_then(sym("..."))
                    .ignore_then(expr.clone())
                    .then_ignore(just('}'))
                    .map(JsxAttribute::Spread),
                attr_name
                    .then_ignore(ws())
                    .then(assign().ignore_then(attr_value).or_not())
                    .map(|(name, value)| JsxAttribute::Named { name, value }),
            ))
            .then_ignore(ws());

            let text_child = none_of("{<")
                .repeated()
                .at_least(1)
                .to_slice()
                .map(|raw: &str| normalize_jsx_text(raw).map(JsxChild::Text));
            let expr_child = just('{')
                .ignore_then(ws())
                .ignore_then(expr.clone().or_not())
                .then_ignore(just('}'))
                .map(|e| e.map(JsxChild::Expr));
            let children = choice((
                text_child,
                expr_child,
                element.clone().map(|e| Some(JsxChild::Expr(e))),
            ))
            .repeated()
            .collect::<Vec<_>>()
            .map(|children| children.into_iter().flatten().collect::<Vec<_>>());

            let head = just('<')
                .ignore_then(ws())
                .ignore_then(tag_name.clone())
                .then_ignore(ws())
                .then(attribute.repeated().collect::<Vec<_>>());

            let self_closing = head
                .clone()
                .then_ignore(just("/>"))
                .map(|(parts, attributes)| {
                    Expr::Element(Box::new(JsxElement {
                        name: JsxName::from_parts(parts),
                        attributes,
                        children: Vec::new(),
                    }))
                });

            let closing = just("</")
                .ignore_then(ws())
                .ignore_then(tag_name)
                .then_ignore(ws())
                .then_ignore(just('>'));
            let paired = head
                .then_ignore(just('>'))
                .then(children.clone())
                .then(closing)
                .validate(|(((parts, attributes), children), close), e, emitter| {
                    if parts != close {
                        emitter.emit(ParseError::custom(
                            e.span(),
                            format!(
                                "expected closing tag </{}>, found </{}>",
                                parts.join("."),
                                close.join(".")
                            ),
                        ));
                    }
                    Expr::Element(Box::new(JsxElement {
                        name: JsxName::from_parts(parts),
                        attributes,
                        children,
                    }))
                });

            let fragment = just('<')
                .then(ws())
                .then(just('>'))
                .ignore_then(children)
                .then_ignore(just("</").then(ws()).then(just('>')))
                .map(Expr::Fragment);

            choice((fragment, self_closing, paired))
        });

        // ---------------------------------------------------------------------
        // Functions and statements
        // ---------------------------------------------------------------------

        let pattern = recursive(|pattern| {
            let param = pattern
                .clone()
                .then(assign().ignore_then(expr.clone()).or_not())
                .map(|(pattern, default)| Param { pattern, default });

            let pattern_property = property_name()
                .then(sym(":").ignore_then(pattern.clone()).or_not())
                .then(assign().ignore_then(expr.clone()).or_not())
                .map(|((key, binding), default)| PatternProperty {
                    binding: binding.unwrap_or_else(|| Pattern::Ident(key.clone())),
                    key,
                    default,
                });
            let object_pattern = pattern_property
                .separated_by(sym(","))
                .allow_trailing()
                .collect::<Vec<_>>()
                .then(sym("...").ignore_then(name()).or_not())
                .then_ignore(sym(",").or_not())
                .delimited_by(sym("{"), sym("}"))
                .map(|(properties, rest)| Pattern::Object { properties, rest });

            let array_pattern = param
                .separated_by(sym(","))
                .allow_trailing()
                .collect::<Vec<_>>()
                .delimited_by(sym("["), sym("]"))
                .map(Pattern::Array);

            choice((name().map(Pattern::Ident), object_pattern, array_pattern))
        });

        let param = pattern
            .clone()
            .then_ignore(annotation())
            .then(assign().ignore_then(expr.clone()).or_not())
            .map(|(pattern, default)| Param { pattern, default });

        let statements = recursive(|stmt| {
            let block = stmt
                .clone()
                .repeated()
                .collect::<Vec<Stmt>>()
                .delimited_by(sym("{"), sym("}"));
            let body = choice((block, stmt.clone().map(|s| vec![s])));

            let declare = choice((keyword("const"), keyword("let"), keyword("var")))
                .ignore_then(pattern.clone())
                .then_ignore(annotation())
                .then_ignore(assign())
                .then(expr.clone())
                .map(|(pattern, init)| Stmt::Declare { pattern, init });
            let ret = keyword("return")
                .ignore_then(expr.clone().or_not())
                .map(Stmt::Return);
            let if_stmt = keyword("if")
                .ignore_then(expr.clone().delimited_by(sym("("), sym(")")))
                .then(body.clone())
                .then(keyword("else").ignore_then(body).or_not())
                .map(|((test, consequent), alternate)| Stmt::If {
                    test,
                    consequent,
                    alternate,
                });

            choice((declare, ret, if_stmt, expr.clone().map(Stmt::Expr)))
                .then_ignore(sym(";").or_not())
        });
        let block = statements
            .repeated()
            .collect::<Vec<Stmt>>()
            .delimited_by(sym("{"), sym("}"));

        let params = choice((
            name().map(|n| {
                vec![Param {
                    pattern: Pattern::Ident(n),
                    default: None,
                }]
            }),
            param
                .separated_by(sym(","))
                .allow_trailing()
                .collect::<Vec<_>>()
                .delimited_by(sym("("), sym(")"))
                .then_ignore(sym(":").ignore_then(type_expr()).or_not()),
        ));
        let arrow = params
            .then_ignore(sym("=>"))
            .then(choice((
                block.map(ArrowBody::Block),
                expr.clone().map(ArrowBody::Expr),
            )))
            .map(|(params, body)| Expr::Arrow(Arc::new(ArrowFunction { params, body })))
            .boxed();

        // ---------------------------------------------------------------------
        // Operators
        // ---------------------------------------------------------------------

        let atom = choice((
            literal,
            template,
            array,
            object,
            element.then_ignore(ws()),
            expr.clone().delimited_by(sym("("), sym(")")),
            name().map(Expr::Ident),
        ))
        .boxed();

        let postfix = choice((
            just("?.")
                .ignore_then(ws())
                .ignore_then(choice((
                    items("(", ")").map(|args| Postfix::Call(args, true)),
                    expr.clone()
                        .delimited_by(sym("["), sym("]"))
                        .map(|index| Postfix::Index(index, true)),
                    property_name().map(|p| Postfix::Member(p, true)),
                ))),
            just('.')
                .then_ignore(just('.').not())
                .ignore_then(ws())
                .ignore_then(property_name())
                .map(|p| Postfix::Member(p, false)),
            expr.clone()
                .delimited_by(sym("["), sym("]"))
                .map(|index| Postfix::Index(index, false)),
            items("(", ")").map(|args| Postfix::Call(args, false)),
            keyword("as").ignore_then(type_expr()).map(|()| Postfix::Cast),
        ));
        let chain = atom.foldl(postfix.repeated(), |object, op| match op {
            Postfix::Member(property, optional) => Expr::Member {
                object: Box::new(object),
                property,
                optional,
            },
            Postfix::Index(index, optional) => Expr::Index {
                object: Box::new(object),
                index: Box::new(index),
                optional,
            },
            Postfix::Call(args, optional) => Expr::Call {
                callee: Box::new(object),
                args,
                optional,
            },
            Postfix::Cast => object,
        });

        let operator = |s: &'static str, op: BinaryOp| just(s).to(op);
        let binary = |op: BinaryOp, left: Expr, right: Expr| Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        let operators = chain.pratt((
            prefix(
                7,
                choice((
                    just('!').to(UnaryOp::Not),
                    just('-').to(UnaryOp::Negate),
                    just('+').to(UnaryOp::Plus),
                    keyword("typeof").to(UnaryOp::TypeOf),
                ))
                .then_ignore(ws()),
                |op, operand, _| Expr::Unary {
                    op,
                    operand: Box::new(operand),
                },
            ),
            infix(
                left(6),
                choice((
                    operator("*", BinaryOp::Multiply),
                    operator("/", BinaryOp::Divide),
                    operator("%", BinaryOp::Remainder),
                ))
                .then_ignore(ws()),
                move |l, op, r, _| binary(op, l, r),
            ),
            infix(
                left(5),
                choice((operator("+", BinaryOp::Add), operator("-", BinaryOp::Subtract))).then_ignore(ws()),
                move |l, op, r, _| binary(op, l, r),
            ),
            infix(
                left(4),
                choice((
                    operator("<=", BinaryOp::LessOrEqual),
                    operator(">=", BinaryOp::GreaterOrEqual),
                    operator("<", BinaryOp::Less),
                    operator(">", BinaryOp::Greater),
                ))
                .then_ignore(ws()),
                move |l, op, r, _| binary(op, l, r),
            ),
            infix(
                left(3),
                choice((
                    operator("===", BinaryOp::StrictEqual),
                    operator("!==", BinaryOp::StrictNotEqual),
                    operator("==", BinaryOp::LooseEqual),
                    operator("!=", BinaryOp::LooseNotEqual),
                ))
                .then_ignore(ws()),
                move |l, op, r, _| binary(op, l, r),
            ),
            infix(
                left(2),
                operator("&&", BinaryOp::And).then_ignore(ws()),
                move |l, op, r, _| binary(op, l, r),
            ),
            infix(
                left(1),
                choice((operator("||", BinaryOp::Or), operator("??", BinaryOp::Coalesce))).then_ignore(ws()),
                move |l, op, r, _| binary(op, l, r),
            ),
        ));

        let question = just('?').then_ignore(one_of("?.").not()).then_ignore(ws());
        let conditional = operators
            .then(
                question
                    .ignore_then(expr.clone())
                    .then_ignore(sym(":"))
                    .then(expr.clone())
                    .or_not(),
            )
            .map(|(test, branches)| match branches {
                Some((consequent, alternate)) => Expr::Conditional {
                    test: Box::new(test),
                    consequent: Box::new(consequent),
                    alternate: Box::new(alternate),
                },
                None => test,
            });

        choice((arrow, conditional.boxed()))
    })
}

// =============================================================================
// NESTING
// =============================================================================

/// What the scanner is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Code,
    Tag,
    Children,
    Template,
}

struct Level {
    context: Context,
    base: usize,
    chain: usize,
}

impl Level {
    fn depth(&self) -> usize {
        self.base + self.chain
    }
}

/// Operators that count as a single link in a chain.
const OPERATORS: &[&str] = &[
    "===", "!==", "...", "==", "!=", "<=", ">=", "&&", "||", "??", "?.", "=>",
];

/// Bound how deeply `source` nests, without parsing it.
///
/// Brackets, elements, templates and the links of an operator chain each
/// count as a level; `,` and `;` end a chain. The count never undershoots
/// the depth of the tree the parser would build. On failure, returns the
/// span where the limit was crossed.
pub fn check_nesting(source: &str, limit: usize) -> Result<(), Range<usize>> {
    let mut scan = NestingScan {
        bytes: source.as_bytes(),
        pos: 0,
        levels: vec![Level {
            context: Context::Code,
            base: 0,
            chain: 0,
        }],
        operand_expected: true,
    };
    while scan.pos < scan.bytes.len() {
        let start = scan.pos;
        match scan.context() {
            Context::Code => scan.code(),
            Context::Tag => scan.tag(),
            Context::Children => scan.children(),
            Context::Template => scan.template(),
        }
        if scan.depth() > limit {
            return Err(start..scan.pos.min(scan.bytes.len()));
        }
    }
    Ok(())
}

struct NestingScan<'a> {
    bytes: &'a [u8],
    pos: usize,
    levels: Vec<Level>,
    /// A `<` here opens an element rather than comparing.
    operand_expected: bool,
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || !b.is_ascii()
}

impl NestingScan<'_> {
    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn at(&self, s: &str) -> bool {
        self.bytes
            .get(self.pos..)
            .is_some_and(|rest| rest.starts_with(s.as_bytes()))
    }

    fn context(&self) -> Context {
        self.levels.last().map_or(Context::Code, |level| level.context)
    }

    fn depth(&self) -> usize {
        self.levels.last().map_or(0, Level::depth)
    }

    fn push(&mut self, context: Context) {
        let base = self.depth() + 1;
        self.levels.push(Level {
            context,
            base,
            chain: 0,
        });
    }

    fn pop(&mut self) {
        if self.levels.len() > 1 {
            self.levels.pop();
        }
    }

    fn link(&mut self) {
        if let Some(level) = self.levels.last_mut() {
            level.chain += 1;
        }
    }

    fn enter(&mut self, context: Context) {
        if let Some(level) = self.levels.last_mut() {
            level.context = context;
        }
    }

    /// Advance past the next `end`, or to the end of input.
    fn skip_past(&mut self, end: &str) {
        while self.pos < self.bytes.len() && !self.at(end) {
            self.pos += 1;
        }
        self.pos += end.len();
    }

    fn skip_string(&mut self, quote: u8) {
        self.pos += 1;
        while let Some(b) = self.peek(0) {
            match b {
                b'\\' => self.pos += 2,
                b'\n' => return,
                _ if b == quote => {
                    self.pos += 1;
                    return;
                }
                _ => self.pos += 1,
            }
        }
    }

    /// Open an element at `<`.
    fn open_element(&mut self) {
        self.pos += 1;
        if self.peek(0) == Some(b'>') {
            self.pos += 1;
            self.push(Context::Children);
        } else {
            self.push(Context::Tag);
        }
    }

    fn code(&mut self) {
        let Some(b) = self.peek(0) else { return };
        match b {
            _ if b.is_ascii_whitespace() => self.pos += 1,
            b'/' if self.peek(1) == Some(b'/') => self.skip_past("\n"),
            b'/' if self.peek(1) == Some(b'*') => {
                self.pos += 2;
                self.skip_past("*/");
            }
            b'\'' | b'"' => {
                self.skip_string(b);
                self.operand_expected = false;
            }
            b'`' => {
                self.pos += 1;
                self.link();
                self.push(Context::Template);
            }
            b'(' | b'[' | b'{' => {
                self.pos += 1;
                self.link();
                self.push(Context::Code);
                self.operand_expected = true;
            }
            b')' | b']' | b'}' => {
                self.pos += 1;
                self.pop();
                self.operand_expected = false;
            }
            b',' | b';' => {
                self.pos += 1;
                if let Some(level) = self.levels.last_mut() {
                    level.chain = 0;
                }
                self.operand_expected = true;
            }
            b'<' if self.operand_expected
                && self
                    .peek(1)
                    .is_some_and(|c| c.is_ascii_alphabetic() || c == b'>') =>
            {
                self.link();
                self.open_element();
            }
            _ if is_word_byte(b) => {
                let start = self.pos;
                while self.peek(0).is_some_and(is_word_byte) {
                    self.pos += 1;
                }
                let word = self.bytes.get(start..self.pos).unwrap_or_default();
                if matches!(word, b"else" | b"typeof" | b"as") {
                    self.link();
                }
                self.operand_expected = matches!(word, b"return" | b"typeof" | b"else");
            }
            _ => {
                let len = OPERATORS
                    .iter()
                    .find(|op| self.at(op))
                    .map_or(1, |op| op.len());
                let spread = self.at("...");
                let colon = b == b':';
                self.pos += len;
                if !spread && !colon {
                    self.link();
                }
                self.operand_expected = true;
            }
        }
    }

    fn tag(&mut self) {
        let Some(b) = self.peek(0) else { return };
        match b {
            b'"' | b'\'' => self.skip_string(b),
            b'{' => {
                self.pos += 1;
                self.push(Context::Code);
                self.operand_expected = true;
            }
            b'/' if self.peek(1) == Some(b'>') => {
                self.pos += 2;
                self.pop();
                self.operand_expected = false;
            }
            b'>' => {
                self.pos += 1;
                self.enter(Context::Children);
            }
            b'<' => self.open_element(),
            _ => self.pos += 1,
        }
    }

    fn children(&mut self) {
        let Some(b) = self.peek(0) else { return };
        match b {
            b'{' => {
                self.pos += 1;
                self.push(Context::Code);
                self.operand_expected = true;
            }
            b'<' if self.peek(1) == Some(b'/') => {
                self.skip_past(">");
                self.pop();
                self.operand_expected = false;
            }
            b'<' => self.open_element(),
            _ => self.pos += 1,
        }
    }

    fn template(&mut self) {
        let Some(b) = self.peek(0) else { return };
        match b {
            b'`' => {
                self.pos += 1;
                self.pop();
                self.operand_expected = false;
            }
            b'\\' => self.pos += 2,
            b'$' if self.peek(1) == Some(b'{') => {
                self.pos += 2;
                self.push(Context::Code);
                self.operand_expected = true;
            }
            _ => self.pos += 1,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
