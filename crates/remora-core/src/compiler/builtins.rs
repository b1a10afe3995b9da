//! Array and string members available to every definition.
//!
//! Methods are returned as host functions bound to their receiver, so
//! `items.map` is an ordinary function value.

use super::EvalError;
use crate::value::{Function, Value};
use std::sync::Arc;

pub(crate) fn array_member(items: &Arc<Vec<Value>>, property: &str) -> Value {
    if property == "length" {
        return Value::Int(items.len() as i64);
    }
    let items = Arc::clone(items);
    let name = format!("Array.{property}");
    let method = match property {
        "map" => Function::host(&name, move |args| {
            let callback = callback(args, "Array.map")?;
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                out.push(callback.call(&[item.clone(), Value::Int(i as i64)])?);
            }
            Ok(Value::array(out))
        }),
        "filter" => Function::host(&name, move |args| {
            let callback = callback(args, "Array.filter")?;
            let mut out = Vec::new();
            for (i, item) in items.iter().enumerate() {
                if callback.call(&[item.clone(), Value::Int(i as i64)])?.is_truthy() {
                    out.push(item.clone());
                }
            }
            Ok(Value::array(out))
        }),
        "find" => Function::host(&name, move |args| {
            let callback = callback(args, "Array.find")?;
            for (i, item) in items.iter().enumerate() {
                if callback.call(&[item.clone(), Value::Int(i as i64)])?.is_truthy() {
                    return Ok(item.clone());
                }
            }
            Ok(Value::Undefined)
        }),
        "some" | "every" => {
            let every = property == "every";
            Function::host(&name, move |args| {
                let callback = callback(args, if every { "Array.every" } else { "Array.some" })?;
                for (i, item) in items.iter().enumerate() {
                    let hit = callback.call(&[item.clone(), Value::Int(i as i64)])?.is_truthy();
                    if hit != every {
                        return Ok(Value::Bool(!every));
                    }
                }
                Ok(Value::Bool(every))
            })
        }
        "includes" => Function::host(&name, move |args| {
            let needle = args.first().cloned().unwrap_or_default();
            Ok(Value::Bool(items.iter().any(|item| item.strict_equals(&needle))))
        }),
        "join" => Function::host(&name, move |args| {
            let separator = args.first().and_then(Value::as_str).unwrap_or(",");
            let joined = items
                .iter()
                .map(|item| {
                    if item.is_nullish() {
                        String::new()
                    } else {
                        item.to_display_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(separator);
            Ok(Value::str(joined))
        }),
        "slice" => Function::host(&name, move |args| {
            let (start, end) = slice_bounds(args, items.len());
            Ok(Value::array(items.get(start..end).unwrap_or_default().to_vec()))
        }),
        "concat" => Function::host(&name, move |args| {
            let mut out = items.to_vec();
            for arg in args {
                match arg {
                    Value::Array(more) => out.extend(more.iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
            Ok(Value::array(out))
        }),
        _ => return Value::Undefined,
    };
    Value::Function(method)
}

pub(crate) fn string_member(s: &Arc<str>, property: &str) -> Value {
    if property == "length" {
        return Value::Int(s.chars().count() as i64);
    }
    let s = Arc::clone(s);
    let name = format!("String.{property}");
    let method = match property {
        "toUpperCase" => Function::host(&name, move |_| Ok(Value::str(s.to_uppercase()))),
        "toLowerCase" => Function::host(&name, move |_| Ok(Value::str(s.to_lowercase()))),
        "trim" => Function::host(&name, move |_| Ok(Value::str(s.trim()))),
        "includes" | "startsWith" | "endsWith" => {
            let which = property.to_string();
            Function::host(&name, move |args| {
                let needle = args.first().map(Value::to_display_string).unwrap_or_default();
                Ok(Value::Bool(match which.as_str() {
                    "startsWith" => s.starts_with(&needle),
                    "endsWith" => s.ends_with(&needle),
                    _ => s.contains(&needle),
                }))
            })
        }
        "split" => Function::host(&name, move |args| {
            let parts = match args.first().and_then(Value::as_str) {
                Some("") => s.chars().map(|c| Value::str(c.to_string())).collect(),
                Some(separator) => s.split(separator).map(Value::str).collect(),
                None => vec![Value::str(&s)],
            };
            Ok(Value::array(parts))
        }),
        "slice" => Function::host(&name, move |args| {
            let chars: Vec<char> = s.chars().collect();
            let (start, end) = slice_bounds(args, chars.len());
            Ok(Value::str(
                chars.get(start..end).unwrap_or_default().iter().collect::<String>(),
            ))
        }),
        _ => return Value::Undefined,
    };
    Value::Function(method)
}

fn callback(args: &[Value], method: &str) -> Result<Function, EvalError> {
    args.first()
        .and_then(Value::as_function)
        .cloned()
        .ok_or_else(|| EvalError::Type(format!("{method} expects a function")))
}

/// Resolve `slice(start, end)` arguments, including negative offsets.
fn slice_bounds(args: &[Value], len: usize) -> (usize, usize) {
    let len = len as i64;
    let resolve = |arg: Option<&Value>, default: i64| {
        let index = arg.and_then(Value::as_int).unwrap_or(default);
        let index = if index < 0 {
            len.saturating_add(index)
        } else {
            index
        };
        index.clamp(0, len) as usize
    };
    let start = resolve(args.first(), 0);
    let end = resolve(args.get(1), len);
    (start, end.max(start))
}
