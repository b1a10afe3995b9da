//! # HTML Rendering
//!
//! Serializes a rendered value tree to HTML text.
//!
//! Strings and numbers become escaped text; arrays render their items in
//! order; `null`, `undefined`, booleans and functions render nothing.
//!
//! Tag and attribute names are written raw, so they must be plain names:
//! an element with any other tag renders only its children, and any other
//! attribute is dropped.

use crate::value::{Element, Value};
use std::collections::BTreeMap;

/// Elements that never have children or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Render `value` as HTML.
#[must_use]
pub fn render_html(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Undefined | Value::Null | Value::Bool(_) | Value::Function(_) => {}
        Value::Int(n) => out.push_str(&n.to_string()),
        Value::Str(s) => escape_into(out, s, false),
        Value::Array(items) => {
            for item in items.iter() {
                write_value(out, item);
            }
        }
        Value::Object(_) => escape_into(out, &value.to_display_string(), false),
        Value::Element(element) => write_element(out, element),
    }
}

/// ASCII letters, digits, `_`, `:`, `.` and `-`.
fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b':' | b'.' | b'-'))
}

fn write_element(out: &mut String, element: &Element) {
    let tag_ok = is_plain_name(&element.tag)
        && element.tag.starts_with(|c: char| c.is_ascii_alphabetic());
    if !tag_ok {
        for child in &element.children {
            write_value(out, child);
        }
        return;
    }
    out.push('<');
    out.push_str(&element.tag);
    for (name, value) in &element.props {
        write_attribute(out, name, value);
    }
    out.push('>');
    if VOID_ELEMENTS.contains(&element.tag.as_str()) {
        return;
    }
    for child in &element.children {
        write_value(out, child);
    }
    out.push_str("</");
    out.push_str(&element.tag);
    out.push('>');
}

fn write_attribute(out: &mut String, name: &str, value: &Value) {
    if matches!(name, "children" | "key" | "ref") || !is_plain_name(name) {
        return;
    }
    let name = match name {
        "className" => "class",
        "htmlFor" => "for",
        other => other,
    };
    let text = match value {
        Value::Undefined | Value::Null | Value::Bool(false) | Value::Function(_) => return,
        Value::Bool(true) => {
            out.push(' ');
            out.push_str(name);
            return;
        }
        Value::Object(entries) if name == "style" => style_text(entries),
        other => other.to_display_string(),
    };
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    escape_into(out, &text, true);
    out.push('"');
}

/// `{ fontSize: 12, marginTop: "1rem" }` -> `font-size:12;margin-top:1rem`
fn style_text(entries: &BTreeMap<String, Value>) -> String {
    entries
        .iter()
        .filter(|(_, v)| !v.is_nullish() && !matches!(v, Value::Bool(_)))
        .map(|(k, v)| format!("{}:{}", kebab_case(k), v.to_display_string()))
        .collect::<Vec<_>>()
        .join(";")
}

fn kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn escape_into(out: &mut String, text: &str, attribute: bool) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            '\'' if attribute => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_nested_elements_with_escaping() {
        let tree = Value::from(
            Element::new("div")
                .prop("className", "card")
                .prop("title", "a \"quote\"")
                .child("1 < 2 & 3")
                .child(Element::new("br")),
        );
        assert_eq!(
            render_html(&tree),
            "<div class=\"card\" title=\"a &quot;quote&quot;\">1 &lt; 2 &amp; 3<br></div>"
        );
    }

    #[test]
    fn boolean_and_function_props() {
        let tree = Value::from(
            Element::new("input")
                .prop("disabled", true)
                .prop("hidden", false)
                .prop("onChange", Value::host_fn("f", |_| Ok(Value::Null))),
        );
        assert_eq!(render_html(&tree), "<input disabled>");
    }

    #[test]
    fn style_objects_become_css() {
        let style = Value::object_from([
            ("fontSize", Value::Int(12)),
            ("marginTop", Value::str("1rem")),
        ]);
        let tree = Value::from(Element::new("p").prop("style", style));
        assert_eq!(
            render_html(&tree),
            "<p style=\"font-size:12;margin-top:1rem\"></p>"
        );
    }

    #[test]
    fn unsafe_names_are_never_written() {
        let tree = Value::from(
            Element::new("div")
                .prop("x><script>alert(1)</script><i", "v")
                .prop("data-id", "7")
                .prop("", "empty"),
        );
        assert_eq!(render_html(&tree), "<div data-id=\"7\"></div>");

        let tree = Value::from(Element::new("img src=x onerror=alert(1)").child("text"));
        assert_eq!(render_html(&tree), "text");
    }

    #[test]
    fn empty_values_render_nothing() {
        let tree = Value::array(vec![Value::Null, Value::Bool(true), Value::Int(0)]);
        assert_eq!(render_html(&tree), "0");
    }
}
