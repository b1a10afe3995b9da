//! # Host Kit
//!
//! The standard capabilities a host can bind into component scopes.
//!
//! ## Contents
//!
//! - **Primitives**: `Button`, `Input`, `Link`, `Image`, `Calendar` and the
//!   table, dropdown, breadcrumb, pagination, select, popover, tabs and
//!   avatar families. Each one renders a single intrinsic element carrying a
//!   `data-slot` marker.
//! - **Icons**: `Bell`, `Moon`, `Sun`, ... rendered as empty `<svg>` elements
//!   tagged with `data-icon`.
//! - **Hooks**: server-side stand-ins for `useState`, `useEffect`,
//!   `useTheme`, `usePathname` and `useRouter`. State never changes and
//!   effects never run.
//! - **Helpers**: `cn` joins truthy class names.
//! - **React**: an object holding `useState`, `useEffect` and `Fragment`.
//!   Every site gets it, bound as `React`.
//!
//! A `Kit` is built once per process. Function identity is part of scope
//! identity, so rebuilding the kit would force every site to recompile.

use remora_core::{Element, Value};
use std::collections::BTreeMap;

/// `(capability, tag, base class)` for every primitive.
const PRIMITIVES: &[(&str, &str, &str)] = &[
    ("Button", "button", "btn"),
    ("Input", "input", "input"),
    ("Link", "a", "link"),
    ("Image", "img", "image"),
    ("Avatar", "span", "avatar"),
    ("AvatarImage", "img", "avatar-image"),
    ("AvatarFallback", "span", "avatar-fallback"),
    ("DropdownMenu", "div", "dropdown"),
    ("DropdownMenuTrigger", "button", "dropdown-trigger"),
    ("DropdownMenuContent", "div", "dropdown-content"),
    ("DropdownMenuLabel", "div", "dropdown-label"),
    ("DropdownMenuItem", "div", "dropdown-item"),
    ("DropdownMenuSeparator", "hr", "dropdown-separator"),
    ("Breadcrumb", "nav", "breadcrumb"),
    ("BreadcrumbList", "ol", "breadcrumb-list"),
    ("BreadcrumbItem", "li", "breadcrumb-item"),
    ("BreadcrumbLink", "a", "breadcrumb-link"),
    ("BreadcrumbPage", "span", "breadcrumb-page"),
    ("BreadcrumbSeparator", "li", "breadcrumb-separator"),
    ("BreadcrumbEllipsis", "span", "breadcrumb-ellipsis"),
    ("Table", "table", "table"),
    ("TableHeader", "thead", "table-header"),
    ("TableBody", "tbody", "table-body"),
    ("TableRow", "tr", "table-row"),
    ("TableHead", "th", "table-head"),
    ("TableCell", "td", "table-cell"),
    ("Pagination", "nav", "pagination"),
    ("PaginationContent", "ul", "pagination-content"),
    ("PaginationItem", "li", "pagination-item"),
    ("PaginationLink", "a", "pagination-link"),
    ("PaginationPrevious", "a", "pagination-previous"),
    ("PaginationNext", "a", "pagination-next"),
    ("PaginationEllipsis", "span", "pagination-ellipsis"),
    ("Select", "div", "select"),
    ("SelectTrigger", "button", "select-trigger"),
    ("SelectValue", "span", "select-value"),
    ("SelectContent", "div", "select-content"),
    ("SelectItem", "div", "select-item"),
    ("Calendar", "div", "calendar"),
    ("Popover", "div", "popover"),
    ("PopoverTrigger", "button", "popover-trigger"),
    ("PopoverContent", "div", "popover-content"),
    ("Tabs", "div", "tabs"),
    ("TabsList", "div", "tabs-list"),
    ("TabsTrigger", "button", "tabs-trigger"),
    ("TabsContent", "div", "tabs-content"),
];

const ICONS: &[&str] = &[
    "Bell",
    "CalendarIcon",
    "ChevronDown",
    "ChevronLeft",
    "ChevronRight",
    "Edit2",
    "HelpCircle",
    "Moon",
    "SearchIcon",
    "Settings",
    "Sun",
    "X",
];

/// Theme reported by `useTheme` when rendering on the host.
pub const DEFAULT_THEME: &str = "light";

/// Name of the React namespace object bound into every site.
pub const REACT: &str = "React";

// =============================================================================
// KIT
// =============================================================================

/// A fixed set of named host capabilities.
#[derive(Debug, Clone)]
pub struct Kit {
    capabilities: BTreeMap<String, Value>,
}

impl Default for Kit {
    fn default() -> Self {
        Self::standard()
    }
}

impl Kit {
    /// The standard kit: primitives, icons, hooks and helpers.
    #[must_use]
    pub fn standard() -> Self {
        let mut capabilities = BTreeMap::new();
        for &(name, tag, class) in PRIMITIVES {
            capabilities.insert(name.to_string(), primitive(name, tag, class));
        }
        for name in ICONS {
            capabilities.insert((*name).to_string(), icon(name));
        }

        let noop = Value::host_fn("noop", |_| Ok(Value::Undefined));
        let setter = noop.clone();
        let use_state = Value::host_fn("useState", move |args| {
            let initial = match args.first() {
                Some(Value::Function(init)) => init.call(&[])?,
                Some(value) => value.clone(),
                None => Value::Undefined,
            };
            Ok(Value::array(vec![initial, setter.clone()]))
        });
        let use_effect = Value::host_fn("useEffect", |_| Ok(Value::Undefined));
        let fragment = Value::host_fn("Fragment", |args| {
            Ok(args
                .first()
                .and_then(|props| props.get("children"))
                .cloned()
                .unwrap_or_default())
        });
        capabilities.insert(
            REACT.to_string(),
            Value::object_from([
                ("useState", use_state.clone()),
                ("useEffect", use_effect.clone()),
                ("Fragment", fragment),
            ]),
        );
        capabilities.insert("useState".to_string(), use_state);
        capabilities.insert("useEffect".to_string(), use_effect);
        let theme = Value::object_from([
            ("theme", Value::str(DEFAULT_THEME)),
            ("resolvedTheme", Value::str(DEFAULT_THEME)),
            ("setTheme", noop.clone()),
        ]);
        capabilities.insert(
            "useTheme".to_string(),
            Value::host_fn("useTheme", move |_| Ok(theme.clone())),
        );
        capabilities.insert(
            "usePathname".to_string(),
            Value::host_fn("usePathname", |_| Ok(Value::str("/"))),
        );
        let router = Value::object_from([
            ("push", noop.clone()),
            ("replace", noop.clone()),
            ("back", noop),
        ]);
        capabilities.insert(
            "useRouter".to_string(),
            Value::host_fn("useRouter", move |_| Ok(router.clone())),
        );
        capabilities.insert("cn".to_string(), Value::host_fn("cn", class_names));

        Self { capabilities }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.capabilities.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.capabilities.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}

// =============================================================================
// BUILDERS
// =============================================================================

fn primitive(name: &str, tag: &'static str, class: &'static str) -> Value {
    let slot = kebab_case(name);
    Value::host_fn(name, move |args| {
        let mut element = Element::new(tag).prop("data-slot", slot.as_str());
        let mut extra_class = None;
        if let Some(Value::Object(props)) = args.first() {
            for (key, value) in props.iter() {
                match key.as_str() {
                    "children" => flatten_into(value, &mut element.children),
                    "className" => extra_class = value.as_str().map(str::to_string),
                    _ => {
                        element.props.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        element
            .props
            .insert("className".to_string(), merge_class(class, extra_class).into());
        Ok(element.into())
    })
}

fn icon(name: &str) -> Value {
    let data_icon = kebab_case(name);
    Value::host_fn(name, move |args| {
        let extra_class = args
            .first()
            .and_then(|props| props.get("className"))
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(Element::new("svg")
            .prop("data-icon", data_icon.as_str())
            .prop("aria-hidden", "true")
            .prop("className", merge_class("icon", extra_class))
            .into())
    })
}

fn merge_class(base: &str, extra: Option<String>) -> String {
    match extra {
        Some(extra) if !extra.trim().is_empty() => format!("{base} {}", extra.trim()),
        _ => base.to_string(),
    }
}

/// Push `value` as children, splicing arrays and dropping empty values.
fn flatten_into(value: &Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => {
            for item in items.iter() {
                flatten_into(item, out);
            }
        }
        Value::Undefined | Value::Null | Value::Bool(_) => {}
        other => out.push(other.clone()),
    }
}

/// `cn("a", cond && "b", null, ["c"])` -> `"a b c"`
fn class_names(args: &[Value]) -> Result<Value, remora_core::EvalError> {
    fn collect(value: &Value, out: &mut Vec<String>) {
        match value {
            Value::Array(items) => items.iter().for_each(|item| collect(item, out)),
            Value::Str(s) if !s.trim().is_empty() => out.push(s.trim().to_string()),
            Value::Int(n) if *n != 0 => out.push(n.to_string()),
            _ => {}
        }
    }
    let mut classes = Vec::new();
    for arg in args {
        collect(arg, &mut classes);
    }
    Ok(Value::str(classes.join(" ")))
}

/// `DropdownMenuItem` -> `dropdown-menu-item`
fn kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('-');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

// =============================================================================
// TESTS
// =============================================================================
