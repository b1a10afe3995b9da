//! # Pages
//!
//! Turns `[[site]]` settings into the scope graph the host renders.
//!
//! Without any configured sites the host serves the built-in layout: the
//! dashboard shell (navbar, sidebar and their dropdowns) plus the shared
//! table, pagination, breadcrumb, select, date picker, input and tabs
//! widgets.
//!
//! Every site also gets the kit's `React` object unless it binds that name
//! itself.

use crate::config::SiteSettings;
use crate::kit::{Kit, REACT};
use remora_core::{LoadFailure, LoaderState, RemoraError, ScopeGraph, SiteSpec, Value};
use std::collections::{BTreeMap, BTreeSet};

const DROPDOWN: &[&str] = &[
    "DropdownMenu",
    "DropdownMenuTrigger",
    "DropdownMenuContent",
    "DropdownMenuLabel",
    "DropdownMenuItem",
    "DropdownMenuSeparator",
];

// =============================================================================
// GRAPH CONSTRUCTION
// =============================================================================

/// Build the scope graph for `sites`, or for the built-in layout if empty.
pub fn build_graph(sites: &[SiteSettings], kit: &Kit) -> Result<ScopeGraph, RemoraError> {
    let defaults;
    let sites = if sites.is_empty() {
        defaults = default_sites();
        &defaults
    } else {
        sites
    };
    let specs = sites
        .iter()
        .map(|site| site_spec(site, kit))
        .collect::<Result<Vec<_>, _>>()?;
    let graph = ScopeGraph::build(specs)?;
    tracing::debug!(sites = ?graph.order(), "scope graph built");
    Ok(graph)
}

fn site_spec(site: &SiteSettings, kit: &Kit) -> Result<SiteSpec, RemoraError> {
    let mut spec = SiteSpec::new(&site.id, &site.component);
    for name in &site.host {
        let value = kit.get(name).ok_or_else(|| {
            RemoraError::Config(format!(
                "site `{}` binds unknown kit capability `{}`",
                site.id, name
            ))
        })?;
        spec = spec.host(name, value.clone());
    }
    for (name, value) in &site.constants {
        spec = spec.host(name, Value::from_json(value.clone()));
    }
    for (name, target) in &site.uses {
        spec = spec.uses(name, target);
    }
    let claimed = site.host.iter().any(|n| n == REACT)
        || site.constants.contains_key(REACT)
        || site.uses.contains_key(REACT);
    if !claimed && let Some(react) = kit.get(REACT) {
        spec = spec.host(REACT, react.clone());
    }
    Ok(spec)
}

/// Capability names bound by every site that renders `component`.
///
/// `None` if no site renders it.
pub fn bound_names(graph: &ScopeGraph, component: &str) -> Option<BTreeSet<String>> {
    let mut names: Option<BTreeSet<String>> = None;
    for id in graph.order() {
        let Some(spec) = graph.spec(id) else { continue };
        if spec.component() != component {
            continue;
        }
        let bound: BTreeSet<String> = spec.bindings().keys().cloned().collect();
        names = Some(match names {
            Some(prev) => prev.intersection(&bound).cloned().collect(),
            None => bound,
        });
    }
    names
}

/// Why `site` has no output, as an error for tooling.
pub fn unresolved_error(graph: &ScopeGraph, site: &str) -> RemoraError {
    let component = graph
        .spec(site)
        .map(|s| s.component().to_string())
        .unwrap_or_default();
    match graph.state(site) {
        None => RemoraError::Config(format!("unknown site `{site}`")),
        Some(LoaderState::Failed(LoadFailure::NotFound)) => {
            RemoraError::ComponentNotFound(component)
        }
        Some(LoaderState::Failed(LoadFailure::Compile(err))) => RemoraError::Compile(err.clone()),
        Some(LoaderState::ScopeIncomplete { missing }) => RemoraError::Config(format!(
            "site `{site}` is waiting for: {}",
            missing.join(", ")
        )),
        Some(_) => RemoraError::Registry(format!("site `{site}` did not resolve")),
    }
}

// =============================================================================
// BUILT-IN LAYOUT
// =============================================================================

fn site(id: &str, component: &str, host: &[&[&str]], uses: &[(&str, &str)]) -> SiteSettings {
    SiteSettings {
        id: id.to_string(),
        component: component.to_string(),
        host: host
            .iter()
            .flat_map(|group| group.iter())
            .map(|name| (*name).to_string())
            .collect(),
        uses: uses
            .iter()
            .map(|(name, target)| ((*name).to_string(), (*target).to_string()))
            .collect(),
        constants: BTreeMap::new(),
    }
}

/// The built-in layout, leaves first.
#[must_use]
pub fn default_sites() -> Vec<SiteSettings> {
    vec![
        site(
            "mode-toggle",
            "ModeToggle",
            &[&["useTheme", "Button", "Moon", "Sun"]],
            &[],
        ),
        site("drop-helpdesk", "DropHelpdesk", &[DROPDOWN, &["HelpCircle", "Button"]], &[]),
        site("drop-settings", "DropSettings", &[DROPDOWN, &["Settings", "Button"]], &[]),
        site(
            "drop-notification",
            "DropNotification",
            &[DROPDOWN, &["Bell", "Button"]],
            &[],
        ),
        site(
            "drop-user",
            "DropUser",
            &[
                DROPDOWN,
                &["Avatar", "AvatarImage", "AvatarFallback", "Button", "ChevronDown"],
            ],
            &[],
        ),
        site(
            "navbar",
            "Navbar",
            &[],
            &[
                ("DropUser", "drop-user"),
                ("DropNotification", "drop-notification"),
                ("DropHelpdesk", "drop-helpdesk"),
                ("DropSettings", "drop-settings"),
                ("ModeToggle", "mode-toggle"),
            ],
        ),
        site(
            "sidebar",
            "Sidebar",
            &[&[
                "useTheme",
                "useState",
                "useEffect",
                "ChevronLeft",
                "ChevronRight",
                "Image",
                "usePathname",
                "Link",
            ]],
            &[
                ("ModeToggle", "mode-toggle"),
                ("DropHelpdesk", "drop-helpdesk"),
                ("DropSettings", "drop-settings"),
            ],
        ),
        site(
            "layout",
            "LayoutSidebarNavbar",
            &[],
            &[("Sidebar", "sidebar"), ("Navbar", "navbar")],
        ),
        site(
            "breadcrumb",
            "CustomBreadcrumb",
            &[&[
                "Breadcrumb",
                "BreadcrumbEllipsis",
                "BreadcrumbItem",
                "BreadcrumbLink",
                "BreadcrumbList",
                "BreadcrumbPage",
                "BreadcrumbSeparator",
                "DropdownMenu",
                "DropdownMenuContent",
                "DropdownMenuItem",
                "DropdownMenuTrigger",
                "Link",
            ]],
            &[],
        ),
        site("search-input", "SearchInput", &[&["Input", "SearchIcon"]], &[]),
        site("custom-button", "CustomButton", &[&["Button"]], &[]),
        site(
            "app-table",
            "AppTable",
            &[&[
                "Table",
                "TableBody",
                "TableCell",
                "TableHead",
                "TableHeader",
                "TableRow",
                "useRouter",
                "Edit2",
                "X",
            ]],
            &[],
        ),
        site(
            "pagination",
            "PaginationControls",
            &[&[
                "Pagination",
                "PaginationContent",
                "PaginationEllipsis",
                "PaginationItem",
                "PaginationLink",
                "PaginationNext",
                "PaginationPrevious",
            ]],
            &[],
        ),
        site(
            "custom-select",
            "CustomSelect",
            &[&[
                "Select",
                "SelectContent",
                "SelectItem",
                "SelectTrigger",
                "SelectValue",
                "useState",
            ]],
            &[],
        ),
        site(
            "date-picker",
            "DatePicker",
            &[&[
                "CalendarIcon",
                "Input",
                "Calendar",
                "Button",
                "Popover",
                "PopoverContent",
                "PopoverTrigger",
            ]],
            &[],
        ),
        site(
            "custom-input",
            "CustomInput",
            &[&["Input"]],
            &[("CustomSelect", "custom-select"), ("DatePicker", "date-picker")],
        ),
        site(
            "custom-tabs",
            "CustomTabs",
            &[&["Tabs", "TabsContent", "TabsList", "TabsTrigger"]],
            &[],
        ),
    ]
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use remora_core::primitives::DEFAULT_RESOLVE_PASSES;
    use remora_core::{ComponentDefinition, Compiler, Manifest, RegistryState};

    #[test]
    fn default_layout_is_a_valid_dag() {
        let graph = build_graph(&[], &Kit::standard()).expect("build");
        let order = graph.order();
        let position = |id: &str| order.iter().position(|s| *s == id).expect("site");
        assert!(position("mode-toggle") < position("navbar"));
        assert!(position("navbar") < position("layout"));
        assert!(position("sidebar") < position("layout"));
        assert!(position("custom-select") < position("custom-input"));
        assert!(position("date-picker") < position("custom-input"));
        assert_eq!(order.len(), 17);
    }

    #[test]
    fn default_layout_binds_every_kit_capability() {
        let kit = Kit::standard();
        let graph = build_graph(&[], &kit).expect("build");
        let bound: BTreeSet<String> = graph
            .order()
            .iter()
            .filter_map(|id| graph.spec(id))
            .flat_map(|spec| spec.bindings().keys().cloned().collect::<Vec<_>>())
            .collect();
        let unused: Vec<&str> = kit.names().filter(|n| !bound.contains(*n)).collect();
        assert_eq!(unused, vec!["cn"]);
    }

    #[test]
    fn every_site_gets_react_unless_it_claims_the_name() {
        let mut own = site("own", "Own", &[], &[]);
        own.constants
            .insert(REACT.to_string(), serde_json::json!("mine"));
        let sites = vec![site("plain", "Plain", &[], &[]), own];
        let mut graph = build_graph(&sites, &Kit::standard()).expect("build");
        let registry = RegistryState::loaded(Manifest::from_definitions([
            ComponentDefinition::new("Plain", "() => <p>{typeof React.useState}</p>"),
            ComponentDefinition::new("Own", "() => <p>{React}</p>"),
        ]));
        graph.resolve(&registry, &Compiler::new(), DEFAULT_RESOLVE_PASSES);
        let render = |id: &str| {
            let unit = graph.output(id).expect("resolved");
            remora_core::render_html(&unit.render(BTreeMap::new()).expect("render"))
        };
        assert_eq!(render("plain"), "<p>function</p>");
        assert_eq!(render("own"), "<p>mine</p>");
    }

    #[test]
    fn unknown_kit_capability_is_a_config_error() {
        let sites = vec![site("a", "A", &[&["Nope"]], &[])];
        let err = build_graph(&sites, &Kit::standard()).expect_err("unknown capability");
        assert!(err.to_string().contains("unknown kit capability `Nope`"));
    }

    #[test]
    fn constants_are_bound() {
        let mut settings = site("title", "Title", &[], &[]);
        settings
            .constants
            .insert("label".to_string(), serde_json::json!("Staff"));
        let mut graph = build_graph(&[settings], &Kit::standard()).expect("build");
        let registry = RegistryState::loaded(Manifest::from_definitions([
            ComponentDefinition::new("Title", "() => <h1>{label}</h1>"),
        ]));
        graph.resolve(&registry, &Compiler::new(), DEFAULT_RESOLVE_PASSES);
        let unit = graph.output("title").expect("resolved");
        let html = remora_core::render_html(&unit.render(BTreeMap::new()).expect("render"));
        assert_eq!(html, "<h1>Staff</h1>");
    }

    #[test]
    fn bound_names_of_composites() {
        let graph = build_graph(&[], &Kit::standard()).expect("build");
        let names = bound_names(&graph, "LayoutSidebarNavbar").expect("site");
        assert_eq!(
            names.into_iter().collect::<Vec<_>>(),
            vec!["Navbar", "React", "Sidebar"]
        );
        assert!(bound_names(&graph, "Unknown").is_none());
    }

    #[test]
    fn unresolved_sites_explain_themselves() {
        let mut graph = build_graph(&[], &Kit::standard()).expect("build");
        let registry = RegistryState::loaded(Manifest::from_definitions([
            ComponentDefinition::new("Navbar", "() => <nav />"),
        ]));
        graph.resolve(&registry, &Compiler::new(), DEFAULT_RESOLVE_PASSES);
        assert!(matches!(
            unresolved_error(&graph, "custom-button"),
            RemoraError::ComponentNotFound(name) if name == "CustomButton"
        ));
        assert!(
            unresolved_error(&graph, "custom-input")
                .to_string()
                .contains("CustomSelect")
        );
        assert!(
            unresolved_error(&graph, "navbar")
                .to_string()
                .contains("waiting for: DropHelpdesk")
        );
        assert!(matches!(
            unresolved_error(&graph, "nowhere"),
            RemoraError::Config(_)
        ));
    }
}
