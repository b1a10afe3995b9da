//! # Loader Property Tests
//!
//! The behavioural contract of a request site, plus the end-to-end
//! resolution scenarios.
//!
//! ## Properties
//!
//! - Idempotence: an unchanged request never recompiles
//! - Missing-capability safety: an incomplete scope never compiles
//! - Change triggers recompile: one structural change, one compilation
//! - Unknown name: absent, never an error
//! - Atomic replace: loaders see only the newest manifest

#![allow(clippy::unwrap_used, clippy::panic)]

use remora_core::{
    ComponentDefinition, Compiler, LoadFailure, Loader, LoaderState, Manifest, RegistryState,
    RegistryStore, Scope, ScopeGraph, SiteSpec, Value, render_html,
};
use std::collections::BTreeMap;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

fn manifest(defs: &[(&str, &str)]) -> Manifest {
    Manifest::from_definitions(defs.iter().map(|(n, s)| ComponentDefinition::new(*n, *s)))
}

fn loaded(defs: &[(&str, &str)]) -> RegistryState {
    RegistryState::loaded(manifest(defs))
}

/// Request, settle, request: the usual two-pass resolution.
fn resolve(
    loader: &mut Loader,
    registry: &RegistryState,
    name: &str,
    scope: &Scope,
) -> Option<remora_core::CompiledUnit> {
    loader.request(registry, name, scope);
    loader.settle(&Compiler::new());
    loader.request(registry, name, scope)
}

fn icon() -> Value {
    Value::host_fn("Icon", |_| {
        Ok(remora_core::Element::new("svg").prop("data-icon", "star").into())
    })
}

// =============================================================================
// PROPERTIES
// =============================================================================

#[test]
fn p1_identical_scope_is_idempotent() {
    let registry = loaded(&[("Card", "({ title }) => <div>{title}{label}</div>")]);
    let mut loader = Loader::new();
    let scope = || Scope::new().with("label", "L").with("Icon", Value::Null);

    let first = resolve(&mut loader, &registry, "Card", &scope()).unwrap();
    for _ in 0..5 {
        let again = loader.request(&registry, "Card", &scope()).unwrap();
        assert_eq!(again, first);
        assert!(!loader.settle(&Compiler::new()));
    }
    assert_eq!(loader.compile_count(), 1);
}

#[test]
fn p2_missing_capability_never_compiles() {
    let registry = loaded(&[("Card", "() => <Icon />")]);
    let mut loader = Loader::new();
    let scope = Scope::new().with_pending("Icon");

    for _ in 0..3 {
        assert!(loader.request(&registry, "Card", &scope).is_none());
        assert!(!loader.settle(&Compiler::new()));
    }
    assert_eq!(loader.compile_count(), 0);
    assert_eq!(
        loader.state(),
        &LoaderState::ScopeIncomplete {
            missing: vec!["Icon".to_string()]
        }
    );
}

#[test]
fn p3_structural_change_recompiles_once() {
    let registry = loaded(&[("Badge", "() => <span>{count}</span>")]);
    let mut loader = Loader::new();

    let before = resolve(&mut loader, &registry, "Badge", &Scope::new().with("count", 1_i64));
    assert!(before.is_some());

    let changed = Scope::new().with("count", 2_i64);
    assert!(loader.request(&registry, "Badge", &changed).is_none());
    loader.settle(&Compiler::new());
    let after = loader.request(&registry, "Badge", &changed);
    assert!(after.is_some());
    assert_ne!(before, after);
    assert_eq!(loader.compile_count(), 2);

    let html = render_html(&after.unwrap().render(BTreeMap::new()).unwrap());
    assert_eq!(html, "<span>2</span>");
}

#[test]
fn p4_unknown_name_is_absent() {
    let registry = loaded(&[("Btn", "() => null")]);
    let mut loader = Loader::new();
    let scope = Scope::new().with("x", 1_i64).with("y", "full");

    assert!(resolve(&mut loader, &registry, "DoesNotExist", &scope).is_none());
    assert_eq!(loader.state(), &LoaderState::Failed(LoadFailure::NotFound));
    assert_eq!(loader.compile_count(), 0);
}

#[test]
fn p5_replace_is_atomic_for_new_loaders() {
    let store = RegistryStore::new();
    store.replace(manifest(&[("Old", "() => <i>old</i>")]));
    store.begin_fetch();
    store.replace(manifest(&[("New", "() => <b>new</b>")]));

    let snapshot = store.snapshot();
    let mut old = Loader::new();
    let mut new = Loader::new();
    assert!(resolve(&mut old, &snapshot, "Old", &Scope::new()).is_none());
    let unit = resolve(&mut new, &snapshot, "New", &Scope::new()).unwrap();
    assert_eq!(render_html(&unit.render(BTreeMap::new()).unwrap()), "<b>new</b>");
}

#[test]
fn generation_change_recompiles_existing_loaders() {
    let store = RegistryStore::new();
    store.replace(manifest(&[("Logo", "() => <i>v1</i>")]));
    let mut loader = Loader::new();
    let v1 = resolve(&mut loader, &store.snapshot(), "Logo", &Scope::new()).unwrap();

    store.replace(manifest(&[("Logo", "() => <i>v2</i>")]));
    let v2 = resolve(&mut loader, &store.snapshot(), "Logo", &Scope::new()).unwrap();
    assert_ne!(v1, v2);
    assert_eq!(render_html(&v2.render(BTreeMap::new()).unwrap()), "<i>v2</i>");
}

// =============================================================================
// SCENARIOS
// =============================================================================

#[test]
fn scenario_a_resolves_after_one_tick() {
    let registry = loaded(&[("Btn", "(props)=>null")]);
    let mut loader = Loader::new();
    assert!(loader.request(&registry, "Btn", &Scope::new()).is_none());
    loader.settle(&Compiler::new());
    let unit = loader.request(&registry, "Btn", &Scope::new()).unwrap();
    assert!(matches!(unit.render(BTreeMap::new()), Ok(Value::Null)));
}

#[test]
fn scenario_c_capability_arrives_later() {
    let registry = loaded(&[("Card", "() => <div><Icon /></div>")]);
    let mut loader = Loader::new();

    let pending = Scope::new().with_pending("Icon");
    assert!(resolve(&mut loader, &registry, "Card", &pending).is_none());

    let ready = Scope::new().with("Icon", icon());
    let unit = resolve(&mut loader, &registry, "Card", &ready).unwrap();
    let html = render_html(&unit.render(BTreeMap::new()).unwrap());
    assert_eq!(html, "<div><svg data-icon=\"star\"></svg></div>");
}

#[test]
fn scenario_d_shared_leaf_reaches_both_composites() {
    let registry = RegistryStore::new();
    registry.replace(manifest(&[
        ("Header", "() => <header><Leaf /></header>"),
        ("Footer", "() => <footer><Leaf /></footer>"),
    ]));

    let mut graph = ScopeGraph::build([
        SiteSpec::new("leaf", "Leaf"),
        SiteSpec::new("header", "Header").uses("Leaf", "leaf"),
        SiteSpec::new("footer", "Footer").uses("Leaf", "leaf"),
    ])
    .unwrap();
    let compiler = Compiler::new();

    let report = graph.resolve(&registry.snapshot(), &compiler, 16);
    assert_eq!(report.resolved, Vec::<String>::new());

    // The leaf appears in the next manifest.
    registry.replace(manifest(&[
        ("Leaf", "() => <em>leaf</em>"),
        ("Header", "() => <header><Leaf /></header>"),
        ("Footer", "() => <footer><Leaf /></footer>"),
    ]));
    let report = graph.resolve(&registry.snapshot(), &compiler, 16);
    assert!(report.stable);
    assert!(report.unresolved.is_empty());

    for (site, tag) in [("header", "header"), ("footer", "footer")] {
        let html = render_html(&graph.output(site).unwrap().render(BTreeMap::new()).unwrap());
        assert_eq!(html, format!("<{tag}><em>leaf</em></{tag}>"));
    }
}

#[test]
fn failed_compile_does_not_escalate() {
    let registry = loaded(&[("Broken", "() => <div>")]);
    let mut loader = Loader::new();
    assert!(resolve(&mut loader, &registry, "Broken", &Scope::new()).is_none());
    assert!(matches!(
        loader.state(),
        LoaderState::Failed(LoadFailure::Compile(_))
    ));
}

#[test]
fn render_errors_surface_to_the_host() {
    let registry = loaded(&[("Nav", "() => <nav><Missing /></nav>")]);
    let mut loader = Loader::new();
    let unit = resolve(&mut loader, &registry, "Nav", &Scope::new()).unwrap();
    let err = unit.render(BTreeMap::new()).unwrap_err();
    assert_eq!(err.to_string(), "Missing is not defined");
}
