//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::api::{self, AppState};
use crate::config::Settings;
use crate::kit::Kit;
use crate::pages;
use crate::registry_client::{RegistryClient, decode_manifest};
use remora_core::{
    CompileError, Compiler, Manifest, RegistryStore, RemoraError, Value,
    primitives::{DEFAULT_RESOLVE_PASSES, MAX_MANIFEST_BYTES},
    render_html,
};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

// =============================================================================
// HELPERS
// =============================================================================

/// Read a manifest from a local JSON file.
fn read_manifest_file(path: &Path) -> Result<Manifest, RemoraError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| RemoraError::Io(format!("Cannot read '{}': {}", path.display(), e)))?;
    if metadata.len() > MAX_MANIFEST_BYTES as u64 {
        return Err(RemoraError::Serialization(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            MAX_MANIFEST_BYTES
        )));
    }
    let bytes = std::fs::read(path)?;
    Ok(decode_manifest(&bytes)?)
}

/// The manifest from `file`, or from the configured registry.
async fn load_manifest(settings: &Settings, file: Option<&Path>) -> Result<Manifest, RemoraError> {
    match file {
        Some(path) => read_manifest_file(path),
        None => {
            let client = RegistryClient::from_settings(&settings.registry, RegistryStore::new())?;
            Ok(client.fetch().await?)
        }
    }
}

fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}

// =============================================================================
// SERVE COMMAND
// =============================================================================

/// Start the HTTP host.
pub async fn cmd_serve(settings: &Settings) -> Result<(), RemoraError> {
    let state = AppState::from_settings(settings)?;

    println!("Remora Host Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", settings.server.host);
    println!("  Port:     {}", settings.server.port);
    println!(
        "  Registry: {}",
        state.client.manifest_url().unwrap_or("(not configured)")
    );
    println!("  Sites:    {}", state.graph.lock().await.order().join(", "));
    println!();
    println!("Endpoints:");
    println!("  GET  /render/{{site}} - Render a site");
    println!("  GET  /status        - Registry state");
    println!("  GET  /components    - Manifest names");
    println!("  POST /refresh       - Re-fetch the manifest");
    println!("  GET  /health        - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    api::run_server(&addr, state).await
}

// =============================================================================
// FETCH COMMAND
// =============================================================================

/// Fetch the manifest and list its components.
pub async fn cmd_fetch(settings: &Settings, json_mode: bool) -> Result<(), RemoraError> {
    let client = RegistryClient::from_settings(&settings.registry, RegistryStore::new())?;
    let manifest = client.fetch().await?;

    if json_mode {
        let components: Vec<_> = manifest
            .iter()
            .map(|def| serde_json::json!({ "name": def.name, "bytes": def.source.len() }))
            .collect();
        print_json(&serde_json::json!({
            "url": client.manifest_url(),
            "count": manifest.len(),
            "components": components,
        }));
    } else {
        println!("Manifest: {}", client.manifest_url().unwrap_or_default());
        println!("Components: {}", manifest.len());
        for def in manifest.iter() {
            println!("  {:<28} {:>7} bytes", def.name, def.source.len());
        }
    }
    Ok(())
}

// =============================================================================
// CHECK COMMAND
// =============================================================================

/// Result of checking one definition.
struct CheckOutcome {
    name: String,
    unbound: Vec<String>,
    error: Option<CompileError>,
}

/// Compile every definition and report problems.
///
/// Free references are checked against the bindings of the sites that
/// render each component; components no site renders are checked against
/// the whole kit plus every manifest name.
pub async fn cmd_check(
    settings: &Settings,
    file: Option<&Path>,
    json_mode: bool,
    verbose: bool,
) -> Result<(), RemoraError> {
    let manifest = load_manifest(settings, file).await?;
    let kit = Kit::standard();
    let graph = pages::build_graph(&settings.sites, &kit)?;
    let compiler = Compiler::new();

    let everything: BTreeSet<String> = kit
        .names()
        .chain(manifest.names())
        .map(str::to_string)
        .collect();

    let mut outcomes = Vec::with_capacity(manifest.len());
    for def in manifest.iter() {
        let outcome = match compiler.free_references(&def.source) {
            Ok(refs) => {
                let bound =
                    pages::bound_names(&graph, &def.name).unwrap_or_else(|| everything.clone());
                CheckOutcome {
                    name: def.name.clone(),
                    unbound: refs.difference(&bound).cloned().collect(),
                    error: None,
                }
            }
            Err(err) => {
                if !json_mode {
                    eprint!("{}", err.report(&def.name, &def.source));
                }
                CheckOutcome {
                    name: def.name.clone(),
                    unbound: Vec::new(),
                    error: Some(err),
                }
            }
        };
        outcomes.push(outcome);
    }

    if json_mode {
        let results: Vec<_> = outcomes
            .iter()
            .map(|o| {
                serde_json::json!({
                    "name": o.name,
                    "ok": o.error.is_none(),
                    "unbound": o.unbound,
                    "error": o.error.as_ref().map(ToString::to_string),
                })
            })
            .collect();
        print_json(&serde_json::json!({ "components": results }));
    } else {
        for o in &outcomes {
            match (&o.error, o.unbound.is_empty()) {
                (Some(_), _) => println!("  FAIL  {}", o.name),
                (None, false) => println!("  WARN  {} (unbound: {})", o.name, o.unbound.join(", ")),
                (None, true) if verbose => println!("  ok    {}", o.name),
                (None, true) => {}
            }
        }
        let failed = outcomes.iter().filter(|o| o.error.is_some()).count();
        println!();
        println!("{} checked, {} failed", outcomes.len(), failed);
    }

    match outcomes.into_iter().find_map(|o| o.error) {
        Some(err) => Err(RemoraError::Compile(err)),
        None => Ok(()),
    }
}

// =============================================================================
// RENDER COMMAND
// =============================================================================

/// Parse `--props` into a props map.
fn parse_props(props: Option<&str>) -> Result<BTreeMap<String, Value>, RemoraError> {
    let Some(text) = props else {
        return Ok(BTreeMap::new());
    };
    match serde_json::from_str::<serde_json::Value>(text)? {
        serde_json::Value::Object(entries) => Ok(entries
            .into_iter()
            .map(|(k, v)| (k, Value::from_json(v)))
            .collect()),
        _ => Err(RemoraError::Serialization(
            "--props must be a JSON object".to_string(),
        )),
    }
}

/// Fetch once, resolve the scope graph and print one site.
pub async fn cmd_render(
    settings: &Settings,
    site: &str,
    props: Option<&str>,
) -> Result<(), RemoraError> {
    let props = parse_props(props)?;
    let state = AppState::from_settings(settings)?;
    state.client.initialize().await?;

    let registry = state.client.store().snapshot();
    let mut graph = state.graph.lock().await;
    if !graph.contains(site) {
        return Err(RemoraError::Config(format!("unknown site `{site}`")));
    }
    let report = graph.resolve(&registry, &state.compiler, DEFAULT_RESOLVE_PASSES);
    tracing::debug!(?report, "scope graph resolved");

    match graph.output(site) {
        Some(unit) => {
            println!("{}", render_html(&unit.render(props)?));
            Ok(())
        }
        None => Err(pages::unresolved_error(&graph, site)),
    }
}

// =============================================================================
// TESTS
// =============================================================================
