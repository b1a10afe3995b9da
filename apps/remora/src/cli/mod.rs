//! # Remora CLI Module
//!
//! This module implements the CLI interface for Remora.
//!
//! ## Available Commands
//!
//! - `serve` - Start the HTTP host
//! - `fetch` - Fetch the manifest and summarize it
//! - `check` - Compile every definition and report problems
//! - `render` - Resolve the scope graph and print one site as HTML

mod commands;

use clap::{Parser, Subcommand};
use remora_core::RemoraError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Remora - remote component host
///
/// Fetches a manifest of component definitions and renders them against
/// explicit capability scopes.
#[derive(Parser, Debug)]
#[command(name = "remora")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the config file (default: ./remora.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Registry base URL (overrides config and REMORA_REGISTRY_URL)
    #[arg(short = 'R', long, global = true)]
    pub registry: Option<String>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP host
    Serve {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Fetch the manifest and list its components
    Fetch,

    /// Compile every definition and report syntax errors and unbound names
    Check {
        /// Check a local manifest file instead of fetching
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Render one site to stdout
    Render {
        /// Site id
        site: String,

        /// Props as a JSON object
        #[arg(long)]
        props: Option<String>,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), RemoraError> {
    let mut settings = crate::config::Settings::load(cli.config.as_deref())?;
    if let Some(url) = cli.registry {
        settings.registry.base_url = Some(url);
    }
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Serve { host, port }) => {
            if let Some(host) = host {
                settings.server.host = host;
            }
            if let Some(port) = port {
                settings.server.port = port;
            }
            cmd_serve(&settings).await
        }
        Some(Commands::Fetch) | None => cmd_fetch(&settings, json_mode).await,
        Some(Commands::Check { file }) => {
            cmd_check(&settings, file.as_deref(), json_mode, cli.verbose).await
        }
        Some(Commands::Render { site, props }) => {
            cmd_render(&settings, &site, props.as_deref()).await
        }
    }
}
