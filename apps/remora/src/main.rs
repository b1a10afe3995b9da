//! # Remora - Remote Component Host
//!
//! The main binary for the Remora component runtime.
//!
//! This application provides:
//! - HTTP host rendering sites from the remote manifest (axum-based)
//! - CLI interface for fetching, checking and rendering components
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    apps/remora (THE BINARY)                  │
//! │                                                              │
//! │  ┌─────────────┐   ┌─────────────┐   ┌──────────────────┐    │
//! │  │    CLI      │   │  HTTP host  │   │ Registry client  │    │
//! │  │   (clap)    │   │   (axum)    │   │    (reqwest)     │    │
//! │  └──────┬──────┘   └──────┬──────┘   └────────┬─────────┘    │
//! │         │                 │                   │              │
//! │         └─────────────────┼───────────────────┘              │
//! │                           ▼                                  │
//! │                   ┌───────────────┐                          │
//! │                   │  remora-core  │                          │
//! │                   │ (THE RUNTIME) │                          │
//! │                   └───────────────┘                          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP host
//! remora serve -R http://localhost:4000 --port 8080
//!
//! # CLI operations
//! remora fetch -R http://localhost:4000
//! remora check --file components.json
//! remora render navbar --props '{"title":"Staff"}'
//! ```

use clap::Parser;
use remora::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // REMORA_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("REMORA_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "remora=info,remora_core=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Remora startup banner.
fn print_banner() {
    println!(
        r#"
  ┬─┐┌─┐┌┬┐┌─┐┬─┐┌─┐
  ├┬┘├┤ ││││ │├┬┘├─┤
  ┴└─└─┘┴ ┴└─┘┴└─┴ ┴

  Remote Component Host v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
