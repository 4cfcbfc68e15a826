//! # Noosphere
//!
//! The main binary for the Noosphere self-describing graph store.
//!
//! ## Usage
//!
//! ```bash
//! # Fresh graph with the standard vocabulary
//! noosphere -D graph.json clear --standard
//!
//! # Insert and read back
//! noosphere -D graph.json add --data '{"name": "A"}'
//! noosphere -D graph.json ls --where '{"has": "name"}'
//!
//! # redb backend, settings from a file
//! noosphere -c noosphere.toml -B redb modules
//! ```

use clap::Parser;
use noosphere::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // Parse CLI arguments
    let cli = cli::Cli::parse();

    // Initialize tracing: NOOSPHERE_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("NOOSPHERE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let default_filter = if cli.verbose {
        "noosphere=debug,noosphere_core=debug"
    } else {
        "noosphere=info,noosphere_core=warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    // Logs go to stderr so stdout stays parseable.
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

    // Execute command
    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
