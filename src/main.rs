//! # rncs CLI
//!
//! The `rncs` binary answers "does this RNC exist, and what is its status?"
//! either once from the command line or continuously over HTTP.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rncs lookup <RNC>` | Print one record as JSON |
//! | `rncs serve [--port N]` | Start the HTTP API (default port 9922) |
//! | `rncs refresh` | Re-download the dataset and rebuild the index |
//! | `rncs stats` | Show dataset and index summary |
//!
//! ## Examples
//!
//! ```bash
//! rncs lookup 132138279
//! rncs serve --port 8080 --config /etc/rncs/rncs.toml
//! curl http://localhost:9922/api/checkrnc/132138279
//! curl -X POST http://localhost:9922/api/reload
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use rncs::context::Context;
use rncs::{acquire, config, lookup, server, stats};

/// rncs: RNC lookup over the DGII taxpayer dataset.
///
/// The dataset is downloaded on first use and cached at `[data].path`.
#[derive(Parser)]
#[command(
    name = "rncs",
    about = "rncs: RNC lookup over the DGII taxpayer dataset",
    version,
    long_about = "Looks up Dominican taxpayer IDs (RNC) in the DGII bulk dataset. \
    The dataset is downloaded and unpacked on first use, indexed in memory, and served \
    either through a one-shot command or an HTTP API that supports hot reload."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/rncs.toml`. When the file does not exist the
    /// built-in defaults are used.
    #[arg(long, global = true, default_value = "./config/rncs.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Look up a single RNC.
    ///
    /// Prints the record as JSON. Exits with status 1 and an
    /// `{"error": ...}` body when the RNC does not exist.
    Lookup {
        /// Taxpayer ID, matched exactly.
        rnc: String,
    },

    /// Start the HTTP API.
    ///
    /// Downloads the dataset if needed and builds the index before
    /// accepting requests.
    Serve {
        /// Port to listen on; overrides the port in `[server].bind`.
        #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
        port: Option<u16>,
    },

    /// Download a fresh copy of the dataset and rebuild the index.
    Refresh,

    /// Show dataset size, record count and build time.
    Stats,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("rncs=info,tower_http=info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_or_default(&cli.config)?;
    let ctx = Context::new(cfg)?;

    match cli.command {
        Commands::Lookup { rnc } => {
            lookup::run_lookup(&ctx, &rnc).await?;
        }
        Commands::Serve { port } => {
            server::run_server(ctx, port).await?;
        }
        Commands::Refresh => {
            acquire::run_refresh(&ctx).await?;
        }
        Commands::Stats => {
            stats::run_stats(&ctx).await?;
        }
    }

    Ok(())
}
