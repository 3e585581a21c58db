//! # Knotify — Wedding-Event Messaging Backend
//!
//! Resolves audiences for host-scheduled broadcasts and delivers them
//! across channels (SMS live; push/email stubbed).
//!
//! Usage:
//!   knotify serve                  # Start the HTTP gateway
//!   knotify serve --port 8080      # Custom port
//!   knotify process                # One processing pass, then exit

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use knotify_core::KnotifyConfig;
use knotify_engine::Engine;
use knotify_gateway::AppState;
use knotify_store::Store;

#[derive(Parser)]
#[command(name = "knotify", version, about = "💌 Knotify — scheduled guest messaging")]
struct Cli {
    /// Path to config file (default: ~/.knotify/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Database path (overrides config)
    #[arg(long)]
    db_path: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP gateway.
    Serve {
        /// Bind host (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Bind port (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run one pass over due messages and exit.
    Process,
}

fn expand_path(p: &str) -> String {
    shellexpand::tilde(p).to_string()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "knotify=debug,tower_http=debug"
    } else {
        "knotify=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => KnotifyConfig::load_from(Path::new(&expand_path(path)))?,
        None => KnotifyConfig::load()?,
    };

    let db_path = expand_path(cli.db_path.as_deref().unwrap_or(&config.store.db_path));
    if let Some(parent) = Path::new(&db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = Arc::new(Store::open(Path::new(&db_path))?);
    let engine = Arc::new(Engine::new(store, &config));

    match cli.command {
        Command::Serve { host, port } => {
            let host = host.unwrap_or(config.gateway.host.clone());
            let port = port.unwrap_or(config.gateway.port);
            println!("💌 Knotify v{}", env!("CARGO_PKG_VERSION"));
            println!("   🌐 Gateway:  http://{host}:{port}");
            println!("   🗄️  Database: {db_path}");
            println!();

            let state = Arc::new(AppState { engine, start_time: std::time::Instant::now() });
            knotify_gateway::start(state, &host, port).await?;
        }
        Command::Process => {
            let summary = engine.process_due_messages().await?;
            println!(
                "Processed {} message(s): {} sent, {} failed",
                summary.processed, summary.sent, summary.failed
            );
        }
    }

    Ok(())
}
