//! todogridd — the todogrid daemon.
//!
//! Single binary that opens the redb document store and serves the REST
//! API, plus offline maintenance commands against the same store.
//!
//! # Usage
//!
//! ```text
//! todogridd serve --port 3000 --data-dir /var/lib/todogrid
//! todogridd serve --config todogrid.toml
//! todogridd reindex --data-dir /var/lib/todogrid
//! todogridd dedupe-columns --data-dir /var/lib/todogrid
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use todogrid_core::{LogFormat, ServerConfig};
use todogrid_state::{Reindexer, StateStore};

#[derive(Parser)]
#[command(name = "todogridd", about = "todogrid daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct StoreArgs {
    /// Path to a todogrid.toml configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Data directory for persistent state (overrides the config file).
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

impl StoreArgs {
    fn load(&self) -> anyhow::Result<ServerConfig> {
        let mut config = ServerConfig::load(self.config.as_deref())?;
        if let Some(data_dir) = &self.data_dir {
            config.storage.data_dir = data_dir.clone();
        }
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API.
    Serve {
        #[command(flatten)]
        store: StoreArgs,

        /// Port to listen on (overrides the config file).
        #[arg(long)]
        port: Option<u16>,

        /// Keep all state in memory; nothing is written to disk.
        #[arg(long)]
        in_memory: bool,
    },
    /// Re-stamp every row's serial number from creation order.
    Reindex {
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Remove repeated field keys from the active table config.
    DedupeColumns {
        #[command(flatten)]
        store: StoreArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            store,
            port,
            in_memory,
        } => {
            let mut config = store.load()?;
            if let Some(port) = port {
                config.server.port = port;
            }
            init_tracing(&config);
            run_serve(config, in_memory).await
        }
        Command::Reindex { store } => {
            let config = store.load()?;
            init_tracing(&config);
            let state = open_store(&config)?;
            let reindexer = Reindexer::new(state);
            let report = reindexer.run();
            println!("{}", serde_json::to_string_pretty(&report)?);
            for failure in reindexer.dead_letters().snapshot() {
                println!("{}", serde_json::to_string(&failure)?);
            }
            Ok(())
        }
        Command::DedupeColumns { store } => {
            let config = store.load()?;
            init_tracing(&config);
            let state = open_store(&config)?;
            let report = state.dedupe_columns()?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

/// `RUST_LOG` wins over the configured filter.
fn init_tracing(config: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.log.format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn open_store(config: &ServerConfig) -> anyhow::Result<StateStore> {
    std::fs::create_dir_all(&config.storage.data_dir)?;
    let db_path = config.db_path();
    let state = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");
    Ok(state)
}

async fn run_serve(config: ServerConfig, in_memory: bool) -> anyhow::Result<()> {
    info!("todogrid daemon starting");

    let state = if in_memory {
        info!("using in-memory state store");
        StateStore::open_in_memory()?
    } else {
        open_store(&config)?
    };

    let router = todogrid_api::build_router(state);
    let addr = config.listen_addr()?;

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        info!("shutdown signal received");
    });

    server.await?;

    info!("todogrid daemon stopped");
    Ok(())
}
