//! Metal simulator - fake bare metal provisioning API for CTO Platform tests.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use metal_sim::{build_router, Engine, Seed};

/// Metal simulator - in-memory bare metal provisioning API.
#[derive(Parser)]
#[command(name = "metal-sim")]
#[command(about = "Serve a simulated bare metal provisioning API")]
struct Cli {
    /// Address to listen on (or set `METAL_SIM_LISTEN` env var).
    #[arg(long, env = "METAL_SIM_LISTEN", default_value = "127.0.0.1:8080")]
    listen: SocketAddr,

    /// YAML seed file (or set `METAL_SIM_SEED` env var). Uses the built-in
    /// sample data when omitted.
    #[arg(long, env = "METAL_SIM_SEED")]
    seed: Option<PathBuf>,

    /// Enable verbose logging.
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Emit logs as JSON.
    #[arg(long, default_value = "false")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let seed = match &cli.seed {
        Some(path) => Seed::load(path)
            .with_context(|| format!("Failed to load seed file {}", path.display()))?,
        None => Seed::sample(),
    };
    let engine = Engine::new(seed).context("Invalid seed data")?;

    let listener = tokio::net::TcpListener::bind(cli.listen)
        .await
        .with_context(|| format!("Failed to bind {}", cli.listen))?;
    info!(listen = %cli.listen, "Metal simulator listening");

    axum::serve(listener, build_router(engine.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    engine.wait_for_actions().await;
    info!("Metal simulator stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully");
        },
        () = terminate => {
            info!("Received SIGTERM, shutting down gracefully");
        },
    }
}
