mod config;
mod logging;
mod signals;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::routing::get;
use clap::{Parser, Subcommand};
use coordgate_discovery::{MemoryCluster, MemoryClusterFactory};
use coordgate_gateway::{api, GatewayService, SessionDirectory};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::AppConfig;

/// Coordgate - RPC gateway for a distributed coordination client
#[derive(Parser)]
#[command(name = "coordgate-server")]
#[command(about = "Coordgate - RPC gateway for a distributed coordination client")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port override for the HTTP server (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Print effective configuration (JSON) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug for coordgate crates, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Run,
    /// Validate configuration and exit
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(ref path) = cli.config {
        if !Path::new(path).is_file() {
            anyhow::bail!("config file does not exist: {}", path.to_string_lossy());
        }
    }

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    logging::init(&config.logging, cli.verbose);

    if cli.print_config {
        println!("Effective configuration:\n{}", config.to_json()?);
        return Ok(());
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_server(&config).await,
        Commands::Check => check_config(&config),
    }
}

fn check_config(config: &AppConfig) -> Result<()> {
    println!("Configuration is valid");
    println!("{}", config.to_json()?);
    Ok(())
}

async fn run_server(config: &AppConfig) -> Result<()> {
    info!("Coordgate server starting");

    let cluster = MemoryCluster::new();
    let factory = Arc::new(MemoryClusterFactory::new(cluster));
    let sessions = Arc::new(SessionDirectory::new(factory));
    let service = Arc::new(GatewayService::new(Arc::clone(&sessions)));

    let cancel = CancellationToken::new();
    let reaper = Arc::clone(&sessions).spawn_reaper(
        Duration::from_secs(config.gateway.reap_interval_secs),
        Duration::from_secs(config.gateway.session_idle_timeout_secs),
        cancel.clone(),
    );

    let app = api::rest::router(service)
        .route("/healthz", get(|| async { "ok" }))
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");

    // Flip the token on the first termination signal.
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = signals::wait_for_shutdown().await {
            warn!(error = %e, "signal handling failed; shutting down");
        }
        signal_cancel.cancel();
    });

    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("server error")?;

    // Stop phase: reaper first, then every remaining session.
    cancel.cancel();
    if let Err(e) = reaper.await {
        warn!(error = %e, "reaper task did not stop cleanly");
    }
    sessions.shutdown().await;
    info!("Coordgate server stopped");
    Ok(())
}
