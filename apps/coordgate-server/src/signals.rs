//! Termination-signal handling.

use anyhow::{Context, Result};
use tokio::signal;

/// Resolve when the process is asked to stop (Ctrl+C, and SIGTERM on unix).
///
/// # Errors
/// Fails only if a signal handler cannot be installed.
pub async fn wait_for_shutdown() -> Result<()> {
    tokio::select! {
        res = signal::ctrl_c() => {
            res.context("failed to listen for Ctrl+C")?;
            tracing::info!("received Ctrl+C");
        }
        () = sigterm() => {
            tracing::info!("received SIGTERM");
        }
    }
    Ok(())
}

#[cfg(unix)]
async fn sigterm() {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut handler) => {
            handler.recv().await;
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn sigterm() {
    std::future::pending::<()>().await;
}
