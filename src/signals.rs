#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

/// Resolves once the process is asked to stop.
///
/// Handles:
/// - SIGTERM/SIGINT on unix
/// - Ctrl-C elsewhere
///
/// If a handler cannot be installed the error is logged and that signal is
/// simply never observed; serving continues.
#[cfg(unix)]
pub async fn shutdown_signal() {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => Some(s),
        Err(e) => {
            tracing::error!(error = %e, "Failed to setup SIGTERM handler");
            None
        }
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => Some(s),
        Err(e) => {
            tracing::error!(error = %e, "Failed to setup SIGINT handler");
            None
        }
    };

    tokio::select! {
        Some(_) = recv(&mut sigterm) => {
            tracing::info!("SIGTERM received, initiating graceful shutdown");
        }
        Some(_) = recv(&mut sigint) => {
            tracing::info!("SIGINT received, initiating graceful shutdown");
        }
        else => {
            tracing::warn!("Signal streams closed, initiating graceful shutdown");
        }
    }
}

#[cfg(unix)]
async fn recv(sig: &mut Option<tokio::signal::unix::Signal>) -> Option<()> {
    match sig {
        Some(s) => s.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(not(unix))]
pub async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Ctrl-C received, initiating graceful shutdown"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }
}
