//! OS signal handling.
//!
//! SIGINT and SIGTERM both request an ordered shutdown. On platforms
//! without SIGTERM only Ctrl+C is observed.

use tokio::signal;

/// The signal that ended the wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    Interrupt,
    Terminate,
}

/// Resolve on the first SIGINT or SIGTERM.
pub async fn wait_for_termination() -> TerminationSignal {
    let received = tokio::select! {
        _ = ctrl_c() => TerminationSignal::Interrupt,
        _ = sigterm() => TerminationSignal::Terminate,
    };
    tracing::info!(signal = ?received, "Termination signal received");
    received
}

async fn ctrl_c() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for SIGINT");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn sigterm() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to register SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn sigterm() {
    std::future::pending::<()>().await;
}
