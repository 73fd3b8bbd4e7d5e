//! # Cross-platform OS signal handling.
//!
//! [`wait_for_shutdown_signal`] completes when the process receives a
//! termination signal, logging which one arrived so the drain that follows
//! can be traced back to its trigger.
//!
//! **Unix:** `SIGINT`, `SIGTERM` (systemd/Kubernetes default), `SIGQUIT`.
//! **Elsewhere:** Ctrl-C.

use tracing::info;

/// Waits for a termination signal.
///
/// Each call creates independent signal listeners. The received signal is
/// logged; callers follow up with the shutdown drain.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    let received = tokio::select! {
        _ = tokio::signal::ctrl_c() => "ctrl-c",
        _ = sigint.recv() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
        _ = sigquit.recv() => "SIGQUIT",
    };

    info!(signal = received, "termination signal received, handing off to the drain");
    Ok(())
}

/// Waits for a termination signal.
///
/// Each call creates independent signal listeners. The received signal is
/// logged; callers follow up with the shutdown drain.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    info!(signal = "ctrl-c", "termination signal received, handing off to the drain");
    Ok(())
}
