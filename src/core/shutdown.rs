//! # OS termination signals.
//!
//! [`shutdown_requested`] completes when the process is asked to stop:
//! `SIGINT`, `SIGTERM` or `SIGQUIT` on unix, `Ctrl-C` elsewhere. When signal
//! handling is disabled, or listeners cannot be installed, it never completes
//! and the venue runs to its natural end.

use std::future::pending;

/// Completes on the first termination signal when `enabled`; otherwise never.
pub async fn shutdown_requested(enabled: bool) {
    if !enabled {
        return pending().await;
    }
    if let Err(err) = wait_for_signal().await {
        tracing::warn!(error = %err, "signal listeners unavailable; running without them");
        pending::<()>().await;
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        res = tokio::signal::ctrl_c() => res?,
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_disabled_never_completes() {
        let waited = tokio::time::timeout(Duration::from_secs(3600), shutdown_requested(false)).await;
        assert!(waited.is_err());
    }
}
