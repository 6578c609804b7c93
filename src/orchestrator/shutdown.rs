//! Interrupt watching.

/// Resolve on the first SIGINT or SIGTERM (Ctrl-C off unix).
///
/// If the signal handlers cannot be installed the run simply cannot be interrupted: the future never resolves.
pub async fn wait_for_interrupt() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let (mut interrupt, mut terminate) = match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
            (Ok(interrupt), Ok(terminate)) => (interrupt, terminate),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(error = %e, "failed to install signal handlers; run cannot be interrupted");
                return std::future::pending().await;
            }
        };
        tokio::select! {
            _ = interrupt.recv() => tracing::info!(signal = "SIGINT", "interrupt received"),
            _ = terminate.recv() => tracing::info!(signal = "SIGTERM", "interrupt received"),
        }
    }

    #[cfg(not(unix))]
    {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!(signal = "ctrl-c", "interrupt received"),
            Err(e) => {
                tracing::warn!(error = %e, "failed to install ctrl-c handler; run cannot be interrupted");
                std::future::pending::<()>().await;
            }
        }
    }
}
