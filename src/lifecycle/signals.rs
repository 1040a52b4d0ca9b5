//! OS signal handling.
//!
//! # Responsibilities
//! - Listen for SIGINT and SIGTERM
//! - Trigger the shared [`Shutdown`]; draining is handled elsewhere
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Handlers are registered before the listening task is spawned, so a
//!   signal arriving before that task first runs is still caught

use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::Shutdown;

/// Register the termination handlers, then spawn a task that triggers
/// `shutdown` on the first signal. Must be called inside a Tokio runtime.
pub fn spawn_signal_listener(shutdown: Shutdown) -> JoinHandle<()> {
    let signals = TerminationSignals::install();
    tokio::spawn(async move {
        let signal = tokio::select! {
            s = signals.recv() => s,
            _ = shutdown.wait() => return,
        };
        tracing::info!(signal, "Shutdown signal received");
        shutdown.trigger();
    })
}

#[cfg(unix)]
struct TerminationSignals {
    interrupt: Option<tokio::signal::unix::Signal>,
    terminate: Option<tokio::signal::unix::Signal>,
}

#[cfg(unix)]
impl TerminationSignals {
    fn install() -> Self {
        use tokio::signal::unix::SignalKind;

        Self {
            interrupt: register(SignalKind::interrupt(), "SIGINT"),
            terminate: register(SignalKind::terminate(), "SIGTERM"),
        }
    }

    async fn recv(mut self) -> &'static str {
        tokio::select! {
            _ = next_or_pending(&mut self.interrupt) => "SIGINT",
            _ = next_or_pending(&mut self.terminate) => "SIGTERM",
        }
    }
}

#[cfg(unix)]
fn register(
    kind: tokio::signal::unix::SignalKind,
    name: &'static str,
) -> Option<tokio::signal::unix::Signal> {
    match tokio::signal::unix::signal(kind) {
        Ok(signal) => Some(signal),
        Err(e) => {
            tracing::warn!(signal = name, error = %e, "Could not install signal handler");
            None
        }
    }
}

/// Resolves on the next delivery; never resolves without a handler.
#[cfg(unix)]
async fn next_or_pending(signal: &mut Option<tokio::signal::unix::Signal>) {
    if let Some(signal) = signal {
        if signal.recv().await.is_some() {
            return;
        }
    }
    std::future::pending::<()>().await
}

#[cfg(not(unix))]
struct TerminationSignals;

#[cfg(not(unix))]
impl TerminationSignals {
    fn install() -> Self {
        Self
    }

    async fn recv(self) -> &'static str {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Could not listen for SIGINT");
            std::future::pending::<()>().await;
        }
        "SIGINT"
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::process::Command;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_sigterm_before_first_poll_is_caught() {
        let shutdown = Shutdown::new();
        let listener = spawn_signal_listener(shutdown.clone());

        // Current-thread runtime: the listener task has not been polled yet.
        let status = Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        tokio::time::timeout(Duration::from_secs(5), listener)
            .await
            .expect("listener observes the signal")
            .unwrap();
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_listener_exits_when_shutdown_is_triggered_elsewhere() {
        let shutdown = Shutdown::new();
        let listener = spawn_signal_listener(shutdown.clone());
        shutdown.trigger();

        tokio::time::timeout(Duration::from_secs(1), listener)
            .await
            .unwrap()
            .unwrap();
    }
}
