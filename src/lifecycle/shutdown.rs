//! Shutdown coordination.
//!
//! # Responsibilities
//! - Carry the shutdown trigger to every long-running task
//! - Stop accepting, drain in-flight connections, enforce the grace period
//! - Report whether the drain finished or was cut short
//!
//! # Design Decisions
//! - A cancellation token, not a channel: a trigger that fires before anyone
//!   waits is still observed
//! - Connections live in a `JoinSet` so the stragglers can be aborted
//! - Completion is reported only after the listening socket is dropped

use std::time::Duration;

use axum::Router;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::net::{serve_connection, Listener, ListenerError};

/// Shared shutdown trigger.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Resolves once shutdown has been triggered.
    pub async fn wait(&self) {
        self.token.cancelled().await
    }
}

/// How a drain ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every in-flight connection finished inside the grace period.
    Graceful,
    /// The grace period elapsed and remaining connections were aborted.
    TimedOut,
}

impl ShutdownOutcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            ShutdownOutcome::Graceful => 0,
            ShutdownOutcome::TimedOut => 1,
        }
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// Accept connections on `listener` until `shutdown` fires, then drain.
///
/// In-flight requests get `grace` to finish. Anything still running after
/// that is aborted and the outcome is [`ShutdownOutcome::TimedOut`].
pub async fn serve_with_grace(
    listener: Listener,
    router: Router,
    shutdown: &Shutdown,
    grace: Duration,
) -> Result<ShutdownOutcome, ServerError> {
    let mut connections = JoinSet::new();
    let token = shutdown.token();

    loop {
        tokio::select! {
            biased;

            _ = token.cancelled() => break,

            Some(_) = connections.join_next(), if !connections.is_empty() => {}

            accepted = listener.accept() => match accepted {
                Ok((stream, peer, permit)) => {
                    connections.spawn(serve_connection(
                        stream,
                        peer,
                        router.clone(),
                        token.clone(),
                        permit,
                    ));
                }
                Err(ListenerError::Accept(e)) => {
                    // Per-connection failures (e.g. reset before accept) are not fatal.
                    tracing::warn!(error = %e, "Accept failed");
                }
                Err(e) => return Err(e.into()),
            },
        }
    }

    let address = listener.local_addr().ok();
    drop(listener);
    tracing::info!(
        address = ?address,
        in_flight = connections.len(),
        grace_secs = grace.as_secs_f64(),
        "Listener closed, draining connections"
    );

    let drained = tokio::time::timeout(grace, async {
        while connections.join_next().await.is_some() {}
    })
    .await;

    match drained {
        Ok(()) => {
            tracing::info!("All connections drained");
            Ok(ShutdownOutcome::Graceful)
        }
        Err(_) => {
            tracing::warn!(
                remaining = connections.len(),
                "Grace period elapsed, aborting connections"
            );
            connections.abort_all();
            while connections.join_next().await.is_some() {}
            Ok(ShutdownOutcome::TimedOut)
        }
    }
}
