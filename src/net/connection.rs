//! Per-connection serving.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Drive one HTTP/1 connection through the router
//! - Switch the connection to graceful close when shutdown begins

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::{body::Body, extract::ConnectInfo, Router};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use crate::net::listener::ConnectionPermit;

/// Only uniqueness matters, so relaxed ordering is enough.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Serve HTTP/1 requests on `stream` until the peer hangs up.
///
/// Once `shutdown` fires the connection finishes its in-flight request and
/// then closes instead of waiting for another one.
pub async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    router: Router,
    shutdown: CancellationToken,
    _permit: ConnectionPermit,
) {
    let id = ConnectionId::new();

    let service = hyper::service::service_fn(move |mut request: hyper::Request<Incoming>| {
        request.extensions_mut().insert(ConnectInfo(peer));
        let router = router.clone();
        async move {
            let response = router.oneshot(request.map(Body::new)).await;
            Ok::<_, Infallible>(response.unwrap_or_else(|never| match never {}))
        }
    });

    let connection = http1::Builder::new()
        .timer(TokioTimer::new())
        .serve_connection(TokioIo::new(stream), service);
    tokio::pin!(connection);

    let result = tokio::select! {
        result = connection.as_mut() => result,
        _ = shutdown.cancelled() => {
            tracing::trace!(connection_id = %id, "Draining connection");
            connection.as_mut().graceful_shutdown();
            connection.as_mut().await
        }
    };

    match result {
        Ok(()) => tracing::trace!(connection_id = %id, peer_addr = %peer, "Connection closed"),
        Err(e) => tracing::debug!(connection_id = %id, peer_addr = %peer, error = %e, "Connection error"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_ids_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
        assert!(id2.as_u64() > id1.as_u64());
        assert!(id1.to_string().starts_with("conn-"));
    }
}
