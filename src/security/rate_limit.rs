//! Per-client rate limiting.
//!
//! # Responsibilities
//! - Keep one token bucket per client identity
//! - Admit or reject each request against its client's bucket
//! - Evict clients that have been idle past the staleness threshold
//!
//! # Design Decisions
//! - One mutex guards the whole map; it is held for a single entry's
//!   lookup/refill/consume and released before the request is forwarded
//! - The reaper takes the same mutex, so it never sees a half-updated entry
//! - Disabled mode admits everything and never starts the reaper

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::RateLimitConfig;
use crate::http::response::ApiError;
use crate::observability::metrics;

/// A simple token bucket rate limiter.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn full(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_update: now,
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        if now > self.last_update {
            self.last_update = now;
        }

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[derive(Debug)]
struct ClientEntry {
    bucket: TokenBucket,
    last_seen: Instant,
}

/// Process-local registry of client buckets.
#[derive(Debug)]
pub struct ClientLimiterRegistry {
    clients: Mutex<HashMap<String, ClientEntry>>,
    enabled: bool,
    rate: f64,
    burst: f64,
    sweep_interval: Duration,
    stale_after: Duration,
    trust_forwarded: bool,
}

impl ClientLimiterRegistry {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            enabled: config.enabled,
            rate: config.requests_per_second,
            burst: f64::from(config.burst),
            sweep_interval: config.sweep_interval(),
            stale_after: config.stale_after(),
            trust_forwarded: config.trust_forwarded_headers,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn admit(&self, identity: &str) -> bool {
        self.admit_at(identity, Instant::now())
    }

    /// Refill `identity`'s bucket up to `now` and try to take one token.
    ///
    /// `last_seen` is refreshed whether or not the request is admitted.
    pub fn admit_at(&self, identity: &str, now: Instant) -> bool {
        if !self.enabled {
            return true;
        }

        let mut clients = self.clients.lock().expect("rate limiter mutex poisoned");
        let entry = clients
            .entry(identity.to_string())
            .or_insert_with(|| ClientEntry {
                bucket: TokenBucket::full(self.burst, now),
                last_seen: now,
            });

        if now > entry.last_seen {
            entry.last_seen = now;
        }
        entry.bucket.try_acquire(self.burst, self.rate, now)
    }

    /// Drop every client idle longer than the staleness threshold.
    /// Returns the number of evicted entries.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut clients = self.clients.lock().expect("rate limiter mutex poisoned");
        let before = clients.len();
        clients.retain(|_, entry| now.saturating_duration_since(entry.last_seen) <= self.stale_after);
        before - clients.len()
    }

    pub fn len(&self) -> usize {
        self.clients.lock().expect("rate limiter mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.clients
            .lock()
            .expect("rate limiter mutex poisoned")
            .contains_key(identity)
    }

    /// Start the periodic sweep. Returns `None` when limiting is disabled.
    ///
    /// The task exits once `cancel` fires.
    pub fn spawn_reaper(self: &Arc<Self>, cancel: CancellationToken) -> Option<JoinHandle<()>> {
        if !self.enabled {
            return None;
        }

        let registry = Arc::clone(self);
        Some(tokio::spawn(async move {
            let period = registry.sweep_interval;
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!("Client reaper stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        let evicted = registry.sweep_at(Instant::now());
                        if evicted > 0 {
                            tracing::debug!(evicted, remaining = registry.len(), "Evicted idle clients");
                            metrics::record_clients_evicted(evicted);
                        }
                    }
                }
            }
        }))
    }
}

/// Identity used to key a request's bucket.
///
/// Forwarding headers are consulted only when `trust_forwarded` is set;
/// otherwise the peer address is used.
pub fn client_identity(request: &Request<Body>, trust_forwarded: bool) -> String {
    if trust_forwarded {
        let headers = request.headers();
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        let real_ip = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        if let Some(ip) = forwarded.or(real_ip) {
            return ip.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware rejecting over-limit clients with 429.
pub async fn rate_limit_middleware(
    State(registry): State<Arc<ClientLimiterRegistry>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !registry.is_enabled() {
        return next.run(request).await;
    }

    let identity = client_identity(&request, registry.trust_forwarded);
    if registry.admit(&identity) {
        next.run(request).await
    } else {
        tracing::warn!(client = %identity, "Rate limit exceeded");
        metrics::record_rate_limited("client_bucket");
        ApiError::RateLimitExceeded.into_response()
    }
}
