//! Resource gateway library.
//!
//! A versioned record service with per-client rate limiting, bearer-token
//! authentication and graceful shutdown, built with Tokio and Axum.

pub mod config;
pub mod data;
pub mod http;
pub mod lifecycle;
pub mod mailer;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod security;
pub mod store;

pub use config::schema::AppConfig;
pub use http::HttpServer;
pub use lifecycle::{Shutdown, ShutdownOutcome};
