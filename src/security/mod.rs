//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → cors.rs (trusted-origin policy, preflight)
//!     → rate_limit.rs (per-client token bucket)
//!     → auth.rs (resolve principal, then per-route guards)
//!     → handler
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - No trust in client input; forwarding headers are opt-in

pub mod auth;
pub mod cors;
pub mod rate_limit;

pub use auth::{authorize, AuthChain, AuthError, AuthzError, Principal, PrincipalKind, Requirement};
pub use cors::cors_layer;
pub use rate_limit::ClientLimiterRegistry;
