//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     Trigger observed → Stop accepting → Close listener
//!         → Drain connections (grace period) → Graceful | TimedOut
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, close, drain
//! - Shutdown has timeout: forced abort after the grace period

pub mod shutdown;
pub mod signals;

pub use shutdown::{serve_with_grace, ServerError, Shutdown, ShutdownOutcome};
pub use signals::spawn_signal_listener;
