//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept, connection limits)
//!     → connection.rs (HTTP/1 serving, graceful close)
//!     → Router
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection runs as its own task so shutdown can abort it

pub mod connection;
pub mod listener;

pub use connection::{serve_connection, ConnectionId};
pub use listener::{ConnectionPermit, Listener, ListenerError};
