//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Store call
//!     → timeouts.rs (deadline per interaction)
//!     → Ok(result) or DeadlineExceeded
//! ```
//!
//! # Design Decisions
//! - Bounded time for every I/O-like interaction
//! - No automatic retries: conflicts and timeouts go back to the caller

pub mod timeouts;

pub use timeouts::{with_deadline, DeadlineExceeded};
