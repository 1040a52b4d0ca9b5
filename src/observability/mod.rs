//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms, /debug/vars snapshot)
//!     → tracing.rs (request spans with correlation IDs)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through every span
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
pub mod tracing;

pub use logging::init_logging;
pub use metrics::{HttpMetrics, MetricsSnapshot};
pub use self::tracing::RequestSpan;
