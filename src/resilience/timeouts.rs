//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap store calls with a deadline
//! - Cancel the wrapped future cleanly when the deadline passes
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors
//! - Timed-out calls surface as server errors and are never retried here

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::observability::metrics;

/// An operation did not finish before its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{operation} exceeded its {deadline:?} deadline")]
pub struct DeadlineExceeded {
    pub operation: &'static str,
    pub deadline: Duration,
}

/// Run `fut` to completion or give up after `deadline`.
///
/// The future is dropped on expiry, so any work it had not yet committed is
/// abandoned.
pub async fn with_deadline<F: Future>(
    operation: &'static str,
    deadline: Duration,
    fut: F,
) -> Result<F::Output, DeadlineExceeded> {
    match tokio::time::timeout(deadline, fut).await {
        Ok(output) => Ok(output),
        Err(_) => {
            tracing::warn!(
                operation,
                deadline_ms = deadline.as_millis() as u64,
                "Operation exceeded deadline"
            );
            metrics::record_deadline_exceeded(operation);
            Err(DeadlineExceeded { operation, deadline })
        }
    }
}
