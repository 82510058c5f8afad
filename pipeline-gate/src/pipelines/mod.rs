//! Pipeline resource operations.
//!
//! [`PipelineClient`] wraps each remote verb in a [`Retrier`] and then
//! interprets the final outcome: a 200 is success, Get maps 404 and empty
//! payloads to [`PipelineError::NotFound`], and everything else becomes a
//! transient or terminal error carrying the action and status.

mod client;

pub use client::PipelineClient;

use crate::errors::{Action, PipelineError};
use crate::transport::Outcome;

/// Converts a final, non-successful outcome into an error.
///
/// Outcomes the retrier would still have retried mean retries ran out (or
/// were interrupted) and map to `Transient`; the rest are `Terminal`.
fn failure<P>(action: Action, outcome: &Outcome<P>) -> PipelineError {
    let status = outcome.status_code();
    let message = outcome.failure_message();
    if outcome.is_retryable() {
        PipelineError::transient(action, status, message)
    } else {
        PipelineError::terminal(action, status, message)
    }
}

/// Requires a 200 response without a transport error.
fn expect_ok<P>(action: Action, outcome: &Outcome<P>) -> Result<(), PipelineError> {
    if outcome.is_ok() {
        Ok(())
    } else {
        Err(failure(action, outcome))
    }
}
