//! Bounded retry loop around a single remote operation.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::policy::RetryPolicy;
use crate::cancellation::CancellationToken;
use crate::events::{self, EventSink, NoOpEventSink};
use crate::transport::{Outcome, TransportError};

/// One deferred remote call, re-executed as a unit on every attempt.
///
/// Closures returning an [`Outcome`] implement this trait, which is how the
/// pipeline operations use it.
pub trait Operation {
    /// Payload type produced by a successful exchange.
    type Payload;

    /// Performs one attempt.
    fn execute(&mut self) -> Outcome<Self::Payload>;
}

impl<F, P> Operation for F
where
    F: FnMut() -> Outcome<P>,
{
    type Payload = P;

    fn execute(&mut self) -> Outcome<P> {
        self()
    }
}

/// Runs operations under a [`RetryPolicy`].
///
/// Retryable outcomes (see [`should_retry`](super::should_retry)) are
/// attempted again after a blocking backoff sleep until the attempt ceiling
/// is reached; the last outcome is then returned untouched. Final outcomes
/// return at once. The retrier never invents errors of its own except
/// [`TransportErrorKind::Interrupted`](crate::transport::TransportErrorKind)
/// when its cancellation token fires during a wait.
///
/// Every wrapped operation must be safe to repeat.
#[derive(Clone)]
pub struct Retrier {
    policy: RetryPolicy,
    events: Arc<dyn EventSink>,
    cancellation: Option<Arc<CancellationToken>>,
}

impl Default for Retrier {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl Retrier {
    /// Creates a retrier with the given policy.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            events: Arc::new(NoOpEventSink),
            cancellation: None,
        }
    }

    /// Sets the event sink retry decisions are reported to.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Sets a token that interrupts backoff waits.
    #[must_use]
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Returns the policy.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Executes `operation`, retrying retryable outcomes.
    pub fn retry<O: Operation>(&self, mut operation: O) -> Outcome<O::Payload> {
        let max_attempts = self.policy.attempts();
        let mut attempt = 1;

        loop {
            let outcome = operation.execute();
            if !outcome.is_retryable() {
                return outcome;
            }

            if attempt >= max_attempts {
                warn!(
                    attempts = attempt,
                    status = ?outcome.status_code(),
                    error = %outcome.failure_message(),
                    "Giving up after retryable failures"
                );
                self.events.emit(
                    events::RETRY_EXHAUSTED,
                    Some(serde_json::json!({
                        "attempts": attempt,
                        "status": outcome.status_code(),
                    })),
                );
                return outcome;
            }

            let delay = self.policy.delay_for_retry(attempt);
            debug!(
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                status = ?outcome.status_code(),
                error = %outcome.failure_message(),
                "Retrying after retryable failure"
            );
            self.events.emit(
                events::RETRY_SCHEDULED,
                Some(serde_json::json!({
                    "attempt": attempt,
                    "delay_ms": u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "status": outcome.status_code(),
                })),
            );

            if let Err(reason) = self.pause(delay) {
                warn!(attempt, reason = %reason, "Retry wait interrupted");
                self.events.emit(
                    events::RETRY_INTERRUPTED,
                    Some(serde_json::json!({ "attempt": attempt, "reason": reason })),
                );
                return outcome.with_error(TransportError::interrupted(reason));
            }

            attempt += 1;
        }
    }

    /// Blocks for `delay`, or until the cancellation token fires.
    fn pause(&self, delay: Duration) -> Result<(), String> {
        match &self.cancellation {
            Some(token) => {
                if token.is_cancelled() || token.wait_timeout(delay) {
                    Err(token
                        .reason()
                        .unwrap_or_else(|| "cancelled".to_string()))
                } else {
                    Ok(())
                }
            }
            None => {
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for Retrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retrier")
            .field("policy", &self.policy)
            .field("cancellation", &self.cancellation)
            .finish_non_exhaustive()
    }
}
