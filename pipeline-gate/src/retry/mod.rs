//! Retry-wrapped execution of remote operations.
//!
//! This module provides:
//! - [`RetryPolicy`] with backoff and jitter strategies
//! - [`should_retry`], the transient-vs-terminal classifier
//! - [`Retrier`], which drives an [`Operation`] under a policy

mod condition;
mod policy;
mod retrier;

pub use condition::{is_retryable_status, should_retry, SERVER_ERROR_FLOOR};
pub use policy::{BackoffStrategy, JitterStrategy, RetryPolicy, DEFAULT_MAX_ATTEMPTS};
pub use retrier::{Operation, Retrier};
