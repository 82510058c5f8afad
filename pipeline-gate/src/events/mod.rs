//! Event sink system for observability.
//!
//! Retry decisions and pipeline lifecycle records are emitted to an
//! [`EventSink`] in addition to being logged through `tracing`.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// A retry was scheduled after a retryable outcome.
pub const RETRY_SCHEDULED: &str = "retry.scheduled";
/// Every attempt produced a retryable outcome.
pub const RETRY_EXHAUSTED: &str = "retry.exhausted";
/// The wait before a retry was interrupted.
pub const RETRY_INTERRUPTED: &str = "retry.interrupted";
/// A pipeline was deleted.
pub const PIPELINE_DELETED: &str = "pipeline.deleted";
