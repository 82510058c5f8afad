//! Testing utilities for code built on the pipeline client.
//!
//! This module provides:
//! - An in-memory pipeline service with fault injection and call counting
//! - A collecting event sink (re-exported from [`crate::events`])

mod mocks;

pub use crate::events::CollectingEventSink;
pub use mocks::InMemoryPipelineApi;
