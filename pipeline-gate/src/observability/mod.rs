//! Logging setup for binaries and tests built on this crate.
//!
//! The library itself only emits `tracing` events; installing a subscriber
//! is left to the application. [`init_tracing`] is a convenience for the
//! common case.

mod logging;

pub use logging::{init_tracing, LogFormat, DEFAULT_FILTER};
