//! # Pipeline Gate
//!
//! A blocking, retrying client for pipeline configurations stored behind a
//! Gate-style HTTP JSON API.
//!
//! The crate provides:
//!
//! - **Bounded retries**: every remote call runs through a [`Retrier`] that
//!   retries missing, invalid and 5xx responses with exponential backoff and
//!   jitter, up to five attempts
//! - **Typed outcomes**: [`PipelineError`] separates not-found, transient,
//!   terminal and decode failures so callers can branch on
//!   [`ErrorKind`] instead of status codes
//! - **CRUD and recreate**: [`PipelineClient`] creates, reads, updates,
//!   deletes and recreates pipelines identified by application and name
//! - **Pluggable transport**: [`PipelineApi`] abstracts the remote verbs;
//!   `HttpPipelineApi` (feature `http`) implements them over `reqwest`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pipeline_gate::prelude::*;
//!
//! let config = GateConfig::new("https://gate.example.com");
//! let client = PipelineClient::from_config(&config)?;
//!
//! match client.get_pipeline_document("shop", "deploy") {
//!     Ok(pipeline) => println!("found {}", pipeline["id"]),
//!     Err(err) if err.is_not_found() => client.create_pipeline(&definition)?,
//!     Err(err) => return Err(err.into()),
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipelines;
pub mod retry;
pub mod testing;
pub mod transport;

pub use config::{ConfigError, GateConfig};
pub use errors::{Action, ErrorKind, PipelineError, Result, NO_SUCH_ENTITY};
pub use pipelines::PipelineClient;
pub use retry::{Retrier, RetryPolicy};
pub use transport::{Outcome, PipelineApi, PipelineDocument};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{ConfigError, GateConfig};
    pub use crate::errors::{Action, ErrorKind, PipelineError, NO_SUCH_ENTITY};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::pipelines::PipelineClient;
    pub use crate::retry::{BackoffStrategy, JitterStrategy, Operation, Retrier, RetryPolicy};
    #[cfg(feature = "http")]
    pub use crate::transport::HttpPipelineApi;
    pub use crate::transport::{
        Outcome, PipelineApi, PipelineDocument, ResponseMeta, TransportError, TransportErrorKind,
    };
}
