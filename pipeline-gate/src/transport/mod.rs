//! Transport boundary.
//!
//! This module defines what one remote exchange looks like to the rest of the
//! crate:
//! - [`Outcome`] carries the decoded payload, response metadata and transport
//!   error of a single attempt
//! - [`PipelineApi`] is the set of remote verbs the client drives
//! - [`HttpPipelineApi`] (feature `http`) implements the verbs over blocking
//!   HTTP

#[cfg(feature = "http")]
mod http;
mod outcome;

#[cfg(feature = "http")]
pub use http::HttpPipelineApi;
pub use outcome::{Outcome, ResponseMeta, TransportError, TransportErrorKind};

/// A pipeline configuration document.
pub type PipelineDocument = serde_json::Map<String, serde_json::Value>;

/// Remote verbs of the pipeline service.
///
/// Implementations report non-2xx responses through the returned
/// [`Outcome`] rather than by panicking; classification and retries happen
/// above this trait.
#[cfg_attr(test, mockall::automock)]
pub trait PipelineApi: Send + Sync {
    /// Saves a new pipeline document.
    fn save_pipeline(&self, pipeline: &serde_json::Value) -> Outcome<PipelineDocument>;

    /// Fetches the configuration of `pipeline` in `application`.
    fn get_pipeline_config(&self, application: &str, pipeline: &str) -> Outcome<PipelineDocument>;

    /// Replaces the pipeline identified by `pipeline_id`.
    fn update_pipeline(
        &self,
        pipeline_id: &str,
        pipeline: &serde_json::Value,
    ) -> Outcome<PipelineDocument>;

    /// Deletes `pipeline` from `application`.
    fn delete_pipeline(&self, application: &str, pipeline: &str) -> Outcome<PipelineDocument>;
}

impl<T: PipelineApi + ?Sized> PipelineApi for &T {
    fn save_pipeline(&self, pipeline: &serde_json::Value) -> Outcome<PipelineDocument> {
        (**self).save_pipeline(pipeline)
    }

    fn get_pipeline_config(&self, application: &str, pipeline: &str) -> Outcome<PipelineDocument> {
        (**self).get_pipeline_config(application, pipeline)
    }

    fn update_pipeline(
        &self,
        pipeline_id: &str,
        pipeline: &serde_json::Value,
    ) -> Outcome<PipelineDocument> {
        (**self).update_pipeline(pipeline_id, pipeline)
    }

    fn delete_pipeline(&self, application: &str, pipeline: &str) -> Outcome<PipelineDocument> {
        (**self).delete_pipeline(application, pipeline)
    }
}

impl<T: PipelineApi + ?Sized> PipelineApi for std::sync::Arc<T> {
    fn save_pipeline(&self, pipeline: &serde_json::Value) -> Outcome<PipelineDocument> {
        (**self).save_pipeline(pipeline)
    }

    fn get_pipeline_config(&self, application: &str, pipeline: &str) -> Outcome<PipelineDocument> {
        (**self).get_pipeline_config(application, pipeline)
    }

    fn update_pipeline(
        &self,
        pipeline_id: &str,
        pipeline: &serde_json::Value,
    ) -> Outcome<PipelineDocument> {
        (**self).update_pipeline(pipeline_id, pipeline)
    }

    fn delete_pipeline(&self, application: &str, pipeline: &str) -> Outcome<PipelineDocument> {
        (**self).delete_pipeline(application, pipeline)
    }
}
