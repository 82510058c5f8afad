//! The pipeline client.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::expect_ok;
use crate::errors::{Action, PipelineError, Result};
use crate::events::{self, EventSink, NoOpEventSink};
use crate::retry::Retrier;
use crate::transport::{PipelineApi, PipelineDocument};

#[cfg(feature = "http")]
use crate::config::{ConfigError, GateConfig};
#[cfg(feature = "http")]
use crate::transport::HttpPipelineApi;

/// Create, read, update and delete pipelines with bounded retries.
///
/// Every call blocks the calling thread until the (possibly retried)
/// exchange finishes. Calls share no mutable state, so one client can be
/// used from many threads; concurrent writes to the same pipeline are not
/// coordinated.
pub struct PipelineClient<A> {
    api: A,
    retrier: Retrier,
    events: Arc<dyn EventSink>,
}

impl<A: PipelineApi> PipelineClient<A> {
    /// Creates a client with the default retry policy.
    #[must_use]
    pub fn new(api: A) -> Self {
        Self {
            api,
            retrier: Retrier::default(),
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Replaces the retrier.
    #[must_use]
    pub fn with_retrier(mut self, retrier: Retrier) -> Self {
        self.retrier = retrier;
        self
    }

    /// Sets the event sink for lifecycle records and retry decisions.
    ///
    /// Applies to the retrier installed at the time of the call.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.retrier = self.retrier.with_event_sink(Arc::clone(&events));
        self.events = events;
        self
    }

    /// Returns the underlying transport.
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Returns the retrier.
    pub fn retrier(&self) -> &Retrier {
        &self.retrier
    }

    /// Saves a new pipeline.
    ///
    /// The document is sent as-is; its identity is not checked locally.
    pub fn create_pipeline<D: Serialize + ?Sized>(&self, pipeline: &D) -> Result<()> {
        let body = encode(Action::Create, pipeline)?;
        let outcome = self.retrier.retry(|| self.api.save_pipeline(&body));
        expect_ok(Action::Create, &outcome)?;
        debug!("saved pipeline");
        Ok(())
    }

    /// Fetches a pipeline and decodes it into `T`.
    ///
    /// A 404, or a 200 with no document, yields
    /// [`PipelineError::NotFound`]. Decoding failures are returned as
    /// [`PipelineError::Decode`] and are not retried.
    pub fn get_pipeline<T: DeserializeOwned>(&self, application: &str, pipeline: &str) -> Result<T> {
        let document = self.get_pipeline_document(application, pipeline)?;
        serde_json::from_value(serde_json::Value::Object(document))
            .map_err(|source| PipelineError::decode(Action::Get, source))
    }

    /// Fetches a pipeline as a raw document.
    pub fn get_pipeline_document(&self, application: &str, pipeline: &str) -> Result<PipelineDocument> {
        let outcome = self
            .retrier
            .retry(|| self.api.get_pipeline_config(application, pipeline));

        if outcome.status_code() == Some(404) {
            debug!(application, pipeline, "pipeline not found");
            return Err(PipelineError::not_found(application, pipeline, Some(404)));
        }
        expect_ok(Action::Get, &outcome)?;

        match outcome.payload {
            Some(document) if !document.is_empty() => Ok(document),
            _ => {
                debug!(application, pipeline, "pipeline lookup returned no document");
                Err(PipelineError::not_found(
                    application,
                    pipeline,
                    outcome.response.map(|response| response.status),
                ))
            }
        }
    }

    /// Replaces the pipeline identified by `pipeline_id`.
    pub fn update_pipeline<D: Serialize + ?Sized>(&self, pipeline_id: &str, pipeline: &D) -> Result<()> {
        let body = encode(Action::Update, pipeline)?;
        let outcome = self
            .retrier
            .retry(|| self.api.update_pipeline(pipeline_id, &body));
        expect_ok(Action::Update, &outcome)?;
        debug!(pipeline_id, "updated pipeline");
        Ok(())
    }

    /// Deletes a pipeline.
    pub fn delete_pipeline(&self, application: &str, pipeline: &str) -> Result<()> {
        let outcome = self
            .retrier
            .retry(|| self.api.delete_pipeline(application, pipeline));
        expect_ok(Action::Delete, &outcome)?;

        info!(application, pipeline, "deleted pipeline");
        self.events.emit(
            events::PIPELINE_DELETED,
            Some(serde_json::json!({
                "application": application,
                "pipeline": pipeline,
            })),
        );
        Ok(())
    }

    /// Deletes a pipeline and saves `pipeline` in its place.
    ///
    /// Stops at the first failure: a failed delete never reaches the create.
    /// This is not transactional. If the create fails after the delete
    /// succeeded, the pipeline stays deleted and the create error is
    /// returned.
    pub fn recreate_pipeline<D: Serialize + ?Sized>(
        &self,
        application: &str,
        name: &str,
        pipeline: &D,
    ) -> Result<()> {
        self.delete_pipeline(application, name)?;
        self.create_pipeline(pipeline).map_err(|err| {
            warn!(
                application,
                pipeline = name,
                error = %err,
                "pipeline deleted but could not be recreated"
            );
            err
        })
    }
}

#[cfg(feature = "http")]
impl PipelineClient<HttpPipelineApi> {
    /// Builds an HTTP-backed client using the configured retry policy.
    pub fn from_config(config: &GateConfig) -> std::result::Result<Self, ConfigError> {
        let api = HttpPipelineApi::new(config)?;
        Ok(Self::new(api).with_retrier(Retrier::new(config.retry.clone())))
    }
}

impl<A> std::fmt::Debug for PipelineClient<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineClient")
            .field("retrier", &self.retrier)
            .finish_non_exhaustive()
    }
}

fn encode<D: Serialize + ?Sized>(action: Action, pipeline: &D) -> Result<serde_json::Value> {
    serde_json::to_value(pipeline).map_err(|source| PipelineError::decode(action, source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ErrorKind, NO_SUCH_ENTITY};
    use crate::events::CollectingEventSink;
    use crate::retry::RetryPolicy;
    use crate::testing::InMemoryPipelineApi;
    use crate::transport::{MockPipelineApi, Outcome, TransportError};
    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Pipeline {
        application: String,
        name: String,
        keep_waiting_pipelines: bool,
        limit_concurrent: bool,
        stages: Vec<Stage>,
        triggers: Vec<serde_json::Value>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Stage {
        name: String,
        #[serde(rename = "type")]
        kind: String,
        ref_id: String,
        requisite_stage_ref_ids: Vec<String>,
    }

    fn sample_pipeline() -> Pipeline {
        Pipeline {
            application: "shop".to_string(),
            name: "deploy".to_string(),
            keep_waiting_pipelines: false,
            limit_concurrent: true,
            stages: vec![
                Stage {
                    name: "Bake".to_string(),
                    kind: "bake".to_string(),
                    ref_id: "1".to_string(),
                    requisite_stage_ref_ids: vec![],
                },
                Stage {
                    name: "Deploy".to_string(),
                    kind: "deploy".to_string(),
                    ref_id: "2".to_string(),
                    requisite_stage_ref_ids: vec!["1".to_string()],
                },
            ],
            triggers: vec![json!({"type": "git", "branch": "main"})],
        }
    }

    fn fast<A: PipelineApi>(api: A) -> PipelineClient<A> {
        PipelineClient::new(api).with_retrier(Retrier::new(RetryPolicy::immediate()))
    }

    fn status_outcome(status: u16) -> Outcome<PipelineDocument> {
        Outcome::status(status).with_error(TransportError::status(format!("{status}")))
    }

    #[test]
    fn test_client_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PipelineClient<InMemoryPipelineApi>>();
    }

    #[test]
    fn test_create_then_get_round_trips() {
        let client = fast(InMemoryPipelineApi::new());
        let pipeline = sample_pipeline();

        client.create_pipeline(&pipeline).unwrap();
        let fetched: Pipeline = client.get_pipeline("shop", "deploy").unwrap();

        assert_eq!(fetched, pipeline);
    }

    #[test]
    fn test_create_rejected_is_terminal() {
        let api = InMemoryPipelineApi::new();
        api.fail_next(Action::Create, 400);
        let client = fast(&api);

        let err = client.create_pipeline(&sample_pipeline()).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Terminal);
        assert_eq!(err.status(), Some(400));
        assert_eq!(api.calls(Action::Create), 1);
        assert!(api.is_empty());
    }

    #[test]
    fn test_create_retries_server_errors_then_succeeds() {
        let api = InMemoryPipelineApi::new();
        api.fail_next(Action::Create, 503);
        api.fail_next(Action::Create, 503);
        let client = fast(&api);

        client.create_pipeline(&sample_pipeline()).unwrap();

        assert_eq!(api.calls(Action::Create), 3);
        assert!(api.contains("shop", "deploy"));
    }

    #[test]
    fn test_create_exhausted_is_transient() {
        let mut mock = MockPipelineApi::new();
        mock.expect_save_pipeline()
            .times(5)
            .returning(|_| status_outcome(502));
        let client = fast(mock);

        let err = client.create_pipeline(&sample_pipeline()).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transient);
        assert_eq!(err.status(), Some(502));
        assert!(err.to_string().contains("saving pipeline"));
    }

    #[test]
    fn test_non_200_success_status_is_terminal() {
        let mut mock = MockPipelineApi::new();
        mock.expect_save_pipeline()
            .times(1)
            .returning(|_| Outcome::status(204));
        let client = fast(mock);

        let err = client.create_pipeline(&sample_pipeline()).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Terminal);
        assert_eq!(err.status(), Some(204));
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let api = InMemoryPipelineApi::new();
        let client = fast(&api);

        let err = client.get_pipeline::<Pipeline>("shop", "deploy").unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(err.to_string(), NO_SUCH_ENTITY);
        assert_eq!(api.calls(Action::Get), 1);
    }

    #[test]
    fn test_get_404_without_transport_error_is_not_found() {
        let mut mock = MockPipelineApi::new();
        mock.expect_get_pipeline_config()
            .times(1)
            .returning(|_, _| Outcome::status(404));
        let client = fast(mock);

        let err = client.get_pipeline_document("shop", "deploy").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn test_get_empty_payload_is_not_found() {
        let mut mock = MockPipelineApi::new();
        mock.expect_get_pipeline_config()
            .times(1)
            .returning(|_, _| Outcome::status(200).with_payload(PipelineDocument::new()));
        let client = fast(mock);

        let err = client.get_pipeline_document("shop", "deploy").unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.status(), Some(200));
    }

    #[test]
    fn test_get_absent_payload_is_not_found() {
        let mut mock = MockPipelineApi::new();
        mock.expect_get_pipeline_config()
            .times(1)
            .returning(|_, _| Outcome::status(200));
        let client = fast(mock);

        let err = client.get_pipeline::<Pipeline>("shop", "deploy").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_get_forbidden_is_terminal_after_one_call() {
        let mut mock = MockPipelineApi::new();
        mock.expect_get_pipeline_config()
            .times(1)
            .returning(|application, pipeline| {
                assert_eq!(application, "shop");
                assert_eq!(pipeline, "deploy");
                status_outcome(403)
            });
        let client = fast(mock);

        let err = client.get_pipeline_document("shop", "deploy").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Terminal);
        assert_eq!(err.status(), Some(403));
        assert!(err.to_string().contains("getting pipeline"));
    }

    #[test]
    fn test_get_undecodable_payload_is_decode_error() {
        let api = InMemoryPipelineApi::new();
        api.insert(
            json!({"application": "shop", "name": "deploy", "stages": "not-a-list"})
                .as_object()
                .cloned()
                .unwrap(),
        );
        let client = fast(&api);

        let err = client.get_pipeline::<Pipeline>("shop", "deploy").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Decode);
        assert_eq!(api.calls(Action::Get), 1);
    }

    #[test]
    fn test_get_document_returns_raw_map() {
        let api = InMemoryPipelineApi::new();
        let client = fast(&api);
        client
            .create_pipeline(&json!({"application": "shop", "name": "deploy", "spelEvaluator": "v4"}))
            .unwrap();

        let document = client.get_pipeline_document("shop", "deploy").unwrap();

        assert_eq!(document["spelEvaluator"], json!("v4"));
        assert_eq!(document["id"], json!("pipeline-1"));
    }

    #[test]
    fn test_update_replaces_document() {
        let api = InMemoryPipelineApi::new();
        let client = fast(&api);
        client.create_pipeline(&sample_pipeline()).unwrap();

        let mut changed = sample_pipeline();
        changed.limit_concurrent = false;
        client.update_pipeline("pipeline-1", &changed).unwrap();

        let fetched: Pipeline = client.get_pipeline("shop", "deploy").unwrap();
        assert_eq!(fetched, changed);
    }

    #[test]
    fn test_update_unknown_id_is_terminal_not_not_found() {
        let client = fast(InMemoryPipelineApi::new());

        let err = client.update_pipeline("missing", &sample_pipeline()).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Terminal);
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.action(), Action::Update);
    }

    #[test]
    fn test_delete_removes_and_emits_record() {
        let api = InMemoryPipelineApi::new();
        let sink = Arc::new(CollectingEventSink::new());
        let client = fast(&api).with_event_sink(sink.clone());
        client.create_pipeline(&sample_pipeline()).unwrap();

        client.delete_pipeline("shop", "deploy").unwrap();

        assert!(!api.contains("shop", "deploy"));
        let deleted = sink.events_of_type(events::PIPELINE_DELETED);
        assert_eq!(deleted.len(), 1);
        assert_eq!(
            deleted[0].1,
            Some(json!({"application": "shop", "pipeline": "deploy"}))
        );
    }

    #[test]
    fn test_failed_delete_emits_no_record() {
        let api = InMemoryPipelineApi::new();
        api.fail_next(Action::Delete, 401);
        let sink = Arc::new(CollectingEventSink::new());
        let client = fast(&api).with_event_sink(sink.clone());

        let err = client.delete_pipeline("shop", "deploy").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Terminal);
        assert!(sink.events_of_type(events::PIPELINE_DELETED).is_empty());
    }

    #[test]
    fn test_retry_events_flow_through_client_sink() {
        let api = InMemoryPipelineApi::new();
        api.fail_next(Action::Delete, 500);
        let sink = Arc::new(CollectingEventSink::new());
        let client = fast(&api).with_event_sink(sink.clone());

        client.delete_pipeline("shop", "deploy").unwrap();

        assert_eq!(sink.events_of_type(events::RETRY_SCHEDULED).len(), 1);
        assert_eq!(api.calls(Action::Delete), 2);
    }

    #[test]
    fn test_recreate_stops_when_delete_fails() {
        let mut mock = MockPipelineApi::new();
        mock.expect_delete_pipeline()
            .times(1)
            .returning(|_, _| status_outcome(400));
        mock.expect_save_pipeline().times(0);
        let client = fast(mock);

        let err = client
            .recreate_pipeline("shop", "deploy", &sample_pipeline())
            .unwrap_err();

        assert_eq!(err.action(), Action::Delete);
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn test_recreate_with_failing_create_leaves_pipeline_absent() {
        let api = InMemoryPipelineApi::new();
        let client = fast(&api);
        client.create_pipeline(&sample_pipeline()).unwrap();
        api.reset();
        api.fail_next(Action::Create, 400);

        let err = client
            .recreate_pipeline("shop", "deploy", &sample_pipeline())
            .unwrap_err();

        assert_eq!(err.action(), Action::Create);
        assert_eq!(err.kind(), ErrorKind::Terminal);
        assert!(!api.contains("shop", "deploy"));
        assert_eq!(api.calls(Action::Delete), 1);
        assert_eq!(api.calls(Action::Create), 1);
    }

    #[test]
    fn test_recreate_replaces_pipeline() {
        let api = InMemoryPipelineApi::new();
        let client = fast(&api);
        client.create_pipeline(&sample_pipeline()).unwrap();

        let mut replacement = sample_pipeline();
        replacement.keep_waiting_pipelines = true;
        client
            .recreate_pipeline("shop", "deploy", &replacement)
            .unwrap();

        let fetched: Pipeline = client.get_pipeline("shop", "deploy").unwrap();
        assert_eq!(fetched, replacement);
    }

    #[test]
    fn test_unserializable_document_is_decode_error() {
        let mut mock = MockPipelineApi::new();
        mock.expect_save_pipeline().times(0);
        let client = fast(mock);

        let mut bad = std::collections::HashMap::new();
        bad.insert((1, 2), "tuple keys are not valid JSON object keys");

        let err = client.create_pipeline(&bad).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn test_connection_failures_exhaust_to_transient() {
        let mut mock = MockPipelineApi::new();
        mock.expect_delete_pipeline()
            .times(5)
            .returning(|_, _| Outcome::failed(TransportError::connect("connection refused")));
        let client = fast(mock);

        let err = client.delete_pipeline("shop", "deploy").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transient);
        assert_eq!(err.status(), None);
        assert!(err.to_string().contains("connection refused"));
    }
}
