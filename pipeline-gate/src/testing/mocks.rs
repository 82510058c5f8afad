//! In-memory pipeline service for testing.

use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::errors::Action;
use crate::transport::{Outcome, PipelineApi, PipelineDocument, TransportError};

/// A pipeline service kept in memory.
///
/// Documents are keyed by their `application` and `name` fields; saving
/// assigns an `id` when the document has none. Faults queued with
/// [`fail_next`](Self::fail_next) are served before the store is consulted,
/// and every call is counted per [`Action`].
#[derive(Debug, Default)]
pub struct InMemoryPipelineApi {
    pipelines: RwLock<BTreeMap<(String, String), PipelineDocument>>,
    faults: Mutex<VecDeque<(Action, Outcome<PipelineDocument>)>>,
    calls: Mutex<HashMap<Action, usize>>,
    next_id: Mutex<u64>,
}

impl InMemoryPipelineApi {
    /// Creates an empty service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a document directly, bypassing call counting.
    ///
    /// Returns false if the document lacks `application` or `name`.
    pub fn insert(&self, document: PipelineDocument) -> bool {
        match identity(&document) {
            Some(key) => {
                self.pipelines.write().insert(key, document);
                true
            }
            None => false,
        }
    }

    /// Returns a stored document.
    #[must_use]
    pub fn document(&self, application: &str, pipeline: &str) -> Option<PipelineDocument> {
        self.pipelines
            .read()
            .get(&(application.to_string(), pipeline.to_string()))
            .cloned()
    }

    /// Returns true if the pipeline is stored.
    #[must_use]
    pub fn contains(&self, application: &str, pipeline: &str) -> bool {
        self.document(application, pipeline).is_some()
    }

    /// Returns the number of stored pipelines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pipelines.read().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pipelines.read().is_empty()
    }

    /// Makes the next call for `action` answer with `status`.
    ///
    /// Non-200 statuses carry a status error, as an HTTP transport reports
    /// them. Queue several to fail several calls.
    pub fn fail_next(&self, action: Action, status: u16) {
        let outcome = if status == 200 {
            Outcome::status(status)
        } else {
            Outcome::status(status).with_error(TransportError::status(format!("injected {status}")))
        };
        self.fail_next_with(action, outcome);
    }

    /// Makes the next call for `action` answer with `outcome`.
    pub fn fail_next_with(&self, action: Action, outcome: Outcome<PipelineDocument>) {
        self.faults.lock().push_back((action, outcome));
    }

    /// Returns how many times `action` was called.
    #[must_use]
    pub fn calls(&self, action: Action) -> usize {
        self.calls.lock().get(&action).copied().unwrap_or(0)
    }

    /// Resets call tracking and queued faults.
    pub fn reset(&self) {
        self.calls.lock().clear();
        self.faults.lock().clear();
    }

    fn record(&self, action: Action) -> Option<Outcome<PipelineDocument>> {
        *self.calls.lock().entry(action).or_insert(0) += 1;

        let mut faults = self.faults.lock();
        let position = faults.iter().position(|(a, _)| *a == action)?;
        faults.remove(position).map(|(_, outcome)| outcome)
    }

    fn assign_id(&self) -> String {
        let mut next = self.next_id.lock();
        *next += 1;
        format!("pipeline-{next}")
    }
}

fn identity(document: &PipelineDocument) -> Option<(String, String)> {
    let application = document.get("application")?.as_str()?;
    let name = document.get("name")?.as_str()?;
    Some((application.to_string(), name.to_string()))
}

fn not_found() -> Outcome<PipelineDocument> {
    Outcome::status(404).with_error(TransportError::status("404 Not Found"))
}

fn bad_request(message: &str) -> Outcome<PipelineDocument> {
    Outcome::status(400).with_error(TransportError::status(format!("400 Bad Request: {message}")))
}

impl PipelineApi for InMemoryPipelineApi {
    fn save_pipeline(&self, pipeline: &serde_json::Value) -> Outcome<PipelineDocument> {
        if let Some(outcome) = self.record(Action::Create) {
            return outcome;
        }

        let Some(mut document) = pipeline.as_object().cloned() else {
            return bad_request("pipeline must be a JSON object");
        };
        let Some(key) = identity(&document) else {
            return bad_request("pipeline needs application and name");
        };
        if !document.contains_key("id") {
            document.insert("id".to_string(), serde_json::Value::String(self.assign_id()));
        }
        self.pipelines.write().insert(key, document);
        Outcome::status(200)
    }

    fn get_pipeline_config(&self, application: &str, pipeline: &str) -> Outcome<PipelineDocument> {
        if let Some(outcome) = self.record(Action::Get) {
            return outcome;
        }

        match self.document(application, pipeline) {
            Some(document) => Outcome::status(200).with_payload(document),
            None => not_found(),
        }
    }

    fn update_pipeline(
        &self,
        pipeline_id: &str,
        pipeline: &serde_json::Value,
    ) -> Outcome<PipelineDocument> {
        if let Some(outcome) = self.record(Action::Update) {
            return outcome;
        }

        let Some(mut document) = pipeline.as_object().cloned() else {
            return bad_request("pipeline must be a JSON object");
        };
        let Some(key) = identity(&document) else {
            return bad_request("pipeline needs application and name");
        };

        let mut pipelines = self.pipelines.write();
        let existing = pipelines
            .iter()
            .find(|(_, doc)| doc.get("id").and_then(serde_json::Value::as_str) == Some(pipeline_id))
            .map(|(key, _)| key.clone());
        let Some(existing) = existing else {
            return not_found();
        };

        pipelines.remove(&existing);
        document.insert("id".to_string(), serde_json::Value::String(pipeline_id.to_string()));
        pipelines.insert(key, document);
        Outcome::status(200)
    }

    fn delete_pipeline(&self, application: &str, pipeline: &str) -> Outcome<PipelineDocument> {
        if let Some(outcome) = self.record(Action::Delete) {
            return outcome;
        }

        self.pipelines
            .write()
            .remove(&(application.to_string(), pipeline.to_string()));
        Outcome::status(200)
    }
}
