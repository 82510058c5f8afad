//! Blocking HTTP implementation of [`PipelineApi`].

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Url;
use tracing::trace;

use super::{Outcome, PipelineApi, PipelineDocument, ResponseMeta, TransportError};
use crate::config::{ConfigError, GateConfig};

/// Longest slice of an error body echoed into a transport error.
const MAX_ERROR_BODY: usize = 512;

/// Talks to the pipeline service over HTTP(S) JSON.
///
/// | Verb | Request |
/// |---|---|
/// | save | `POST /pipelines` |
/// | get | `GET /applications/{application}/pipelineConfigs/{pipeline}` |
/// | update | `PUT /pipelines/{id}` |
/// | delete | `DELETE /pipelines/{application}/{pipeline}` |
///
/// Non-2xx responses come back with both the response metadata and a
/// [`Status`](super::TransportErrorKind::Status) error.
#[derive(Debug, Clone)]
pub struct HttpPipelineApi {
    client: Client,
    base: Url,
}

impl HttpPipelineApi {
    /// Builds a client from configuration.
    pub fn new(config: &GateConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let base = Url::parse(&config.endpoint)
            .map_err(|e| ConfigError::invalid("endpoint", e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(ConfigError::invalid("endpoint", "not a base URL"));
        }

        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ConfigError::invalid(format!("headers.{name}"), e.to_string()))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| ConfigError::invalid(format!("headers.{name}"), e.to_string()))?;
            headers.insert(header_name, header_value);
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()
            .map_err(|e| ConfigError::invalid("client", e.to_string()))?;

        Ok(Self { client, base })
    }

    /// Returns the base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base
    }

    /// Appends percent-encoded path segments to the base URL.
    fn url(&self, segments: &[&str]) -> Result<Url, TransportError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| TransportError::request("endpoint cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn send(&self, request: Result<RequestBuilder, TransportError>, read_payload: bool) -> Outcome<PipelineDocument> {
        let request = match request {
            Ok(request) => request,
            Err(error) => return Outcome::failed(error),
        };

        match request.send() {
            Ok(response) => read_response(response, read_payload),
            Err(error) => Outcome::failed(classify_reqwest_error(&error)),
        }
    }
}

fn read_response(response: Response, read_payload: bool) -> Outcome<PipelineDocument> {
    let status = response.status();
    let mut meta = ResponseMeta::new(status.as_u16());
    for (name, value) in response.headers() {
        if let Ok(value) = value.to_str() {
            meta = meta.with_header(name.as_str(), value);
        }
    }
    trace!(status = status.as_u16(), "received response");

    let body = match response.text() {
        Ok(body) => body,
        Err(error) => {
            return Outcome::responded(meta).with_error(TransportError::body(error.to_string()))
        }
    };

    if !status.is_success() {
        let mut detail = status.to_string();
        let body = body.trim();
        if !body.is_empty() {
            let cut = body
                .char_indices()
                .nth(MAX_ERROR_BODY)
                .map_or(body.len(), |(index, _)| index);
            detail = format!("{detail}: {}", &body[..cut]);
        }
        return Outcome::responded(meta).with_error(TransportError::status(detail));
    }

    if !read_payload || body.trim().is_empty() {
        return Outcome::responded(meta);
    }

    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(serde_json::Value::Object(document)) => Outcome::responded(meta).with_payload(document),
        Ok(serde_json::Value::Null) => Outcome::responded(meta),
        Ok(other) => Outcome::responded(meta).with_error(TransportError::body(format!(
            "expected a JSON object, got {}",
            json_type(&other)
        ))),
        Err(error) => Outcome::responded(meta).with_error(TransportError::body(error.to_string())),
    }
}

const fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

fn classify_reqwest_error(error: &reqwest::Error) -> TransportError {
    if error.is_builder() {
        TransportError::request(error.to_string())
    } else if error.is_timeout() {
        TransportError::timeout(error.to_string())
    } else if error.is_body() || error.is_decode() {
        TransportError::body(error.to_string())
    } else {
        TransportError::connect(error.to_string())
    }
}

impl PipelineApi for HttpPipelineApi {
    fn save_pipeline(&self, pipeline: &serde_json::Value) -> Outcome<PipelineDocument> {
        let request = self
            .url(&["pipelines"])
            .map(|url| self.client.post(url).json(pipeline));
        self.send(request, false)
    }

    fn get_pipeline_config(&self, application: &str, pipeline: &str) -> Outcome<PipelineDocument> {
        let request = self
            .url(&["applications", application, "pipelineConfigs", pipeline])
            .map(|url| self.client.get(url));
        self.send(request, true)
    }

    fn update_pipeline(
        &self,
        pipeline_id: &str,
        pipeline: &serde_json::Value,
    ) -> Outcome<PipelineDocument> {
        let request = self
            .url(&["pipelines", pipeline_id])
            .map(|url| self.client.put(url).json(pipeline));
        self.send(request, false)
    }

    fn delete_pipeline(&self, application: &str, pipeline: &str) -> Outcome<PipelineDocument> {
        let request = self
            .url(&["pipelines", application, pipeline])
            .map(|url| self.client.delete(url));
        self.send(request, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use crate::transport::TransportErrorKind;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api(endpoint: &str) -> HttpPipelineApi {
        HttpPipelineApi::new(&GateConfig::new(endpoint)).unwrap()
    }

    #[test]
    fn test_url_encodes_segments() {
        let api = api("https://gate.example.com/api/");
        let url = api
            .url(&["applications", "my app", "pipelineConfigs", "deploy/prod"])
            .unwrap();

        assert_eq!(
            url.as_str(),
            "https://gate.example.com/api/applications/my%20app/pipelineConfigs/deploy%2Fprod"
        );
    }

    #[test]
    fn test_url_without_trailing_slash() {
        let api = api("http://localhost:8084");
        let url = api.url(&["pipelines", "abc-123"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8084/pipelines/abc-123");
    }

    #[test]
    fn test_rejects_non_base_endpoint() {
        let err = HttpPipelineApi::new(&GateConfig::new("mailto:ops@example.com")).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "endpoint"));
    }

    #[test]
    fn test_rejects_bad_header() {
        let config = GateConfig::default().with_header("bad header", "x");
        assert!(HttpPipelineApi::new(&config).is_err());
    }

    /// A wiremock server driven from synchronous tests.
    ///
    /// The server runs on its own thread; the runtime here only drives
    /// setup and verification, so the blocking client is never called from
    /// inside it.
    struct MockGate {
        server: MockServer,
        runtime: tokio::runtime::Runtime,
    }

    impl MockGate {
        fn start() -> Self {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let server = runtime.block_on(MockServer::start());
            Self { server, runtime }
        }

        fn mount(&self, mock: Mock) {
            self.runtime.block_on(mock.mount(&self.server));
        }

        fn api(&self) -> HttpPipelineApi {
            api(&self.server.uri())
        }

        fn verify(&self) {
            self.runtime.block_on(self.server.verify());
        }
    }

    #[test]
    fn test_get_decodes_object_payload() {
        let gate = MockGate::start();
        gate.mount(
            Mock::given(method("GET"))
                .and(path("/applications/shop/pipelineConfigs/deploy"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(json!({"name": "deploy", "application": "shop"})),
                )
                .expect(1),
        );

        let outcome = gate.api().get_pipeline_config("shop", "deploy");

        assert!(outcome.is_ok());
        let document = outcome.payload.unwrap();
        assert_eq!(document["name"], json!("deploy"));
        gate.verify();
    }

    #[test]
    fn test_error_status_carries_response_and_error() {
        let gate = MockGate::start();
        gate.mount(
            Mock::given(method("GET"))
                .and(path("/applications/shop/pipelineConfigs/missing"))
                .respond_with(
                    ResponseTemplate::new(404).set_body_json(json!({"message": "not found"})),
                )
                .expect(1),
        );

        let outcome = gate.api().get_pipeline_config("shop", "missing");

        assert_eq!(outcome.status_code(), Some(404));
        let error = outcome.error.unwrap();
        assert_eq!(error.kind, TransportErrorKind::Status);
        assert!(error.message.contains("not found"));
        gate.verify();
    }

    #[test]
    fn test_non_object_payload_is_body_error() {
        let gate = MockGate::start();
        gate.mount(
            Mock::given(method("GET"))
                .and(path("/applications/shop/pipelineConfigs/deploy"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!([1, 2, 3])))
                .expect(1),
        );

        let outcome = gate.api().get_pipeline_config("shop", "deploy");

        assert_eq!(outcome.status_code(), Some(200));
        assert_eq!(outcome.error.map(|e| e.kind), Some(TransportErrorKind::Body));
        gate.verify();
    }

    #[test]
    fn test_save_posts_json_body() {
        let gate = MockGate::start();
        gate.mount(
            Mock::given(method("POST"))
                .and(path("/pipelines"))
                .and(body_json(json!({"application": "shop", "name": "deploy"})))
                .respond_with(ResponseTemplate::new(200))
                .expect(1),
        );

        let outcome = gate
            .api()
            .save_pipeline(&json!({"application": "shop", "name": "deploy"}));

        assert!(outcome.is_ok());
        assert!(outcome.payload.is_none());
        gate.verify();
    }

    #[test]
    fn test_update_puts_by_id() {
        let gate = MockGate::start();
        gate.mount(
            Mock::given(method("PUT"))
                .and(path("/pipelines/pipeline-7"))
                .and(body_json(json!({"name": "deploy"})))
                .respond_with(ResponseTemplate::new(200))
                .expect(1),
        );

        let outcome = gate.api().update_pipeline("pipeline-7", &json!({"name": "deploy"}));

        assert!(outcome.is_ok());
        gate.verify();
    }

    #[test]
    fn test_client_retries_through_http() {
        let gate = MockGate::start();
        gate.mount(
            Mock::given(method("DELETE"))
                .and(path("/pipelines/shop/deploy"))
                .respond_with(ResponseTemplate::new(503))
                .up_to_n_times(2)
                .expect(2),
        );
        gate.mount(
            Mock::given(method("DELETE"))
                .and(path("/pipelines/shop/deploy"))
                .respond_with(ResponseTemplate::new(200))
                .expect(1),
        );

        let config = GateConfig::new(gate.server.uri()).with_retry(RetryPolicy::immediate());
        let client = crate::PipelineClient::from_config(&config).unwrap();

        client.delete_pipeline("shop", "deploy").unwrap();
        gate.verify();
    }

    #[test]
    fn test_unreachable_service_is_response_less_outcome() {
        // Port 9 (discard) on localhost is not expected to accept HTTP.
        let api = HttpPipelineApi::new(&GateConfig::new("http://127.0.0.1:9").with_timeout(2.0)).unwrap();
        let outcome = api.get_pipeline_config("app", "deploy");

        assert!(outcome.response.is_none());
        assert!(outcome.error.is_some());
        assert!(outcome.is_retryable());
    }
}
