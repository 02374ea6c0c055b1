use crate::audio::AudioSource;
use crate::config::{ApiKey, ClientConfig, Endpoint};
use crate::operation::Operation;
use crate::recognize::AudioEncoding;
use crate::service::{AsyncRecognizeRequest, ServiceError, SpeechService};
use crate::util::{retry_with_backoff, RetryConfig};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use url::Url;

const ASYNC_RECOGNIZE_PATH: &str = "v1beta1/speech:asyncrecognize";
const OPERATIONS_PATH: &str = "v1beta1/operations/";
const LOG_TARGET: &str = "service::http";

/// REST transport for the speech service. Lookups retry transient failures
/// (timeouts, connection errors, 408/429/5xx) with backoff. Submissions only
/// retry when the server never accepted the request, so a slow response can
/// not start a second job.
#[derive(Clone)]
pub struct HttpSpeechService {
    client: Client,
    endpoint: Endpoint,
    api_key: Option<ApiKey>,
    retry: RetryConfig,
}

impl HttpSpeechService {
    pub fn new(config: &ClientConfig) -> Result<Self, ServiceError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            retry: RetryConfig::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn method_url(&self, path: &str) -> Result<Url, ServiceError> {
        let mut url = self
            .endpoint
            .url()
            .join(path)
            .map_err(|e| ServiceError::Transport(format!("invalid request url: {e}")))?;
        if let Some(key) = &self.api_key {
            url.query_pairs_mut().append_pair("key", key.expose());
        }
        Ok(url)
    }

    async fn call(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
        should_retry: fn(&ServiceError) -> bool,
    ) -> Result<Operation, ServiceError> {
        let this = self;
        retry_with_backoff(
            &self.retry,
            move || this.call_once(method.clone(), url.clone(), body.clone()),
            should_retry,
        )
        .await
    }

    async fn call_once(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> Result<Operation, ServiceError> {
        tracing::debug!(target: LOG_TARGET, %method, path = url.path(), "sending request");

        let mut request = self.client.request(method, url);
        if let Some(body) = &body {
            request = request.json(body);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::debug!(target: LOG_TARGET, status = status.as_u16(), "request rejected");
            return Err(ServiceError::from_status(
                status.as_u16(),
                error_message(error_text),
            ));
        }

        let bytes = response.bytes().await?;
        Ok(Operation::from_json(&bytes)?)
    }
}

impl SpeechService for HttpSpeechService {
    fn async_recognize(
        &self,
        request: AsyncRecognizeRequest,
    ) -> BoxFuture<'_, Result<Operation, ServiceError>> {
        async move {
            let url = self.method_url(ASYNC_RECOGNIZE_PATH)?;
            let body = serde_json::to_value(WireRequest::from(&request))
                .map_err(|e| ServiceError::Transport(format!("failed to encode request: {e}")))?;
            self.call(
                Method::POST,
                url,
                Some(body),
                ServiceError::is_retryable_submission,
            )
            .await
        }
        .boxed()
    }

    fn get_operation(&self, id: String) -> BoxFuture<'_, Result<Operation, ServiceError>> {
        async move {
            let url = self.method_url(&format!("{OPERATIONS_PATH}{}", urlencoding::encode(&id)))?;
            self.call(Method::GET, url, None, ServiceError::is_retryable)
                .await
        }
        .boxed()
    }
}

#[derive(Serialize)]
struct WireRequest<'a> {
    config: WireConfig<'a>,
    audio: WireAudio,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireConfig<'a> {
    encoding: AudioEncoding,
    sample_rate: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    language_code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_alternatives: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    profanity_filter: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speech_context: Option<WireSpeechContext<'a>>,
}

#[derive(Serialize)]
struct WireSpeechContext<'a> {
    phrases: &'a [String],
}

#[derive(Serialize)]
struct WireAudio {
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    uri: Option<String>,
}

impl<'a> From<&'a AsyncRecognizeRequest> for WireRequest<'a> {
    fn from(request: &'a AsyncRecognizeRequest) -> Self {
        let config = &request.config;
        let audio = match &request.audio {
            AudioSource::Inline(content) => WireAudio {
                content: Some(STANDARD.encode(content)),
                uri: None,
            },
            AudioSource::Uri(uri) => WireAudio {
                content: None,
                uri: Some(uri.clone()),
            },
        };
        Self {
            config: WireConfig {
                encoding: config.encoding,
                sample_rate: config.sample_rate,
                language_code: config.language_code.as_deref(),
                max_alternatives: config.max_alternatives,
                profanity_filter: config.profanity_filter,
                speech_context: (!config.phrases.is_empty()).then(|| WireSpeechContext {
                    phrases: &config.phrases,
                }),
            },
            audio,
        }
    }
}

#[derive(Deserialize)]
struct WireErrorBody {
    error: WireErrorDetail,
}

#[derive(Deserialize)]
struct WireErrorDetail {
    #[serde(default)]
    message: String,
}

/// Pulls `error.message` out of a JSON error body, falling back to the raw text.
fn error_message(body: String) -> String {
    match serde_json::from_str::<WireErrorBody>(&body) {
        Ok(parsed) if !parsed.error.message.is_empty() => parsed.error.message,
        _ => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognize::RecognitionConfig;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PENDING_JOB_JSON: &str = r#"{"name":"1234567890","metadata":{"typeUrl":"type.googleapis.com/google.cloud.speech.v1beta1.AsyncRecognizeMetadata","value":"CFQSDAi6jKS/BRCwkLafARoMCIeZpL8FEKjRqswC"}}"#;

    fn service_for(server: &MockServer) -> HttpSpeechService {
        service_with_timeout(server, Duration::from_secs(5))
    }

    fn service_with_timeout(server: &MockServer, timeout: Duration) -> HttpSpeechService {
        let config = ClientConfig {
            endpoint: Endpoint::parse(&server.uri()).expect("mock server uri"),
            api_key: Some(ApiKey::new("test-key").expect("non-empty")),
            timeout,
        };
        HttpSpeechService::new(&config)
            .expect("client builds")
            .with_retry(RetryConfig::new(3, Duration::from_millis(1)).without_jitter())
    }

    fn linear16_request(audio: AudioSource) -> AsyncRecognizeRequest {
        AsyncRecognizeRequest {
            config: RecognitionConfig::new(AudioEncoding::Linear16, 16000),
            audio,
        }
    }

    #[tokio::test]
    async fn submits_inline_audio_as_base64() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta1/speech:asyncrecognize"))
            .and(query_param("key", "test-key"))
            .and(body_json(json!({
                "config": {"encoding": "LINEAR16", "sampleRate": 16000},
                "audio": {"content": "AAECAw=="}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(PENDING_JOB_JSON))
            .expect(1)
            .mount(&server)
            .await;

        let op = service_for(&server)
            .async_recognize(linear16_request(AudioSource::inline(vec![0u8, 1, 2, 3])))
            .await
            .unwrap();
        assert_eq!(op.id(), "1234567890");
        assert!(!op.done());
    }

    #[tokio::test]
    async fn submits_uri_audio_with_optional_config() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta1/speech:asyncrecognize"))
            .and(body_json(json!({
                "config": {
                    "encoding": "FLAC",
                    "sampleRate": 44100,
                    "languageCode": "en-US",
                    "maxAlternatives": 3,
                    "speechContext": {"phrases": ["Brooklyn Bridge"]}
                },
                "audio": {"uri": "gs://some_bucket/audio.flac"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(PENDING_JOB_JSON))
            .expect(1)
            .mount(&server)
            .await;

        let request = AsyncRecognizeRequest {
            config: RecognitionConfig::new(AudioEncoding::Flac, 44100)
                .with_language("en-US")
                .with_max_alternatives(3)
                .with_phrases(["Brooklyn Bridge"]),
            audio: AudioSource::uri("gs://some_bucket/audio.flac"),
        };
        let op = service_for(&server).async_recognize(request).await.unwrap();
        assert_eq!(op.id(), "1234567890");
    }

    #[tokio::test]
    async fn fetches_operation_by_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1beta1/operations/1234567890"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"name":"1234567890","done":true,"error":{"code":3,"message":"bad audio"}}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let op = service_for(&server)
            .get_operation("1234567890".into())
            .await
            .unwrap();
        assert_eq!(op.error().map(|s| s.code), Some(3));
    }

    #[tokio::test]
    async fn missing_operation_maps_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1beta1/operations/nope"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"code": 404, "message": "operation nope not found", "status": "NOT_FOUND"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = service_for(&server)
            .get_operation("nope".into())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(m) if m == "operation nope not found"));
    }

    #[tokio::test]
    async fn rejected_request_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad sample rate"))
            .expect(1)
            .mount(&server)
            .await;

        let err = service_for(&server)
            .async_recognize(linear16_request(AudioSource::uri("gs://b/a.raw")))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArgument(m) if m == "bad sample rate"));
    }

    #[tokio::test]
    async fn transient_failure_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1beta1/operations/1234567890"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1beta1/operations/1234567890"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PENDING_JOB_JSON))
            .expect(1)
            .mount(&server)
            .await;

        let op = service_for(&server)
            .get_operation("1234567890".into())
            .await
            .unwrap();
        assert_eq!(op.id(), "1234567890");
    }

    #[tokio::test]
    async fn timed_out_submission_is_sent_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta1/speech:asyncrecognize"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(PENDING_JOB_JSON)
                    .set_delay(Duration::from_millis(500)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let err = service_with_timeout(&server, Duration::from_millis(100))
            .async_recognize(linear16_request(AudioSource::uri("gs://b/a.raw")))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Http(ref e) if e.is_timeout()));
    }

    #[tokio::test]
    async fn server_error_on_submission_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let err = service_for(&server)
            .async_recognize(linear16_request(AudioSource::uri("gs://b/a.raw")))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Status { code: 500, .. }));
    }

    #[tokio::test]
    async fn throttled_submission_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PENDING_JOB_JSON))
            .expect(1)
            .mount(&server)
            .await;

        let op = service_for(&server)
            .async_recognize(linear16_request(AudioSource::uri("gs://b/a.raw")))
            .await
            .unwrap();
        assert_eq!(op.id(), "1234567890");
    }

    #[tokio::test]
    async fn malformed_envelope_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"name":"1","done":true}"#))
            .mount(&server)
            .await;

        let err = service_for(&server)
            .get_operation("1".into())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Envelope(_)));
    }

    #[test]
    fn error_message_prefers_structured_body() {
        assert_eq!(
            error_message(r#"{"error":{"message":"quota"}}"#.to_owned()),
            "quota"
        );
        assert_eq!(error_message("plain".to_owned()), "plain");
    }
}
