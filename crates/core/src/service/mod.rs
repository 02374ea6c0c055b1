//! Remote calls behind the job handle.
//!
//! [`SpeechService`] is the only seam between the job lifecycle and the
//! network. The handle never retries; any retry policy belongs to the
//! implementation of this trait.

mod http;

use crate::audio::AudioSource;
use crate::operation::{EnvelopeError, Operation};
use crate::recognize::RecognitionConfig;
use futures::future::BoxFuture;

pub use http::HttpSpeechService;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AsyncRecognizeRequest {
    pub config: RecognitionConfig,
    pub audio: AudioSource,
}

#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("http error {code}: {message}")]
    Status { code: u16, message: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
}

impl ServiceError {
    pub fn from_status(code: u16, message: String) -> Self {
        match code {
            400 => ServiceError::InvalidArgument(message),
            401 | 403 => ServiceError::PermissionDenied(message),
            404 => ServiceError::NotFound(message),
            _ => ServiceError::Status { code, message },
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Status { code, .. } => crate::util::is_http_retryable(*code),
            ServiceError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Retry rule for requests that start work on the server. Only failures
    /// where the request was never accepted qualify; a timed-out submission
    /// may already have created a job.
    pub fn is_retryable_submission(&self) -> bool {
        match self {
            ServiceError::Status { code, .. } => matches!(code, 429 | 503),
            ServiceError::Http(e) => e.is_connect(),
            _ => false,
        }
    }
}

pub trait SpeechService: Send + Sync {
    /// Starts asynchronous recognition and returns the pending operation.
    fn async_recognize(
        &self,
        request: AsyncRecognizeRequest,
    ) -> BoxFuture<'_, Result<Operation, ServiceError>>;

    /// Fetches the current state of an operation by id.
    fn get_operation(&self, id: String) -> BoxFuture<'_, Result<Operation, ServiceError>>;
}
