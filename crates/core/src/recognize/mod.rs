mod config;

use crate::audio::{AudioReferenceError, AudioSource, RecognitionAudio};
use crate::config::ClientConfig;
use crate::job::{RecognizeJob, RefreshError};
use crate::service::{AsyncRecognizeRequest, HttpSpeechService, ServiceError, SpeechService};
use std::sync::Arc;

pub use config::{AudioEncoding, RecognitionConfig, UnknownEncoding};

const LOG_TARGET: &str = "recognize";

#[derive(thiserror::Error, Debug)]
pub enum SubmissionError {
    #[error("invalid audio reference: {0}")]
    InvalidAudioReference(#[from] AudioReferenceError),

    #[error("submission failed: {0}")]
    Remote(#[from] ServiceError),

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
}

/// Entry point for starting recognition jobs and looking them up again.
#[derive(Clone)]
pub struct Speech {
    service: Arc<dyn SpeechService>,
}

impl Speech {
    pub fn new(service: Arc<dyn SpeechService>) -> Self {
        Self { service }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ServiceError> {
        Ok(Self::new(Arc::new(HttpSpeechService::new(config)?)))
    }

    /// Submits audio for asynchronous recognition.
    ///
    /// The audio reference is checked before anything goes over the wire; a
    /// returned job is always pending and must be refreshed by the caller.
    pub async fn recognize_job(
        &self,
        audio: impl Into<RecognitionAudio>,
        config: RecognitionConfig,
    ) -> Result<RecognizeJob, SubmissionError> {
        let audio = AudioSource::try_from(audio.into())?;
        tracing::debug!(
            target: LOG_TARGET,
            encoding = %config.encoding,
            sample_rate = config.sample_rate,
            inline = matches!(audio, AudioSource::Inline(_)),
            "submitting recognition job"
        );

        let operation = self
            .service
            .async_recognize(AsyncRecognizeRequest { config, audio })
            .await?;

        if operation.done() {
            tracing::warn!(target: LOG_TARGET, job = %operation.id(), "submission returned a finished operation");
            return Err(SubmissionError::ProtocolViolation(format!(
                "submission returned operation {} already done",
                operation.id()
            )));
        }

        tracing::info!(target: LOG_TARGET, job = %operation.id(), "recognition job started");
        Ok(RecognizeJob::new(self.service.clone(), operation))
    }

    /// Rebuilds a handle for a job submitted earlier, from its id.
    pub async fn job(&self, id: &str) -> Result<RecognizeJob, RefreshError> {
        let operation = self
            .service
            .get_operation(id.to_owned())
            .await
            .map_err(|e| RefreshError::from_service(id, e))?;

        if operation.id() != id {
            return Err(RefreshError::ProtocolViolation(format!(
                "requested operation {id} but received {}",
                operation.id()
            )));
        }
        Ok(RecognizeJob::new(self.service.clone(), operation))
    }
}
