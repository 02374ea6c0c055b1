//! Caller-facing handle for one asynchronous recognition job.
//!
//! A [`RecognizeJob`] owns the most recently fetched [`Operation`] and nothing
//! else. It never polls on its own: state only moves forward when the caller
//! awaits [`RecognizeJob::refresh`], which swaps in a whole new envelope.
//! `refresh` takes `&mut self`, so a reader can never observe half of one
//! envelope and half of another; sharing a job across tasks needs the
//! caller's own lock.

use crate::decode::{self, DecodeError, RecognizeMetadata, Transcript};
use crate::operation::{EnvelopeError, JobState, Operation, Status};
use crate::service::{ServiceError, SpeechService};
use std::fmt;
use std::sync::Arc;

const LOG_TARGET: &str = "job";

#[derive(thiserror::Error, Debug)]
pub enum RefreshError {
    #[error("operation {0} not found")]
    NotFound(String),

    #[error("transport error: {0}")]
    Transport(#[source] ServiceError),

    #[error(transparent)]
    MalformedEnvelope(EnvelopeError),

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
}

impl RefreshError {
    pub(crate) fn from_service(id: &str, err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(_) => RefreshError::NotFound(id.to_owned()),
            ServiceError::Envelope(e) => RefreshError::MalformedEnvelope(e),
            other => RefreshError::Transport(other),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("job is not done yet")]
    NotDone,

    #[error("recognition failed with code {}: {}", .0.code, .0.message)]
    Remote(Status),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

pub struct RecognizeJob {
    service: Arc<dyn SpeechService>,
    operation: Operation,
}

impl fmt::Debug for RecognizeJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecognizeJob")
            .field("operation", &self.operation)
            .finish_non_exhaustive()
    }
}

impl RecognizeJob {
    pub(crate) fn new(service: Arc<dyn SpeechService>, operation: Operation) -> Self {
        Self { service, operation }
    }

    pub fn id(&self) -> &str {
        self.operation.id()
    }

    pub fn done(&self) -> bool {
        self.operation.done()
    }

    pub fn state(&self) -> JobState {
        self.operation.state()
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// The failure reported by the service, if the job finished unsuccessfully.
    pub fn error(&self) -> Option<&Status> {
        self.operation.error()
    }

    /// Progress metadata from the last fetched envelope, if the service sent any.
    pub fn metadata(&self) -> Result<Option<RecognizeMetadata>, DecodeError> {
        self.operation
            .metadata()
            .map(decode::decode_metadata)
            .transpose()
    }

    /// Decodes the held result. Never touches the network; call
    /// [`refresh`](Self::refresh) first if [`done`](Self::done) is false.
    pub fn results(&self) -> Result<Transcript, JobError> {
        if let Some(status) = self.operation.error() {
            return Err(JobError::Remote(status.clone()));
        }
        match self.operation.response() {
            Some(payload) => Ok(decode::decode_response(payload)?),
            None => Err(JobError::NotDone),
        }
    }

    /// Fetches the latest envelope and replaces the held one. On any error the
    /// held envelope is left untouched.
    pub async fn refresh(&mut self) -> Result<(), RefreshError> {
        let id = self.operation.id().to_owned();
        let fetched = self
            .service
            .get_operation(id.clone())
            .await
            .map_err(|e| RefreshError::from_service(&id, e))?;

        if let Err(violation) = check_transition(&self.operation, &fetched) {
            tracing::warn!(target: LOG_TARGET, job = %id, %violation, "rejecting refreshed envelope");
            return Err(RefreshError::ProtocolViolation(violation));
        }

        tracing::debug!(
            target: LOG_TARGET,
            job = %id,
            state = ?fetched.state(),
            "job refreshed"
        );
        self.operation = fetched;
        Ok(())
    }
}

/// Pending may move anywhere; a finished job must stay finished the same way.
fn check_transition(held: &Operation, fetched: &Operation) -> Result<(), String> {
    if fetched.id() != held.id() {
        return Err(format!(
            "requested operation {} but received {}",
            held.id(),
            fetched.id()
        ));
    }
    let (from, to) = (held.state(), fetched.state());
    if from.is_terminal() && from != to {
        return Err(format!(
            "operation {} moved from {from:?} to {to:?}",
            held.id()
        ));
    }
    Ok(())
}
