//! Long-running operation envelope.
//!
//! An [`Operation`] is the server's record of one asynchronous job: an opaque
//! id, optional progress metadata, and once the job is finished exactly one of
//! a success payload or a failure status. `done` is derived from the presence
//! of a result, so a finished envelope without a result cannot be built.

mod wire;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Typed opaque payload: a type identifier plus the serialized message bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Any {
    pub type_url: String,
    pub value: Bytes,
}

impl Any {
    pub fn new<S: Into<String>, B: Into<Bytes>>(type_url: S, value: B) -> Self {
        Self {
            type_url: type_url.into(),
            value: value.into(),
        }
    }

    pub fn is(&self, type_url: &str) -> bool {
        self.type_url == type_url
    }
}

/// Failure payload of a finished operation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Status {
    pub code: i32,
    pub message: String,
}

impl Status {
    pub fn new<S: Into<String>>(code: i32, message: S) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OperationResult {
    Response(Any),
    Error(Status),
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobState::Pending)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("malformed operation envelope: {0}")]
    MalformedEnvelope(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "wire::WireOperation", into = "wire::WireOperation")]
pub struct Operation {
    id: String,
    metadata: Option<Any>,
    result: Option<OperationResult>,
}

impl Operation {
    pub fn pending<S: Into<String>>(id: S) -> Self {
        Self {
            id: id.into(),
            metadata: None,
            result: None,
        }
    }

    pub fn completed<S: Into<String>>(id: S, result: OperationResult) -> Self {
        Self {
            id: id.into(),
            metadata: None,
            result: Some(result),
        }
    }

    pub fn with_metadata(mut self, metadata: Any) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn done(&self) -> bool {
        self.result.is_some()
    }

    pub fn metadata(&self) -> Option<&Any> {
        self.metadata.as_ref()
    }

    pub fn result(&self) -> Option<&OperationResult> {
        self.result.as_ref()
    }

    pub fn response(&self) -> Option<&Any> {
        match &self.result {
            Some(OperationResult::Response(any)) => Some(any),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&Status> {
        match &self.result {
            Some(OperationResult::Error(status)) => Some(status),
            _ => None,
        }
    }

    pub fn state(&self) -> JobState {
        match &self.result {
            None => JobState::Pending,
            Some(OperationResult::Response(_)) => JobState::Succeeded,
            Some(OperationResult::Error(_)) => JobState::Failed,
        }
    }

    /// Decodes the JSON wire form, enforcing the envelope invariants.
    pub fn from_json(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        serde_json::from_slice(bytes).map_err(|e| EnvelopeError::MalformedEnvelope(e.to_string()))
    }

    pub fn to_json(&self) -> String {
        // Serializing strings, bools, and integers cannot fail.
        serde_json::to_string(&wire::WireOperation::from(self.clone())).unwrap_or_default()
    }
}
