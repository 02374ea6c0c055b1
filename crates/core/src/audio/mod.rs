mod resolve;

use bytes::Bytes;

pub use resolve::{resolve_audio, ResolveError, STORAGE_URI_SCHEME};

/// Canonical audio reference accepted by a submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AudioSource {
    Inline(Bytes),
    Uri(String),
}

impl AudioSource {
    pub fn inline<B: Into<Bytes>>(content: B) -> Self {
        Self::Inline(content.into())
    }

    pub fn uri<S: Into<String>>(uri: S) -> Self {
        Self::Uri(uri.into())
    }

    pub fn from_storage(object: &impl StorageObject) -> Self {
        Self::Uri(object.storage_uri())
    }
}

/// Anything that lives in remote storage and can name itself with a URI.
pub trait StorageObject {
    fn storage_uri(&self) -> String;
}

/// Request-shaped audio reference. Exactly one field must be set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecognitionAudio {
    pub content: Option<Bytes>,
    pub uri: Option<String>,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioReferenceError {
    #[error("audio reference sets both inline content and a uri")]
    Ambiguous,
    #[error("audio reference sets neither inline content nor a uri")]
    Missing,
}

impl From<AudioSource> for RecognitionAudio {
    fn from(source: AudioSource) -> Self {
        match source {
            AudioSource::Inline(content) => Self {
                content: Some(content),
                uri: None,
            },
            AudioSource::Uri(uri) => Self {
                content: None,
                uri: Some(uri),
            },
        }
    }
}

impl TryFrom<RecognitionAudio> for AudioSource {
    type Error = AudioReferenceError;

    fn try_from(audio: RecognitionAudio) -> Result<Self, Self::Error> {
        match (audio.content, audio.uri) {
            (Some(content), None) => Ok(AudioSource::Inline(content)),
            (None, Some(uri)) => Ok(AudioSource::Uri(uri)),
            (Some(_), Some(_)) => Err(AudioReferenceError::Ambiguous),
            (None, None) => Err(AudioReferenceError::Missing),
        }
    }
}
