//! Decoding of typed operation payloads into recognition results.
//!
//! Dispatch is an explicit match on the payload's type identifier. Anything
//! this client does not know about surfaces as
//! [`DecodeError::UnsupportedResultType`] rather than being guessed at.
//! Payload bytes are the service's protobuf messages, see [`proto`].

mod proto;

use crate::operation::Any;
use prost::Message;
use proto::{
    AsyncRecognizeMetadataProto, AsyncRecognizeResponseProto, SpeechRecognitionAlternativeProto,
    SpeechRecognitionResultProto, TimestampProto,
};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const ASYNC_RECOGNIZE_RESPONSE_TYPE: &str =
    "type.googleapis.com/google.cloud.speech.v1beta1.AsyncRecognizeResponse";
pub const ASYNC_RECOGNIZE_METADATA_TYPE: &str =
    "type.googleapis.com/google.cloud.speech.v1beta1.AsyncRecognizeMetadata";

const NANOS_PER_SECOND: i32 = 1_000_000_000;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SpeechAlternative {
    pub transcript: String,
    #[serde(default)]
    pub confidence: f32,
}

/// One utterance segment; alternatives are ordered most likely first.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct RecognitionResult {
    #[serde(default)]
    pub alternatives: Vec<SpeechAlternative>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Transcript {
    #[serde(default)]
    pub results: Vec<RecognitionResult>,
}

impl Transcript {
    pub fn new(results: Vec<RecognitionResult>) -> Self {
        Self { results }
    }

    pub fn is_empty(&self) -> bool {
        self.results.iter().all(|r| r.alternatives.is_empty())
    }

    /// Top alternative of every segment, joined in order.
    pub fn best_transcript(&self) -> String {
        self.results
            .iter()
            .filter_map(|r| r.alternatives.first())
            .map(|a| a.transcript.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecognizeMetadata {
    pub progress_percent: i32,
    pub start_time: Option<SystemTime>,
    pub last_update_time: Option<SystemTime>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Response(Transcript),
    Metadata(RecognizeMetadata),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unsupported result type: {0}")]
    UnsupportedResultType(String),

    #[error("malformed result payload: {0}")]
    MalformedResult(String),
}

pub type Result<T> = std::result::Result<T, DecodeError>;

pub fn decode(payload: &Any) -> Result<Payload> {
    match payload.type_url.as_str() {
        ASYNC_RECOGNIZE_RESPONSE_TYPE => parse_transcript(&payload.value).map(Payload::Response),
        ASYNC_RECOGNIZE_METADATA_TYPE => parse_metadata(&payload.value).map(Payload::Metadata),
        other => Err(DecodeError::UnsupportedResultType(other.to_owned())),
    }
}

pub fn decode_response(payload: &Any) -> Result<Transcript> {
    match decode(payload)? {
        Payload::Response(transcript) => Ok(transcript),
        Payload::Metadata(_) => Err(DecodeError::UnsupportedResultType(
            payload.type_url.clone(),
        )),
    }
}

pub fn decode_metadata(payload: &Any) -> Result<RecognizeMetadata> {
    match decode(payload)? {
        Payload::Metadata(metadata) => Ok(metadata),
        Payload::Response(_) => Err(DecodeError::UnsupportedResultType(
            payload.type_url.clone(),
        )),
    }
}

pub fn encode_response(transcript: &Transcript) -> Any {
    let message = AsyncRecognizeResponseProto {
        results: transcript
            .results
            .iter()
            .map(|result| SpeechRecognitionResultProto {
                alternatives: result
                    .alternatives
                    .iter()
                    .map(|a| SpeechRecognitionAlternativeProto {
                        transcript: a.transcript.clone(),
                        confidence: a.confidence,
                    })
                    .collect(),
            })
            .collect(),
    };
    Any::new(ASYNC_RECOGNIZE_RESPONSE_TYPE, message.encode_to_vec())
}

/// Times before the epoch or beyond `i64` seconds are not representable and
/// are dropped.
pub fn encode_metadata(metadata: &RecognizeMetadata) -> Any {
    let message = AsyncRecognizeMetadataProto {
        progress_percent: metadata.progress_percent,
        start_time: metadata.start_time.and_then(to_timestamp),
        last_update_time: metadata.last_update_time.and_then(to_timestamp),
    };
    Any::new(ASYNC_RECOGNIZE_METADATA_TYPE, message.encode_to_vec())
}

fn malformed(e: prost::DecodeError) -> DecodeError {
    DecodeError::MalformedResult(e.to_string())
}

fn parse_transcript(bytes: &[u8]) -> Result<Transcript> {
    let message = AsyncRecognizeResponseProto::decode(bytes).map_err(malformed)?;
    let mut results = Vec::with_capacity(message.results.len());
    for (segment, result) in message.results.into_iter().enumerate() {
        let mut alternatives = Vec::with_capacity(result.alternatives.len());
        for alternative in result.alternatives {
            if !(0.0..=1.0).contains(&alternative.confidence) {
                return Err(DecodeError::MalformedResult(format!(
                    "confidence {} out of range in segment {segment}",
                    alternative.confidence
                )));
            }
            alternatives.push(SpeechAlternative {
                transcript: alternative.transcript,
                confidence: alternative.confidence,
            });
        }
        results.push(RecognitionResult { alternatives });
    }
    Ok(Transcript { results })
}

fn parse_metadata(bytes: &[u8]) -> Result<RecognizeMetadata> {
    let message = AsyncRecognizeMetadataProto::decode(bytes).map_err(malformed)?;
    Ok(RecognizeMetadata {
        progress_percent: message.progress_percent,
        start_time: message.start_time.map(from_timestamp).transpose()?,
        last_update_time: message.last_update_time.map(from_timestamp).transpose()?,
    })
}

fn from_timestamp(ts: TimestampProto) -> Result<SystemTime> {
    if !(0..NANOS_PER_SECOND).contains(&ts.nanos) {
        return Err(DecodeError::MalformedResult(format!(
            "timestamp nanos {} out of range",
            ts.nanos
        )));
    }
    let offset = Duration::from_secs(ts.seconds.unsigned_abs());
    let whole = if ts.seconds >= 0 {
        UNIX_EPOCH.checked_add(offset)
    } else {
        UNIX_EPOCH.checked_sub(offset)
    };
    whole
        .and_then(|t| t.checked_add(Duration::from_nanos(ts.nanos as u64)))
        .ok_or_else(|| {
            DecodeError::MalformedResult(format!("timestamp {}s not representable", ts.seconds))
        })
}

fn to_timestamp(time: SystemTime) -> Option<TimestampProto> {
    let since_epoch = time.duration_since(UNIX_EPOCH).ok()?;
    Some(TimestampProto {
        seconds: i64::try_from(since_epoch.as_secs()).ok()?,
        nanos: since_epoch.subsec_nanos() as i32,
    })
}
