//! Wire messages for the speech payloads carried in operation `Any` fields.
//!
//! Field tags follow the service's `google.cloud.speech.v1beta1` schema.

use prost::Message;

#[derive(Clone, PartialEq, Message)]
pub(super) struct AsyncRecognizeResponseProto {
    #[prost(message, repeated, tag = "2")]
    pub results: Vec<SpeechRecognitionResultProto>,
}

#[derive(Clone, PartialEq, Message)]
pub(super) struct SpeechRecognitionResultProto {
    #[prost(message, repeated, tag = "1")]
    pub alternatives: Vec<SpeechRecognitionAlternativeProto>,
}

#[derive(Clone, PartialEq, Message)]
pub(super) struct SpeechRecognitionAlternativeProto {
    #[prost(string, tag = "1")]
    pub transcript: String,
    #[prost(float, tag = "2")]
    pub confidence: f32,
}

#[derive(Clone, PartialEq, Message)]
pub(super) struct AsyncRecognizeMetadataProto {
    #[prost(int32, tag = "1")]
    pub progress_percent: i32,
    #[prost(message, optional, tag = "2")]
    pub start_time: Option<TimestampProto>,
    #[prost(message, optional, tag = "3")]
    pub last_update_time: Option<TimestampProto>,
}

/// `google.protobuf.Timestamp`
#[derive(Clone, Copy, PartialEq, Message)]
pub(super) struct TimestampProto {
    #[prost(int64, tag = "1")]
    pub seconds: i64,
    #[prost(int32, tag = "2")]
    pub nanos: i32,
}
