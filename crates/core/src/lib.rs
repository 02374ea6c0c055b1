//! Client for asynchronous speech recognition jobs.
//!
//! Audio is submitted through [`Speech::recognize_job`], which returns a
//! pending [`RecognizeJob`]. The caller drives it forward with
//! [`RecognizeJob::refresh`] (or [`util::wait_until_done`]) and reads the
//! transcript with [`RecognizeJob::results`] once it is done.

pub mod audio;
pub mod config;
pub mod decode;
pub mod job;
pub mod operation;
pub mod recognize;
pub mod service;
pub mod util;

pub use audio::{AudioSource, RecognitionAudio, StorageObject};
pub use decode::{RecognitionResult, SpeechAlternative, Transcript};
pub use job::{JobError, RecognizeJob, RefreshError};
pub use operation::{JobState, Operation};
pub use recognize::{AudioEncoding, RecognitionConfig, Speech, SubmissionError};
pub use service::{ServiceError, SpeechService};
