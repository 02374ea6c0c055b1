use bytes::Bytes;
use cloud_speech_core::audio::{resolve_audio, AudioReferenceError};
use cloud_speech_core::service::AsyncRecognizeRequest;
use cloud_speech_core::{
    AudioEncoding, AudioSource, JobError, Operation, RecognitionAudio, RecognitionConfig,
    ServiceError, Speech, SpeechService, StorageObject, SubmissionError,
};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::{Arc, Mutex};

const JOB_JSON: &str = r#"{"name":"1234567890","metadata":{"typeUrl":"type.googleapis.com/google.cloud.speech.v1beta1.AsyncRecognizeMetadata","value":"CFQSDAi6jKS/BRCwkLafARoMCIeZpL8FEKjRqswC"}}"#;

/// Answers every call with the pending fixture and records what it was asked.
#[derive(Default)]
struct MockSpeechService {
    submitted: Mutex<Vec<AsyncRecognizeRequest>>,
    lookups: Mutex<Vec<String>>,
}

impl MockSpeechService {
    fn total_calls(&self) -> usize {
        self.submitted.lock().unwrap().len() + self.lookups.lock().unwrap().len()
    }
}

fn pending_job() -> Result<Operation, ServiceError> {
    Ok(Operation::from_json(JOB_JSON.as_bytes())?)
}

impl SpeechService for MockSpeechService {
    fn async_recognize(
        &self,
        request: AsyncRecognizeRequest,
    ) -> BoxFuture<'_, Result<Operation, ServiceError>> {
        self.submitted.lock().unwrap().push(request);
        async { pending_job() }.boxed()
    }

    fn get_operation(&self, id: String) -> BoxFuture<'_, Result<Operation, ServiceError>> {
        self.lookups.lock().unwrap().push(id);
        async { pending_job() }.boxed()
    }
}

fn raw_16khz() -> RecognitionConfig {
    RecognitionConfig::new("raw".parse::<AudioEncoding>().unwrap(), 16000)
}

fn fixture_audio() -> Vec<u8> {
    (0..3200u32).map(|i| (i % 251) as u8).collect()
}

async fn assert_submits(audio: impl Into<RecognitionAudio>, expected: AudioSource) {
    let service = Arc::new(MockSpeechService::default());
    let speech = Speech::new(service.clone());

    let job = speech.recognize_job(audio, raw_16khz()).await.unwrap();
    assert!(!job.done());
    assert_eq!(job.id(), "1234567890");

    let submitted = service.submitted.lock().unwrap();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].config.encoding, AudioEncoding::Linear16);
    assert_eq!(submitted[0].config.sample_rate, 16000);
    assert_eq!(submitted[0].audio, expected);
}

#[tokio::test]
async fn recognizes_audio_from_local_file_path() {
    let path = std::env::temp_dir().join(format!("cloud-speech-it-{}.raw", std::process::id()));
    tokio::fs::write(&path, fixture_audio()).await.unwrap();

    let source = resolve_audio(path.to_str().unwrap()).await.unwrap();
    assert_submits(source, AudioSource::Inline(Bytes::from(fixture_audio()))).await;

    tokio::fs::remove_file(&path).await.unwrap();
}

#[tokio::test]
async fn recognizes_inline_audio_bytes() {
    assert_submits(
        AudioSource::inline(fixture_audio()),
        AudioSource::Inline(Bytes::from(fixture_audio())),
    )
    .await;
}

#[tokio::test]
async fn recognizes_audio_from_storage_url() {
    assert_submits(
        AudioSource::uri("gs://some_bucket/audio.raw"),
        AudioSource::uri("gs://some_bucket/audio.raw"),
    )
    .await;
}

#[tokio::test]
async fn recognizes_audio_from_storage_object() {
    struct StorageFile;
    impl StorageObject for StorageFile {
        fn storage_uri(&self) -> String {
            "gs://some_bucket/audio.raw".to_owned()
        }
    }

    assert_submits(
        AudioSource::from_storage(&StorageFile),
        AudioSource::uri("gs://some_bucket/audio.raw"),
    )
    .await;
}

#[tokio::test]
async fn both_content_and_uri_fail_before_any_remote_call() {
    let service = Arc::new(MockSpeechService::default());
    let speech = Speech::new(service.clone());

    let audio = RecognitionAudio {
        content: Some(Bytes::from(fixture_audio())),
        uri: Some("gs://some_bucket/audio.raw".into()),
    };
    let err = speech.recognize_job(audio, raw_16khz()).await.unwrap_err();

    assert!(matches!(
        err,
        SubmissionError::InvalidAudioReference(AudioReferenceError::Ambiguous)
    ));
    assert_eq!(service.total_calls(), 0);
}

#[tokio::test]
async fn pending_job_stays_not_done_across_refreshes() {
    let service = Arc::new(MockSpeechService::default());
    let speech = Speech::new(service.clone());

    let mut job = speech
        .recognize_job(AudioSource::inline(fixture_audio()), raw_16khz())
        .await
        .unwrap();
    for _ in 0..3 {
        job.refresh().await.unwrap();
        assert!(!job.done());
        assert_eq!(job.results(), Err(JobError::NotDone));
    }

    let lookups = service.lookups.lock().unwrap();
    assert_eq!(lookups.as_slice(), ["1234567890"; 3]);
}

#[tokio::test]
async fn pending_job_reports_service_progress() {
    let speech = Speech::new(Arc::new(MockSpeechService::default()));

    let job = speech.job("1234567890").await.unwrap();
    let metadata = job.metadata().unwrap().unwrap();
    assert_eq!(metadata.progress_percent, 84);
    assert!(metadata.last_update_time > metadata.start_time);
}
