use crate::audio::AudioSource;
use std::path::PathBuf;

const LOG_TARGET: &str = "audio";

pub const STORAGE_URI_SCHEME: &str = "gs://";

#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    #[error("audio input must not be empty")]
    Empty,

    #[error("failed to read audio file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Maps a command-line style input to an [`AudioSource`]: storage URIs are
/// passed through, anything else is read from the local filesystem.
pub async fn resolve_audio(input: &str) -> Result<AudioSource, ResolveError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ResolveError::Empty);
    }

    if input.starts_with(STORAGE_URI_SCHEME) {
        tracing::debug!(target: LOG_TARGET, uri = %input, "using storage uri as audio source");
        return Ok(AudioSource::Uri(input.to_owned()));
    }

    let path = PathBuf::from(input);
    let content = tokio::fs::read(&path)
        .await
        .map_err(|source| ResolveError::Io {
            path: path.clone(),
            source,
        })?;
    tracing::debug!(target: LOG_TARGET, path = %path.display(), bytes = content.len(), "read inline audio");
    Ok(AudioSource::inline(content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn storage_uri_is_passed_through() {
        let source = resolve_audio("gs://some_bucket/audio.raw").await.unwrap();
        assert_eq!(source, AudioSource::uri("gs://some_bucket/audio.raw"));
    }

    #[tokio::test]
    async fn local_file_is_read_inline() {
        let path = std::env::temp_dir().join(format!(
            "cloud-speech-resolve-{}.raw",
            std::process::id()
        ));
        tokio::fs::write(&path, [0u8, 1, 2, 3]).await.unwrap();

        let source = resolve_audio(path.to_str().unwrap()).await.unwrap();
        assert_eq!(source, AudioSource::inline(vec![0u8, 1, 2, 3]));

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn missing_file_reports_path() {
        let err = resolve_audio("/definitely/not/here.raw").await.unwrap_err();
        assert!(matches!(err, ResolveError::Io { .. }));
        assert!(err.to_string().contains("/definitely/not/here.raw"));
    }

    #[tokio::test]
    async fn blank_input_is_rejected() {
        assert!(matches!(resolve_audio("  ").await, Err(ResolveError::Empty)));
    }
}
