use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AudioEncoding {
    /// Uncompressed 16-bit signed little-endian samples.
    Linear16,
    Flac,
    Mulaw,
    Amr,
    AmrWb,
    OggOpus,
}

impl AudioEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioEncoding::Linear16 => "LINEAR16",
            AudioEncoding::Flac => "FLAC",
            AudioEncoding::Mulaw => "MULAW",
            AudioEncoding::Amr => "AMR",
            AudioEncoding::AmrWb => "AMR_WB",
            AudioEncoding::OggOpus => "OGG_OPUS",
        }
    }
}

impl fmt::Display for AudioEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown audio encoding: {0}")]
pub struct UnknownEncoding(pub String);

impl FromStr for AudioEncoding {
    type Err = UnknownEncoding;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "raw" | "linear" | "linear16" => Ok(AudioEncoding::Linear16),
            "flac" => Ok(AudioEncoding::Flac),
            "mulaw" | "mu_law" => Ok(AudioEncoding::Mulaw),
            "amr" => Ok(AudioEncoding::Amr),
            "amr_wb" => Ok(AudioEncoding::AmrWb),
            "ogg_opus" | "opus" => Ok(AudioEncoding::OggOpus),
            _ => Err(UnknownEncoding(s.to_owned())),
        }
    }
}

/// Recognition settings sent with a submission. Combinations of encoding and
/// sample rate are not checked locally; the service decides what it accepts.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionConfig {
    pub encoding: AudioEncoding,
    pub sample_rate: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_alternatives: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profanity_filter: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub phrases: Vec<String>,
}

impl RecognitionConfig {
    pub fn new(encoding: AudioEncoding, sample_rate: u32) -> Self {
        Self {
            encoding,
            sample_rate,
            language_code: None,
            max_alternatives: None,
            profanity_filter: None,
            phrases: Vec::new(),
        }
    }

    pub fn with_language<S: Into<String>>(mut self, language_code: S) -> Self {
        self.language_code = Some(language_code.into());
        self
    }

    pub fn with_max_alternatives(mut self, max: u32) -> Self {
        self.max_alternatives = Some(max);
        self
    }

    pub fn with_profanity_filter(mut self, enabled: bool) -> Self {
        self.profanity_filter = Some(enabled);
        self
    }

    pub fn with_phrases<I, S>(mut self, phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.phrases = phrases.into_iter().map(Into::into).collect();
        self
    }
}
