pub mod acrcloud;
pub mod response;
pub mod signature;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Access key / secret pair issued by the recognition provider.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub access_key: String,
    pub access_secret: String,
}

impl Credentials {
    pub fn new(access_key: impl Into<String>, access_secret: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            access_secret: access_secret.into(),
        }
    }

    /// Both halves must be non-blank.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.access_key.trim().is_empty() || self.access_secret.trim().is_empty() {
            return Err(AppError::MalformedInput(
                "access key and secret must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Key shortened for logs, e.g. `b3e2****0d6b`.
    pub fn masked_key(&self) -> String {
        mask_secret(&self.access_key)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &mask_secret(&self.access_key))
            .field("access_secret", &mask_secret(&self.access_secret))
            .finish()
    }
}

pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}****{tail}")
    } else {
        "****".to_string()
    }
}

/// Cross-references to streaming platforms and registries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIds {
    pub spotify: Option<String>,
    pub youtube: Option<String>,
    pub isrc: Option<String>,
}

/// Metadata for the best match returned by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognizedSong {
    pub title: String,
    pub artists: Vec<String>,
    pub album: Option<String>,
    pub duration_ms: u64,
    pub genres: Vec<String>,
    pub release_date: Option<String>,
    pub external_ids: ExternalIds,
}

impl RecognizedSong {
    pub fn artists_string(&self) -> String {
        self.artists.join(", ")
    }

    pub fn genres_string(&self) -> Option<String> {
        if self.genres.is_empty() {
            None
        } else {
            Some(self.genres.join(", "))
        }
    }

    /// `m:ss`, or `h:mm:ss` for anything an hour or longer.
    pub fn formatted_duration(&self) -> String {
        let total_secs = self.duration_ms / 1000;
        let hours = total_secs / 3600;
        let minutes = (total_secs / 60) % 60;
        let seconds = total_secs % 60;
        if hours > 0 {
            format!("{hours}:{minutes:02}:{seconds:02}")
        } else {
            format!("{minutes}:{seconds:02}")
        }
    }
}

/// Why the provider found nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotFoundReason {
    /// The fingerprint was fine but matched no catalogue entry.
    NoMatch,
    /// No fingerprint could be extracted: too short, too quiet, or not music.
    UnusableSample,
}

/// Result of one recognition attempt, derived from the embedded status
/// code and the HTTP status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecognitionOutcome {
    Matched { song: RecognizedSong },
    NotFound { reason: NotFoundReason },
    InvalidCredentials { message: String },
    QuotaExceeded { message: String },
    RateLimited,
    ServiceUnavailable,
    TransientNetworkError { status: u16, body: String },
    UnknownError { code: i64, message: String },
}

impl RecognitionOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, RecognitionOutcome::Matched { .. })
    }

    pub fn song(&self) -> Option<&RecognizedSong> {
        match self {
            RecognitionOutcome::Matched { song } => Some(song),
            _ => None,
        }
    }

    /// Outcomes where trying again later may succeed without user action.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RecognitionOutcome::RateLimited
                | RecognitionOutcome::ServiceUnavailable
                | RecognitionOutcome::TransientNetworkError { .. }
        )
    }

    pub fn user_message(&self) -> String {
        match self {
            RecognitionOutcome::Matched { song } => {
                format!("{} - {}", song.title, song.artists_string())
            }
            RecognitionOutcome::NotFound {
                reason: NotFoundReason::NoMatch,
            } => "No matching song found".to_string(),
            RecognitionOutcome::NotFound {
                reason: NotFoundReason::UnusableSample,
            } => "Could not fingerprint the recording. Record at least 10 seconds of clearly \
                  audible music in a quiet place, at a moderate volume."
                .to_string(),
            RecognitionOutcome::InvalidCredentials { message } => {
                format!("Recognition service rejected the API credentials: {message}")
            }
            RecognitionOutcome::QuotaExceeded { message } => {
                format!("Recognition quota used up: {message}")
            }
            RecognitionOutcome::RateLimited => {
                "Too many requests, please try again later".to_string()
            }
            RecognitionOutcome::ServiceUnavailable => {
                "Recognition service is unavailable".to_string()
            }
            RecognitionOutcome::TransientNetworkError { status, body } => {
                format!("Recognition request failed (HTTP {status}): {body}")
            }
            RecognitionOutcome::UnknownError { code, message } => {
                format!("Recognition failed: {message} (code {code})")
            }
        }
    }
}

/// A remote service that turns a WAV clip into a song match.
#[allow(async_fn_in_trait)]
pub trait SongRecognizer: Send + Sync {
    /// Identify a complete WAV file.
    async fn recognize(&self, wav: &[u8]) -> Result<RecognitionOutcome, AppError>;

    fn provider_name(&self) -> &str;
}
