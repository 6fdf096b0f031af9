use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use reqwest::multipart;
use tracing::{debug, info, warn};

use super::response;
use super::signature::{self, DATA_TYPE, HTTP_URI, SIGNATURE_VERSION};
use super::{Credentials, RecognitionOutcome, SongRecognizer};
use crate::audio::wav;
use crate::config::AppConfig;
use crate::error::AppError;

/// ACRCloud identify client (signature version 1).
///
/// One client owns one connection pool; it is cheap to share behind an
/// `Arc` and safe to call from several tasks at once.
pub struct AcrCloudClient {
    credentials: Credentials,
    endpoint: String,
    timeout: Duration,
    client: reqwest::Client,
}

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

impl AcrCloudClient {
    pub fn new(credentials: Credentials, host: &str, timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            credentials,
            endpoint: format!("{}{HTTP_URI}", host.trim().trim_end_matches('/')),
            timeout,
            client,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        Self::new(config.credentials(), &config.host, config.timeout())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Identify `wav` with explicit credentials, signing with the current time.
    pub async fn recognize_with(
        &self,
        wav_data: &[u8],
        credentials: &Credentials,
    ) -> Result<RecognitionOutcome, AppError> {
        self.recognize_at(wav_data, credentials, chrono::Utc::now().timestamp())
            .await
    }

    /// Identify `wav` using a caller-chosen signing timestamp (unix seconds).
    pub async fn recognize_at(
        &self,
        wav_data: &[u8],
        credentials: &Credentials,
        timestamp: i64,
    ) -> Result<RecognitionOutcome, AppError> {
        if wav_data.is_empty() {
            return Err(AppError::MalformedInput("audio payload is empty".into()));
        }
        credentials.validate()?;

        if !wav::is_wav(wav_data) {
            warn!("[recognize] payload has no RIFF/WAVE header; the service may reject it");
        }
        if credentials.access_key.len() < 8 || credentials.access_secret.len() < 8 {
            warn!(
                "[recognize] access key ({} chars) or secret ({} chars) looks too short",
                credentials.access_key.len(),
                credentials.access_secret.len()
            );
        }

        let request_id = NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed);
        info!(
            "[recognize] request_id={} endpoint={} key={} bytes={} ({:.1} KB)",
            request_id,
            self.endpoint,
            credentials.masked_key(),
            wav_data.len(),
            wav_data.len() as f64 / 1024.0
        );

        let form = build_form(wav_data, credentials, timestamp)?;

        let started = Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        debug!(
            "[recognize] request_id={} status={} latency_ms={}",
            request_id,
            status,
            started.elapsed().as_millis()
        );

        if !status.is_success() {
            warn!("[recognize] HTTP {status}: {body}");
        }

        let outcome = response::interpret(status.as_u16(), &body)?;
        match &outcome {
            RecognitionOutcome::Matched { song } => info!(
                "[recognize] request_id={} matched \"{}\" by {}",
                request_id,
                song.title,
                song.artists_string()
            ),
            other => info!("[recognize] request_id={} outcome={:?}", request_id, other),
        }
        Ok(outcome)
    }

    fn transport_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Timeout(self.timeout.as_secs())
        } else {
            AppError::Network(e)
        }
    }
}

/// Multipart body with the field names the identify endpoint expects.
pub fn build_form(
    wav_data: &[u8],
    credentials: &Credentials,
    timestamp: i64,
) -> Result<multipart::Form, AppError> {
    let signature =
        signature::sign_request(&credentials.access_key, &credentials.access_secret, timestamp)?;

    let sample = multipart::Part::bytes(wav_data.to_vec())
        .file_name("recording.wav")
        .mime_str("audio/wav")
        .map_err(|e| AppError::Recognition(format!("Failed to create multipart: {e}")))?;

    Ok(multipart::Form::new()
        .text("access_key", credentials.access_key.clone())
        .text("access_secret", credentials.access_secret.clone())
        .text("data_type", DATA_TYPE)
        .text("signature_version", SIGNATURE_VERSION)
        .text("timestamp", timestamp.to_string())
        .text("signature", signature)
        .text("sample_bytes", wav_data.len().to_string())
        .part("sample", sample))
}

impl SongRecognizer for AcrCloudClient {
    async fn recognize(&self, wav_data: &[u8]) -> Result<RecognitionOutcome, AppError> {
        self.recognize_with(wav_data, &self.credentials).await
    }

    fn provider_name(&self) -> &str {
        "ACRCloud"
    }
}
