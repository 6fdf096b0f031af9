use std::path::PathBuf;

use chrono::Local;
use serde::Serialize;
use tracing::{info, warn};

use crate::audio::recorder::Recorder;
use crate::audio::wav::{self, WavSpec};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::recognition::{RecognitionOutcome, SongRecognizer};

/// Below this share of non-zero bytes a capture is most likely silence.
const QUIET_CAPTURE_RATIO: f32 = 0.1;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyResult {
    pub outcome: RecognitionOutcome,
    pub duration_secs: f32,
    pub audio_path: Option<String>,
}

/// Drives one capture → encode → upload → interpret attempt at a time.
///
/// The recorder is passed in by the caller so the device lifecycle stays
/// with whoever owns the microphone.
pub struct AudioSearch<R> {
    config: AppConfig,
    recognizer: R,
}

impl<R: SongRecognizer> AudioSearch<R> {
    pub fn new(config: AppConfig, recognizer: R) -> Self {
        Self { config, recognizer }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn recognizer(&self) -> &R {
        &self.recognizer
    }

    /// Stop the recorder and identify what it captured. The buffer stays in
    /// the recorder, so a retryable outcome can be followed by [`Self::retry`].
    pub async fn stop_and_identify(&self, recorder: &mut Recorder) -> Result<IdentifyResult, AppError> {
        recorder.stop().await?;
        self.retry(recorder).await
    }

    /// Upload the recorder's last finished recording again.
    pub async fn retry(&self, recorder: &Recorder) -> Result<IdentifyResult, AppError> {
        let pcm = recorder
            .recording()
            .ok_or_else(|| AppError::Audio("No recording available".into()))?;
        info!("[recognize] identifying recording of {} bytes", pcm.len());
        self.identify_pcm(pcm).await
    }

    /// Wrap captured PCM (44.1kHz mono s16le) in WAV and identify it.
    pub async fn identify_pcm(&self, pcm: &[u8]) -> Result<IdentifyResult, AppError> {
        if pcm.is_empty() {
            return Err(AppError::MalformedInput("no audio captured".into()));
        }

        let spec = WavSpec::RECOGNITION;
        let duration_secs = wav::pcm_duration(pcm.len(), spec);
        if duration_secs < self.config.min_recording_secs as f32 {
            return Err(AppError::RecordingTooShort {
                actual_secs: duration_secs,
                min_secs: self.config.min_recording_secs,
            });
        }

        let ratio = wav::nonzero_ratio(pcm);
        if ratio < QUIET_CAPTURE_RATIO {
            warn!("[recognize] capture is mostly silent (non-zero ratio {ratio:.3})");
        }

        let audio_path = if self.config.save_recordings {
            Some(self.save_recording(pcm, duration_secs)?)
        } else {
            None
        };

        let wav_data = wav::encode_pcm(pcm, spec);
        let outcome = self.identify_wav(&wav_data).await?;

        Ok(IdentifyResult {
            outcome,
            duration_secs,
            audio_path: audio_path.map(|p| p.display().to_string()),
        })
    }

    /// Upload an already-encoded WAV, bounded by the configured timeout.
    pub async fn identify_wav(&self, wav_data: &[u8]) -> Result<RecognitionOutcome, AppError> {
        info!(
            "[recognize] identifying {} bytes via {}",
            wav_data.len(),
            self.recognizer.provider_name()
        );
        tokio::time::timeout(self.config.timeout(), self.recognizer.recognize(wav_data))
            .await
            .map_err(|_| AppError::Timeout(self.config.timeout_secs))?
    }

    fn save_recording(&self, pcm: &[u8], duration_secs: f32) -> Result<PathBuf, AppError> {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let path = self
            .config
            .recordings_dir()
            .join(format!("recording_{timestamp}_{}s.wav", duration_secs.round() as u64));
        let written = wav::write_wav_file(&path, pcm, WavSpec::RECOGNITION)?;
        info!("[recording] saved WAV: {} ({} bytes)", path.display(), written);
        Ok(path)
    }
}
