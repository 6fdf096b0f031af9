pub mod audio;
pub mod config;
pub mod error;
pub mod logger;
pub mod recognition;
#[cfg(feature = "keychain")]
pub mod security;
pub mod session;

pub use audio::recorder::{Recorder, RecordingStatus};
pub use audio::wav::{encode_pcm, WavSpec};
pub use config::AppConfig;
pub use error::AppError;
pub use recognition::acrcloud::AcrCloudClient;
pub use recognition::{
    Credentials, NotFoundReason, RecognitionOutcome, RecognizedSong, SongRecognizer,
};
pub use session::{AudioSearch, IdentifyResult};

/// Identify a WAV clip with the given credentials against `config.host`.
///
/// Builds a fresh client per call; keep an [`AcrCloudClient`] around to
/// reuse its connection pool instead.
pub async fn recognize(
    wav: &[u8],
    credentials: &Credentials,
    config: &AppConfig,
) -> Result<RecognitionOutcome, AppError> {
    let client = AcrCloudClient::new(credentials.clone(), &config.host, config.timeout())?;
    client.recognize_with(wav, credentials).await
}
