use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Recognition error: {0}")]
    Recognition(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Recording too short: {actual_secs:.1}s captured, at least {min_secs}s required")]
    RecordingTooShort { actual_secs: f32, min_secs: u64 },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Security error: {0}")]
    Security(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
