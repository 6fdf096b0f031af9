//! Configuration loading.
//!
//! Resolution order for the config file:
//! 1. Explicit path (CLI `--config`)
//! 2. `AUDIOSEARCH_CONFIG` environment variable
//! 3. `<platform config dir>/audiosearch/config.toml`
//!
//! A missing file means defaults. Credential and host environment variables
//! override whatever the file says.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AppError;
use crate::recognition::Credentials;

pub const DEFAULT_HOST: &str = "https://identify-us-west-2.acrcloud.com";

/// Regional identify hosts; accounts are bound to the region they were created in.
pub const KNOWN_HOSTS: [&str; 4] = [
    "https://identify-us-west-2.acrcloud.com",
    "https://identify-eu-west-1.acrcloud.com",
    "https://identify-ap-southeast-1.acrcloud.com",
    "https://identify-cn-north-1.acrcloud.cn",
];

pub const ENV_CONFIG_PATH: &str = "AUDIOSEARCH_CONFIG";
pub const ENV_ACCESS_KEY: &str = "AUDIOSEARCH_ACCESS_KEY";
pub const ENV_ACCESS_SECRET: &str = "AUDIOSEARCH_ACCESS_SECRET";
pub const ENV_HOST: &str = "AUDIOSEARCH_HOST";

const MIN_TIMEOUT_SECS: u64 = 5;
const MAX_TIMEOUT_SECS: u64 = 180;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub access_key: String,
    pub access_secret: String,
    pub host: String,
    pub timeout_secs: u64,
    pub min_recording_secs: u64,
    pub max_recording_secs: u64,
    /// Where recordings are kept when `save_recordings` is on.
    pub recordings_dir: Option<PathBuf>,
    pub save_recordings: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            access_key: String::new(),
            access_secret: String::new(),
            host: DEFAULT_HOST.to_string(),
            timeout_secs: 30,
            min_recording_secs: 3,
            max_recording_secs: 30,
            recordings_dir: None,
            save_recordings: false,
        }
    }
}

impl AppConfig {
    /// Parse TOML and normalise the result.
    pub fn from_toml_str(content: &str) -> Result<Self, AppError> {
        let config: AppConfig = toml::from_str(content)?;
        Ok(config.normalized())
    }

    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Load from the first config file found, then apply environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self, AppError> {
        let config = match resolve_config_path(explicit) {
            Some(path) if path.exists() => {
                debug!("[config] loading {}", path.display());
                Self::from_file(&path)?
            }
            Some(path) if explicit.is_some() => {
                return Err(AppError::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            _ => {
                debug!("[config] no config file, using defaults");
                Self::default()
            }
        };
        Ok(config.with_overrides(|name| std::env::var(name).ok()))
    }

    /// Apply `AUDIOSEARCH_*` overrides from `lookup` (the process environment in `load`).
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(key) = lookup(ENV_ACCESS_KEY) {
            self.access_key = key;
        }
        if let Some(secret) = lookup(ENV_ACCESS_SECRET) {
            self.access_secret = secret;
        }
        if let Some(host) = lookup(ENV_HOST) {
            self.host = host;
        }
        self.normalized()
    }

    /// Trim credentials and host, drop a trailing slash, clamp the timeout.
    pub fn normalized(mut self) -> Self {
        self.access_key = self.access_key.trim().to_string();
        self.access_secret = self.access_secret.trim().to_string();
        self.host = normalize_host(&self.host);
        self.timeout_secs = self.timeout_secs.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS);
        if self.max_recording_secs < self.min_recording_secs {
            self.max_recording_secs = self.min_recording_secs;
        }
        self
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.access_key.clone(), self.access_secret.clone())
    }

    pub fn has_credentials(&self) -> bool {
        !self.access_key.is_empty() && !self.access_secret.is_empty()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn min_recording(&self) -> Duration {
        Duration::from_secs(self.min_recording_secs)
    }

    pub fn max_recording(&self) -> Duration {
        Duration::from_secs(self.max_recording_secs)
    }

    /// Directory for saved recordings: the configured one or the platform data dir.
    pub fn recordings_dir(&self) -> PathBuf {
        self.recordings_dir.clone().unwrap_or_else(default_recordings_dir)
    }

    /// Use the keychain secret for `access_key` when the config carries none.
    #[cfg(feature = "keychain")]
    pub fn with_keychain_secret(
        mut self,
        store: &crate::security::keystore::KeyStore,
    ) -> Result<Self, AppError> {
        if self.access_secret.is_empty() && !self.access_key.is_empty() {
            if let Some(secret) = store.get_secret(&self.access_key)? {
                debug!("[config] using access secret from keychain");
                self.access_secret = secret.trim().to_string();
            }
        }
        Ok(self)
    }

    /// Multi-line summary for troubleshooting credential/host mismatches.
    pub fn diagnostic_info(&self) -> String {
        let hostname = self
            .host
            .split("://")
            .nth(1)
            .unwrap_or(self.host.as_str())
            .split('/')
            .next()
            .unwrap_or_default();
        format!(
            "access key: {}\nkey length: {}\nsecret length: {}\nhost: {}\nhostname: {}\nknown hosts:\n  {}",
            self.credentials().masked_key(),
            self.access_key.len(),
            self.access_secret.len(),
            self.host,
            hostname,
            KNOWN_HOSTS.join("\n  ")
        )
    }
}

pub fn normalize_host(host: &str) -> String {
    let trimmed = host.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        DEFAULT_HOST.to_string()
    } else {
        trimmed.to_string()
    }
}

fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    dirs::config_dir().map(|d| d.join("audiosearch").join("config.toml"))
}

/// `<data dir>/audiosearch/recordings`, falling back to the working directory.
pub fn default_recordings_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("audiosearch").join("recordings"))
        .unwrap_or_else(|| PathBuf::from("./recordings"))
}
