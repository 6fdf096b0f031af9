use crate::error::AppError;

const SERVICE_NAME: &str = "app.audiosearch";

/// OS-native keychain storage for recognition secrets, keyed by access key.
/// Uses macOS Keychain, Windows Credential Manager, or Linux Secret Service.
pub struct KeyStore;

impl KeyStore {
    pub fn new() -> Self {
        Self
    }

    fn entry(&self, access_key: &str) -> Result<keyring::Entry, AppError> {
        keyring::Entry::new(SERVICE_NAME, access_key)
            .map_err(|e| AppError::Security(format!("Keyring entry error: {e}")))
    }

    pub fn save_secret(&self, access_key: &str, secret: &str) -> Result<(), AppError> {
        self.entry(access_key)?
            .set_password(secret)
            .map_err(|e| AppError::Security(format!("Failed to save secret: {e}")))
    }

    pub fn get_secret(&self, access_key: &str) -> Result<Option<String>, AppError> {
        match self.entry(access_key)?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(AppError::Security(format!("Failed to read secret: {e}"))),
        }
    }

    pub fn delete_secret(&self, access_key: &str) -> Result<(), AppError> {
        match self.entry(access_key)?.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()), // Already deleted
            Err(e) => Err(AppError::Security(format!("Failed to delete secret: {e}"))),
        }
    }

    pub fn has_secret(&self, access_key: &str) -> Result<bool, AppError> {
        Ok(self.get_secret(access_key)?.is_some())
    }
}

impl Default for KeyStore {
    fn default() -> Self {
        Self::new()
    }
}
