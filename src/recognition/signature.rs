use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::error::AppError;

type HmacSha1 = Hmac<Sha1>;

pub const HTTP_METHOD: &str = "POST";
pub const HTTP_URI: &str = "/v1/identify";
pub const DATA_TYPE: &str = "audio";
pub const SIGNATURE_VERSION: &str = "1";

/// Newline-joined string the provider recomputes on its side:
/// method, URI, access key, data type, signature version, timestamp.
pub fn string_to_sign(access_key: &str, timestamp: i64) -> String {
    format!("{HTTP_METHOD}\n{HTTP_URI}\n{access_key}\n{DATA_TYPE}\n{SIGNATURE_VERSION}\n{timestamp}")
}

/// Base64 of HMAC-SHA1(secret, message).
pub fn sign(message: &str, secret: &str) -> Result<String, AppError> {
    let mut mac = HmacSha1::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Security(format!("Invalid signing key: {e}")))?;
    mac.update(message.as_bytes());
    Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

/// Signature for an identify request made at `timestamp` (unix seconds).
pub fn sign_request(
    access_key: &str,
    access_secret: &str,
    timestamp: i64,
) -> Result<String, AppError> {
    sign(&string_to_sign(access_key, timestamp), access_secret)
}
