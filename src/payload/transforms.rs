//! Leaf transforms applied to tagged string fields.
//!
//! Request direction turns REST conventions into what the gRPC-gateway
//! expects; response direction does the reverse. Empty input always
//! yields empty output.

use base64::{engine::general_purpose, Engine as _};
use chrono::DateTime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("hex string without 0x prefix")]
    MissingHexPrefix,

    #[error("invalid hex string: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("invalid base64 string: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("invalid RFC3339 timestamp: {0}")]
    InvalidTime(#[from] chrono::ParseError),
}

/// Signature shared by every leaf transform.
pub type Transform = fn(&str) -> Result<String, TransformError>;

/// Decode a `0x`-prefixed hex string into bytes.
pub fn decode_hex(value: &str) -> Result<Vec<u8>, TransformError> {
    let digits = value
        .strip_prefix("0x")
        .ok_or(TransformError::MissingHexPrefix)?;
    Ok(hex::decode(digits)?)
}

/// True when `value` is `0x` followed by at least one hex digit.
pub fn is_hex(value: &str) -> bool {
    value
        .strip_prefix("0x")
        .map(|d| !d.is_empty() && d.bytes().all(|b| b.is_ascii_hexdigit()))
        .unwrap_or(false)
}

/// `0x`-prefixed hex to standard padded base64.
pub fn hex_to_base64(value: &str) -> Result<String, TransformError> {
    if value.is_empty() {
        return Ok(String::new());
    }
    let bytes = decode_hex(value)?;
    Ok(general_purpose::STANDARD.encode(bytes))
}

/// Standard base64 to lowercase `0x`-prefixed hex.
pub fn base64_to_hex(value: &str) -> Result<String, TransformError> {
    if value.is_empty() {
        return Ok(String::new());
    }
    let bytes = general_purpose::STANDARD.decode(value)?;
    Ok(format!("0x{}", hex::encode(bytes)))
}

pub fn enum_to_lowercase(value: &str) -> Result<String, TransformError> {
    Ok(value.to_lowercase())
}

/// RFC3339 timestamp to decimal seconds since the Unix epoch.
pub fn time_to_unix(value: &str) -> Result<String, TransformError> {
    if value.is_empty() {
        return Ok(String::new());
    }
    let parsed = DateTime::parse_from_rfc3339(value)?;
    Ok(parsed.timestamp().to_string())
}

/// URL-safe padded base64 of a path or query value.
///
/// Hex values are decoded to bytes first; anything else is encoded as its
/// raw UTF-8 bytes.
pub fn url_value_to_base64(value: &str) -> Result<String, TransformError> {
    let bytes = if is_hex(value) {
        decode_hex(value)?
    } else {
        value.as_bytes().to_vec()
    };
    Ok(general_purpose::URL_SAFE.encode(bytes))
}
