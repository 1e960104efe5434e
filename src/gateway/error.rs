//! Error model.
//!
//! Everything written to the wire as an error is an [`ErrorJson`]: a status
//! code and a message, plus whatever extra fields an endpoint declares.
//! Failures inside the gateway are [`GatewayError`]s and are converted to
//! the wire model only when the response is written.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::payload::container::json_type;
use crate::payload::DecodeError;

/// Wire error capability set.
pub trait ErrorJson: fmt::Debug + Send + Sync {
    fn status_code(&self) -> u16;
    fn set_status_code(&mut self, code: u16);
    fn message(&self) -> &str;
    fn set_message(&mut self, message: String);
    /// Serialize the full error, extension fields included.
    fn to_json(&self) -> serde_json::Result<Vec<u8>>;
    /// Overwrite the fields present in `bytes`, leaving the rest untouched.
    fn merge_json(&mut self, bytes: &[u8]) -> serde_json::Result<()>;
}

pub type BoxedError = Box<dyn ErrorJson>;

/// The two-field error envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultError {
    pub message: String,
    pub code: u16,
}

impl DefaultError {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
        }
    }

    /// 500 with message `"<prefix>: <cause>"`.
    pub fn internal_server_error(cause: impl fmt::Display, prefix: &str) -> Self {
        Self::new(500, format!("{prefix}: {cause}"))
    }

    pub fn timeout() -> Self {
        Self::new(408, "Request timeout")
    }
}

impl ErrorJson for DefaultError {
    fn status_code(&self) -> u16 {
        self.code
    }

    fn set_status_code(&mut self, code: u16) {
        self.code = code;
    }

    fn message(&self) -> &str {
        &self.message
    }

    fn set_message(&mut self, message: String) {
        self.message = message;
    }

    fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    fn merge_json(&mut self, bytes: &[u8]) -> serde_json::Result<()> {
        merge_json_into(self, bytes)
    }
}

/// Default envelope plus endpoint-specific fields `X`.
///
/// `X` is flattened, so `{"message":..,"code":..,"failures":[..]}` maps onto
/// `ExtendedError<Failures>` where `Failures` holds a `failures` field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtendedError<X> {
    #[serde(flatten)]
    pub base: DefaultError,
    #[serde(flatten)]
    pub extra: X,
}

impl<X> ExtendedError<X> {
    pub fn new(base: DefaultError, extra: X) -> Self {
        Self { base, extra }
    }
}

impl<X> ErrorJson for ExtendedError<X>
where
    X: Serialize + DeserializeOwned + fmt::Debug + Send + Sync,
{
    fn status_code(&self) -> u16 {
        self.base.code
    }

    fn set_status_code(&mut self, code: u16) {
        self.base.code = code;
    }

    fn message(&self) -> &str {
        &self.base.message
    }

    fn set_message(&mut self, message: String) {
        self.base.message = message;
    }

    fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    fn merge_json(&mut self, bytes: &[u8]) -> serde_json::Result<()> {
        merge_json_into(self, bytes)
    }
}

/// Overlay the keys of the JSON object in `bytes` onto `target`.
///
/// Keys match exactly first, then ignoring ASCII case. Keys `target` does
/// not declare are dropped when the merged value is deserialized back.
pub fn merge_json_into<T>(target: &mut T, bytes: &[u8]) -> serde_json::Result<()>
where
    T: Serialize + DeserializeOwned,
{
    let incoming = match serde_json::from_slice::<Value>(bytes)? {
        Value::Object(map) => map,
        Value::Null => return Ok(()),
        other => {
            return Err(<serde_json::Error as serde::de::Error>::custom(format!(
                "cannot unmarshal {} into error object",
                json_type(&other)
            )))
        }
    };

    let mut current = serde_json::to_value(&*target)?;
    if let Value::Object(map) = &mut current {
        for (key, value) in incoming {
            let slot = if map.contains_key(&key) {
                key
            } else {
                map.keys()
                    .find(|existing| existing.eq_ignore_ascii_case(&key))
                    .cloned()
                    .unwrap_or(key)
            };
            map.insert(slot, value);
        }
    }
    *target = serde_json::from_value(current)?;
    Ok(())
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures raised while processing a request.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Body did not match the endpoint's request shape.
    #[error("could not decode request body: {0}")]
    MalformedBody(#[source] DecodeError),

    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("Request timeout")]
    Timeout,

    #[error("{context}: {source}")]
    Internal {
        context: &'static str,
        #[source]
        source: BoxError,
    },

    /// Already in wire form, e.g. returned by a hook.
    #[error("{}", .0.message())]
    Reported(BoxedError),
}

impl GatewayError {
    pub fn internal(context: &'static str, source: impl Into<BoxError>) -> Self {
        GatewayError::Internal {
            context,
            source: source.into(),
        }
    }

    /// Classify a request body decode failure.
    pub fn decode(err: DecodeError) -> Self {
        if err.is_unknown_field() {
            GatewayError::MalformedBody(err)
        } else {
            GatewayError::internal("could not decode request body", err)
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::MalformedBody(_) => 400,
            GatewayError::BodyTooLarge { .. } => 413,
            GatewayError::Timeout => 408,
            GatewayError::Internal { .. } => 500,
            GatewayError::Reported(e) => e.status_code(),
        }
    }

    pub fn into_error_json(self) -> BoxedError {
        match self {
            GatewayError::Reported(e) => e,
            GatewayError::Timeout => Box::new(DefaultError::timeout()),
            other => Box::new(DefaultError::new(other.status_code(), other.to_string())),
        }
    }
}

impl From<BoxedError> for GatewayError {
    fn from(e: BoxedError) -> Self {
        GatewayError::Reported(e)
    }
}
