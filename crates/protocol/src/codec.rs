//! JSON-or-string encoding for multipart text fields.
//!
//! Strings travel verbatim, everything else as JSON text. Decoding tries
//! JSON first and falls back to the raw text as a string value.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::ProtocolError;

/// Encodes a field value: strings verbatim, anything else as JSON.
pub fn serialize_field(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Decodes a field value, falling back to a plain string when the text is
/// not valid JSON.
pub fn deserialize_field(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Decodes a field into a typed value.
pub fn decode_field<T: DeserializeOwned>(field: &str, text: &str) -> Result<T, ProtocolError> {
    serde_json::from_value(deserialize_field(text)).map_err(|e| ProtocolError::InvalidField {
        field: field.to_string(),
        reason: e.to_string(),
    })
}
