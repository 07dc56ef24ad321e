//! Wire and canonical encodings of raw objects
//!
//! Transitions travel as JSON objects. Signatures cover a bincode encoding of
//! the same object, which is stable because JSON maps are ordered by key.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use crate::error::SerializationError;

/// Decode wire bytes into a raw object
pub fn decode_object(bytes: &[u8]) -> Result<Value, SerializationError> {
    serde_json::from_slice(bytes).map_err(|e| SerializationError::DeserializationFailed {
        reason: format!("JSON deserialization failed: {}", e),
    })
}

/// Encode a raw object for the wire
pub fn encode_object(object: &Value) -> Result<Vec<u8>, SerializationError> {
    serde_json::to_vec(object).map_err(|e| SerializationError::SerializationFailed {
        reason: format!("JSON serialization failed: {}", e),
    })
}

/// Convert a typed value into its raw object
pub fn to_object<T: Serialize>(value: &T) -> Result<Value, SerializationError> {
    serde_json::to_value(value).map_err(|e| SerializationError::SerializationFailed {
        reason: format!("Object conversion failed: {}", e),
    })
}

/// Build a typed value from a raw object
pub fn from_object<T: DeserializeOwned>(object: Value) -> Result<T, SerializationError> {
    serde_json::from_value(object).map_err(|e| SerializationError::DeserializationFailed {
        reason: format!("Object conversion failed: {}", e),
    })
}

/// Canonical byte encoding used for signing
pub fn encode_canonical(object: &Value) -> Result<Vec<u8>, SerializationError> {
    bincode::serialize(object).map_err(|e| SerializationError::SerializationFailed {
        reason: format!("Bincode serialization failed: {}", e),
    })
}
