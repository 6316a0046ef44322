//! JSON Canonicalization Scheme (RFC 8785).
//!
//! Mandate signatures are computed over the JCS form of the signable
//! fields, so key order and whitespace never affect verification.

use crate::error::{Error, Result};
use serde::Serialize;

/// Serialize a value to JCS canonical JSON bytes.
///
/// ```
/// use agentpay_core::crypto::jcs;
/// use serde_json::json;
///
/// let bytes = jcs::to_vec(&json!({"b": 2, "a": 1})).unwrap();
/// assert_eq!(bytes, br#"{"a":1,"b":2}"#);
/// ```
pub fn to_vec<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_jcs::to_vec(value).map_err(|e| Error::Encoding(format!("canonical json: {e}")))
}

/// Serialize a value to a JCS canonical JSON string.
pub fn to_string<T: Serialize>(value: &T) -> Result<String> {
    serde_jcs::to_string(value).map_err(|e| Error::Encoding(format!("canonical json: {e}")))
}
