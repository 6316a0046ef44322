//! Canonical encoding and byte helpers shared by signing and verification.

pub mod jcs;

use crate::error::CryptoError;
use sha2::{Digest, Sha256};

/// Decode a hex string received at the wire boundary.
///
/// An optional `0x` prefix is accepted.
pub fn decode_hex(field: &str, value: &str) -> Result<Vec<u8>, CryptoError> {
    let trimmed = value.trim();
    let trimmed = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    hex::decode(trimmed).map_err(|e| CryptoError::InvalidHex {
        field: field.to_string(),
        reason: e.to_string(),
    })
}

/// `sha256:<lowercase-hex>` digest.
pub fn sha256_prefixed(bytes: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(bytes)))
}

/// DSSE Pre-Authentication Encoding.
///
/// ```text
/// PAE(type, payload) = "DSSEv1" SP LEN(type) SP type SP LEN(payload) SP payload
/// ```
pub fn build_pae(payload_type: &str, payload: &[u8]) -> Vec<u8> {
    let type_len = payload_type.len().to_string();
    let payload_len = payload.len().to_string();

    let mut pae = Vec::with_capacity(16 + payload_type.len() + payload.len());
    pae.extend_from_slice(b"DSSEv1 ");
    pae.extend_from_slice(type_len.as_bytes());
    pae.push(b' ');
    pae.extend_from_slice(payload_type.as_bytes());
    pae.push(b' ');
    pae.extend_from_slice(payload_len.as_bytes());
    pae.push(b' ');
    pae.extend_from_slice(payload);
    pae
}
