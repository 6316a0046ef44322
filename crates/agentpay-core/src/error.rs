//! Error types for mandate authorization and consensus verification.
//!
//! Guard outcomes (expired, revoked, merchant mismatch, failed quorum) are
//! not errors: they are reported through
//! [`VerificationReport`](crate::authority::VerificationReport) and
//! [`ConsensusResult`](crate::consensus::ConsensusResult). The types here
//! cover failures that abort the call itself.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Key material and signing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid key format: {reason}")]
    InvalidKeyFormat { reason: String },

    #[error("public key does not match private key")]
    KeyMismatch,

    #[error("identity has no private key")]
    NotInitialized,

    #[error("entropy source failure: {0}")]
    Entropy(String),

    #[error("invalid hex in {field}: {reason}")]
    InvalidHex { field: String, reason: String },
}

impl CryptoError {
    pub(crate) fn wrong_length(what: &str, expected: usize, actual: usize) -> Self {
        Self::InvalidKeyFormat {
            reason: format!("{what} must be {expected} bytes, got {actual}"),
        }
    }
}

/// One violated mandate field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Why a verifier pool cannot run a round.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum PoolMisconfiguration {
    #[error("pool of {pool_size} outside [{min_agents}, {max_agents}]")]
    PoolSize {
        pool_size: usize,
        min_agents: usize,
        max_agents: usize,
    },

    #[error("consensus threshold {threshold} outside (0, 1]")]
    Threshold { threshold: f64 },
}

/// Crate-wide error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("validation failed: {}", join_violations(.violations))]
    ValidationFailed { violations: Vec<FieldViolation> },

    #[error("signing failed: {reason}")]
    SignatureFailed { reason: String },

    #[error("insufficient agents: {reason}")]
    InsufficientAgents { reason: PoolMisconfiguration },

    #[error("mandate not found: {mandate_id}")]
    MandateNotFound { mandate_id: String },

    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("store error: {0}")]
    Store(String),

    #[error("encoding error: {0}")]
    Encoding(String),
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Store(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Encoding(e.to_string())
    }
}

impl Error {
    pub fn validation(violations: Vec<FieldViolation>) -> Self {
        Self::ValidationFailed { violations }
    }

    pub fn insufficient_agents(reason: PoolMisconfiguration) -> Self {
        Self::InsufficientAgents { reason }
    }

    /// Stable machine-readable code for callers on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Crypto(CryptoError::InvalidKeyFormat { .. }) => "E_INVALID_KEY_FORMAT",
            Self::Crypto(CryptoError::KeyMismatch) => "E_KEY_MISMATCH",
            Self::Crypto(CryptoError::NotInitialized) => "E_NOT_INITIALIZED",
            Self::Crypto(CryptoError::Entropy(_)) => "E_CRYPTO",
            Self::Crypto(CryptoError::InvalidHex { .. }) => "E_INVALID_HEX",
            Self::ValidationFailed { .. } => "E_VALIDATION_FAILED",
            Self::SignatureFailed { .. } => "E_SIGNATURE_FAILED",
            Self::InsufficientAgents { .. } => "E_INSUFFICIENT_AGENTS",
            Self::MandateNotFound { .. } => "E_MANDATE_NOT_FOUND",
            Self::Config { .. } => "E_CONFIG",
            Self::Store(_) => "E_STORE",
            Self::Encoding(_) => "E_ENCODING",
        }
    }

    /// Exit code for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            // Caller must fix the input
            Self::ValidationFailed { .. }
            | Self::Crypto(CryptoError::InvalidKeyFormat { .. })
            | Self::Crypto(CryptoError::InvalidHex { .. })
            | Self::Crypto(CryptoError::KeyMismatch)
            | Self::Encoding(_) => 1,
            // Misconfiguration
            Self::Config { .. } | Self::InsufficientAgents { .. } => 2,
            Self::MandateNotFound { .. } => 3,
            Self::SignatureFailed { .. } | Self::Crypto(CryptoError::NotInitialized) => 4,
            Self::Crypto(CryptoError::Entropy(_)) | Self::Store(_) => 5,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_lists_fields() {
        let err = Error::validation(vec![
            FieldViolation::new("amount", "must be greater than zero"),
            FieldViolation::new("currency", "unrecognized currency code 'XXY'"),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("amount: must be greater than zero"));
        assert!(msg.contains("currency: unrecognized"));
        assert_eq!(err.code(), "E_VALIDATION_FAILED");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::validation(vec![]).exit_code(), 1);
        assert_eq!(
            Error::insufficient_agents(PoolMisconfiguration::PoolSize {
                pool_size: 0,
                min_agents: 1,
                max_agents: 10
            })
            .exit_code(),
            2
        );
        let threshold = Error::insufficient_agents(PoolMisconfiguration::Threshold {
            threshold: 1.5,
        });
        assert_eq!(threshold.code(), "E_INSUFFICIENT_AGENTS");
        assert_eq!(threshold.exit_code(), 2);
        assert!(threshold.to_string().contains("threshold 1.5 outside (0, 1]"));
        assert_eq!(Error::Crypto(CryptoError::NotInitialized).exit_code(), 4);
        assert_eq!(Error::Store("disk".into()).exit_code(), 5);
    }
}
