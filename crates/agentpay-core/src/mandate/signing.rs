//! Mandate signing and signature verification.
//!
//! # Signing process
//!
//! ```text
//! 1. signable  = every mandate field except `signature`
//! 2. canonical = JCS(signable)
//! 3. digest    = "sha256:" + hex(SHA256(canonical))
//! 4. pae       = DSSEv1_PAE(MANDATE_PAYLOAD_TYPE, canonical)
//! 5. signature = ed25519_sign(private_key, pae)
//! ```
//!
//! # Signer binding
//!
//! When `agent` or `holder` is an Ed25519 `did:key`, the signer must be one
//! of those parties. With `require_party_signer`, at least one party must
//! be a `did:key` and the signer must match it.

use super::types::{
    Mandate, MandateSignature, SignablePayload, MANDATE_PAYLOAD_TYPE, SIGNATURE_ALGORITHM,
};
use crate::crypto::{build_pae, decode_hex, jcs, sha256_prefixed};
use crate::error::Result;
use crate::identity::{public_key_from_did, Identity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Signature verification failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignatureError {
    #[error("mandate is not signed")]
    Unsigned,

    #[error("malformed signature: {reason}")]
    Malformed { reason: String },

    #[error("algorithm mismatch: expected ed25519, got {algorithm}")]
    AlgorithmMismatch { algorithm: String },

    #[error("payload type mismatch: expected {expected}, got {got}")]
    PayloadTypeMismatch { expected: String, got: String },

    #[error("signer_did {claimed} does not belong to the attached public key ({actual})")]
    SignerDidMismatch { claimed: String, actual: String },

    #[error("signer {signer} is neither the agent nor the holder")]
    SignerNotParty { signer: String },

    #[error("signed_payload_digest mismatch: computed {computed}, claimed {claimed}")]
    DigestMismatch { computed: String, claimed: String },

    #[error("signature does not match the canonical mandate encoding")]
    SignatureInvalid,
}

impl SignatureError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unsigned => "E_UNSIGNED",
            Self::Malformed { .. } => "E_SIGNATURE_MALFORMED",
            Self::AlgorithmMismatch { .. } => "E_ALGORITHM_MISMATCH",
            Self::PayloadTypeMismatch { .. } => "E_PAYLOAD_TYPE_MISMATCH",
            Self::SignerDidMismatch { .. } => "E_SIGNER_DID_MISMATCH",
            Self::SignerNotParty { .. } => "E_SIGNER_NOT_PARTY",
            Self::DigestMismatch { .. } => "E_DIGEST_MISMATCH",
            Self::SignatureInvalid => "E_SIGNATURE_INVALID",
        }
    }
}

/// Result of a successful signature check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSignature {
    pub signer_did: String,
    pub signed_payload_digest: String,
    pub signed_at: DateTime<Utc>,
}

/// Canonical bytes of the signed fields.
pub fn canonical_payload(mandate: &Mandate) -> Result<Vec<u8>> {
    jcs::to_vec(&SignablePayload::from(mandate))
}

/// Exact bytes the Ed25519 signature covers.
pub fn signing_input(mandate: &Mandate) -> Result<Vec<u8>> {
    Ok(build_pae(MANDATE_PAYLOAD_TYPE, &canonical_payload(mandate)?))
}

/// Produce the signature object for `mandate` with `identity`.
///
/// Callers are expected to have validated the mandate and the signer.
pub(crate) fn sign_payload(mandate: &Mandate, identity: &Identity) -> Result<MandateSignature> {
    let canonical = canonical_payload(mandate)?;
    let signed_payload_digest = sha256_prefixed(&canonical);
    let pae = build_pae(MANDATE_PAYLOAD_TYPE, &canonical);
    let signature = identity.sign(&pae)?;

    Ok(MandateSignature {
        algorithm: SIGNATURE_ALGORITHM.to_string(),
        payload_type: MANDATE_PAYLOAD_TYPE.to_string(),
        signed_payload_digest,
        public_key: identity.public_key_hex(),
        signer_did: identity.did().to_string(),
        signature: hex::encode(signature),
        signed_at: Utc::now(),
    })
}

/// DIDs of the parties that are resolvable Ed25519 `did:key` identifiers.
fn party_dids(mandate: &Mandate) -> Vec<&str> {
    [mandate.agent.as_str(), mandate.holder.as_str()]
        .into_iter()
        .filter(|p| public_key_from_did(p).is_some())
        .collect()
}

/// Check that `signer_did` may sign for this mandate.
pub(crate) fn check_signer_party(
    mandate: &Mandate,
    signer_did: &str,
    require_party_signer: bool,
) -> std::result::Result<(), SignatureError> {
    let parties = party_dids(mandate);
    if parties.is_empty() && !require_party_signer {
        return Ok(());
    }
    if parties.contains(&signer_did) {
        Ok(())
    } else {
        Err(SignatureError::SignerNotParty {
            signer: signer_did.to_string(),
        })
    }
}

/// Verify the signature attached to `mandate`.
///
/// Checks, in order: presence, algorithm, payload type, signer key and DID,
/// signer binding, payload digest, Ed25519 signature.
pub fn verify_signature(
    mandate: &Mandate,
    require_party_signer: bool,
) -> std::result::Result<VerifiedSignature, SignatureError> {
    let sig = mandate.signature.as_ref().ok_or(SignatureError::Unsigned)?;

    if sig.algorithm != SIGNATURE_ALGORITHM {
        return Err(SignatureError::AlgorithmMismatch {
            algorithm: sig.algorithm.clone(),
        });
    }
    if sig.payload_type != MANDATE_PAYLOAD_TYPE {
        return Err(SignatureError::PayloadTypeMismatch {
            expected: MANDATE_PAYLOAD_TYPE.to_string(),
            got: sig.payload_type.clone(),
        });
    }

    let signer = Identity::from_public_key_hex(&sig.public_key).map_err(|e| {
        SignatureError::Malformed {
            reason: e.to_string(),
        }
    })?;
    if signer.did() != sig.signer_did {
        return Err(SignatureError::SignerDidMismatch {
            claimed: sig.signer_did.clone(),
            actual: signer.did().to_string(),
        });
    }
    check_signer_party(mandate, signer.did(), require_party_signer)?;

    let canonical = canonical_payload(mandate).map_err(|e| SignatureError::Malformed {
        reason: e.to_string(),
    })?;
    let computed = sha256_prefixed(&canonical);
    if computed != sig.signed_payload_digest {
        return Err(SignatureError::DigestMismatch {
            computed,
            claimed: sig.signed_payload_digest.clone(),
        });
    }

    let signature_bytes =
        decode_hex("signature", &sig.signature).map_err(|e| SignatureError::Malformed {
            reason: e.to_string(),
        })?;
    let pae = build_pae(&sig.payload_type, &canonical);
    if !signer.verify(&signature_bytes, &pae) {
        return Err(SignatureError::SignatureInvalid);
    }

    Ok(VerifiedSignature {
        signer_did: sig.signer_did.clone(),
        signed_payload_digest: computed,
        signed_at: sig.signed_at,
    })
}
