//! Ed25519 identities for agents, holders and verifier panels.
//!
//! An [`Identity`] always carries a public key and a `did:key` identifier
//! derived from it; it carries a private key only when it was generated or
//! imported with one. Verification-only identities are the expected input
//! for consensus panels.
//!
//! # DID format
//!
//! ```text
//! did = "did:key:z" + base58btc(0xed 0x01 || public_key)
//! ```

use crate::crypto::decode_hex;
use crate::error::CryptoError;
use chrono::{DateTime, Utc};
use ed25519_dalek::{
    Signer, SigningKey, Verifier, VerifyingKey, PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH,
    SIGNATURE_LENGTH,
};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;

/// Multicodec prefix for an Ed25519 public key.
const ED25519_MULTICODEC: [u8; 2] = [0xed, 0x01];

const DID_KEY_PREFIX: &str = "did:key:z";

/// Raw Ed25519 signature bytes.
pub type SignatureBytes = [u8; SIGNATURE_LENGTH];

/// Asymmetric identity: public key, optional private key and derived DID.
///
/// Deliberately not `Clone`: a signing identity is owned by one component.
/// Use [`Identity::public_only`] to hand out a verification-only copy.
pub struct Identity {
    verifying_key: VerifyingKey,
    signing_key: Option<SigningKey>,
    did: String,
    created_at: DateTime<Utc>,
}

impl Identity {
    /// Generate a fresh keypair from the operating system's entropy source.
    pub fn generate() -> Result<Self, CryptoError> {
        let mut seed = [0u8; SECRET_KEY_LENGTH];
        OsRng
            .try_fill_bytes(&mut seed)
            .map_err(|e| CryptoError::Entropy(e.to_string()))?;
        let signing_key = SigningKey::from_bytes(&seed);
        seed.fill(0);
        Ok(Self::from_signing_key(signing_key))
    }

    /// Import a keypair, checking that `public_key` belongs to `private_key`.
    pub fn from_keys(private_key: &[u8], public_key: &[u8]) -> Result<Self, CryptoError> {
        let claimed = to_array::<PUBLIC_KEY_LENGTH>("public key", public_key)?;
        let identity = Self::from_private_key(private_key)?;
        if identity.verifying_key.as_bytes() != &claimed {
            return Err(CryptoError::KeyMismatch);
        }
        Ok(identity)
    }

    /// Import a private key; the public key is re-derived.
    pub fn from_private_key(private_key: &[u8]) -> Result<Self, CryptoError> {
        let bytes = to_array::<SECRET_KEY_LENGTH>("private key", private_key)?;
        Ok(Self::from_signing_key(SigningKey::from_bytes(&bytes)))
    }

    /// Verification-only identity. [`can_sign`](Self::can_sign) is false.
    pub fn from_public_key(public_key: &[u8]) -> Result<Self, CryptoError> {
        let bytes = to_array::<PUBLIC_KEY_LENGTH>("public key", public_key)?;
        let verifying_key =
            VerifyingKey::from_bytes(&bytes).map_err(|e| CryptoError::InvalidKeyFormat {
                reason: format!("public key is not a valid ed25519 point: {e}"),
            })?;
        Ok(Self::from_verifying_key(verifying_key))
    }

    pub fn from_private_key_hex(private_key: &str) -> Result<Self, CryptoError> {
        Self::from_private_key(&decode_hex("private_key", private_key)?)
    }

    pub fn from_public_key_hex(public_key: &str) -> Result<Self, CryptoError> {
        Self::from_public_key(&decode_hex("public_key", public_key)?)
    }

    /// Resolve a `did:key` Ed25519 identifier back into a verification-only identity.
    pub fn from_did(did: &str) -> Result<Self, CryptoError> {
        let public_key = public_key_from_did(did).ok_or_else(|| CryptoError::InvalidKeyFormat {
            reason: format!("not an ed25519 did:key: {did}"),
        })?;
        Self::from_public_key(&public_key)
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let verifying_key = signing_key.verifying_key();
        let mut identity = Self::from_verifying_key(verifying_key);
        identity.signing_key = Some(signing_key);
        identity
    }

    fn from_verifying_key(verifying_key: VerifyingKey) -> Self {
        Self {
            did: did_from_public_key(verifying_key.as_bytes()),
            verifying_key,
            signing_key: None,
            created_at: Utc::now(),
        }
    }

    /// A copy of this identity without the private key.
    pub fn public_only(&self) -> Self {
        Self {
            verifying_key: self.verifying_key,
            signing_key: None,
            did: self.did.clone(),
            created_at: self.created_at,
        }
    }

    pub fn can_sign(&self) -> bool {
        self.signing_key.is_some()
    }

    /// Deterministic Ed25519 signature over raw bytes.
    pub fn sign(&self, message: &[u8]) -> Result<SignatureBytes, CryptoError> {
        let key = self.signing_key.as_ref().ok_or(CryptoError::NotInitialized)?;
        Ok(key.sign(message).to_bytes())
    }

    /// Check a signature over `message`. Malformed signatures yield `false`.
    pub fn verify(&self, signature: &[u8], message: &[u8]) -> bool {
        match ed25519_dalek::Signature::from_slice(signature) {
            Ok(sig) => self.verifying_key.verify(message, &sig).is_ok(),
            Err(_) => false,
        }
    }

    pub fn did(&self) -> &str {
        &self.did
    }

    pub fn public_key(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        self.verifying_key.to_bytes()
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.verifying_key.as_bytes())
    }

    /// Hex private key, for key export at the CLI boundary only.
    pub fn private_key_hex(&self) -> Option<String> {
        self.signing_key.as_ref().map(|k| hex::encode(k.to_bytes()))
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("did", &self.did)
            .field("can_sign", &self.can_sign())
            .field("created_at", &self.created_at)
            .finish()
    }
}

fn to_array<const N: usize>(what: &str, bytes: &[u8]) -> Result<[u8; N], CryptoError> {
    bytes
        .try_into()
        .map_err(|_| CryptoError::wrong_length(what, N, bytes.len()))
}

/// Derive the `did:key` identifier for an Ed25519 public key.
pub fn did_from_public_key(public_key: &[u8; PUBLIC_KEY_LENGTH]) -> String {
    let mut buf = Vec::with_capacity(ED25519_MULTICODEC.len() + PUBLIC_KEY_LENGTH);
    buf.extend_from_slice(&ED25519_MULTICODEC);
    buf.extend_from_slice(public_key);
    format!("{DID_KEY_PREFIX}{}", bs58::encode(buf).into_string())
}

/// Extract the Ed25519 public key from a `did:key` identifier.
///
/// Returns `None` for anything that is not an Ed25519 `did:key`.
pub fn public_key_from_did(did: &str) -> Option<[u8; PUBLIC_KEY_LENGTH]> {
    let encoded = did.strip_prefix(DID_KEY_PREFIX)?;
    let decoded = bs58::decode(encoded).into_vec().ok()?;
    let key = decoded.strip_prefix(&ED25519_MULTICODEC[..])?;
    key.try_into().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_can_sign_and_verify() {
        let id = Identity::generate().unwrap();
        assert!(id.can_sign());
        let sig = id.sign(b"pay 12000 USD").unwrap();
        assert!(id.verify(&sig, b"pay 12000 USD"));
        assert!(!id.verify(&sig, b"pay 99999 USD"));
    }

    #[test]
    fn test_signature_is_deterministic() {
        let id = Identity::generate().unwrap();
        assert_eq!(id.sign(b"m").unwrap(), id.sign(b"m").unwrap());
    }

    #[test]
    fn test_public_only_cannot_sign() {
        let id = Identity::generate().unwrap();
        let public = id.public_only();
        assert!(!public.can_sign());
        assert_eq!(public.did(), id.did());
        assert!(matches!(public.sign(b"x"), Err(CryptoError::NotInitialized)));

        let sig = id.sign(b"x").unwrap();
        assert!(public.verify(&sig, b"x"));
    }

    #[test]
    fn test_from_keys_rejects_mismatch() {
        let a = Identity::generate().unwrap();
        let b = Identity::generate().unwrap();
        let a_priv = hex::decode(a.private_key_hex().unwrap()).unwrap();

        let ok = Identity::from_keys(&a_priv, &a.public_key()).unwrap();
        assert_eq!(ok.did(), a.did());

        let err = Identity::from_keys(&a_priv, &b.public_key()).unwrap_err();
        assert_eq!(err, CryptoError::KeyMismatch);
    }

    #[test]
    fn test_wrong_lengths_are_invalid_format() {
        assert!(matches!(
            Identity::from_private_key(&[1u8; 31]),
            Err(CryptoError::InvalidKeyFormat { .. })
        ));
        assert!(matches!(
            Identity::from_public_key(&[1u8; 33]),
            Err(CryptoError::InvalidKeyFormat { .. })
        ));
        let a = Identity::generate().unwrap();
        let a_priv = hex::decode(a.private_key_hex().unwrap()).unwrap();
        assert!(matches!(
            Identity::from_keys(&a_priv, &[0u8; 5]),
            Err(CryptoError::InvalidKeyFormat { .. })
        ));
    }

    #[test]
    fn test_malformed_signature_is_false_not_panic() {
        let id = Identity::generate().unwrap();
        assert!(!id.verify(&[], b"m"));
        assert!(!id.verify(&[0u8; 12], b"m"));
        assert!(!id.verify(&[0xffu8; 64], b"m"));
    }

    #[test]
    fn test_did_roundtrips_and_is_stable() {
        let id = Identity::generate().unwrap();
        assert!(id.did().starts_with("did:key:z6Mk"));
        assert_eq!(public_key_from_did(id.did()), Some(id.public_key()));

        let reimported = Identity::from_public_key_hex(&id.public_key_hex()).unwrap();
        assert_eq!(reimported.did(), id.did());

        let resolved = Identity::from_did(id.did()).unwrap();
        assert_eq!(resolved.public_key(), id.public_key());
    }

    #[test]
    fn test_non_did_key_does_not_resolve() {
        assert_eq!(public_key_from_did("shopping-agent-1"), None);
        assert_eq!(public_key_from_did("did:web:example.com"), None);
        assert_eq!(public_key_from_did("did:key:z0OIl"), None);
    }

    #[test]
    fn test_debug_hides_private_key() {
        let id = Identity::generate().unwrap();
        let dbg = format!("{id:?}");
        let private = id.private_key_hex().unwrap();
        assert!(!dbg.contains(&private));
        assert!(dbg.contains("can_sign: true"));
    }
}
