//! Spending mandates: data model, field invariants and signatures.

pub mod merchant;
pub mod signing;
pub mod types;
mod validate;

pub(crate) use validate::{validate_fields, validate_mandate};

pub use signing::{
    canonical_payload, signing_input, verify_signature, SignatureError, VerifiedSignature,
};
pub use types::{
    Mandate, MandateFields, MandateKind, MandateSignature, Period, MANDATE_PAYLOAD_TYPE,
    SIGNATURE_ALGORITHM,
};
pub use validate::is_recognized_currency;
