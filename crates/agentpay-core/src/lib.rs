//! Signed spending mandates for autonomous agents.
//!
//! A holder grants an agent bounded spending authority through a
//! [`Mandate`]; the [`MandateAuthority`] creates, signs and verifies
//! mandates against expiry, revocation, merchant and amount guards, and
//! can additionally require a [`ConsensusVerifier`] panel to reach quorum
//! on the mandate signature.

pub mod authority;
pub mod config;
pub mod consensus;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod mandate;
pub mod ops;
pub mod registry;

pub use authority::{
    AuthorityConfig, GuardFailure, GuardKind, MandateAuthority, MandateInfo, MandateStatus,
    VerificationContext, VerificationReport,
};
pub use config::AgentPayConfig;
pub use consensus::{ConsensusConfig, ConsensusResult, ConsensusVerifier};
pub use error::{CryptoError, Error, FieldViolation, PoolMisconfiguration, Result};
pub use identity::Identity;
pub use mandate::{Mandate, MandateFields, MandateKind, Period};
pub use registry::{RevocationEntry, RevocationRegistry};
