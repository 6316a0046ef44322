//! Ballots and the verifier seam.
//!
//! Every verifier in a pool evaluates the same [`BallotClaim`]: a signature
//! over a message, asserted to belong to a claimed public key. A verifier
//! either answers (`Ok(true)` approve, `Ok(false)` reject) or faults; a fault
//! is recorded on the ballot and counts as a rejection.

use crate::identity::Identity;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ed25519_dalek::SIGNATURE_LENGTH;
use serde::{Deserialize, Serialize};

/// The assertion a pool adjudicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BallotClaim {
    pub signature: Vec<u8>,
    pub message: Vec<u8>,
    pub claimed_public_key: Vec<u8>,
}

/// A verifier could not produce a vote.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifierFault {
    #[error("malformed signature: expected 64 bytes, got {len}")]
    MalformedSignature { len: usize },

    #[error("malformed claimed public key: {reason}")]
    MalformedKey { reason: String },

    #[error("verifier panicked: {0}")]
    Panicked(String),

    #[error("verifier failure: {0}")]
    Internal(String),
}

#[async_trait]
pub trait BallotVerifier: Send + Sync {
    /// Stable identifier recorded on the ballot.
    fn agent_id(&self) -> &str;

    async fn evaluate(&self, claim: &BallotClaim) -> Result<bool, VerifierFault>;
}

/// Pool member backed by an [`Identity`].
///
/// Checks the claim against the claimed public key; its own key only
/// identifies the ballot.
pub struct PanelVerifier {
    identity: Identity,
}

impl PanelVerifier {
    /// Any private key on `identity` is dropped.
    pub fn new(identity: Identity) -> Self {
        Self {
            identity: identity.public_only(),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }
}

#[async_trait]
impl BallotVerifier for PanelVerifier {
    fn agent_id(&self) -> &str {
        self.identity.did()
    }

    async fn evaluate(&self, claim: &BallotClaim) -> Result<bool, VerifierFault> {
        if claim.signature.len() != SIGNATURE_LENGTH {
            return Err(VerifierFault::MalformedSignature {
                len: claim.signature.len(),
            });
        }
        let claimed = Identity::from_public_key(&claim.claimed_public_key).map_err(|e| {
            VerifierFault::MalformedKey {
                reason: e.to_string(),
            }
        })?;
        Ok(claimed.verify(&claim.signature, &claim.message))
    }
}

/// How a ballot was decided. Only `Approved` is a yes vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BallotOutcome {
    Approved,
    Rejected,
    Faulted { reason: String },
    /// Not completed before the round deadline.
    TimedOut,
    /// Not evaluated: the sequential round was already decided.
    Skipped,
}

impl BallotOutcome {
    pub fn is_approval(&self) -> bool {
        matches!(self, Self::Approved)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Faulted { .. } => "faulted",
            Self::TimedOut => "timed_out",
            Self::Skipped => "skipped",
        }
    }
}

impl From<Result<bool, VerifierFault>> for BallotOutcome {
    fn from(result: Result<bool, VerifierFault>) -> Self {
        match result {
            Ok(true) => Self::Approved,
            Ok(false) => Self::Rejected,
            Err(fault) => Self::Faulted {
                reason: fault.to_string(),
            },
        }
    }
}

/// One verifier's vote within a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusBallot {
    pub agent_id: String,
    pub vote: bool,
    pub outcome: BallotOutcome,
    pub timestamp: DateTime<Utc>,
    pub latency_ms: u64,
}

impl ConsensusBallot {
    pub fn new(
        agent_id: impl Into<String>,
        outcome: BallotOutcome,
        timestamp: DateTime<Utc>,
        latency_ms: u64,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            vote: outcome.is_approval(),
            outcome,
            timestamp,
            latency_ms,
        }
    }
}
