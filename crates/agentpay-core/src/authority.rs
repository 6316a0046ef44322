//! Mandate issuance and verification.
//!
//! Verification flow, stopping at the first failing check:
//! 1. Signature over the canonical encoding (always)
//! 2. Expiry
//! 3. Revocation
//! 4. Merchant allow list, then block list (when a merchant is supplied)
//! 5. Amount cap (when an amount is supplied)
//! 6. Panel quorum (`verify_mandate_with_panel` only)

use crate::consensus::{ConsensusResult, ConsensusVerifier};
use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::mandate::{Mandate, MandateFields, SignatureError};
use crate::registry::{RevocationEntry, RevocationRegistry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[path = "authority_internal/mod.rs"]
mod authority_internal;

/// Authority configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorityConfig {
    /// Grace period added to `expires_at`.
    pub clock_skew_seconds: i64,
    /// Require `agent`/`holder` to be `did:key` identifiers and the signer
    /// to be one of them.
    pub require_party_signer: bool,
}

/// Largest accepted `clock_skew_seconds` (one day).
pub const MAX_CLOCK_SKEW_SECONDS: i64 = 86_400;

impl AuthorityConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0..=MAX_CLOCK_SKEW_SECONDS).contains(&self.clock_skew_seconds) {
            return Err(Error::Config {
                message: format!(
                    "clock_skew_seconds must be within [0, {MAX_CLOCK_SKEW_SECONDS}], got {}",
                    self.clock_skew_seconds
                ),
            });
        }
        Ok(())
    }
}

/// Caller-supplied facts a presented mandate is checked against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationContext {
    #[serde(default)]
    pub merchant: Option<String>,
    #[serde(default, alias = "amount")]
    pub amount_minor_units: Option<u64>,
}

impl VerificationContext {
    pub fn merchant(mut self, host: impl Into<String>) -> Self {
        self.merchant = Some(host.into());
        self
    }

    pub fn amount(mut self, amount_minor_units: u64) -> Self {
        self.amount_minor_units = Some(amount_minor_units);
        self
    }
}

/// A verification step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardKind {
    Signature,
    Expiry,
    Revocation,
    MerchantAllow,
    MerchantBlock,
    Amount,
    Quorum,
}

/// One executed step and whether it passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardCheck {
    pub guard: GuardKind,
    pub passed: bool,
}

/// Why a presented mandate was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GuardFailure {
    #[error("signature verification failed: {error}")]
    VerificationFailed { error: SignatureError },

    #[error("mandate expired at {expires_at} (now {now})")]
    ExpiredMandate {
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    #[error("mandate revoked at {revoked_at}{}", reason_suffix(.reason))]
    InvalidMandate {
        reason: Option<String>,
        revoked_at: DateTime<Utc>,
    },

    #[error("merchant {merchant} is not in the allow list")]
    MerchantNotAllowed { merchant: String },

    #[error("merchant {merchant} is blocked")]
    MerchantBlocked { merchant: String },

    #[error("amount {amount_minor_units} exceeds cap {cap_minor_units}")]
    AmountExceedsCap {
        amount_minor_units: u64,
        cap_minor_units: u64,
    },

    #[error(
        "panel quorum not reached: {votes_for}/{total_votes} approvals, {required_votes} required"
    )]
    QuorumNotReached {
        votes_for: usize,
        required_votes: usize,
        total_votes: usize,
    },
}

fn reason_suffix(reason: &Option<String>) -> String {
    reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default()
}

impl GuardFailure {
    pub fn code(&self) -> &'static str {
        match self {
            Self::VerificationFailed { .. } => "E_SIGNATURE",
            Self::ExpiredMandate { .. } => "E_EXPIRED",
            Self::InvalidMandate { .. } => "E_REVOKED",
            Self::MerchantNotAllowed { .. } => "E_MERCHANT_NOT_ALLOWED",
            Self::MerchantBlocked { .. } => "E_MERCHANT_BLOCKED",
            Self::AmountExceedsCap { .. } => "E_AMOUNT_EXCEEDS_CAP",
            Self::QuorumNotReached { .. } => "E_QUORUM_NOT_REACHED",
        }
    }

    pub fn guard(&self) -> GuardKind {
        match self {
            Self::VerificationFailed { .. } => GuardKind::Signature,
            Self::ExpiredMandate { .. } => GuardKind::Expiry,
            Self::InvalidMandate { .. } => GuardKind::Revocation,
            Self::MerchantNotAllowed { .. } => GuardKind::MerchantAllow,
            Self::MerchantBlocked { .. } => GuardKind::MerchantBlock,
            Self::AmountExceedsCap { .. } => GuardKind::Amount,
            Self::QuorumNotReached { .. } => GuardKind::Quorum,
        }
    }
}

/// Structured result of `verify_mandate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub mandate_id: String,
    pub valid: bool,
    /// Executed checks, in order.
    pub checks: Vec<GuardCheck>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<GuardFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer_did: Option<String>,
    pub verified_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consensus: Option<ConsensusResult>,
}

impl VerificationReport {
    pub fn failed_guard(&self) -> Option<GuardKind> {
        self.failure.as_ref().map(GuardFailure::guard)
    }
}

/// Live status of an issued mandate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MandateStatus {
    Active,
    Expired,
    Revoked,
    Unsigned,
    Invalid,
}

impl MandateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
            Self::Unsigned => "unsigned",
            Self::Invalid => "invalid",
        }
    }
}

/// Read-only projection of an issued mandate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MandateInfo {
    pub mandate: Mandate,
    pub status: MandateStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation: Option<RevocationEntry>,
    pub report: VerificationReport,
}

/// Creates, signs, verifies and revokes mandates.
#[derive(Clone)]
pub struct MandateAuthority {
    registry: RevocationRegistry,
    config: AuthorityConfig,
}

impl MandateAuthority {
    pub fn new(registry: RevocationRegistry, config: AuthorityConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &RevocationRegistry {
        &self.registry
    }

    pub fn config(&self) -> &AuthorityConfig {
        &self.config
    }

    /// Validate `fields` and issue an unsigned mandate.
    pub fn create_active_mandate(&self, fields: MandateFields) -> Result<Mandate> {
        self.create_active_mandate_at(fields, Utc::now())
    }

    /// Like [`create_active_mandate`](Self::create_active_mandate) with an
    /// explicit creation time.
    pub fn create_active_mandate_at(
        &self,
        fields: MandateFields,
        now: DateTime<Utc>,
    ) -> Result<Mandate> {
        authority_internal::issue::create_impl(self, fields, now)
    }

    /// Sign `mandate` with `signer`. Fails with `SignatureFailed` if the
    /// signer has no private key or the mandate is already signed.
    pub fn sign_mandate(&self, mandate: &Mandate, signer: &Identity) -> Result<Mandate> {
        authority_internal::issue::sign_impl(self, mandate, signer)
    }

    pub fn verify_mandate(
        &self,
        mandate: &Mandate,
        check_guards: bool,
        context: &VerificationContext,
    ) -> Result<VerificationReport> {
        self.verify_mandate_at(mandate, check_guards, context, Utc::now())
    }

    /// Like [`verify_mandate`](Self::verify_mandate) with an explicit `now`.
    /// Use this in tests to avoid clock-dependent assertions.
    pub fn verify_mandate_at(
        &self,
        mandate: &Mandate,
        check_guards: bool,
        context: &VerificationContext,
        now: DateTime<Utc>,
    ) -> Result<VerificationReport> {
        authority_internal::run::verify_at_impl(self, mandate, check_guards, context, now)
    }

    /// Full guard verification followed by a panel consensus round over the
    /// mandate's signature.
    pub async fn verify_mandate_with_panel(
        &self,
        mandate: &Mandate,
        context: &VerificationContext,
        panel: &ConsensusVerifier,
    ) -> Result<VerificationReport> {
        authority_internal::panel::verify_with_panel_impl(
            self,
            mandate,
            context,
            panel,
            Utc::now(),
        )
        .await
    }

    /// Idempotent: revoking a revoked id returns the original entry.
    pub fn revoke_mandate(
        &self,
        mandate_id: &str,
        reason: Option<&str>,
    ) -> Result<RevocationEntry> {
        self.registry.revoke(mandate_id, reason)
    }

    pub fn list_revocations(&self) -> Result<Vec<RevocationEntry>> {
        self.registry.list_revocations()
    }

    pub fn get_mandate_info(&self, mandate_id: &str) -> Result<MandateInfo> {
        self.get_mandate_info_at(mandate_id, Utc::now())
    }

    pub fn get_mandate_info_at(
        &self,
        mandate_id: &str,
        now: DateTime<Utc>,
    ) -> Result<MandateInfo> {
        authority_internal::info::mandate_info_impl(self, mandate_id, now)
    }
}
