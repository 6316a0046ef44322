//! Mandate data model.
//!
//! A mandate grants an agent bounded spending authority on behalf of a
//! holder: an amount cap in minor currency units, a period, merchant rules
//! and an optional expiry. The signature covers the canonical encoding of
//! every other field.

use crate::error::FieldViolation;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Payload type bound into every mandate signature (type confusion prevention).
pub const MANDATE_PAYLOAD_TYPE: &str = "application/vnd.agentpay.mandate+json;v=1";

/// Only supported signature algorithm.
pub const SIGNATURE_ALGORITHM: &str = "ed25519";

/// Spending period the amount cap applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Single,
    Daily,
    Weekly,
    Monthly,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

impl FromStr for Period {
    type Err = FieldViolation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            other => Err(FieldViolation::new(
                "period",
                format!(
                    "unrecognized period '{other}' (expected single, daily, weekly or monthly)"
                ),
            )),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mandate kind.
///
/// | Kind | Purpose |
/// |------|---------|
/// | `Intent` | Standing authority within the cap |
/// | `Cart` | Authority bound to one concrete checkout |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MandateKind {
    Intent,
    Cart,
}

impl MandateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Intent => "intent",
            Self::Cart => "cart",
        }
    }
}

impl FromStr for MandateKind {
    type Err = FieldViolation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "intent" => Ok(Self::Intent),
            "cart" => Ok(Self::Cart),
            other => Err(FieldViolation::new(
                "kind",
                format!("unrecognized kind '{other}' (expected intent or cart)"),
            )),
        }
    }
}

impl fmt::Display for MandateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied fields for a new mandate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MandateFields {
    pub agent: String,
    pub holder: String,
    pub amount_cap_minor_units: u64,
    pub currency: String,
    pub period: Period,
    pub kind: MandateKind,
    #[serde(default)]
    pub merchant_allow: Vec<String>,
    #[serde(default)]
    pub merchant_block: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl MandateFields {
    pub fn new(
        agent: impl Into<String>,
        holder: impl Into<String>,
        amount_cap_minor_units: u64,
        currency: impl Into<String>,
        period: Period,
        kind: MandateKind,
    ) -> Self {
        Self {
            agent: agent.into(),
            holder: holder.into(),
            amount_cap_minor_units,
            currency: currency.into(),
            period,
            kind,
            merchant_allow: Vec::new(),
            merchant_block: Vec::new(),
            expires_at: None,
        }
    }

    pub fn with_merchant_allow(mut self, hosts: Vec<String>) -> Self {
        self.merchant_allow = hosts;
        self
    }

    pub fn with_merchant_block(mut self, hosts: Vec<String>) -> Self {
        self.merchant_block = hosts;
        self
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

/// Signature attached to a mandate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MandateSignature {
    /// MUST be "ed25519"
    pub algorithm: String,

    pub payload_type: String,

    /// SHA-256 of the canonical signed payload
    pub signed_payload_digest: String,

    /// Hex-encoded signer public key
    pub public_key: String,

    pub signer_did: String,

    /// Hex-encoded Ed25519 signature over the PAE of the canonical payload
    pub signature: String,

    /// Signing timestamp (metadata only, not covered by the signature)
    pub signed_at: DateTime<Utc>,
}

/// Bounded spending authority for an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mandate {
    pub id: String,
    pub agent: String,
    pub holder: String,
    #[serde(alias = "amount")]
    pub amount_cap_minor_units: u64,
    pub currency: String,
    pub period: Period,
    pub kind: MandateKind,
    #[serde(default)]
    pub merchant_allow: BTreeSet<String>,
    #[serde(default)]
    pub merchant_block: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<MandateSignature>,
}

impl Mandate {
    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// `expires_at` is exclusive: a mandate is expired from that instant on.
    ///
    /// A skew that is negative or does not fit the timestamp range is ignored.
    pub fn is_expired_at(&self, now: DateTime<Utc>, skew_seconds: i64) -> bool {
        let Some(exp) = self.expires_at else {
            return false;
        };
        let deadline = TimeDelta::try_seconds(skew_seconds.max(0))
            .and_then(|grace| exp.checked_add_signed(grace))
            .unwrap_or(exp);
        now >= deadline
    }
}

/// The fields covered by a mandate signature (everything but the signature).
#[derive(Debug, Serialize)]
pub(crate) struct SignablePayload<'a> {
    pub id: &'a str,
    pub agent: &'a str,
    pub holder: &'a str,
    pub amount_cap_minor_units: u64,
    pub currency: &'a str,
    pub period: Period,
    pub kind: MandateKind,
    pub merchant_allow: &'a BTreeSet<String>,
    pub merchant_block: &'a BTreeSet<String>,
    pub created_at: &'a DateTime<Utc>,
    pub expires_at: Option<&'a DateTime<Utc>>,
}

impl<'a> From<&'a Mandate> for SignablePayload<'a> {
    fn from(m: &'a Mandate) -> Self {
        Self {
            id: &m.id,
            agent: &m.agent,
            holder: &m.holder,
            amount_cap_minor_units: m.amount_cap_minor_units,
            currency: &m.currency,
            period: m.period,
            kind: m.kind,
            merchant_allow: &m.merchant_allow,
            merchant_block: &m.merchant_block,
            created_at: &m.created_at,
            expires_at: m.expires_at.as_ref(),
        }
    }
}
