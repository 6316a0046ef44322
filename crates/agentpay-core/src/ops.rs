//! Wire operations.
//!
//! One JSON request names an operation and carries its arguments; byte
//! values (keys, signatures, messages) travel as hex strings:
//!
//! ```json
//! {"operation": "revoke_mandate", "arguments": {"mandate_id": "mdt_...", "reason": "lost"}}
//! ```
//!
//! The response echoes the operation name with a `result`. Failures are
//! reported as a [`WireError`] carrying the stable error code.

use crate::authority::{MandateAuthority, MandateInfo, VerificationContext, VerificationReport};
use crate::config::AgentPayConfig;
use crate::consensus::{
    ByzantineMetrics, ConsensusBallot, ConsensusConfig, ConsensusResult, ConsensusVerifier,
    RoundState,
};
use crate::crypto::decode_hex;
use crate::error::{Error, FieldViolation, Result};
use crate::identity::Identity;
use crate::mandate::{validate_fields, Mandate, MandateFields, MandateKind, Period};
use crate::registry::RevocationEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "arguments", rename_all = "snake_case")]
pub enum Request {
    CreateActiveMandate(CreateMandateArgs),
    SignMandate {
        mandate: Mandate,
        /// Hex-encoded Ed25519 private key.
        private_key: String,
    },
    VerifyMandate {
        signed_mandate: Mandate,
        #[serde(default = "default_true")]
        check_guards: bool,
        #[serde(default)]
        merchant: Option<String>,
        #[serde(default)]
        amount: Option<u64>,
        /// Evaluate guards at this instant instead of the current time.
        #[serde(default)]
        now: Option<DateTime<Utc>>,
    },
    RevokeMandate {
        mandate_id: String,
        #[serde(default)]
        reason: Option<String>,
    },
    ListRevocations,
    GetMandateInfo {
        mandate_id: String,
    },
    VerifyConsensus {
        message: String,
        signature: String,
        public_key: String,
        agent_public_keys: Vec<String>,
        #[serde(default)]
        consensus_threshold: Option<f64>,
    },
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateActiveMandate(_) => "create_active_mandate",
            Self::SignMandate { .. } => "sign_mandate",
            Self::VerifyMandate { .. } => "verify_mandate",
            Self::RevokeMandate { .. } => "revoke_mandate",
            Self::ListRevocations => "list_revocations",
            Self::GetMandateInfo { .. } => "get_mandate_info",
            Self::VerifyConsensus { .. } => "verify_consensus",
        }
    }
}

/// Arguments of `create_active_mandate`. `period` and `kind` stay strings
/// here so unknown values are reported as field violations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateMandateArgs {
    pub agent: String,
    pub holder: String,
    pub amount: u64,
    pub currency: String,
    pub period: String,
    pub kind: String,
    #[serde(default)]
    pub merchant_allow: Vec<String>,
    #[serde(default)]
    pub merchant_block: Vec<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "result", rename_all = "snake_case")]
pub enum Response {
    CreateActiveMandate(Mandate),
    SignMandate(Mandate),
    VerifyMandate(VerificationReport),
    RevokeMandate(RevocationEntry),
    ListRevocations(Vec<RevocationEntry>),
    GetMandateInfo(Box<MandateInfo>),
    VerifyConsensus(ConsensusReport),
}

/// Consensus result as exchanged on the wire: percentages are 0-100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusReport {
    pub is_valid: bool,
    pub consensus_reached: bool,
    pub state: RoundState,
    pub timed_out: bool,
    pub votes_for: usize,
    pub votes_against: usize,
    pub total_votes: usize,
    pub required_votes: usize,
    pub consensus_threshold: u32,
    pub consensus_percentage: u32,
    pub total_latency_ms: u64,
    pub avg_latency_ms: f64,
    pub ballots: Vec<ConsensusBallot>,
    pub byzantine_fault_tolerance: ByzantineMetrics,
}

fn percent(fraction: f64) -> u32 {
    (fraction * 100.0).round().clamp(0.0, 100.0) as u32
}

fn two_decimals(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl From<ConsensusResult> for ConsensusReport {
    fn from(r: ConsensusResult) -> Self {
        Self {
            is_valid: r.is_valid,
            consensus_reached: r.consensus_reached,
            state: r.state,
            timed_out: r.timed_out,
            votes_for: r.votes_for,
            votes_against: r.votes_against,
            total_votes: r.total_votes,
            required_votes: r.required_votes,
            consensus_threshold: percent(r.consensus_threshold),
            consensus_percentage: percent(r.consensus_percentage),
            total_latency_ms: r.total_latency_ms,
            avg_latency_ms: two_decimals(r.avg_latency_ms),
            ballots: r.ballots,
            byzantine_fault_tolerance: r.byzantine_fault_tolerance,
        }
    }
}

/// Error body returned to wire callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireError {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<FieldViolation>,
}

impl From<&Error> for WireError {
    fn from(e: &Error) -> Self {
        let violations = match e {
            Error::ValidationFailed { violations } => violations.clone(),
            _ => Vec::new(),
        };
        Self {
            code: e.code().to_string(),
            message: e.to_string(),
            violations,
        }
    }
}

/// Dispatches wire requests to the authority and to consensus rounds.
pub struct Service {
    authority: MandateAuthority,
    consensus: ConsensusConfig,
}

impl Service {
    pub fn new(authority: MandateAuthority, consensus: ConsensusConfig) -> Self {
        Self {
            authority,
            consensus,
        }
    }

    pub fn from_config(config: &AgentPayConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config.build_authority()?, config.consensus.clone()))
    }

    pub fn authority(&self) -> &MandateAuthority {
        &self.authority
    }

    pub async fn handle(&self, request: Request) -> Result<Response> {
        let span = tracing::info_span!("operation", name = request.name());
        self.dispatch(request).instrument(span).await
    }

    async fn dispatch(&self, request: Request) -> Result<Response> {
        match request {
            Request::CreateActiveMandate(args) => self
                .create_active_mandate(args)
                .map(Response::CreateActiveMandate),
            Request::SignMandate {
                mandate,
                private_key,
            } => {
                let signer = Identity::from_private_key_hex(&private_key)?;
                self.authority
                    .sign_mandate(&mandate, &signer)
                    .map(Response::SignMandate)
            }
            Request::VerifyMandate {
                signed_mandate,
                check_guards,
                merchant,
                amount,
                now,
            } => {
                let context = VerificationContext {
                    merchant: merchant.filter(|m| !m.trim().is_empty()),
                    amount_minor_units: amount,
                };
                self.authority
                    .verify_mandate_at(
                        &signed_mandate,
                        check_guards,
                        &context,
                        now.unwrap_or_else(Utc::now),
                    )
                    .map(Response::VerifyMandate)
            }
            Request::RevokeMandate { mandate_id, reason } => self
                .authority
                .revoke_mandate(&mandate_id, reason.as_deref())
                .map(Response::RevokeMandate),
            Request::ListRevocations => self
                .authority
                .list_revocations()
                .map(Response::ListRevocations),
            Request::GetMandateInfo { mandate_id } => self
                .authority
                .get_mandate_info(&mandate_id)
                .map(|info| Response::GetMandateInfo(Box::new(info))),
            Request::VerifyConsensus {
                message,
                signature,
                public_key,
                agent_public_keys,
                consensus_threshold,
            } => {
                let result = self
                    .verify_consensus(
                        &message,
                        &signature,
                        &public_key,
                        &agent_public_keys,
                        consensus_threshold,
                    )
                    .await?;
                Ok(Response::VerifyConsensus(result.into()))
            }
        }
    }

    fn create_active_mandate(&self, args: CreateMandateArgs) -> Result<Mandate> {
        let mut violations: Vec<FieldViolation> = Vec::new();
        let period = args
            .period
            .parse::<Period>()
            .map_err(|v| violations.push(v))
            .ok();
        let kind = args
            .kind
            .parse::<MandateKind>()
            .map_err(|v| violations.push(v))
            .ok();

        let mut fields = MandateFields::new(
            args.agent,
            args.holder,
            args.amount,
            args.currency,
            period.unwrap_or(Period::Single),
            kind.unwrap_or(MandateKind::Intent),
        )
        .with_merchant_allow(args.merchant_allow)
        .with_merchant_block(args.merchant_block);
        fields.expires_at = args.expires_at;

        if !violations.is_empty() {
            if let Err(more) = validate_fields(&fields, Utc::now()) {
                violations.extend(more);
            }
            return Err(Error::validation(violations));
        }
        self.authority.create_active_mandate(fields)
    }

    async fn verify_consensus(
        &self,
        message: &str,
        signature: &str,
        public_key: &str,
        agent_public_keys: &[String],
        consensus_threshold: Option<f64>,
    ) -> Result<ConsensusResult> {
        let message = decode_hex("message", message)?;
        let signature = decode_hex("signature", signature)?;
        let public_key = decode_hex("public_key", public_key)?;
        let pool = agent_public_keys
            .iter()
            .map(|k| Identity::from_public_key_hex(k))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let config = ConsensusConfig {
            consensus_threshold: consensus_threshold
                .unwrap_or(self.consensus.consensus_threshold),
            ..self.consensus.clone()
        };
        let verifier = ConsensusVerifier::builder()
            .config(config)
            .identities(pool)
            .build()?;
        verifier
            .verify_with_consensus(&signature, &message, &public_key)
            .await
    }
}
