use super::super::{
    GuardFailure, GuardKind, MandateAuthority, VerificationContext, VerificationReport,
};
use super::run::{fail_report, pass_check, verify_at_impl};
use crate::consensus::ConsensusVerifier;
use crate::crypto::decode_hex;
use crate::error::{Error, Result};
use crate::mandate::{signing_input, Mandate};
use chrono::{DateTime, Utc};

pub(crate) async fn verify_with_panel_impl(
    authority: &MandateAuthority,
    mandate: &Mandate,
    context: &VerificationContext,
    panel: &ConsensusVerifier,
    now: DateTime<Utc>,
) -> Result<VerificationReport> {
    let mut report = verify_at_impl(authority, mandate, true, context, now)?;
    if !report.valid {
        return Ok(report);
    }

    // The signature check above passed, so the signature block is present.
    let signature_block = mandate.signature.as_ref().ok_or_else(|| Error::SignatureFailed {
        reason: format!("mandate {} lost its signature during verification", mandate.id),
    })?;
    let signature = decode_hex("signature", &signature_block.signature)?;
    let public_key = decode_hex("public_key", &signature_block.public_key)?;
    let message = signing_input(mandate)?;

    let result = panel
        .verify_with_consensus(&signature, &message, &public_key)
        .await?;

    if result.consensus_reached {
        pass_check(&mut report, GuardKind::Quorum);
    } else {
        tracing::info!(
            mandate_id = %mandate.id,
            votes_for = result.votes_for,
            required = result.required_votes,
            "panel quorum not reached"
        );
        fail_report(
            &mut report,
            GuardFailure::QuorumNotReached {
                votes_for: result.votes_for,
                required_votes: result.required_votes,
                total_votes: result.total_votes,
            },
        );
    }
    report.consensus = Some(result);
    Ok(report)
}
