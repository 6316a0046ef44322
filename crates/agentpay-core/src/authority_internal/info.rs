use super::super::{
    GuardFailure, MandateAuthority, MandateInfo, MandateStatus, VerificationContext,
};
use super::run::verify_at_impl;
use crate::error::{Error, Result};
use crate::mandate::SignatureError;
use chrono::{DateTime, Utc};

pub(crate) fn mandate_info_impl(
    authority: &MandateAuthority,
    mandate_id: &str,
    now: DateTime<Utc>,
) -> Result<MandateInfo> {
    let mandate = authority
        .registry
        .get_mandate(mandate_id)?
        .ok_or_else(|| Error::MandateNotFound {
            mandate_id: mandate_id.to_string(),
        })?;

    let context = VerificationContext::default();
    let report = verify_at_impl(authority, &mandate, true, &context, now)?;
    let revocation = authority.registry.get_revocation(mandate_id)?;
    // Revocation is terminal whatever else fails.
    let status = if revocation.is_some() {
        MandateStatus::Revoked
    } else {
        status_from_failure(report.failure.as_ref())
    };

    Ok(MandateInfo {
        mandate,
        status,
        revocation,
        report,
    })
}

fn status_from_failure(failure: Option<&GuardFailure>) -> MandateStatus {
    match failure {
        None => MandateStatus::Active,
        Some(GuardFailure::VerificationFailed {
            error: SignatureError::Unsigned,
        }) => MandateStatus::Unsigned,
        Some(GuardFailure::VerificationFailed { .. }) => MandateStatus::Invalid,
        Some(GuardFailure::ExpiredMandate { .. }) => MandateStatus::Expired,
        Some(GuardFailure::InvalidMandate { .. }) => MandateStatus::Revoked,
        // Not reachable without merchant, amount or panel context.
        Some(_) => MandateStatus::Invalid,
    }
}
