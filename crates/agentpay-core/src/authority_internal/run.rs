use super::super::{
    GuardCheck, GuardFailure, GuardKind, MandateAuthority, VerificationContext,
    VerificationReport,
};
use super::guards::{self, GuardResult};
use crate::error::Result;
use crate::mandate::{verify_signature, Mandate};
use chrono::{DateTime, Utc};

pub(crate) fn verify_at_impl(
    authority: &MandateAuthority,
    mandate: &Mandate,
    check_guards: bool,
    context: &VerificationContext,
    now: DateTime<Utc>,
) -> Result<VerificationReport> {
    let mut checks = Vec::new();

    let (signer_did, outcome) =
        match verify_signature(mandate, authority.config.require_party_signer) {
            Ok(verified) => {
                checks.push(passed(GuardKind::Signature));
                let outcome = if check_guards {
                    check_guards_impl(authority, mandate, context, now, &mut checks)?
                } else {
                    Ok(())
                };
                (Some(verified.signer_did), outcome)
            }
            Err(error) => {
                checks.push(failed(GuardKind::Signature));
                (None, Err(GuardFailure::VerificationFailed { error }))
            }
        };

    let report = build_report(mandate, checks, outcome.err(), signer_did, now);
    tracing::debug!(
        mandate_id = %report.mandate_id,
        valid = report.valid,
        failure = report.failure_code.as_deref().unwrap_or("none"),
        "mandate verified"
    );
    Ok(report)
}

/// Guards after the signature, in order. The first failure ends the run.
fn check_guards_impl(
    authority: &MandateAuthority,
    mandate: &Mandate,
    context: &VerificationContext,
    now: DateTime<Utc>,
    checks: &mut Vec<GuardCheck>,
) -> Result<GuardResult> {
    let expiry = guards::check_expiry_impl(&authority.config, mandate, now);
    if record(checks, GuardKind::Expiry, &expiry) {
        return Ok(expiry);
    }

    let revocation = guards::check_revocation_impl(&authority.registry, mandate)?;
    if record(checks, GuardKind::Revocation, &revocation) {
        return Ok(revocation);
    }

    if let Some(merchant) = context.merchant.as_deref() {
        let allow = guards::check_merchant_allow_impl(mandate, merchant);
        if record(checks, GuardKind::MerchantAllow, &allow) {
            return Ok(allow);
        }
        let block = guards::check_merchant_block_impl(mandate, merchant);
        if record(checks, GuardKind::MerchantBlock, &block) {
            return Ok(block);
        }
    }

    if context.amount_minor_units.is_some() {
        let amount = guards::check_amount_impl(mandate, context);
        if record(checks, GuardKind::Amount, &amount) {
            return Ok(amount);
        }
    }

    Ok(Ok(()))
}

/// Append the check; true if it failed.
fn record(checks: &mut Vec<GuardCheck>, guard: GuardKind, result: &GuardResult) -> bool {
    checks.push(GuardCheck {
        guard,
        passed: result.is_ok(),
    });
    result.is_err()
}

fn passed(guard: GuardKind) -> GuardCheck {
    GuardCheck {
        guard,
        passed: true,
    }
}

fn failed(guard: GuardKind) -> GuardCheck {
    GuardCheck {
        guard,
        passed: false,
    }
}

pub(super) fn build_report(
    mandate: &Mandate,
    checks: Vec<GuardCheck>,
    failure: Option<GuardFailure>,
    signer_did: Option<String>,
    now: DateTime<Utc>,
) -> VerificationReport {
    VerificationReport {
        mandate_id: mandate.id.clone(),
        valid: failure.is_none(),
        checks,
        failure_code: failure.as_ref().map(|f| f.code().to_string()),
        failure,
        signer_did,
        verified_at: now,
        consensus: None,
    }
}

pub(super) fn fail_report(report: &mut VerificationReport, failure: GuardFailure) {
    report.checks.push(failed(failure.guard()));
    report.valid = false;
    report.failure_code = Some(failure.code().to_string());
    report.failure = Some(failure);
}

pub(super) fn pass_check(report: &mut VerificationReport, guard: GuardKind) {
    report.checks.push(passed(guard));
}
