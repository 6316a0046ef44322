use super::super::{AuthorityConfig, GuardFailure, VerificationContext};
use crate::error::Result;
use crate::mandate::merchant::{any_matches, normalize_host};
use crate::mandate::Mandate;
use crate::registry::RevocationRegistry;
use chrono::{DateTime, Utc};

pub(super) type GuardResult = std::result::Result<(), GuardFailure>;

pub(super) fn check_expiry_impl(
    config: &AuthorityConfig,
    mandate: &Mandate,
    now: DateTime<Utc>,
) -> GuardResult {
    match mandate.expires_at {
        Some(expires_at) if mandate.is_expired_at(now, config.clock_skew_seconds) => {
            Err(GuardFailure::ExpiredMandate { expires_at, now })
        }
        _ => Ok(()),
    }
}

/// Outer `Err` is a store failure; inner `Err` is the guard failing.
pub(super) fn check_revocation_impl(
    registry: &RevocationRegistry,
    mandate: &Mandate,
) -> Result<GuardResult> {
    Ok(match registry.get_revocation(&mandate.id)? {
        Some(entry) => Err(GuardFailure::InvalidMandate {
            reason: entry.reason,
            revoked_at: entry.revoked_at,
        }),
        None => Ok(()),
    })
}

pub(super) fn check_merchant_allow_impl(mandate: &Mandate, merchant: &str) -> GuardResult {
    if !mandate.merchant_allow.is_empty() && !any_matches(&mandate.merchant_allow, merchant) {
        return Err(GuardFailure::MerchantNotAllowed {
            merchant: normalize_host(merchant),
        });
    }
    Ok(())
}

pub(super) fn check_merchant_block_impl(mandate: &Mandate, merchant: &str) -> GuardResult {
    if any_matches(&mandate.merchant_block, merchant) {
        return Err(GuardFailure::MerchantBlocked {
            merchant: normalize_host(merchant),
        });
    }
    Ok(())
}

pub(super) fn check_amount_impl(mandate: &Mandate, context: &VerificationContext) -> GuardResult {
    match context.amount_minor_units {
        Some(amount) if amount > mandate.amount_cap_minor_units => {
            Err(GuardFailure::AmountExceedsCap {
                amount_minor_units: amount,
                cap_minor_units: mandate.amount_cap_minor_units,
            })
        }
        _ => Ok(()),
    }
}
