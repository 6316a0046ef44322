use super::super::MandateAuthority;
use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::mandate::signing::{check_signer_party, sign_payload};
use crate::mandate::{validate_fields, validate_mandate, Mandate, MandateFields};
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub(crate) fn new_mandate_id() -> String {
    format!("mdt_{}", Uuid::new_v4().simple())
}

pub(crate) fn create_impl(
    authority: &MandateAuthority,
    fields: MandateFields,
    now: DateTime<Utc>,
) -> Result<Mandate> {
    let rules = validate_fields(&fields, now).map_err(Error::validation)?;

    let mandate = Mandate {
        id: new_mandate_id(),
        agent: fields.agent.trim().to_string(),
        holder: fields.holder.trim().to_string(),
        amount_cap_minor_units: fields.amount_cap_minor_units,
        currency: fields.currency,
        period: fields.period,
        kind: fields.kind,
        merchant_allow: rules.allow,
        merchant_block: rules.block,
        created_at: now,
        expires_at: fields.expires_at,
        signature: None,
    };
    authority.registry.record_mandate(&mandate)?;

    tracing::info!(
        mandate_id = %mandate.id,
        agent = %mandate.agent,
        amount = mandate.amount_cap_minor_units,
        currency = %mandate.currency,
        period = %mandate.period,
        "mandate created"
    );
    Ok(mandate)
}

pub(crate) fn sign_impl(
    authority: &MandateAuthority,
    mandate: &Mandate,
    signer: &Identity,
) -> Result<Mandate> {
    if !signer.can_sign() {
        return Err(Error::SignatureFailed {
            reason: "signing identity has no private key".to_string(),
        });
    }
    if mandate.is_signed() {
        return Err(Error::SignatureFailed {
            reason: format!("mandate {} is already signed", mandate.id),
        });
    }
    validate_mandate(mandate).map_err(Error::validation)?;
    check_signer_party(mandate, signer.did(), authority.config.require_party_signer).map_err(
        |e| Error::SignatureFailed {
            reason: e.to_string(),
        },
    )?;

    let signature = sign_payload(mandate, signer)?;
    let signed = Mandate {
        signature: Some(signature),
        ..mandate.clone()
    };
    authority.registry.record_mandate(&signed)?;

    tracing::info!(
        mandate_id = %signed.id,
        signer = %signer.did(),
        "mandate signed"
    );
    Ok(signed)
}
