//! Field invariants for mandates.

use super::merchant::{normalize_host, validate_rule};
use super::types::{Mandate, MandateFields};
use crate::error::FieldViolation;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Active ISO 4217 alphabetic codes, sorted. `XXX` and `XTS` are excluded.
const RECOGNIZED_CURRENCIES: &[&str] = &[
    "AED", "AFN", "ALL", "AMD", "ANG", "AOA", "ARS", "AUD", "AWG", "AZN", "BAM", "BBD", "BDT",
    "BGN", "BHD", "BIF", "BMD", "BND", "BOB", "BOV", "BRL", "BSD", "BTN", "BWP", "BYN", "BZD",
    "CAD", "CDF", "CHE", "CHF", "CHW", "CLF", "CLP", "CNY", "COP", "COU", "CRC", "CUC", "CUP",
    "CVE", "CZK", "DJF", "DKK", "DOP", "DZD", "EGP", "ERN", "ETB", "EUR", "FJD", "FKP", "GBP",
    "GEL", "GHS", "GIP", "GMD", "GNF", "GTQ", "GYD", "HKD", "HNL", "HTG", "HUF", "IDR", "ILS",
    "INR", "IQD", "IRR", "ISK", "JMD", "JOD", "JPY", "KES", "KGS", "KHR", "KMF", "KPW", "KRW",
    "KWD", "KYD", "KZT", "LAK", "LBP", "LKR", "LRD", "LSL", "LYD", "MAD", "MDL", "MGA", "MKD",
    "MMK", "MNT", "MOP", "MRU", "MUR", "MVR", "MWK", "MXN", "MXV", "MYR", "MZN", "NAD", "NGN",
    "NIO", "NOK", "NPR", "NZD", "OMR", "PAB", "PEN", "PGK", "PHP", "PKR", "PLN", "PYG", "QAR",
    "RON", "RSD", "RUB", "RWF", "SAR", "SBD", "SCR", "SDG", "SEK", "SGD", "SHP", "SLE", "SLL",
    "SOS", "SRD", "SSP", "STN", "SVC", "SYP", "SZL", "THB", "TJS", "TMT", "TND", "TOP", "TRY",
    "TTD", "TWD", "TZS", "UAH", "UGX", "USD", "USN", "UYI", "UYU", "UYW", "UZS", "VED", "VES",
    "VND", "VUV", "WST", "XAF", "XAG", "XAU", "XBA", "XBB", "XBC", "XBD", "XCD", "XCG", "XDR",
    "XOF", "XPD", "XPF", "XPT", "XSU", "XUA", "YER", "ZAR", "ZMW", "ZWG", "ZWL",
];

pub fn is_recognized_currency(code: &str) -> bool {
    RECOGNIZED_CURRENCIES.binary_search(&code).is_ok()
}

/// Merchant rules after normalisation.
#[derive(Debug, Clone, Default)]
pub(crate) struct MerchantRules {
    pub allow: BTreeSet<String>,
    pub block: BTreeSet<String>,
}

/// Validate caller-supplied fields for a new mandate.
///
/// `now` is used to reject an expiry that has already passed.
pub(crate) fn validate_fields(
    fields: &MandateFields,
    now: DateTime<Utc>,
) -> Result<MerchantRules, Vec<FieldViolation>> {
    let mut violations = Vec::new();
    check_parties(&fields.agent, &fields.holder, &mut violations);
    check_amount(fields.amount_cap_minor_units, &mut violations);
    check_currency(&fields.currency, &mut violations);
    let rules = check_merchants(&fields.merchant_allow, &fields.merchant_block, &mut violations);

    if let Some(exp) = fields.expires_at {
        if exp <= now {
            violations.push(FieldViolation::new(
                "expires_at",
                format!("{} is not in the future", exp.to_rfc3339()),
            ));
        }
    }

    if violations.is_empty() {
        Ok(rules)
    } else {
        Err(violations)
    }
}

/// Re-check the invariants of an existing mandate before signing it.
///
/// Expiry is not checked here; verification reports it.
pub(crate) fn validate_mandate(mandate: &Mandate) -> Result<(), Vec<FieldViolation>> {
    let mut violations = Vec::new();
    if mandate.id.trim().is_empty() {
        violations.push(FieldViolation::new("id", "must not be empty"));
    }
    check_parties(&mandate.agent, &mandate.holder, &mut violations);
    check_amount(mandate.amount_cap_minor_units, &mut violations);
    check_currency(&mandate.currency, &mut violations);

    let allow: Vec<String> = mandate.merchant_allow.iter().cloned().collect();
    let block: Vec<String> = mandate.merchant_block.iter().cloned().collect();
    let rules = check_merchants(&allow, &block, &mut violations);
    if rules.allow != mandate.merchant_allow || rules.block != mandate.merchant_block {
        violations.push(FieldViolation::new(
            "merchant_allow",
            "merchant rules must be normalised (lowercase, no trailing dot)",
        ));
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

fn check_parties(agent: &str, holder: &str, out: &mut Vec<FieldViolation>) {
    if agent.trim().is_empty() {
        out.push(FieldViolation::new("agent", "must not be empty"));
    }
    if holder.trim().is_empty() {
        out.push(FieldViolation::new("holder", "must not be empty"));
    }
}

fn check_amount(amount: u64, out: &mut Vec<FieldViolation>) {
    if amount == 0 {
        out.push(FieldViolation::new("amount", "must be greater than zero"));
    }
}

fn check_currency(currency: &str, out: &mut Vec<FieldViolation>) {
    if !is_recognized_currency(currency) {
        out.push(FieldViolation::new(
            "currency",
            format!("unrecognized ISO 4217 currency code '{currency}'"),
        ));
    }
}

fn check_merchants(
    allow: &[String],
    block: &[String],
    out: &mut Vec<FieldViolation>,
) -> MerchantRules {
    let allow = normalize_list("merchant_allow", allow, out);
    let block = normalize_list("merchant_block", block, out);

    let overlap: Vec<&String> = allow.intersection(&block).collect();
    if !overlap.is_empty() {
        let hosts = overlap
            .iter()
            .map(|h| h.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        out.push(FieldViolation::new(
            "merchant_block",
            format!("overlaps merchant_allow: {hosts}"),
        ));
    }

    MerchantRules { allow, block }
}

fn normalize_list(
    field: &str,
    hosts: &[String],
    out: &mut Vec<FieldViolation>,
) -> BTreeSet<String> {
    let mut set = BTreeSet::new();
    for raw in hosts {
        let host = normalize_host(raw);
        match validate_rule(&host) {
            Ok(()) => {
                set.insert(host);
            }
            Err(e) => out.push(FieldViolation::new(field, e)),
        }
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mandate::types::{MandateKind, Period};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 28, 12, 0, 0).unwrap()
    }

    fn fields() -> MandateFields {
        MandateFields::new(
            "agent-1",
            "holder-1",
            12000,
            "USD",
            Period::Monthly,
            MandateKind::Intent,
        )
    }

    #[test]
    fn test_valid_fields_normalise_merchants() {
        let f = fields()
            .with_merchant_allow(vec!["Shop.Example.com.".into(), "*.stripe.com".into()])
            .with_merchant_block(vec!["evil.example.com".into()]);
        let rules = validate_fields(&f, now()).unwrap();
        assert!(rules.allow.contains("shop.example.com"));
        assert!(rules.allow.contains("*.stripe.com"));
        assert!(rules.block.contains("evil.example.com"));
    }

    #[test]
    fn test_overlap_after_normalisation_is_rejected() {
        let f = fields()
            .with_merchant_allow(vec!["shop.example.com".into()])
            .with_merchant_block(vec!["SHOP.example.com".into()]);
        let violations = validate_fields(&f, now()).unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "merchant_block");
        assert!(violations[0].message.contains("shop.example.com"));
    }

    #[test]
    fn test_all_violations_are_listed() {
        let mut f = fields();
        f.agent = " ".into();
        f.amount_cap_minor_units = 0;
        f.currency = "usd".into();
        f.expires_at = Some(now() - chrono::Duration::seconds(1));
        let violations = validate_fields(&f, now()).unwrap_err();
        let names: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(names, vec!["agent", "amount", "currency", "expires_at"]);
    }

    #[test]
    fn test_invalid_hostname_is_reported() {
        let f = fields().with_merchant_allow(vec!["not a host".into()]);
        let violations = validate_fields(&f, now()).unwrap_err();
        assert_eq!(violations[0].field, "merchant_allow");
    }

    #[test]
    fn test_currency_list() {
        assert!(is_recognized_currency("USD"));
        assert!(is_recognized_currency("EUR"));
        assert!(!is_recognized_currency("XXX"));
        assert!(!is_recognized_currency("usd"));
    }

    #[test]
    fn test_less_common_currencies_are_accepted() {
        for code in ["BGN", "KZT", "XOF", "BHD", "ZWG", "XCG"] {
            let mut f = fields();
            f.currency = code.into();
            assert!(validate_fields(&f, now()).is_ok(), "{code} should be accepted");
        }
        assert!(RECOGNIZED_CURRENCIES.windows(2).all(|w| w[0] < w[1]));
        assert!(!is_recognized_currency("XTS"));
    }
}
