//! Merchant hostname rules.
//!
//! Entries are exact hostnames (`shop.example.com`) or wildcard suffixes
//! (`*.example.com`). A wildcard matches strict subdomains only, never the
//! bare domain itself. All comparisons happen on normalised hostnames:
//! ASCII-lowercased with any trailing dot removed.

use std::collections::BTreeSet;

const MAX_HOSTNAME_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// Lowercase, trim and drop a trailing root dot.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim().to_ascii_lowercase();
    host.strip_suffix('.').map(str::to_string).unwrap_or(host)
}

/// Check a normalised rule entry (hostname or `*.` wildcard).
pub fn validate_rule(rule: &str) -> Result<(), String> {
    let host = rule.strip_prefix("*.").unwrap_or(rule);
    if host.contains('*') {
        return Err(format!("'{rule}': wildcard is only allowed as a leading '*.' label"));
    }
    validate_hostname(host).map_err(|e| format!("'{rule}': {e}"))
}

fn validate_hostname(host: &str) -> Result<(), String> {
    if host.is_empty() {
        return Err("empty hostname".to_string());
    }
    if host.len() > MAX_HOSTNAME_LEN {
        return Err(format!("hostname longer than {MAX_HOSTNAME_LEN} characters"));
    }
    for label in host.split('.') {
        if label.is_empty() {
            return Err("empty label".to_string());
        }
        if label.len() > MAX_LABEL_LEN {
            return Err(format!("label longer than {MAX_LABEL_LEN} characters"));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(format!("label '{label}' starts or ends with '-'"));
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(format!("label '{label}' contains invalid characters"));
        }
    }
    Ok(())
}

/// Does a single rule match the (normalised) hostname?
pub fn rule_matches(rule: &str, host: &str) -> bool {
    match rule.strip_prefix("*.") {
        Some(suffix) => host
            .strip_suffix(suffix)
            .and_then(|prefix| prefix.strip_suffix('.'))
            .is_some_and(|sub| !sub.is_empty()),
        None => rule == host,
    }
}

/// Does any rule in the set match the hostname?
pub fn any_matches(rules: &BTreeSet<String>, host: &str) -> bool {
    let host = normalize_host(host);
    rules.iter().any(|rule| rule_matches(rule, &host))
}
