//! Root configuration document.
//!
//! ```yaml
//! database: /var/lib/agentpay/registry.db   # omit for in-memory
//! authority:
//!   clock_skew_seconds: 30
//!   require_party_signer: true
//! consensus:
//!   consensus_threshold: 0.67
//!   timeout_ms: 5000
//!   parallel: true
//! ```
//!
//! Environment overrides: `AGENTPAY_DB`, `AGENTPAY_CONSENSUS_THRESHOLD`,
//! `AGENTPAY_TIMEOUT_MS`.

use crate::authority::{AuthorityConfig, MandateAuthority};
use crate::consensus::ConsensusConfig;
use crate::error::{Error, Result};
use crate::registry::RevocationRegistry;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_DB: &str = "AGENTPAY_DB";
pub const ENV_CONSENSUS_THRESHOLD: &str = "AGENTPAY_CONSENSUS_THRESHOLD";
pub const ENV_TIMEOUT_MS: &str = "AGENTPAY_TIMEOUT_MS";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentPayConfig {
    pub authority: AuthorityConfig,
    pub consensus: ConsensusConfig,
    /// SQLite registry file; `None` keeps the registry in memory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
}

impl AgentPayConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|e| Error::Config {
            message: format!("invalid configuration: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {e}", path.display()),
        })?;
        Self::from_yaml_str(&raw)
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from `lookup` (normally `std::env::var`), then validate.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db) = lookup(ENV_DB).filter(|v| !v.trim().is_empty()) {
            self.database = Some(PathBuf::from(db));
        }
        if let Some(raw) = lookup(ENV_CONSENSUS_THRESHOLD) {
            self.consensus.consensus_threshold = parse_env(ENV_CONSENSUS_THRESHOLD, &raw)?;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            self.consensus.timeout_ms = parse_env(ENV_TIMEOUT_MS, &raw)?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        self.authority.validate()?;
        self.consensus.validate()
    }

    /// Open the configured registry.
    pub fn open_registry(&self) -> Result<RevocationRegistry> {
        match &self.database {
            Some(path) => RevocationRegistry::open(path),
            None => RevocationRegistry::memory(),
        }
    }

    pub fn build_authority(&self) -> Result<MandateAuthority> {
        Ok(MandateAuthority::new(
            self.open_registry()?,
            self.authority.clone(),
        ))
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e| Error::Config {
        message: format!("{key}={raw:?}: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_yaml_document() {
        let config = AgentPayConfig::from_yaml_str(
            r#"
database: /tmp/agentpay.db
authority:
  clock_skew_seconds: 30
  require_party_signer: true
consensus:
  consensus_threshold: 0.75
  parallel: false
"#,
        )
        .unwrap();
        assert_eq!(config.database, Some(PathBuf::from("/tmp/agentpay.db")));
        assert_eq!(config.authority.clock_skew_seconds, 30);
        assert!(config.authority.require_party_signer);
        assert_eq!(config.consensus.consensus_threshold, 0.75);
        assert!(!config.consensus.parallel);
        assert_eq!(config.consensus.timeout_ms, 5000);
    }

    #[test]
    fn test_empty_document_is_default() {
        let config = AgentPayConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, AgentPayConfig::default());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = AgentPayConfig::from_yaml_str("databse: x.db").unwrap_err();
        assert_eq!(err.code(), "E_CONFIG");
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let err = AgentPayConfig::from_yaml_str("consensus:\n  consensus_threshold: 1.5\n")
            .unwrap_err();
        assert_eq!(err.code(), "E_INSUFFICIENT_AGENTS");
    }

    #[test]
    fn test_clock_skew_bounds() {
        for bad in ["-1", "86401", "92233720368547758"] {
            let yaml = format!("authority:\n  clock_skew_seconds: {bad}\n");
            let err = AgentPayConfig::from_yaml_str(&yaml).unwrap_err();
            assert_eq!(err.code(), "E_CONFIG");
            assert!(err.to_string().contains("clock_skew_seconds"));
        }
        let config =
            AgentPayConfig::from_yaml_str("authority:\n  clock_skew_seconds: 86400\n").unwrap();
        assert_eq!(config.authority.clock_skew_seconds, 86_400);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AgentPayConfig::default();
        config
            .apply_env_overrides(env(&[
                (ENV_DB, "/data/registry.db"),
                (ENV_CONSENSUS_THRESHOLD, "0.8"),
                (ENV_TIMEOUT_MS, " 250 "),
            ]))
            .unwrap();
        assert_eq!(config.database, Some(PathBuf::from("/data/registry.db")));
        assert_eq!(config.consensus.consensus_threshold, 0.8);
        assert_eq!(config.consensus.timeout_ms, 250);
    }

    #[test]
    fn test_env_override_parse_errors() {
        let mut config = AgentPayConfig::default();
        let err = config
            .apply_env_overrides(env(&[(ENV_TIMEOUT_MS, "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_TIMEOUT_MS));

        let err = config
            .apply_env_overrides(env(&[(ENV_CONSENSUS_THRESHOLD, "0")]))
            .unwrap_err();
        assert_eq!(err.code(), "E_INSUFFICIENT_AGENTS");
    }

    #[test]
    fn test_load_from_file_and_open_registry() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("registry.db");
        let path = dir.path().join("agentpay.yaml");
        std::fs::write(&path, format!("database: {}\n", db.display())).unwrap();

        let config = AgentPayConfig::load(&path).unwrap();
        let authority = config.build_authority().unwrap();
        authority.revoke_mandate("mdt_1", None).unwrap();
        assert!(db.exists());
    }
}
