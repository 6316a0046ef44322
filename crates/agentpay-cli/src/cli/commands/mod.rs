pub mod call;
mod dispatch;
pub mod keygen;
pub mod serve;

pub use dispatch::dispatch;

use agentpay_core::ops::Service;
use agentpay_core::AgentPayConfig;
use std::path::Path;

/// Configuration file (or defaults), then environment, then `--db`.
pub(crate) fn load_config(
    config_path: Option<&Path>,
    db: Option<&Path>,
) -> anyhow::Result<AgentPayConfig> {
    let mut config = match config_path {
        Some(path) => AgentPayConfig::load(path)?,
        None => AgentPayConfig::default(),
    };
    config.apply_env_overrides(|key| std::env::var(key).ok())?;
    if let Some(db) = db {
        config.database = Some(db.to_path_buf());
    }
    tracing::debug!(
        database = ?config.database,
        consensus_threshold = config.consensus.consensus_threshold,
        "configuration loaded"
    );
    Ok(config)
}

pub(crate) fn build_service(
    config_path: Option<&Path>,
    db: Option<&Path>,
) -> anyhow::Result<Service> {
    let config = load_config(config_path, db)?;
    Ok(Service::from_config(&config)?)
}
