//! Threshold verification of a signature by a pool of independent verifiers.
//!
//! A round dispatches one [`BallotClaim`] to every verifier in the pool,
//! collects ballots until all complete or the deadline passes, and tallies
//! them against `ceil(pool_size * consensus_threshold)`. Ballots missing at
//! the deadline count as rejections.

pub mod ballot;
mod tally;
mod verifier;

pub use ballot::{
    BallotClaim, BallotOutcome, BallotVerifier, ConsensusBallot, PanelVerifier, VerifierFault,
};
pub use tally::{
    max_compromised_agents, required_votes, ByzantineMetrics, ConsensusResult, RoundState,
};
pub use verifier::{ConsensusVerifier, ConsensusVerifierBuilder};

use crate::error::{Error, PoolMisconfiguration, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONSENSUS_THRESHOLD: f64 = 0.67;
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Round parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Fraction of the pool that must approve, in `(0, 1]`.
    pub consensus_threshold: f64,
    pub min_agents: usize,
    pub max_agents: usize,
    /// Hard wall-clock deadline per round, measured from dispatch.
    pub timeout_ms: u64,
    pub parallel: bool,
    /// Sequential rounds only: stop evaluating once the outcome is decided.
    pub short_circuit: bool,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            consensus_threshold: DEFAULT_CONSENSUS_THRESHOLD,
            min_agents: 1,
            max_agents: 100,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            parallel: true,
            short_circuit: false,
        }
    }
}

impl ConsensusConfig {
    pub fn validate(&self) -> Result<()> {
        let t = self.consensus_threshold;
        if !(t > 0.0 && t <= 1.0) {
            return Err(Error::insufficient_agents(
                PoolMisconfiguration::Threshold { threshold: t },
            ));
        }
        if self.min_agents > self.max_agents {
            return Err(Error::Config {
                message: format!(
                    "min_agents ({}) exceeds max_agents ({})",
                    self.min_agents, self.max_agents
                ),
            });
        }
        if self.timeout_ms == 0 {
            return Err(Error::Config {
                message: "timeout_ms must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Check a pool size against `[min_agents, max_agents]`.
    pub fn check_pool_size(&self, pool_size: usize) -> Result<()> {
        if pool_size == 0 || pool_size < self.min_agents || pool_size > self.max_agents {
            return Err(Error::insufficient_agents(PoolMisconfiguration::PoolSize {
                pool_size,
                min_agents: self.min_agents,
                max_agents: self.max_agents,
            }));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = ConsensusConfig::default();
        assert_eq!(c.consensus_threshold, 0.67);
        assert_eq!(c.timeout_ms, 5000);
        assert!(c.parallel);
        assert!(!c.short_circuit);
        c.validate().unwrap();
    }

    #[test]
    fn test_threshold_bounds() {
        for bad in [0.0, -0.1, 1.01, f64::NAN] {
            let c = ConsensusConfig {
                consensus_threshold: bad,
                ..Default::default()
            };
            assert!(matches!(
                c.validate(),
                Err(Error::InsufficientAgents {
                    reason: PoolMisconfiguration::Threshold { .. }
                })
            ));
        }
        let c = ConsensusConfig {
            consensus_threshold: 1.0,
            ..Default::default()
        };
        c.validate().unwrap();
    }

    #[test]
    fn test_pool_size_bounds() {
        let c = ConsensusConfig {
            min_agents: 3,
            max_agents: 5,
            ..Default::default()
        };
        assert!(c.check_pool_size(0).is_err());
        assert!(c.check_pool_size(2).is_err());
        assert!(c.check_pool_size(3).is_ok());
        assert!(c.check_pool_size(5).is_ok());
        assert!(matches!(
            c.check_pool_size(6),
            Err(Error::InsufficientAgents {
                reason: PoolMisconfiguration::PoolSize { pool_size: 6, .. }
            })
        ));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let c: ConsensusConfig =
            serde_yaml::from_str("consensus_threshold: 0.8\nparallel: false\n").unwrap();
        assert_eq!(c.consensus_threshold, 0.8);
        assert!(!c.parallel);
        assert_eq!(c.max_agents, 100);
    }
}
