//! Vote counting and Byzantine-fault-tolerance metrics.

use super::ballot::ConsensusBallot;
use serde::{Deserialize, Serialize};

/// Tolerance applied before rounding up, so `20 * 0.65` yields 13 rather
/// than 14 after floating-point error.
const THRESHOLD_EPSILON: f64 = 1e-9;

/// `ceil(pool_size * threshold)`, never less than one vote.
pub fn required_votes(pool_size: usize, threshold: f64) -> usize {
    let raw = (pool_size as f64 * threshold - THRESHOLD_EPSILON).ceil();
    (raw.max(0.0) as usize).max(1)
}

/// `floor(pool_size / 3) - 1`; negative for pools smaller than three.
pub fn max_compromised_agents(pool_size: usize) -> i64 {
    (pool_size / 3) as i64 - 1
}

/// Lifecycle of one consensus round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundState {
    Pending,
    Collecting,
    TimedOut,
    ConsensusReached,
    ConsensusFailed,
}

impl RoundState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ConsensusReached | Self::ConsensusFailed)
    }

    /// Terminal state for a round whose tally is complete.
    pub(crate) fn conclude(self, consensus_reached: bool) -> Self {
        match (self, consensus_reached) {
            (s, _) if s.is_terminal() => s,
            (_, true) => Self::ConsensusReached,
            (_, false) => Self::ConsensusFailed,
        }
    }
}

/// Fault-tolerance annotation of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByzantineMetrics {
    pub max_compromised_agents: i64,
    /// `votes_for - required_votes`
    pub security_margin: i64,
    /// Consensus was reached and compromised verifiers alone could not
    /// have reached it.
    pub is_byzantine_secure: bool,
}

/// Outcome of one consensus round. Fractions are in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub is_valid: bool,
    pub consensus_reached: bool,
    pub state: RoundState,
    pub timed_out: bool,
    pub votes_for: usize,
    pub votes_against: usize,
    pub total_votes: usize,
    pub required_votes: usize,
    pub consensus_threshold: f64,
    pub consensus_percentage: f64,
    pub total_latency_ms: u64,
    pub avg_latency_ms: f64,
    /// In dispatch order.
    pub ballots: Vec<ConsensusBallot>,
    pub byzantine_fault_tolerance: ByzantineMetrics,
}

pub(crate) fn tally(
    ballots: Vec<ConsensusBallot>,
    threshold: f64,
    state: RoundState,
    total_latency_ms: u64,
) -> ConsensusResult {
    let total_votes = ballots.len();
    let votes_for = ballots.iter().filter(|b| b.vote).count();
    let votes_against = total_votes - votes_for;
    let required = required_votes(total_votes, threshold);
    let consensus_reached = votes_for >= required;

    let consensus_percentage = if total_votes == 0 {
        0.0
    } else {
        votes_for as f64 / total_votes as f64
    };
    let avg_latency_ms = if total_votes == 0 {
        0.0
    } else {
        ballots.iter().map(|b| b.latency_ms as f64).sum::<f64>() / total_votes as f64
    };

    let max_compromised = max_compromised_agents(total_votes);
    let byzantine = ByzantineMetrics {
        max_compromised_agents: max_compromised,
        security_margin: votes_for as i64 - required as i64,
        is_byzantine_secure: consensus_reached && max_compromised < required as i64,
    };

    ConsensusResult {
        is_valid: consensus_reached,
        consensus_reached,
        timed_out: state == RoundState::TimedOut,
        state: state.conclude(consensus_reached),
        votes_for,
        votes_against,
        total_votes,
        required_votes: required,
        consensus_threshold: threshold,
        consensus_percentage,
        total_latency_ms,
        avg_latency_ms,
        ballots,
        byzantine_fault_tolerance: byzantine,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::ballot::BallotOutcome;
    use chrono::Utc;

    fn ballots(approve: usize, reject: usize) -> Vec<ConsensusBallot> {
        (0..approve + reject)
            .map(|i| {
                let outcome = if i < approve {
                    BallotOutcome::Approved
                } else {
                    BallotOutcome::Rejected
                };
                ConsensusBallot::new(format!("agent-{i}"), outcome, Utc::now(), 2)
            })
            .collect()
    }

    #[test]
    fn test_required_votes() {
        assert_eq!(required_votes(20, 0.65), 13);
        assert_eq!(required_votes(20, 0.67), 14);
        assert_eq!(required_votes(3, 0.67), 3);
        assert_eq!(required_votes(10, 1.0), 10);
        assert_eq!(required_votes(10, 0.5), 5);
        assert_eq!(required_votes(1, 0.01), 1);
    }

    #[test]
    fn test_max_compromised_agents() {
        assert_eq!(max_compromised_agents(20), 5);
        assert_eq!(max_compromised_agents(3), 0);
        assert_eq!(max_compromised_agents(2), -1);
    }

    #[test]
    fn test_exact_threshold_reaches_consensus_with_zero_margin() {
        let r = tally(ballots(13, 7), 0.65, RoundState::Collecting, 10);
        assert!(r.consensus_reached);
        assert!(r.is_valid);
        assert_eq!(r.required_votes, 13);
        assert_eq!(r.byzantine_fault_tolerance.security_margin, 0);
        assert!(r.byzantine_fault_tolerance.is_byzantine_secure);
        assert_eq!(r.state, RoundState::ConsensusReached);
        assert!((r.consensus_percentage - 0.65).abs() < 1e-12);
    }

    #[test]
    fn test_one_short_fails() {
        let r = tally(ballots(12, 8), 0.65, RoundState::Collecting, 10);
        assert!(!r.consensus_reached);
        assert_eq!(r.votes_for, 12);
        assert_eq!(r.votes_against, 8);
        assert_eq!(r.total_votes, 20);
        assert_eq!(r.byzantine_fault_tolerance.security_margin, -1);
        assert!(!r.byzantine_fault_tolerance.is_byzantine_secure);
        assert_eq!(r.state, RoundState::ConsensusFailed);
    }

    #[test]
    fn test_compromised_minority_cannot_force_consensus() {
        let r = tally(ballots(6, 14), 0.65, RoundState::Collecting, 10);
        assert_eq!(r.byzantine_fault_tolerance.max_compromised_agents, 5);
        assert!(!r.consensus_reached);
    }

    #[test]
    fn test_timed_out_round_is_flagged() {
        let r = tally(ballots(1, 2), 0.67, RoundState::TimedOut, 50);
        assert!(r.timed_out);
        assert_eq!(r.state, RoundState::ConsensusFailed);
    }

    #[test]
    fn test_avg_latency_is_mean_of_ballots() {
        let r = tally(ballots(2, 2), 0.5, RoundState::Collecting, 99);
        assert_eq!(r.avg_latency_ms, 2.0);
        assert_eq!(r.total_latency_ms, 99);
    }
}
