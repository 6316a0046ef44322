//! Pool construction and round execution.

use super::ballot::{
    BallotClaim, BallotOutcome, BallotVerifier, ConsensusBallot, PanelVerifier, VerifierFault,
};
use super::tally::{self, required_votes, ConsensusResult, RoundState};
use super::ConsensusConfig;
use crate::error::Result;
use crate::identity::Identity;
use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio::time::timeout_at;
use tracing::{debug, info, warn};

/// Builder for [`ConsensusVerifier`].
#[derive(Default)]
pub struct ConsensusVerifierBuilder {
    config: ConsensusConfig,
    verifiers: Vec<Arc<dyn BallotVerifier>>,
}

impl ConsensusVerifierBuilder {
    /// Replace every round parameter at once.
    pub fn config(mut self, config: ConsensusConfig) -> Self {
        self.config = config;
        self
    }

    pub fn consensus_threshold(mut self, threshold: f64) -> Self {
        self.config.consensus_threshold = threshold;
        self
    }

    pub fn min_agents(mut self, min_agents: usize) -> Self {
        self.config.min_agents = min_agents;
        self
    }

    pub fn max_agents(mut self, max_agents: usize) -> Self {
        self.config.max_agents = max_agents;
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.timeout_ms = timeout_ms;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }

    pub fn short_circuit(mut self, short_circuit: bool) -> Self {
        self.config.short_circuit = short_circuit;
        self
    }

    /// Add an identity to the pool. Only its public key is kept.
    pub fn identity(self, identity: Identity) -> Self {
        self.verifier(PanelVerifier::new(identity))
    }

    pub fn identities(self, identities: impl IntoIterator<Item = Identity>) -> Self {
        identities.into_iter().fold(self, Self::identity)
    }

    pub fn verifier<V: BallotVerifier + 'static>(self, verifier: V) -> Self {
        self.shared_verifier(Arc::new(verifier))
    }

    pub fn shared_verifier(mut self, verifier: Arc<dyn BallotVerifier>) -> Self {
        self.verifiers.push(verifier);
        self
    }

    /// Fails with `InsufficientAgents` for a threshold outside `(0, 1]` or a
    /// pool outside `[min_agents, max_agents]`; `reason` tells them apart.
    pub fn build(self) -> Result<ConsensusVerifier> {
        self.config.validate()?;
        self.config.check_pool_size(self.verifiers.len())?;
        Ok(ConsensusVerifier {
            config: self.config,
            verifiers: self.verifiers,
        })
    }
}

/// A fixed pool of verifiers and the parameters for its rounds.
///
/// Rounds are independent; the verifier keeps no state between them.
pub struct ConsensusVerifier {
    config: ConsensusConfig,
    verifiers: Vec<Arc<dyn BallotVerifier>>,
}

impl ConsensusVerifier {
    pub fn builder() -> ConsensusVerifierBuilder {
        ConsensusVerifierBuilder::default()
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    pub fn pool_size(&self) -> usize {
        self.verifiers.len()
    }

    pub fn agent_ids(&self) -> Vec<String> {
        self.verifiers
            .iter()
            .map(|v| v.agent_id().to_string())
            .collect()
    }

    /// Ask every verifier whether `signature` is a valid signature over
    /// `message` by `claimed_public_key`, and tally the answers.
    ///
    /// Faulty verifiers are absorbed as rejections; the only error is a
    /// pool that no longer satisfies the configured bounds.
    pub async fn verify_with_consensus(
        &self,
        signature: &[u8],
        message: &[u8],
        claimed_public_key: &[u8],
    ) -> Result<ConsensusResult> {
        self.verify_claim(BallotClaim {
            signature: signature.to_vec(),
            message: message.to_vec(),
            claimed_public_key: claimed_public_key.to_vec(),
        })
        .await
    }

    pub async fn verify_claim(&self, claim: BallotClaim) -> Result<ConsensusResult> {
        self.config.check_pool_size(self.verifiers.len())?;

        let pool_size = self.verifiers.len();
        let required = required_votes(pool_size, self.config.consensus_threshold);
        debug!(
            pool_size,
            required,
            parallel = self.config.parallel,
            timeout_ms = self.config.timeout_ms,
            "dispatching consensus round"
        );

        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + Duration::from_millis(self.config.timeout_ms);
        let (ballots, state) = if self.config.parallel {
            self.collect_parallel(Arc::new(claim), started, deadline).await
        } else {
            self.collect_sequential(&claim, required, deadline).await
        };

        let result = tally::tally(
            ballots,
            self.config.consensus_threshold,
            state,
            elapsed_ms(started),
        );
        info!(
            votes_for = result.votes_for,
            required = result.required_votes,
            total = result.total_votes,
            consensus_reached = result.consensus_reached,
            timed_out = result.timed_out,
            latency_ms = result.total_latency_ms,
            "consensus round complete"
        );
        Ok(result)
    }

    async fn collect_parallel(
        &self,
        claim: Arc<BallotClaim>,
        started: Instant,
        deadline: tokio::time::Instant,
    ) -> (Vec<ConsensusBallot>, RoundState) {
        let mut tasks = JoinSet::new();
        for (index, verifier) in self.verifiers.iter().enumerate() {
            let verifier = Arc::clone(verifier);
            let claim = Arc::clone(&claim);
            tasks.spawn(async move {
                let t0 = Instant::now();
                let outcome = evaluate_guarded(verifier.as_ref(), &claim).await;
                (index, outcome, elapsed_ms(t0))
            });
        }

        let mut slots: Vec<Option<ConsensusBallot>> =
            (0..self.verifiers.len()).map(|_| None).collect();
        let mut state = RoundState::Collecting;
        loop {
            match timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((index, outcome, latency_ms)))) => {
                    let agent_id = self.verifiers[index].agent_id();
                    log_ballot(agent_id, &outcome, latency_ms);
                    slots[index] = Some(ConsensusBallot::new(
                        agent_id,
                        outcome,
                        Utc::now(),
                        latency_ms,
                    ));
                }
                Ok(Some(Err(e))) => warn!(error = %e, "verifier task did not complete"),
                Ok(None) => break,
                Err(_) => {
                    state = RoundState::TimedOut;
                    tasks.abort_all();
                    break;
                }
            }
        }

        let partial_latency_ms = elapsed_ms(started);
        let ballots = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    let agent_id = self.verifiers[index].agent_id();
                    let outcome = if state == RoundState::TimedOut {
                        BallotOutcome::TimedOut
                    } else {
                        BallotOutcome::Faulted {
                            reason: "verifier task did not complete".to_string(),
                        }
                    };
                    log_ballot(agent_id, &outcome, partial_latency_ms);
                    ConsensusBallot::new(agent_id, outcome, Utc::now(), partial_latency_ms)
                })
            })
            .collect();
        (ballots, state)
    }

    async fn collect_sequential(
        &self,
        claim: &BallotClaim,
        required: usize,
        deadline: tokio::time::Instant,
    ) -> (Vec<ConsensusBallot>, RoundState) {
        let pool_size = self.verifiers.len();
        let mut ballots = Vec::with_capacity(pool_size);
        let mut votes_for = 0usize;
        let mut state = RoundState::Collecting;

        for (index, verifier) in self.verifiers.iter().enumerate() {
            let remaining = pool_size - index;
            let decided = votes_for >= required || votes_for + remaining < required;
            let t0 = Instant::now();

            let outcome = if state == RoundState::TimedOut {
                BallotOutcome::TimedOut
            } else if self.config.short_circuit && decided {
                BallotOutcome::Skipped
            } else if tokio::time::Instant::now() >= deadline {
                state = RoundState::TimedOut;
                BallotOutcome::TimedOut
            } else {
                match timeout_at(deadline, evaluate_guarded(verifier.as_ref(), claim)).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        state = RoundState::TimedOut;
                        BallotOutcome::TimedOut
                    }
                }
            };

            if outcome.is_approval() {
                votes_for += 1;
            }
            let latency_ms = elapsed_ms(t0);
            log_ballot(verifier.agent_id(), &outcome, latency_ms);
            ballots.push(ConsensusBallot::new(
                verifier.agent_id(),
                outcome,
                Utc::now(),
                latency_ms,
            ));
        }
        (ballots, state)
    }
}

/// Run one evaluation, turning a panic into a fault.
async fn evaluate_guarded(verifier: &dyn BallotVerifier, claim: &BallotClaim) -> BallotOutcome {
    match AssertUnwindSafe(verifier.evaluate(claim)).catch_unwind().await {
        Ok(result) => BallotOutcome::from(result),
        Err(payload) => BallotOutcome::from(Err(VerifierFault::Panicked(panic_message(
            payload.as_ref(),
        )))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn log_ballot(agent_id: &str, outcome: &BallotOutcome, latency_ms: u64) {
    match outcome {
        BallotOutcome::Faulted { reason } => {
            warn!(agent_id, latency_ms, reason = %reason, "verifier fault recorded as rejection")
        }
        BallotOutcome::TimedOut => {
            warn!(agent_id, latency_ms, "ballot timed out; recorded as rejection")
        }
        other => debug!(agent_id, latency_ms, outcome = other.as_str(), "ballot cast"),
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}
