//! Consensus rounds over real Ed25519 verifier pools.

use agentpay_core::consensus::{
    BallotClaim, BallotOutcome, BallotVerifier, ConsensusVerifier, RoundState, VerifierFault,
};
use agentpay_core::{
    AuthorityConfig, GuardKind, Identity, MandateAuthority, MandateFields, MandateKind, Period,
    RevocationRegistry, VerificationContext,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn pool(n: usize) -> Vec<Identity> {
    (0..n)
        .map(|_| Identity::generate().unwrap().public_only())
        .collect()
}

#[tokio::test]
async fn test_honest_pool_reaches_consensus() {
    init_tracing();
    let signer = Identity::generate().unwrap();
    let message = b"authorize 4999 USD at shop.example.com";
    let signature = signer.sign(message).unwrap();

    let verifier = ConsensusVerifier::builder()
        .consensus_threshold(0.65)
        .identities(pool(20))
        .build()
        .unwrap();
    let result = verifier
        .verify_with_consensus(&signature, message, &signer.public_key())
        .await
        .unwrap();

    assert!(result.is_valid);
    assert_eq!(result.state, RoundState::ConsensusReached);
    assert_eq!(result.votes_for, 20);
    assert_eq!(result.required_votes, 13);
    assert_eq!(result.byzantine_fault_tolerance.max_compromised_agents, 5);
    assert_eq!(result.byzantine_fault_tolerance.security_margin, 7);
    assert!(result.byzantine_fault_tolerance.is_byzantine_secure);
}

#[tokio::test]
async fn test_tampered_message_is_rejected_by_every_agent() {
    let signer = Identity::generate().unwrap();
    let signature = signer.sign(b"pay 10 EUR").unwrap();

    let verifier = ConsensusVerifier::builder()
        .identities(pool(5))
        .parallel(false)
        .build()
        .unwrap();
    let result = verifier
        .verify_with_consensus(&signature, b"pay 10000 EUR", &signer.public_key())
        .await
        .unwrap();

    assert!(!result.is_valid);
    assert_eq!(result.state, RoundState::ConsensusFailed);
    assert_eq!(result.votes_against, 5);
    assert!(result
        .ballots
        .iter()
        .all(|b| b.outcome == BallotOutcome::Rejected));
}

#[tokio::test]
async fn test_malformed_signature_faults_without_failing_the_call() {
    let signer = Identity::generate().unwrap();
    let verifier = ConsensusVerifier::builder()
        .identities(pool(3))
        .build()
        .unwrap();
    let result = verifier
        .verify_with_consensus(&[0u8; 10], b"m", &signer.public_key())
        .await
        .unwrap();

    assert!(!result.consensus_reached);
    assert!(result
        .ballots
        .iter()
        .all(|b| matches!(b.outcome, BallotOutcome::Faulted { .. })));
}

struct Refuser;

#[async_trait]
impl BallotVerifier for Refuser {
    fn agent_id(&self) -> &str {
        "refuser"
    }

    async fn evaluate(&self, _claim: &BallotClaim) -> Result<bool, VerifierFault> {
        Ok(false)
    }
}

#[tokio::test]
async fn test_mandate_panel_requires_quorum() {
    init_tracing();
    let authority = MandateAuthority::new(
        RevocationRegistry::memory().unwrap(),
        AuthorityConfig::default(),
    );
    let holder = Identity::generate().unwrap();
    let fields = MandateFields::new(
        "shopping-agent-1",
        "user-42",
        12000,
        "USD",
        Period::Monthly,
        MandateKind::Intent,
    )
    .with_expires_at(Utc::now() + Duration::days(30));
    let created = authority.create_active_mandate(fields).unwrap();
    let signed = authority.sign_mandate(&created, &holder).unwrap();
    let ctx = VerificationContext::default().amount(1500);

    let honest = ConsensusVerifier::builder()
        .identities(pool(3))
        .build()
        .unwrap();
    let report = authority
        .verify_mandate_with_panel(&signed, &ctx, &honest)
        .await
        .unwrap();
    assert!(report.valid);
    assert!(report.consensus.as_ref().unwrap().consensus_reached);

    // Two refusers out of three leave one approval, below ceil(3 * 0.67) = 3.
    let split = ConsensusVerifier::builder()
        .identities(pool(1))
        .verifier(Refuser)
        .verifier(Refuser)
        .build()
        .unwrap();
    let report = authority
        .verify_mandate_with_panel(&signed, &ctx, &split)
        .await
        .unwrap();
    assert!(!report.valid);
    assert_eq!(report.failed_guard(), Some(GuardKind::Quorum));
    assert_eq!(report.consensus.unwrap().votes_for, 1);
}
