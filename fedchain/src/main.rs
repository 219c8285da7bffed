// src/main.rs
//
// Participant simulation that wires up the fedchain library:
//
// - in-memory contribution ledger, token ledger and collectible registry
// - local keyed-hash proof verifier
// - configured reward policy
// - a few participants submitting gradient updates each round
// - the operator averaging the admitted ones and submitting the
//   full-training update

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use fedchain::{
    AccountId, AggregationError, ContributionKind, CoordinationEngine, DeclaredMetrics,
    FedAvgAggregator, FedChainConfig, Hash256, InMemoryCollectibleRegistry,
    InMemoryContributionLedger, InMemoryCoordinationEngine, InMemoryTokenLedger,
    KeyedHashVerifier, MetricsRegistry, ModelDigest, Proof, PublicInputs, RoundId, Submission,
    SubmissionOutcome, TokenLedger,
};

const PARTICIPANTS: usize = 4;
const ROUNDS: u64 = 2;
/// Fewest admitted gradients a round needs before it is aggregated.
const MIN_PARTICIPANTS: usize = 3;
const LAYER_SIZES: [usize; 2] = [8, 4];

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fedchain=info")),
        )
        .init();

    if let Err(err) = run_simulation() {
        error!(error = %err, "simulation failed");
        std::process::exit(1);
    }
}

fn run_simulation() -> Result<(), String> {
    let cfg = match std::env::var("FEDCHAIN_CONFIG") {
        Ok(path) => FedChainConfig::from_json_file(&path).map_err(|e| e.to_string())?,
        Err(_) => FedChainConfig::default(),
    };

    let metrics = MetricsRegistry::new()
        .map_err(|e| format!("failed to initialise metrics registry: {e}"))?;

    // ---------------------------
    // Deployment wiring
    // ---------------------------

    let administrator = cfg.engine.administrator_id();
    let token = Arc::new(InMemoryTokenLedger::new(administrator));
    let collectibles = Arc::new(InMemoryCollectibleRegistry::new(administrator));
    let keys = cfg.verifier.keys().map_err(|e| e.to_string())?;
    // The simulator attests proofs itself, so it always verifies locally.
    let attester = Arc::new(KeyedHashVerifier::new(&keys));

    let engine: InMemoryCoordinationEngine = CoordinationEngine::builder()
        .ledger(InMemoryContributionLedger::new())
        .reward_policy(cfg.reward.build_policy())
        .verifier(attester.clone())
        .token_ledger(token.clone())
        .collectibles(collectibles.clone())
        .config(&cfg.engine)
        .metrics(metrics.coordinator.clone())
        .build()
        .map_err(|e| e.to_string())?;

    engine
        .governor()
        .hand_off_all(&administrator)
        .map_err(|e| format!("authority handoff failed: {e}"))?;

    let participants: Vec<AccountId> = (0..PARTICIPANTS)
        .map(|i| AccountId::from_public_key(format!("participant-{i}").as_bytes()))
        .collect();
    let operator = AccountId::from_public_key(b"aggregation-operator");

    // ---------------------------
    // Training rounds
    // ---------------------------

    for _ in 0..ROUNDS {
        let round = engine.current_round();
        let prior = engine.current_model().version;

        let mut batch = Vec::with_capacity(PARTICIPANTS + 2);
        let mut updates = Vec::with_capacity(PARTICIPANTS);
        for (i, participant) in participants.iter().enumerate() {
            let update = local_update(participant, round);
            let quality_bps = 6_000 + 1_000 * i as u32;
            batch.push(attested(
                &attester,
                *participant,
                round,
                ContributionKind::Gradient,
                prior,
                digest_of(&update),
                quality_bps,
            ));
            updates.push(update);
        }

        // One replay and one forgery per round.
        if let Some(first) = batch.first().cloned() {
            batch.push(first);
        }
        if let Some(mut forged) = batch.first().cloned() {
            forged.participant = AccountId::from_public_key(b"forger");
            batch.push(forged);
        }

        // Only admitted updates are averaged.
        let mut aggregator = FedAvgAggregator::with_min_updates(MIN_PARTICIPANTS);
        for (i, result) in engine.submit_batch(batch).into_iter().enumerate() {
            match result {
                Ok(SubmissionOutcome::Accepted(a)) => {
                    info!(
                        participant = %a.contribution.participant,
                        reward = a.reward,
                        "gradient accepted"
                    );
                    if let Some(update) = updates.get(i) {
                        aggregator.add(update).map_err(|e| e.to_string())?;
                    }
                }
                Ok(SubmissionOutcome::Rejected(reason)) => {
                    warn!(reason = %reason, "gradient rejected")
                }
                Err(e) => return Err(e.to_string()),
            }
        }

        match aggregator.aggregate() {
            Ok(averaged) => {
                let training = attested(
                    &attester,
                    operator,
                    round,
                    ContributionKind::FullTraining,
                    prior,
                    digest_of(&averaged),
                    9_500,
                );
                match engine.submit(training).map_err(|e| e.to_string())? {
                    SubmissionOutcome::Accepted(a) => {
                        if let Some(version) = &a.new_version {
                            info!(
                                version = version.version,
                                digest = %version.digest,
                                collectible = ?a.collectible,
                                "aggregated model published"
                            );
                        }
                    }
                    SubmissionOutcome::Rejected(reason) => {
                        warn!(reason = %reason, "aggregation rejected")
                    }
                }
            }
            Err(e @ (AggregationError::Empty | AggregationError::TooFewUpdates { .. })) => {
                warn!(round = %round, error = %e, "not enough participants, model not advanced")
            }
            Err(e) => return Err(e.to_string()),
        }

        let summary = engine
            .finalize_round(&administrator)
            .map_err(|e| format!("finalize round failed: {e}"))?;
        info!(
            round = %summary.round,
            participants = summary.participants.len(),
            total_rewards = summary.total_rewards,
            "round closed"
        );
    }

    for participant in participants.iter().chain(std::iter::once(&operator)) {
        info!(
            account = %participant,
            balance = token.balance_of(participant),
            "final balance"
        );
    }
    info!(
        model_version = engine.current_model().version,
        total_supply = token.total_supply(),
        collectibles = collectibles.len(),
        "simulation finished"
    );
    Ok(())
}

/// Deterministic pseudo-gradient for `participant` in `round`.
fn local_update(participant: &AccountId, round: RoundId) -> Vec<Vec<f32>> {
    let mut seed = Vec::from(participant.as_hash().as_bytes().as_slice());
    seed.extend_from_slice(&round.0.to_be_bytes());
    let bytes = *Hash256::compute(&seed).as_bytes();

    LAYER_SIZES
        .iter()
        .enumerate()
        .map(|(layer, &size)| {
            (0..size)
                .map(|i| {
                    let b = bytes[(layer * 8 + i) % bytes.len()];
                    (f32::from(b) - 128.0) / 128.0
                })
                .collect()
        })
        .collect()
}

/// Content identifier of an update, in the `Qm…` style of the model store.
fn digest_of(update: &[Vec<f32>]) -> ModelDigest {
    let bytes: Vec<u8> = update
        .iter()
        .flatten()
        .flat_map(|v| v.to_le_bytes())
        .collect();
    ModelDigest::new(format!("Qm{}", Hash256::compute(&bytes).to_hex()))
}

fn attested(
    attester: &KeyedHashVerifier,
    participant: AccountId,
    round: RoundId,
    kind: ContributionKind,
    prior_version: u64,
    update_digest: ModelDigest,
    quality_bps: u32,
) -> Submission {
    let mut submission = Submission {
        participant,
        round,
        kind,
        proof: Proof::default(),
        public_inputs: PublicInputs {
            prior_version,
            metrics: DeclaredMetrics {
                quality_bps,
                sample_count: 256,
            },
            update_digest,
        },
    };
    submission.proof = attester.attest(kind, &submission.public_input_digest());
    submission
}
