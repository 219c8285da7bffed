//! Submission state machine.
//!
//! The coordination engine wires together:
//!
//! - a [`ContributionLedger`] for replay protection,
//! - a [`ProofVerifier`] for the correctness predicate,
//! - a [`RewardPolicy`] for compensation,
//! - the external [`TokenLedger`] and [`CollectibleRegistry`], and
//! - the [`ModelRegistry`] holding the canonical model lineage.
//!
//! Each `(participant, round, kind)` slot moves `Unseen -> Pending ->
//! {Accepted, Rejected}`. Reservation and commit run under one engine
//! lock; proof verification runs outside it so that distinct
//! submissions verify in parallel. A commit either applies every effect
//! (reward, collectible, ledger mark, model advance) or none of them.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::{debug, error, info, warn};

use crate::collaborators::{CollaboratorError, CollectibleRegistry, TokenLedger};
use crate::metrics::CoordinatorMetrics;
use crate::reward::{MetricScaledRewardPolicy, RewardDecision, RewardPolicy};
use crate::storage::InMemoryContributionLedger;
use crate::types::{
    AccountId, CollectibleId, Contribution, ContributionKey, ContributionKind,
    ContributionOutcome, ModelDigest, ModelVersion, RewardRecord, RoundId, Submission,
    TokenAmount,
};
use crate::verification::ProofVerifier;

use super::authority::AuthorityGovernor;
use super::config::EngineConfig;
use super::error::{AuthorityError, ConfigError, EngineError, RejectReason};
use super::ledger::{ContributionLedger, SlotStatus};
use super::registry::ModelRegistry;
use super::rounds::{RoundBook, RoundSummary};

/// Effects of an accepted contribution.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Acceptance {
    pub contribution: ContributionKey,
    /// New canonical model, for full-training contributions.
    pub new_version: Option<ModelVersion>,
    pub reward: TokenAmount,
    pub collectible: Option<CollectibleId>,
}

/// Result of judging one submission.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SubmissionOutcome {
    Accepted(Acceptance),
    Rejected(RejectReason),
}

impl SubmissionOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmissionOutcome::Accepted(_))
    }

    pub fn acceptance(&self) -> Option<&Acceptance> {
        match self {
            SubmissionOutcome::Accepted(a) => Some(a),
            SubmissionOutcome::Rejected(_) => None,
        }
    }

    pub fn reject_reason(&self) -> Option<&RejectReason> {
        match self {
            SubmissionOutcome::Accepted(_) => None,
            SubmissionOutcome::Rejected(r) => Some(r),
        }
    }

    /// `"accepted"` or the rejection code; used as a metrics label.
    pub fn label(&self) -> &'static str {
        match self {
            SubmissionOutcome::Accepted(_) => "accepted",
            SubmissionOutcome::Rejected(r) => r.code(),
        }
    }
}

/// Everything the commit section mutates.
struct EngineState<L> {
    ledger: L,
    registry: ModelRegistry,
    rounds: RoundBook,
    rewards: Vec<RewardRecord>,
    contributions: Vec<Contribution>,
}

/// Reward effects already applied to the collaborators.
struct AppliedReward {
    amount: TokenAmount,
    collectible: Option<CollectibleId>,
}

/// Verified-contribution coordinator.
///
/// Generic over:
///
/// - `L`: replay-protection backend implementing [`ContributionLedger`],
/// - `P`: reward policy implementing [`RewardPolicy`].
///
/// All methods take `&self`; the engine can be shared behind an `Arc`.
pub struct CoordinationEngine<L, P> {
    engine_id: AccountId,
    administrator: AccountId,
    verifier: Arc<dyn ProofVerifier>,
    token: Arc<dyn TokenLedger>,
    collectibles: Arc<dyn CollectibleRegistry>,
    policy: P,
    governor: AuthorityGovernor,
    metrics: Option<CoordinatorMetrics>,
    state: Mutex<EngineState<L>>,
}

impl<L, P> CoordinationEngine<L, P>
where
    L: ContributionLedger,
    P: RewardPolicy,
{
    /// Identity the engine acts as towards the collaborators.
    pub fn engine_id(&self) -> AccountId {
        self.engine_id
    }

    /// Identity allowed to finalize rounds.
    pub fn administrator(&self) -> AccountId {
        self.administrator
    }

    pub fn governor(&self) -> &AuthorityGovernor {
        &self.governor
    }

    pub fn token_ledger(&self) -> &Arc<dyn TokenLedger> {
        &self.token
    }

    pub fn collectibles(&self) -> &Arc<dyn CollectibleRegistry> {
        &self.collectibles
    }

    /// Judges one submission.
    ///
    /// Every routine refusal is an `Ok(Rejected(..))`. `Err` is returned
    /// only when the contribution ledger itself fails; effects applied
    /// before such a fault are compensated first.
    pub fn submit(&self, submission: Submission) -> Result<SubmissionOutcome, EngineError> {
        let started = Instant::now();
        let result = self.process(submission);
        self.observe(started, &result);
        result
    }

    /// Judges many submissions, verifying their proofs in parallel.
    ///
    /// Only proof verification is parallel. Reservation and commit then
    /// run one entry at a time in input order, so an earlier entry always
    /// wins a slot or a model version over a later one. Each result is
    /// what [`submit`] would have returned had the entries been submitted
    /// one after another.
    ///
    /// [`submit`]: CoordinationEngine::submit
    pub fn submit_batch(
        &self,
        submissions: Vec<Submission>,
    ) -> Vec<Result<SubmissionOutcome, EngineError>> {
        let verdicts: Vec<bool> = submissions
            .par_iter()
            .map(|submission| self.check_proof(submission))
            .collect();

        submissions
            .into_iter()
            .zip(verdicts)
            .map(|(submission, verified)| {
                let started = Instant::now();
                let result = self.process_verified(submission, verified);
                self.observe(started, &result);
                result
            })
            .collect()
    }

    fn observe(&self, started: Instant, result: &Result<SubmissionOutcome, EngineError>) {
        if let (Some(metrics), Ok(outcome)) = (&self.metrics, result) {
            metrics.observe_submission(outcome.label(), started.elapsed().as_secs_f64());
        }
    }

    fn process(&self, submission: Submission) -> Result<SubmissionOutcome, EngineError> {
        if let Some(refused) = self.reserve(&submission.key())? {
            return Ok(refused);
        }
        // Verification runs outside the lock.
        let verified = self.check_proof(&submission);
        self.judge(submission, verified)
    }

    /// Same pipeline as `process`, with the proof verdict already known.
    fn process_verified(
        &self,
        submission: Submission,
        verified: bool,
    ) -> Result<SubmissionOutcome, EngineError> {
        if let Some(refused) = self.reserve(&submission.key())? {
            return Ok(refused);
        }
        self.judge(submission, verified)
    }

    /// Claims the slot of `key`. Returns the refusal when the round is
    /// closed or the slot is taken; closed rounds leave no record at all.
    fn reserve(&self, key: &ContributionKey) -> Result<Option<SubmissionOutcome>, EngineError> {
        debug!(
            participant = %key.participant,
            round = %key.round,
            kind = %key.kind,
            "submission received"
        );

        let mut state = self.state.lock();
        let open = state.rounds.open_round();
        if key.round != open {
            return Ok(Some(reject(
                key,
                RejectReason::RoundClosed {
                    round: key.round,
                    open,
                },
            )));
        }
        if !state.ledger.try_reserve(key)? {
            return Ok(Some(reject(key, RejectReason::DuplicateContribution)));
        }
        Ok(None)
    }

    /// A contribution that names no update artefact is malformed and
    /// fails like a bad proof.
    fn check_proof(&self, submission: &Submission) -> bool {
        if submission.public_inputs.update_digest.is_empty() {
            return false;
        }
        let digest = submission.public_input_digest();
        self.verifier
            .verify(submission.kind, &digest, &submission.proof)
    }

    /// Settles a reserved submission given its proof verdict.
    fn judge(
        &self,
        submission: Submission,
        verified: bool,
    ) -> Result<SubmissionOutcome, EngineError> {
        let contribution = Contribution::pending(submission);
        let key = contribution.key;

        if !verified {
            let mut state = self.state.lock();
            state.ledger.release(&key)?;
            return Ok(refuse(&mut *state, contribution, RejectReason::ProofInvalid));
        }
        debug!(participant = %key.participant, kind = %key.kind, "proof verified");

        // Pure reward computation.
        let decision = self.policy.compute(&contribution);

        let mut state = self.state.lock();
        self.commit(&mut state, contribution, decision)
    }

    /// Applies every effect of an accepted contribution, or none.
    ///
    /// Must be called with the engine lock held and the slot pending.
    fn commit(
        &self,
        state: &mut EngineState<L>,
        contribution: Contribution,
        decision: RewardDecision,
    ) -> Result<SubmissionOutcome, EngineError> {
        let key = contribution.key;

        // The round may have been finalized while the proof was checked.
        let open = state.rounds.open_round();
        if key.round != open {
            state.ledger.release(&key)?;
            return Ok(refuse(
                state,
                contribution,
                RejectReason::RoundClosed {
                    round: key.round,
                    open,
                },
            ));
        }

        // Lineage is validated before any collaborator is touched so a
        // stale contribution needs no compensation.
        let next_version = match key.kind {
            ContributionKind::Gradient => None,
            ContributionKind::FullTraining => {
                let inputs = &contribution.public_inputs;
                match state.registry.prepare_advance(
                    inputs.prior_version,
                    inputs.update_digest.clone(),
                    Some(key.participant),
                ) {
                    Ok(next) => Some(next),
                    Err(e) => {
                        state.ledger.release(&key)?;
                        return Ok(refuse(state, contribution, e.into()));
                    }
                }
            }
        };

        let model_digest = decision.collectible.as_ref().map(|c| c.model_digest.clone());
        let applied = match self.apply_reward(&key.participant, &decision) {
            Ok(applied) => applied,
            Err(e) => {
                state.ledger.release(&key)?;
                return Ok(refuse(state, contribution, RejectReason::Collaborator(e)));
            }
        };

        if let Err(e) = state.ledger.mark_accepted(&key) {
            error!(
                participant = %key.participant,
                round = %key.round,
                kind = %key.kind,
                error = %e,
                "failed to mark contribution accepted; compensating reward"
            );
            self.compensate(&key.participant, &applied);
            if let Err(release_err) = state.ledger.release(&key) {
                error!(error = %release_err, "failed to release slot after ledger fault");
            }
            settle(state, contribution, ContributionOutcome::Rejected);
            return Err(e.into());
        }

        // Nothing below can fail.
        if let Some(next) = &next_version {
            state.registry.apply(next.clone());
            info!(
                version = next.version,
                digest = %next.digest,
                contributor = %key.participant,
                "canonical model advanced"
            );
            if let Some(metrics) = &self.metrics {
                metrics.set_model_version(next.version);
            }
        }
        state
            .rounds
            .record(key.round, key.participant, applied.amount);
        state.rewards.push(RewardRecord {
            contribution: key,
            amount: applied.amount,
            collectible: applied.collectible,
            model_digest: applied.collectible.and(model_digest),
        });
        settle(state, contribution, ContributionOutcome::Accepted);
        if let Some(metrics) = &self.metrics {
            metrics.observe_reward(applied.amount);
        }

        info!(
            participant = %key.participant,
            round = %key.round,
            kind = %key.kind,
            reward = applied.amount,
            "contribution accepted"
        );

        Ok(SubmissionOutcome::Accepted(Acceptance {
            contribution: key,
            new_version: next_version,
            reward: applied.amount,
            collectible: applied.collectible,
        }))
    }

    /// Mints the reward. If the collectible mint fails the token mint is
    /// undone before the error is returned.
    fn apply_reward(
        &self,
        participant: &AccountId,
        decision: &RewardDecision,
    ) -> Result<AppliedReward, CollaboratorError> {
        self.token
            .mint(&self.engine_id, participant, decision.amount)?;

        let collectible = match &decision.collectible {
            None => None,
            Some(request) => {
                match self
                    .collectibles
                    .mint(&self.engine_id, participant, &request.model_digest)
                {
                    Ok(id) => Some(id),
                    Err(e) => {
                        self.burn_tokens(participant, decision.amount);
                        return Err(e);
                    }
                }
            }
        };

        Ok(AppliedReward {
            amount: decision.amount,
            collectible,
        })
    }

    fn compensate(&self, participant: &AccountId, applied: &AppliedReward) {
        if let Some(id) = applied.collectible {
            if let Err(e) = self.collectibles.burn(&self.engine_id, id) {
                error!(collectible = %id, error = %e, "failed to burn collectible during compensation");
            }
        }
        self.burn_tokens(participant, applied.amount);
    }

    fn burn_tokens(&self, participant: &AccountId, amount: TokenAmount) {
        match self.token.burn(&self.engine_id, participant, amount) {
            Ok(()) => warn!(participant = %participant, amount, "reward mint compensated"),
            Err(e) => error!(
                participant = %participant,
                amount,
                error = %e,
                "failed to burn reward during compensation"
            ),
        }
    }

    /// Closes the open round and opens the next one. Administrator only.
    pub fn finalize_round(&self, caller: &AccountId) -> Result<RoundSummary, AuthorityError> {
        if *caller != self.administrator {
            return Err(AuthorityError::NotAuthorized);
        }
        let summary = self.state.lock().rounds.finalize();
        info!(
            round = %summary.round,
            participants = summary.participants.len(),
            total_rewards = summary.total_rewards,
            "round finalized"
        );
        Ok(summary)
    }

    pub fn current_model(&self) -> ModelVersion {
        self.state.lock().registry.current().clone()
    }

    /// Every model version, oldest first.
    pub fn model_history(&self) -> Vec<ModelVersion> {
        self.state.lock().registry.history().to_vec()
    }

    pub fn model_at(&self, version: u64) -> Option<ModelVersion> {
        self.state.lock().registry.model_at(version).cloned()
    }

    pub fn slot_status(&self, key: &ContributionKey) -> Result<SlotStatus, EngineError> {
        Ok(self.state.lock().ledger.status(key)?)
    }

    pub fn is_accepted(&self, key: &ContributionKey) -> Result<bool, EngineError> {
        Ok(self.state.lock().ledger.is_accepted(key)?)
    }

    /// The round currently accepting contributions.
    pub fn current_round(&self) -> RoundId {
        self.state.lock().rounds.open_round()
    }

    pub fn is_round_finalized(&self, round: RoundId) -> bool {
        self.state.lock().rounds.is_finalized(round)
    }

    /// Accepted participants of `round`, in acceptance order.
    pub fn round_participants(&self, round: RoundId) -> Vec<AccountId> {
        self.state.lock().rounds.participants(round)
    }

    pub fn participant_reward(&self, round: RoundId, participant: &AccountId) -> TokenAmount {
        self.state.lock().rounds.reward_of(round, participant)
    }

    /// Rewards granted so far, in acceptance order.
    pub fn reward_records(&self) -> Vec<RewardRecord> {
        self.state.lock().rewards.clone()
    }

    /// Every contribution that held a slot, in settlement order.
    ///
    /// Refusals that never reserved a slot (replays, closed rounds) are
    /// not contributions and do not appear here.
    pub fn contributions(&self) -> Vec<Contribution> {
        self.state.lock().contributions.clone()
    }
}

/// Moves `contribution` to its terminal state and appends it to the log.
fn settle<L>(
    state: &mut EngineState<L>,
    mut contribution: Contribution,
    outcome: ContributionOutcome,
) {
    let settled = contribution.settle(outcome);
    debug_assert!(settled, "contribution settled twice");
    state.contributions.push(contribution);
}

/// Rejects a contribution that held a slot. The slot must already be
/// released.
fn refuse<L>(
    state: &mut EngineState<L>,
    contribution: Contribution,
    reason: RejectReason,
) -> SubmissionOutcome {
    let outcome = reject(&contribution.key, reason);
    settle(state, contribution, ContributionOutcome::Rejected);
    outcome
}

fn reject(key: &ContributionKey, reason: RejectReason) -> SubmissionOutcome {
    warn!(
        participant = %key.participant,
        round = %key.round,
        kind = %key.kind,
        reason = %reason,
        "contribution rejected"
    );
    SubmissionOutcome::Rejected(reason)
}

impl CoordinationEngine<InMemoryContributionLedger, MetricScaledRewardPolicy> {
    /// Starts a builder with the in-memory ledger and the metric-scaled
    /// policy; both can be swapped before `build`.
    pub fn builder() -> CoordinationEngineBuilder<InMemoryContributionLedger, MetricScaledRewardPolicy> {
        CoordinationEngineBuilder::new()
    }
}

/// Builder for [`CoordinationEngine`].
///
/// The proof verifier, both collaborators and the initial model are
/// required; `build` fails with `InvalidConfiguration` when any of them
/// is missing. The ledger defaults to [`InMemoryContributionLedger`] and
/// the policy to [`MetricScaledRewardPolicy`].
pub struct CoordinationEngineBuilder<L, P> {
    ledger: L,
    policy: P,
    verifier: Option<Arc<dyn ProofVerifier>>,
    token: Option<Arc<dyn TokenLedger>>,
    collectibles: Option<Arc<dyn CollectibleRegistry>>,
    initial_model: Option<ModelDigest>,
    engine_id: AccountId,
    administrator: AccountId,
    metrics: Option<CoordinatorMetrics>,
}

impl CoordinationEngineBuilder<InMemoryContributionLedger, MetricScaledRewardPolicy> {
    pub fn new() -> Self {
        let defaults = EngineConfig::default();
        Self {
            ledger: InMemoryContributionLedger::new(),
            policy: MetricScaledRewardPolicy::default(),
            verifier: None,
            token: None,
            collectibles: None,
            initial_model: None,
            engine_id: defaults.engine_id(),
            administrator: defaults.administrator_id(),
            metrics: None,
        }
    }
}

impl Default for CoordinationEngineBuilder<InMemoryContributionLedger, MetricScaledRewardPolicy> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L, P> CoordinationEngineBuilder<L, P>
where
    L: ContributionLedger,
    P: RewardPolicy,
{
    pub fn ledger<L2: ContributionLedger>(self, ledger: L2) -> CoordinationEngineBuilder<L2, P> {
        CoordinationEngineBuilder {
            ledger,
            policy: self.policy,
            verifier: self.verifier,
            token: self.token,
            collectibles: self.collectibles,
            initial_model: self.initial_model,
            engine_id: self.engine_id,
            administrator: self.administrator,
            metrics: self.metrics,
        }
    }

    pub fn reward_policy<P2: RewardPolicy>(self, policy: P2) -> CoordinationEngineBuilder<L, P2> {
        CoordinationEngineBuilder {
            ledger: self.ledger,
            policy,
            verifier: self.verifier,
            token: self.token,
            collectibles: self.collectibles,
            initial_model: self.initial_model,
            engine_id: self.engine_id,
            administrator: self.administrator,
            metrics: self.metrics,
        }
    }

    pub fn verifier(mut self, verifier: Arc<dyn ProofVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn token_ledger(mut self, token: Arc<dyn TokenLedger>) -> Self {
        self.token = Some(token);
        self
    }

    pub fn collectibles(mut self, collectibles: Arc<dyn CollectibleRegistry>) -> Self {
        self.collectibles = Some(collectibles);
        self
    }

    pub fn initial_model(mut self, digest: ModelDigest) -> Self {
        self.initial_model = Some(digest);
        self
    }

    pub fn engine_id(mut self, engine_id: AccountId) -> Self {
        self.engine_id = engine_id;
        self
    }

    pub fn administrator(mut self, administrator: AccountId) -> Self {
        self.administrator = administrator;
        self
    }

    /// Takes initial model and both identities from `cfg`.
    pub fn config(self, cfg: &EngineConfig) -> Self {
        self.initial_model(cfg.initial_model())
            .engine_id(cfg.engine_id())
            .administrator(cfg.administrator_id())
    }

    pub fn metrics(mut self, metrics: CoordinatorMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> Result<CoordinationEngine<L, P>, ConfigError> {
        let verifier = self.verifier.ok_or_else(|| missing("proof verifier"))?;
        let token = self.token.ok_or_else(|| missing("token ledger"))?;
        let collectibles = self
            .collectibles
            .ok_or_else(|| missing("collectible registry"))?;
        let initial_model = self.initial_model.ok_or_else(|| missing("initial model"))?;

        if initial_model.is_empty() {
            return Err(ConfigError::InvalidConfiguration(
                "initial model digest is empty".to_string(),
            ));
        }
        if self.engine_id == self.administrator {
            return Err(ConfigError::InvalidConfiguration(
                "engine identity must differ from the administrator".to_string(),
            ));
        }

        if let Some(metrics) = &self.metrics {
            metrics.set_model_version(0);
        }
        let governor = AuthorityGovernor::new(self.engine_id, token.clone(), collectibles.clone());
        info!(
            engine = %self.engine_id,
            administrator = %self.administrator,
            initial_model = %initial_model,
            "coordination engine initialized"
        );

        Ok(CoordinationEngine {
            engine_id: self.engine_id,
            administrator: self.administrator,
            verifier,
            token,
            collectibles,
            policy: self.policy,
            governor,
            metrics: self.metrics,
            state: Mutex::new(EngineState {
                ledger: self.ledger,
                registry: ModelRegistry::new(initial_model),
                rounds: RoundBook::new(),
                rewards: Vec::new(),
                contributions: Vec::new(),
            }),
        })
    }
}

fn missing(what: &str) -> ConfigError {
    ConfigError::InvalidConfiguration(format!("missing {what}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{InMemoryCollectibleRegistry, InMemoryTokenLedger};
    use crate::coordination::authority::AuthorityState;
    use crate::coordination::error::LedgerError;
    use crate::reward::FlatRewardPolicy;
    use crate::types::{DeclaredMetrics, Proof, PublicInputDigest, PublicInputs};
    use std::time::Duration;
    use crate::verification::{KeyedHashVerifier, RejectAllVerifier, VerificationKeySet};

    fn account(seed: &str) -> AccountId {
        AccountId::from_public_key(seed.as_bytes())
    }

    fn admin() -> AccountId {
        account("admin")
    }

    fn engine_identity() -> AccountId {
        account("engine")
    }

    fn keyed_verifier() -> KeyedHashVerifier {
        let keys = VerificationKeySet::new("gradient-dummy-key", "training-dummy-key")
            .expect("valid keys");
        KeyedHashVerifier::new(&keys)
    }

    /// Builds a submission whose proof is valid under `keyed_verifier()`.
    fn signed(
        participant: AccountId,
        round: u64,
        kind: ContributionKind,
        prior_version: u64,
        update: &str,
        quality_bps: u32,
    ) -> Submission {
        let mut submission = Submission {
            participant,
            round: RoundId(round),
            kind,
            proof: Proof::default(),
            public_inputs: PublicInputs {
                prior_version,
                metrics: DeclaredMetrics {
                    quality_bps,
                    sample_count: 128,
                },
                update_digest: ModelDigest::new(update),
            },
        };
        submission.proof = keyed_verifier().attest(kind, &submission.public_input_digest());
        submission
    }

    struct Harness<L: ContributionLedger> {
        engine: CoordinationEngine<L, MetricScaledRewardPolicy>,
        token: Arc<InMemoryTokenLedger>,
        collectibles: Arc<dyn CollectibleRegistry>,
    }

    fn harness_with<L: ContributionLedger>(
        ledger: L,
        collectibles: Arc<dyn CollectibleRegistry>,
        hand_off: bool,
    ) -> Harness<L> {
        build_harness(ledger, collectibles, Arc::new(keyed_verifier()), hand_off)
    }

    fn build_harness<L: ContributionLedger>(
        ledger: L,
        collectibles: Arc<dyn CollectibleRegistry>,
        verifier: Arc<dyn ProofVerifier>,
        hand_off: bool,
    ) -> Harness<L> {
        let token = Arc::new(InMemoryTokenLedger::new(admin()));
        let engine = CoordinationEngineBuilder::new()
            .ledger(ledger)
            .verifier(verifier)
            .token_ledger(token.clone())
            .collectibles(collectibles.clone())
            .initial_model(ModelDigest::new("QmInitialModelHash"))
            .engine_id(engine_identity())
            .administrator(admin())
            .build()
            .expect("engine builds");
        if hand_off {
            engine
                .governor()
                .hand_off_all(&admin())
                .expect("handoff succeeds");
        }
        Harness {
            engine,
            token,
            collectibles,
        }
    }

    fn harness() -> Harness<InMemoryContributionLedger> {
        harness_with(
            InMemoryContributionLedger::new(),
            Arc::new(InMemoryCollectibleRegistry::new(admin())),
            true,
        )
    }

    /// Collectible registry whose mints always fail.
    struct FailingCollectibles {
        inner: InMemoryCollectibleRegistry,
    }

    impl CollectibleRegistry for FailingCollectibles {
        fn mint(
            &self,
            _caller: &AccountId,
            _to: &AccountId,
            _model: &ModelDigest,
        ) -> Result<CollectibleId, CollaboratorError> {
            Err(CollaboratorError::Unavailable("injected fault".to_string()))
        }

        fn burn(&self, caller: &AccountId, id: CollectibleId) -> Result<(), CollaboratorError> {
            self.inner.burn(caller, id)
        }

        fn owner_of(&self, id: CollectibleId) -> Option<AccountId> {
            self.inner.owner_of(id)
        }

        fn token_uri(&self, id: CollectibleId) -> Option<String> {
            self.inner.token_uri(id)
        }

        fn authority(&self) -> AuthorityState {
            self.inner.authority()
        }

        fn transfer_authority(
            &self,
            caller: &AccountId,
            new_authority: AccountId,
        ) -> Result<(), AuthorityError> {
            self.inner.transfer_authority(caller, new_authority)
        }
    }

    /// Keyed verifier that stalls on one particular proof.
    struct SlowOnProof {
        inner: KeyedHashVerifier,
        slow: Proof,
        delay: Duration,
    }

    impl ProofVerifier for SlowOnProof {
        fn verify(
            &self,
            kind: ContributionKind,
            digest: &PublicInputDigest,
            proof: &Proof,
        ) -> bool {
            if *proof == self.slow {
                std::thread::sleep(self.delay);
            }
            self.inner.verify(kind, digest, proof)
        }
    }

    /// Ledger whose `mark_accepted` always fails with a storage fault.
    #[derive(Default)]
    struct FaultyMarkLedger {
        inner: InMemoryContributionLedger,
    }

    impl ContributionLedger for FaultyMarkLedger {
        fn try_reserve(&mut self, key: &ContributionKey) -> Result<bool, LedgerError> {
            self.inner.try_reserve(key)
        }

        fn release(&mut self, key: &ContributionKey) -> Result<(), LedgerError> {
            self.inner.release(key)
        }

        fn mark_accepted(&mut self, _key: &ContributionKey) -> Result<(), LedgerError> {
            Err(LedgerError::Storage("disk full".to_string()))
        }

        fn status(&self, key: &ContributionKey) -> Result<SlotStatus, LedgerError> {
            self.inner.status(key)
        }
    }

    #[test]
    fn full_training_advances_model_pays_and_blocks_replay() {
        let h = harness();
        let alice = account("alice");
        let bob = account("bob");

        let first = h
            .engine
            .submit(signed(alice, 0, ContributionKind::FullTraining, 0, "QmV1", 9_000))
            .expect("no ledger fault");
        let acceptance = first.acceptance().expect("accepted").clone();
        let v1 = acceptance.new_version.clone().expect("model advanced");
        assert_eq!(v1.version, 1);
        assert_eq!(v1.digest.as_str(), "QmV1");
        assert_eq!(v1.contributor, Some(alice));
        assert!(acceptance.reward > 0);
        assert_eq!(h.token.balance_of(&alice), acceptance.reward);

        let collectible = acceptance.collectible.expect("collectible minted");
        assert_eq!(h.collectibles.owner_of(collectible), Some(alice));
        assert_eq!(
            h.collectibles.token_uri(collectible).as_deref(),
            Some("ipfs://QmV1")
        );

        // Same slot again, even with a valid proof.
        let replay = h
            .engine
            .submit(signed(alice, 0, ContributionKind::FullTraining, 1, "QmV2", 9_000))
            .expect("no ledger fault");
        assert_eq!(
            replay,
            SubmissionOutcome::Rejected(RejectReason::DuplicateContribution)
        );

        // A slow contributor still building on version 0.
        let late = h
            .engine
            .submit(signed(bob, 0, ContributionKind::FullTraining, 0, "QmLate", 9_000))
            .expect("no ledger fault");
        assert_eq!(
            late,
            SubmissionOutcome::Rejected(RejectReason::StaleVersion {
                expected: 0,
                current: 1
            })
        );
        assert_eq!(h.token.balance_of(&bob), 0);
        assert_eq!(h.engine.current_model(), v1);
        assert_eq!(h.engine.model_history().len(), 2);

        let bob_key = ContributionKey::new(bob, RoundId(0), ContributionKind::FullTraining);
        assert_eq!(h.engine.slot_status(&bob_key).expect("status"), SlotStatus::Unseen);
    }

    #[test]
    fn invalid_proof_releases_slot_for_corrected_resubmission() {
        let h = harness();
        let alice = account("alice");
        let key = ContributionKey::new(alice, RoundId(0), ContributionKind::Gradient);

        let mut bad = signed(alice, 0, ContributionKind::Gradient, 0, "QmGrad", 5_000);
        bad.proof = Proof(vec![0u8; 32]);
        let outcome = h.engine.submit(bad).expect("no ledger fault");
        assert_eq!(outcome, SubmissionOutcome::Rejected(RejectReason::ProofInvalid));
        assert_eq!(h.engine.slot_status(&key).expect("status"), SlotStatus::Unseen);
        assert_eq!(h.token.total_supply(), 0);

        let good = signed(alice, 0, ContributionKind::Gradient, 0, "QmGrad", 5_000);
        assert!(h.engine.submit(good.clone()).expect("no ledger fault").is_accepted());
        assert!(h.engine.is_accepted(&key).expect("status"));
        assert_eq!(
            h.engine.submit(good).expect("no ledger fault"),
            SubmissionOutcome::Rejected(RejectReason::DuplicateContribution)
        );
    }

    #[test]
    fn proof_bound_to_other_kind_is_rejected() {
        let h = harness();
        let alice = account("alice");

        let mut wrong = signed(alice, 0, ContributionKind::FullTraining, 0, "QmV1", 5_000);
        let gradient_proof = signed(alice, 0, ContributionKind::Gradient, 0, "QmV1", 5_000).proof;
        wrong.proof = gradient_proof;

        assert_eq!(
            h.engine.submit(wrong).expect("no ledger fault"),
            SubmissionOutcome::Rejected(RejectReason::ProofInvalid)
        );
        assert_eq!(h.engine.current_model().version, 0);
    }

    #[test]
    fn empty_update_digest_is_malformed() {
        let h = harness();
        let alice = account("alice");
        let outcome = h
            .engine
            .submit(signed(alice, 0, ContributionKind::Gradient, 0, "  ", 5_000))
            .expect("no ledger fault");
        assert_eq!(outcome, SubmissionOutcome::Rejected(RejectReason::ProofInvalid));
    }

    #[test]
    fn gradient_contributions_pay_without_advancing_model() {
        let h = harness();
        let alice = account("alice");
        let bob = account("bob");

        let low = h
            .engine
            .submit(signed(alice, 0, ContributionKind::Gradient, 0, "QmGa", 2_000))
            .expect("no ledger fault");
        let high = h
            .engine
            .submit(signed(bob, 0, ContributionKind::Gradient, 0, "QmGb", 8_000))
            .expect("no ledger fault");

        let low = low.acceptance().expect("accepted");
        let high = high.acceptance().expect("accepted");
        assert!(low.new_version.is_none());
        assert!(low.collectible.is_none());
        assert!(high.reward > low.reward);
        assert_eq!(h.engine.current_model().version, 0);
        assert_eq!(h.engine.round_participants(RoundId(0)), vec![alice, bob]);
        assert_eq!(h.engine.participant_reward(RoundId(0), &bob), high.reward);
        assert_eq!(h.engine.reward_records().len(), 2);
    }

    #[test]
    fn collectible_failure_rolls_back_everything() {
        let failing = Arc::new(FailingCollectibles {
            inner: InMemoryCollectibleRegistry::new(admin()),
        });
        let h = harness_with(InMemoryContributionLedger::new(), failing, true);
        let alice = account("alice");
        let key = ContributionKey::new(alice, RoundId(0), ContributionKind::FullTraining);

        let outcome = h
            .engine
            .submit(signed(alice, 0, ContributionKind::FullTraining, 0, "QmV1", 9_000))
            .expect("no ledger fault");

        assert_eq!(
            outcome,
            SubmissionOutcome::Rejected(RejectReason::Collaborator(
                CollaboratorError::Unavailable("injected fault".to_string())
            ))
        );
        assert_eq!(h.token.balance_of(&alice), 0);
        assert_eq!(h.token.total_supply(), 0);
        assert_eq!(h.engine.slot_status(&key).expect("status"), SlotStatus::Unseen);
        assert_eq!(h.engine.current_model().version, 0);
        assert!(h.engine.reward_records().is_empty());
        assert!(h.engine.round_participants(RoundId(0)).is_empty());
    }

    #[test]
    fn ledger_fault_is_surfaced_after_compensation() {
        let collectibles = Arc::new(InMemoryCollectibleRegistry::new(admin()));
        let h = harness_with(FaultyMarkLedger::default(), collectibles.clone(), true);
        let alice = account("alice");
        let key = ContributionKey::new(alice, RoundId(0), ContributionKind::FullTraining);

        let err = h
            .engine
            .submit(signed(alice, 0, ContributionKind::FullTraining, 0, "QmV1", 9_000))
            .expect_err("storage fault surfaces");
        assert!(matches!(err, EngineError::Ledger(LedgerError::Storage(_))));

        assert_eq!(h.token.total_supply(), 0);
        assert!(collectibles.is_empty());
        assert_eq!(h.engine.current_model().version, 0);
        assert_eq!(h.engine.slot_status(&key).expect("status"), SlotStatus::Unseen);
    }

    #[test]
    fn submission_before_handoff_is_not_authorized() {
        let h = harness_with(
            InMemoryContributionLedger::new(),
            Arc::new(InMemoryCollectibleRegistry::new(admin())),
            false,
        );
        let alice = account("alice");
        let key = ContributionKey::new(alice, RoundId(0), ContributionKind::Gradient);

        let outcome = h
            .engine
            .submit(signed(alice, 0, ContributionKind::Gradient, 0, "QmG", 5_000))
            .expect("no ledger fault");
        assert_eq!(
            outcome,
            SubmissionOutcome::Rejected(RejectReason::Collaborator(CollaboratorError::Authority(
                AuthorityError::NotAuthorized
            )))
        );
        assert_eq!(h.engine.slot_status(&key).expect("status"), SlotStatus::Unseen);

        h.engine
            .governor()
            .hand_off_all(&admin())
            .expect("handoff succeeds");
        assert!(h.engine.governor().fully_engine_controlled());
        assert!(
            h.engine
                .submit(signed(alice, 0, ContributionKind::Gradient, 0, "QmG", 5_000))
                .expect("no ledger fault")
                .is_accepted()
        );
    }

    #[test]
    fn administrator_loses_mint_authority_after_handoff() {
        let h = harness();
        let alice = account("alice");

        assert_eq!(
            h.token.mint(&admin(), &alice, 1),
            Err(CollaboratorError::Authority(AuthorityError::NotAuthorized))
        );
        assert_eq!(
            h.engine.governor().hand_off_all(&admin()),
            Err(AuthorityError::AlreadyTransferred)
        );
    }

    #[test]
    fn concurrent_advances_have_exactly_one_winner() {
        let h = harness();
        let participants: Vec<AccountId> =
            (0..8).map(|i| account(&format!("trainer-{i}"))).collect();
        let submissions: Vec<Submission> = participants
            .iter()
            .map(|p| signed(*p, 0, ContributionKind::FullTraining, 0, &format!("Qm{p}"), 7_000))
            .collect();

        let outcomes: Vec<SubmissionOutcome> = std::thread::scope(|scope| {
            let handles: Vec<_> = submissions
                .into_iter()
                .map(|s| {
                    let engine = &h.engine;
                    scope.spawn(move || engine.submit(s).expect("no ledger fault"))
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().expect("thread completes"))
                .collect()
        });

        let winners = outcomes.iter().filter(|o| o.is_accepted()).count();
        assert_eq!(winners, 1);
        for outcome in outcomes.iter().filter(|o| !o.is_accepted()) {
            assert_eq!(
                outcome,
                &SubmissionOutcome::Rejected(RejectReason::StaleVersion {
                    expected: 0,
                    current: 1
                })
            );
        }
        assert_eq!(h.engine.current_model().version, 1);
        assert_eq!(h.engine.model_history().len(), 2);
    }

    #[test]
    fn concurrent_replays_are_accepted_once() {
        let h = harness();
        let alice = account("alice");
        let submission = signed(alice, 0, ContributionKind::Gradient, 0, "QmG", 5_000);

        let accepted = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let engine = &h.engine;
                    let s = submission.clone();
                    scope.spawn(move || engine.submit(s).expect("no ledger fault"))
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().expect("thread completes"))
                .filter(SubmissionOutcome::is_accepted)
                .count()
        });

        assert_eq!(accepted, 1);
        assert_eq!(h.engine.reward_records().len(), 1);
    }

    #[test]
    fn batch_results_follow_input_order() {
        let h = harness();
        let alice = account("alice");
        let bob = account("bob");

        let mut forged = signed(bob, 0, ContributionKind::Gradient, 0, "QmGb", 5_000);
        forged.proof = Proof(vec![1, 2, 3]);

        let results = h.engine.submit_batch(vec![
            signed(alice, 0, ContributionKind::Gradient, 0, "QmGa", 5_000),
            forged,
            signed(alice, 3, ContributionKind::Gradient, 0, "QmGc", 5_000),
        ]);

        let outcomes: Vec<SubmissionOutcome> = results
            .into_iter()
            .map(|r| r.expect("no ledger fault"))
            .collect();
        assert!(outcomes[0].is_accepted());
        assert_eq!(outcomes[1], SubmissionOutcome::Rejected(RejectReason::ProofInvalid));
        assert_eq!(outcomes[2].label(), "round_closed");
    }

    #[test]
    fn slowest_proof_at_batch_head_still_wins_the_advance() {
        let trainers: Vec<AccountId> = (0..4).map(|i| account(&format!("trainer-{i}"))).collect();
        let batch: Vec<Submission> = trainers
            .iter()
            .enumerate()
            .map(|(i, p)| {
                signed(*p, 0, ContributionKind::FullTraining, 0, &format!("QmCandidate{i}"), 9_000)
            })
            .collect();

        for _ in 0..3 {
            let verifier = SlowOnProof {
                inner: keyed_verifier(),
                slow: batch[0].proof.clone(),
                delay: Duration::from_millis(20),
            };
            let h = build_harness(
                InMemoryContributionLedger::new(),
                Arc::new(InMemoryCollectibleRegistry::new(admin())),
                Arc::new(verifier),
                true,
            );

            let outcomes: Vec<SubmissionOutcome> = h
                .engine
                .submit_batch(batch.clone())
                .into_iter()
                .map(|r| r.expect("no ledger fault"))
                .collect();

            let head = outcomes[0].acceptance().expect("first entry accepted");
            let v1 = head.new_version.as_ref().expect("model advanced");
            assert_eq!(v1.digest.as_str(), "QmCandidate0");
            assert_eq!(v1.contributor, Some(trainers[0]));
            for outcome in &outcomes[1..] {
                assert_eq!(
                    outcome,
                    &SubmissionOutcome::Rejected(RejectReason::StaleVersion {
                        expected: 0,
                        current: 1
                    })
                );
            }
        }
    }

    #[test]
    fn batch_duplicate_resolves_to_first_occurrence() {
        let h = harness();
        let alice = account("alice");

        let results = h.engine.submit_batch(vec![
            signed(alice, 0, ContributionKind::Gradient, 0, "QmFirst", 4_000),
            signed(alice, 0, ContributionKind::Gradient, 0, "QmSecond", 9_000),
        ]);
        let outcomes: Vec<SubmissionOutcome> = results
            .into_iter()
            .map(|r| r.expect("no ledger fault"))
            .collect();

        let first = outcomes[0].acceptance().expect("first accepted");
        assert_eq!(
            outcomes[1],
            SubmissionOutcome::Rejected(RejectReason::DuplicateContribution)
        );
        assert_eq!(h.token.balance_of(&alice), first.reward);

        let log = h.engine.contributions();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].public_inputs.update_digest.as_str(), "QmFirst");
    }

    #[test]
    fn batch_full_training_keeps_lineage_linear() {
        let h = harness();
        let alice = account("alice");
        let bob = account("bob");
        let carol = account("carol");

        let outcomes: Vec<SubmissionOutcome> = h
            .engine
            .submit_batch(vec![
                signed(alice, 0, ContributionKind::FullTraining, 0, "QmA", 9_000),
                signed(bob, 0, ContributionKind::FullTraining, 0, "QmB", 9_000),
                signed(carol, 0, ContributionKind::FullTraining, 1, "QmC", 9_000),
            ])
            .into_iter()
            .map(|r| r.expect("no ledger fault"))
            .collect();

        assert!(outcomes[0].is_accepted());
        assert_eq!(
            outcomes[1],
            SubmissionOutcome::Rejected(RejectReason::StaleVersion {
                expected: 0,
                current: 1
            })
        );
        let v2 = outcomes[2]
            .acceptance()
            .and_then(|a| a.new_version.clone())
            .expect("third entry advances");
        assert_eq!(v2.version, 2);

        let digests: Vec<String> = h
            .engine
            .model_history()
            .iter()
            .map(|v| v.digest.as_str().to_string())
            .collect();
        assert_eq!(digests, vec!["QmInitialModelHash", "QmA", "QmC"]);
        assert_eq!(h.token.balance_of(&bob), 0);
    }

    #[test]
    fn contribution_log_holds_settled_reservations_only() {
        let h = harness();
        let alice = account("alice");

        let mut bad = signed(alice, 0, ContributionKind::Gradient, 0, "QmG", 5_000);
        bad.proof = Proof(vec![9; 32]);
        let good = signed(alice, 0, ContributionKind::Gradient, 0, "QmG", 5_000);

        h.engine.submit(bad).expect("no ledger fault");
        h.engine.submit(good.clone()).expect("no ledger fault");
        h.engine.submit(good).expect("no ledger fault");
        h.engine
            .submit(signed(alice, 5, ContributionKind::Gradient, 0, "QmG", 5_000))
            .expect("no ledger fault");

        let outcomes: Vec<ContributionOutcome> =
            h.engine.contributions().iter().map(|c| c.outcome).collect();
        assert_eq!(
            outcomes,
            vec![ContributionOutcome::Rejected, ContributionOutcome::Accepted]
        );
    }

    #[test]
    fn closed_rounds_reject_and_finalize_is_admin_only() {
        let h = harness();
        let alice = account("alice");

        assert!(
            h.engine
                .submit(signed(alice, 0, ContributionKind::Gradient, 0, "QmG", 5_000))
                .expect("no ledger fault")
                .is_accepted()
        );

        assert_eq!(
            h.engine.finalize_round(&alice),
            Err(AuthorityError::NotAuthorized)
        );
        let summary = h.engine.finalize_round(&admin()).expect("admin finalizes");
        assert_eq!(summary.round, RoundId(0));
        assert_eq!(summary.participants, vec![alice]);
        assert_eq!(h.engine.current_round(), RoundId(1));
        assert!(h.engine.is_round_finalized(RoundId(0)));

        let late = h
            .engine
            .submit(signed(account("bob"), 0, ContributionKind::Gradient, 0, "QmG", 5_000))
            .expect("no ledger fault");
        assert_eq!(
            late,
            SubmissionOutcome::Rejected(RejectReason::RoundClosed {
                round: RoundId(0),
                open: RoundId(1)
            })
        );

        // Same participant, new round: independent slot.
        assert!(
            h.engine
                .submit(signed(alice, 1, ContributionKind::Gradient, 0, "QmG", 5_000))
                .expect("no ledger fault")
                .is_accepted()
        );
    }

    #[test]
    fn reward_records_reference_minted_collectible() {
        let h = harness();
        let alice = account("alice");
        h.engine
            .submit(signed(alice, 0, ContributionKind::FullTraining, 0, "QmV1", 10_000))
            .expect("no ledger fault");

        let records = h.engine.reward_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].model_digest, Some(ModelDigest::new("QmV1")));
        assert!(records[0].collectible.is_some());
    }

    #[test]
    fn custom_policy_and_metrics_are_wired() {
        let metrics = CoordinatorMetrics::register(&prometheus::Registry::new())
            .expect("register metrics");
        let token = Arc::new(InMemoryTokenLedger::new(admin()));
        let engine = CoordinationEngine::builder()
            .reward_policy(FlatRewardPolicy::new(7, 11))
            .verifier(Arc::new(keyed_verifier()))
            .token_ledger(token.clone())
            .collectibles(Arc::new(InMemoryCollectibleRegistry::new(admin())))
            .config(&EngineConfig {
                engine_seed: "engine".to_string(),
                administrator_seed: "admin".to_string(),
                ..EngineConfig::default()
            })
            .metrics(metrics.clone())
            .build()
            .expect("engine builds");
        engine.governor().hand_off_all(&admin()).expect("handoff");

        let alice = account("alice");
        let outcome = engine
            .submit(signed(alice, 0, ContributionKind::FullTraining, 0, "QmV1", 1))
            .expect("no ledger fault");
        assert_eq!(outcome.acceptance().map(|a| a.reward), Some(11));
        assert_eq!(token.balance_of(&alice), 11);
        assert_eq!(metrics.model_version.get(), 1);
        assert_eq!(
            metrics
                .submissions_total
                .with_label_values(&["accepted"])
                .get(),
            1
        );
    }

    #[test]
    fn build_requires_every_collaborator() {
        let err = CoordinationEngineBuilder::new()
            .verifier(Arc::new(RejectAllVerifier))
            .initial_model(ModelDigest::new("QmInitialModelHash"))
            .build()
            .err()
            .expect("missing collaborators");
        assert!(matches!(err, ConfigError::InvalidConfiguration(_)));

        let err = CoordinationEngineBuilder::new()
            .verifier(Arc::new(RejectAllVerifier))
            .token_ledger(Arc::new(InMemoryTokenLedger::new(admin())))
            .collectibles(Arc::new(InMemoryCollectibleRegistry::new(admin())))
            .initial_model(ModelDigest::new(""))
            .build()
            .err()
            .expect("empty initial model");
        assert_eq!(
            err,
            ConfigError::InvalidConfiguration("initial model digest is empty".to_string())
        );
    }
}
