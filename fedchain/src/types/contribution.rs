//! Contribution payloads and their public-input binding.
//!
//! A participant submits either a gradient update or a full training step
//! together with an opaque proof. The proof is checked against a
//! [`PublicInputDigest`], which binds it to the participant, the round,
//! the contribution kind, the model version it was computed against and
//! the declared metrics. A proof produced for one context therefore never
//! verifies in another.
//!
//! Serialization for digests uses **bincode 2** with the `serde`
//! integration and an explicit `standard()` config.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{AccountId, HASH_LEN, Hash256, ModelDigest, RoundId};

/// Domain separation tag mixed into every public-input digest.
const DIGEST_DOMAIN: &str = "fedchain/contribution/v1";

/// Which verification key a contribution is checked with.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionKind {
    /// A locally computed gradient for the current model.
    Gradient,
    /// A full training step producing a new canonical model.
    FullTraining,
}

impl ContributionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContributionKind::Gradient => "gradient",
            ContributionKind::FullTraining => "full_training",
        }
    }

    fn tag(&self) -> u8 {
        match self {
            ContributionKind::Gradient => 0,
            ContributionKind::FullTraining => 1,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(ContributionKind::Gradient),
            1 => Some(ContributionKind::FullTraining),
            _ => None,
        }
    }
}

impl fmt::Display for ContributionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Length of [`ContributionKey::to_bytes`].
pub const CONTRIBUTION_KEY_LEN: usize = HASH_LEN + 8 + 1;

/// The uniqueness slot of a contribution: at most one contribution per
/// `(participant, round, kind)` can ever be accepted.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ContributionKey {
    pub participant: AccountId,
    pub round: RoundId,
    pub kind: ContributionKind,
}

impl ContributionKey {
    pub fn new(participant: AccountId, round: RoundId, kind: ContributionKind) -> Self {
        Self {
            participant,
            round,
            kind,
        }
    }

    /// Fixed-width key encoding: participant ‖ round (big-endian) ‖ kind.
    ///
    /// Big-endian rounds keep a participant's slots ordered by round in
    /// ordered key-value stores.
    pub fn to_bytes(&self) -> [u8; CONTRIBUTION_KEY_LEN] {
        let mut out = [0u8; CONTRIBUTION_KEY_LEN];
        out[..HASH_LEN].copy_from_slice(self.participant.0.as_bytes());
        out[HASH_LEN..HASH_LEN + 8].copy_from_slice(&self.round.0.to_be_bytes());
        out[HASH_LEN + 8] = self.kind.tag();
        out
    }

    /// Inverse of [`ContributionKey::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != CONTRIBUTION_KEY_LEN {
            return None;
        }
        let mut participant = [0u8; HASH_LEN];
        participant.copy_from_slice(&bytes[..HASH_LEN]);
        let mut round = [0u8; 8];
        round.copy_from_slice(&bytes[HASH_LEN..HASH_LEN + 8]);
        let kind = ContributionKind::from_tag(bytes[HASH_LEN + 8])?;
        Some(Self {
            participant: AccountId(Hash256(participant)),
            round: RoundId(u64::from_be_bytes(round)),
            kind,
        })
    }
}

impl fmt::Display for ContributionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.participant, self.round, self.kind)
    }
}

/// Opaque, verifier-specific proof bytes.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Proof(pub Vec<u8>);

impl Proof {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Metrics the participant declares (and proves) about its update.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct DeclaredMetrics {
    /// Reported quality in basis points (accuracy × 100, 10 000 = 100%).
    pub quality_bps: u32,
    /// Number of local training samples behind the update.
    pub sample_count: u64,
}

/// Public inputs of a contribution proof.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PublicInputs {
    /// Model version the update was computed against.
    pub prior_version: u64,
    /// Declared quality metrics.
    pub metrics: DeclaredMetrics,
    /// Content identifier of the submitted artefact: the gradient blob for
    /// gradient contributions, the new model for full-training ones.
    pub update_digest: ModelDigest,
}

/// Digest binding a proof to its full context.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PublicInputDigest(pub Hash256);

impl PublicInputDigest {
    /// Computes the digest of `inputs` in the context of `key`.
    ///
    /// # Panics
    ///
    /// Panics if encoding fails. This is considered a programming
    /// error, because all fields are plain serializable data.
    pub fn compute(key: &ContributionKey, inputs: &PublicInputs) -> Self {
        #[derive(Serialize)]
        struct Preimage<'a> {
            domain: &'a str,
            participant: &'a AccountId,
            round: RoundId,
            kind: ContributionKind,
            inputs: &'a PublicInputs,
        }

        let preimage = Preimage {
            domain: DIGEST_DOMAIN,
            participant: &key.participant,
            round: key.round,
            kind: key.kind,
            inputs,
        };
        let cfg = bincode::config::standard();
        let bytes = bincode::serde::encode_to_vec(&preimage, cfg)
            .expect("public inputs should always be serializable with bincode 2 + serde");
        PublicInputDigest(Hash256::compute(&bytes))
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        self.0.as_bytes()
    }
}

/// A submission as it arrives at the engine: already authenticated and
/// parsed, not yet judged.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Submission {
    pub participant: AccountId,
    pub round: RoundId,
    pub kind: ContributionKind,
    pub proof: Proof,
    pub public_inputs: PublicInputs,
}

impl Submission {
    pub fn key(&self) -> ContributionKey {
        ContributionKey::new(self.participant, self.round, self.kind)
    }

    pub fn public_input_digest(&self) -> PublicInputDigest {
        PublicInputDigest::compute(&self.key(), &self.public_inputs)
    }
}

/// Lifecycle state of a contribution.
///
/// `Accepted` and `Rejected` are terminal.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionOutcome {
    Pending,
    Accepted,
    Rejected,
}

/// A submission under judgement by the engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Contribution {
    pub key: ContributionKey,
    pub proof: Proof,
    pub public_inputs: PublicInputs,
    pub outcome: ContributionOutcome,
}

impl Contribution {
    /// Wraps a freshly received submission as a pending contribution.
    pub fn pending(submission: Submission) -> Self {
        Self {
            key: submission.key(),
            proof: submission.proof,
            public_inputs: submission.public_inputs,
            outcome: ContributionOutcome::Pending,
        }
    }

    pub fn kind(&self) -> ContributionKind {
        self.key.kind
    }

    /// Moves a pending contribution to a terminal state.
    ///
    /// Returns `false` (and leaves the outcome untouched) if the
    /// contribution already reached a terminal state.
    pub fn settle(&mut self, outcome: ContributionOutcome) -> bool {
        if self.outcome != ContributionOutcome::Pending || outcome == ContributionOutcome::Pending {
            return false;
        }
        self.outcome = outcome;
        true
    }
}
