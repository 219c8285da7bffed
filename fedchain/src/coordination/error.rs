use thiserror::Error;

use crate::collaborators::CollaboratorError;
use crate::types::{ContributionKey, RoundId};

/// Construction-time configuration failure.
///
/// Fatal: an engine that fails to build never becomes usable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Authority-handoff failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthorityError {
    /// Caller does not hold the authority required for the operation.
    #[error("caller is not authorized for this operation")]
    NotAuthorized,
    /// The handoff to the engine already happened.
    #[error("authority was already transferred")]
    AlreadyTransferred,
}

/// Model registry failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The registry moved past the version the caller built on.
    #[error("stale model version: expected {expected}, registry is at {current}")]
    StaleVersion { expected: u64, current: u64 },
}

/// Contribution ledger failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Release or acceptance was requested for a slot that is not pending.
    #[error("contribution slot {0} is not pending")]
    NotPending(ContributionKey),
    /// Backend I/O failure.
    #[error("ledger storage error: {0}")]
    Storage(String),
    /// Backend returned bytes that do not decode.
    #[error("corrupted ledger entry: {0}")]
    Corrupted(&'static str),
}

/// Why a submission was refused.
///
/// Every variant is a routine outcome, never a process fault. Only
/// `DuplicateContribution` permanently refuses the slot; for the others
/// no record is kept and the participant may resubmit where that makes
/// sense.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("contribution slot already reserved or accepted")]
    DuplicateContribution,
    #[error("proof failed verification")]
    ProofInvalid,
    #[error("stale model version: expected {expected}, registry is at {current}")]
    StaleVersion { expected: u64, current: u64 },
    #[error("round {round} is not open (open round is {open})")]
    RoundClosed { round: RoundId, open: RoundId },
    #[error("reward application failed: {0}")]
    Collaborator(CollaboratorError),
}

impl RejectReason {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::DuplicateContribution => "duplicate_contribution",
            RejectReason::ProofInvalid => "proof_invalid",
            RejectReason::StaleVersion { .. } => "stale_version",
            RejectReason::RoundClosed { .. } => "round_closed",
            RejectReason::Collaborator(_) => "collaborator_failure",
        }
    }
}

impl From<RegistryError> for RejectReason {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::StaleVersion { expected, current } => {
                RejectReason::StaleVersion { expected, current }
            }
        }
    }
}

/// Infrastructure faults surfaced by the engine.
///
/// These are not submission outcomes: they mean the backing store
/// misbehaved. Effects applied before the fault are compensated first.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
