//! Verified-contribution coordination engine and its building blocks.
//!
//! This module provides:
//!
//! - the submission state machine ([`engine::CoordinationEngine`]),
//! - replay protection ([`ledger::ContributionLedger`]),
//! - the versioned canonical model pointer ([`registry::ModelRegistry`]),
//! - the one-way authority handoff ([`authority::AuthorityGovernor`]),
//! - training-round bookkeeping ([`rounds::RoundBook`]),
//! - configuration and error types.

pub mod authority;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod registry;
pub mod rounds;

pub use authority::{Authority, AuthorityGovernor, AuthorityState, GovernedCollaborator};
pub use config::EngineConfig;
pub use engine::{Acceptance, CoordinationEngine, CoordinationEngineBuilder, SubmissionOutcome};
pub use error::{
    AuthorityError, ConfigError, EngineError, LedgerError, RegistryError, RejectReason,
};
pub use ledger::{ContributionLedger, SlotStatus};
pub use registry::ModelRegistry;
pub use rounds::{RoundBook, RoundSummary};
