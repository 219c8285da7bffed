//! FedChain library crate.
//!
//! This crate provides the core building blocks for coordinating
//! federated training across mutually untrusted participants:
//!
//! - strongly-typed domain types (`types`),
//! - the verified-contribution engine and its state (`coordination`),
//! - proof verification, local (`verification`) and remote
//!   (`verifier_client`),
//! - reward policies (`reward`),
//! - token and collectible collaborators (`collaborators`),
//! - contribution ledger backends (`storage`),
//! - gradient averaging (`aggregation`),
//! - Prometheus-based metrics (`metrics`),
//! - and a top-level node configuration (`config`).
//!
//! Higher-level binaries (the simulator, the HTTP gateway) compose these
//! pieces into a running coordinator.

pub mod aggregation;
pub mod collaborators;
pub mod config;
pub mod coordination;
pub mod metrics;
pub mod reward;
pub mod storage;
pub mod types;
pub mod verification;
pub mod verifier_client;

// Re-export top-level configuration types.
pub use config::{FedChainConfig, MetricsConfig, VerifierBackend, VerifierConfig};

// Re-export the engine, its building blocks and error types.
pub use coordination::{
    Acceptance, Authority, AuthorityError, AuthorityGovernor, AuthorityState, ConfigError,
    ContributionLedger, CoordinationEngine, CoordinationEngineBuilder, EngineConfig, EngineError,
    GovernedCollaborator, LedgerError, ModelRegistry, RegistryError, RejectReason, RoundBook,
    RoundSummary, SlotStatus, SubmissionOutcome,
};

pub use aggregation::{AggregationError, FedAvgAggregator, GradientUpdate};
pub use collaborators::{
    CollaboratorError, CollectibleRegistry, InMemoryCollectibleRegistry, InMemoryTokenLedger,
    TokenLedger,
};
pub use reward::{
    FlatRewardPolicy, MetricScaledRewardPolicy, RewardConfig, RewardDecision, RewardPolicy,
    RewardPolicyKind,
};
pub use storage::{InMemoryContributionLedger, RocksDbConfig, RocksDbContributionLedger, StorageError};
pub use verification::{
    AcceptAllVerifier, KeyedHashVerifier, ProofVerifier, RejectAllVerifier, VerificationKeySet,
};
pub use verifier_client::HttpProofVerifier;

// Re-export metrics registry and coordinator metrics.
pub use metrics::{CoordinatorMetrics, MetricsRegistry, run_prometheus_http_server};

// Re-export domain types at the crate root for convenience.
pub use types::*;

/// Engine used by the simulator, the gateway and tests.
pub type InMemoryCoordinationEngine =
    CoordinationEngine<InMemoryContributionLedger, Box<dyn RewardPolicy>>;
