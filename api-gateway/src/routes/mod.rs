//! HTTP route handlers.

pub mod balances;
pub mod contributions;
pub mod health;
pub mod models;
pub mod rounds;

use axum::http::StatusCode;

use fedchain::{AccountId, Hash256};

/// Error half of every fallible handler.
pub type ApiError = (StatusCode, String);

pub fn as_bad_request(msg: impl std::fmt::Display) -> ApiError {
    (StatusCode::BAD_REQUEST, msg.to_string())
}

pub fn as_internal(msg: impl std::fmt::Display) -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, msg.to_string())
}

/// Parses a hex-encoded `AccountId` (32-byte hash).
pub fn parse_account(hex_str: &str) -> Result<AccountId, ApiError> {
    Hash256::from_hex(hex_str)
        .map(AccountId)
        .map_err(as_bad_request)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use fedchain::{
        AccountId, CoordinationEngine, EngineConfig, InMemoryCollectibleRegistry,
        InMemoryContributionLedger, InMemoryTokenLedger, KeyedHashVerifier, RewardConfig,
        VerificationKeySet,
    };

    use crate::state::{AppState, SharedState};

    pub fn verifier() -> KeyedHashVerifier {
        let keys = VerificationKeySet::new("gradient-dummy-key", "training-dummy-key")
            .expect("valid keys");
        KeyedHashVerifier::new(&keys)
    }

    pub fn administrator() -> AccountId {
        EngineConfig::default().administrator_id()
    }

    /// In-memory engine with authority already handed off.
    pub fn state() -> SharedState {
        let cfg = EngineConfig::default();
        let engine = CoordinationEngine::builder()
            .ledger(InMemoryContributionLedger::new())
            .reward_policy(RewardConfig::default().build_policy())
            .verifier(Arc::new(verifier()))
            .token_ledger(Arc::new(InMemoryTokenLedger::new(administrator())))
            .collectibles(Arc::new(InMemoryCollectibleRegistry::new(administrator())))
            .config(&cfg)
            .build()
            .expect("engine builds");
        engine
            .governor()
            .hand_off_all(&administrator())
            .expect("handoff");
        Arc::new(AppState { engine })
    }
}
