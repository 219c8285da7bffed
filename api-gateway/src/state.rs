//! Shared application state.

use std::sync::Arc;

use fedchain::InMemoryCoordinationEngine;

/// Engine stack embedded in the gateway.
///
/// The gateway is a single-process deployment: the contribution ledger,
/// the model lineage, the rounds and both collaborators all live in
/// memory and start fresh together on every restart.
pub type GatewayEngine = InMemoryCoordinationEngine;

/// Shared state held by the API handlers.
///
/// This is wrapped in an [`Arc`] and passed to request handlers via Axum's
/// `State` extractor. The engine synchronizes internally, so no outer
/// lock is needed.
pub struct AppState {
    pub engine: GatewayEngine,
}

/// Thread-safe alias for `AppState`.
pub type SharedState = Arc<AppState>;
