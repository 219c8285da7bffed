use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::state::SharedState;

/// Health-check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Whether the engine controls both reward collaborators yet.
    pub engine_controlled: bool,
}

/// `GET /health`
///
/// Returns a basic JSON document indicating liveness.
pub async fn health(State(state): State<SharedState>) -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            engine_controlled: state.engine.governor().fully_engine_controlled(),
        }),
    )
}
