use axum::{Json, extract::State};
use serde::Serialize;

use fedchain::ModelVersion;

use crate::state::SharedState;

/// API view of a model version.
#[derive(Debug, Serialize)]
pub struct ModelVersionDto {
    pub version: u64,
    pub digest: String,
    pub token_uri: String,
    /// Hex account of the contributor that produced this version.
    pub contributor: Option<String>,
}

impl From<&ModelVersion> for ModelVersionDto {
    fn from(v: &ModelVersion) -> Self {
        Self {
            version: v.version,
            digest: v.digest.as_str().to_string(),
            token_uri: v.digest.token_uri(),
            contributor: v.contributor.map(|c| c.to_hex()),
        }
    }
}

/// `GET /model`
pub async fn current_model(State(state): State<SharedState>) -> Json<ModelVersionDto> {
    Json(ModelVersionDto::from(&state.engine.current_model()))
}

/// `GET /model/history`
///
/// Every version since genesis, oldest first.
pub async fn model_history(State(state): State<SharedState>) -> Json<Vec<ModelVersionDto>> {
    Json(
        state
            .engine
            .model_history()
            .iter()
            .map(ModelVersionDto::from)
            .collect(),
    )
}
