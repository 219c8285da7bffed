use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use fedchain::{AuthorityError, RoundId};

use super::{ApiError, parse_account};
use crate::state::SharedState;

#[derive(Debug, Serialize)]
pub struct CurrentRoundResponse {
    pub round: u64,
}

#[derive(Debug, Serialize)]
pub struct RoundParticipantsResponse {
    pub round: u64,
    pub finalized: bool,
    /// Hex accounts, in acceptance order.
    pub participants: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ParticipantRewardResponse {
    pub round: u64,
    pub participant: String,
    /// Base units, as a decimal string.
    pub reward: String,
}

/// Request body for `POST /rounds/finalize`.
#[derive(Debug, Deserialize)]
pub struct FinalizeRoundRequest {
    /// Hex-encoded caller account; must be the administrator.
    pub caller: String,
}

#[derive(Debug, Serialize)]
pub struct RoundSummaryResponse {
    pub round: u64,
    pub participants: Vec<String>,
    pub total_rewards: String,
    /// The round now accepting contributions.
    pub next_round: u64,
}

/// `GET /rounds/current`
pub async fn current_round(State(state): State<SharedState>) -> Json<CurrentRoundResponse> {
    Json(CurrentRoundResponse {
        round: state.engine.current_round().0,
    })
}

/// `GET /rounds/{round}/participants`
pub async fn round_participants(
    State(state): State<SharedState>,
    Path(round): Path<u64>,
) -> Json<RoundParticipantsResponse> {
    let id = RoundId(round);
    Json(RoundParticipantsResponse {
        round,
        finalized: state.engine.is_round_finalized(id),
        participants: state
            .engine
            .round_participants(id)
            .iter()
            .map(|p| p.to_hex())
            .collect(),
    })
}

/// `GET /rounds/{round}/rewards/{participant}`
pub async fn participant_reward(
    State(state): State<SharedState>,
    Path((round, participant)): Path<(u64, String)>,
) -> Result<Json<ParticipantRewardResponse>, ApiError> {
    let account = parse_account(&participant)?;
    Ok(Json(ParticipantRewardResponse {
        round,
        participant: account.to_hex(),
        reward: state
            .engine
            .participant_reward(RoundId(round), &account)
            .to_string(),
    }))
}

/// `POST /rounds/finalize`
///
/// Closes the open round. Administrator only.
///
/// The caller account comes from the request body and is public, so this
/// check is only meaningful behind an authenticating proxy that binds the
/// body's `caller` to the authenticated administrator.
pub async fn finalize_round(
    State(state): State<SharedState>,
    Json(body): Json<FinalizeRoundRequest>,
) -> Result<Json<RoundSummaryResponse>, ApiError> {
    let caller = parse_account(&body.caller)?;
    let summary = state
        .engine
        .finalize_round(&caller)
        .map_err(|e| match e {
            AuthorityError::NotAuthorized => (StatusCode::FORBIDDEN, e.to_string()),
            AuthorityError::AlreadyTransferred => (StatusCode::CONFLICT, e.to_string()),
        })?;

    Ok(Json(RoundSummaryResponse {
        round: summary.round.0,
        participants: summary.participants.iter().map(|p| p.to_hex()).collect(),
        total_rewards: summary.total_rewards.to_string(),
        next_round: summary.round.next().0,
    }))
}
