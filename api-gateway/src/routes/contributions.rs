use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use fedchain::{
    ContributionKind, DeclaredMetrics, ModelDigest, Proof, PublicInputs, RoundId, Submission,
    SubmissionOutcome,
};

use super::models::ModelVersionDto;
use super::{ApiError, as_bad_request, as_internal, parse_account};
use crate::state::SharedState;

/// Request body for `POST /contributions` and `POST /contributions/digest`.
///
/// The participant identity is taken as already authenticated by the
/// transport in front of the gateway.
#[derive(Debug, Deserialize)]
pub struct ContributionRequest {
    /// Hex-encoded participant `AccountId`.
    pub participant: String,
    pub round: u64,
    pub kind: ContributionKind,
    /// Model version the update was computed against.
    pub prior_version: u64,
    /// Declared quality in basis points.
    pub quality_bps: u32,
    pub sample_count: u64,
    /// Content identifier of the submitted update.
    pub update_digest: String,
    /// Hex-encoded proof. Ignored by the digest endpoint.
    #[serde(default)]
    pub proof: String,
}

impl ContributionRequest {
    fn into_submission(self) -> Result<Submission, ApiError> {
        let participant = parse_account(&self.participant)?;
        let proof = hex::decode(&self.proof)
            .map_err(|_| as_bad_request("proof is not valid hex"))?;
        Ok(Submission {
            participant,
            round: RoundId(self.round),
            kind: self.kind,
            proof: Proof(proof),
            public_inputs: PublicInputs {
                prior_version: self.prior_version,
                metrics: DeclaredMetrics {
                    quality_bps: self.quality_bps,
                    sample_count: self.sample_count,
                },
                update_digest: ModelDigest::new(self.update_digest),
            },
        })
    }
}

/// Response body for `POST /contributions/digest`.
#[derive(Debug, Serialize)]
pub struct DigestResponse {
    /// Hex-encoded digest the proof must be bound to.
    pub public_input_digest: String,
}

/// Response body for `POST /contributions`.
#[derive(Debug, Serialize)]
pub struct SubmissionResponse {
    /// `"accepted"` or `"rejected"`.
    pub status: &'static str,
    /// Machine-readable rejection code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_version: Option<ModelVersionDto>,
    /// Reward in token base units, as a decimal string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collectible: Option<u64>,
}

impl From<SubmissionOutcome> for SubmissionResponse {
    fn from(outcome: SubmissionOutcome) -> Self {
        match outcome {
            SubmissionOutcome::Accepted(a) => Self {
                status: "accepted",
                reason_code: None,
                reason: None,
                new_version: a.new_version.as_ref().map(ModelVersionDto::from),
                reward: Some(a.reward.to_string()),
                collectible: a.collectible.map(|c| c.0),
            },
            SubmissionOutcome::Rejected(r) => Self {
                status: "rejected",
                reason_code: Some(r.code()),
                reason: Some(r.to_string()),
                new_version: None,
                reward: None,
                collectible: None,
            },
        }
    }
}

/// `POST /contributions/digest`
///
/// Returns the public-input digest of a prospective submission so the
/// client can bind its proof to it.
pub async fn contribution_digest(
    Json(body): Json<ContributionRequest>,
) -> Result<Json<DigestResponse>, ApiError> {
    let submission = body.into_submission()?;
    Ok(Json(DigestResponse {
        public_input_digest: submission.public_input_digest().0.to_hex(),
    }))
}

/// `POST /contributions`
///
/// Runs the submission through the engine. Rejections are routine and
/// returned with `200 OK`; only ledger faults map to `500`.
pub async fn submit_contribution(
    State(state): State<SharedState>,
    Json(body): Json<ContributionRequest>,
) -> Result<(StatusCode, Json<SubmissionResponse>), ApiError> {
    let submission = body.into_submission()?;

    // The verifier may block on a remote service.
    let outcome = tokio::task::spawn_blocking(move || state.engine.submit(submission))
        .await
        .map_err(as_internal)?
        .map_err(|e| {
            tracing::error!(error = %e, "contribution ledger fault");
            as_internal(e)
        })?;

    Ok((StatusCode::OK, Json(SubmissionResponse::from(outcome))))
}
