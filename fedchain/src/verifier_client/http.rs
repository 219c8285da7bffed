//! HTTP-based proof verifier client.
//!
//! This implementation of [`crate::verification::ProofVerifier`] talks to
//! a verification sidecar over HTTP. It assumes the service exposes a
//! JSON API of the form:
//!
//! ```json
//! POST /verify
//! {
//!   "kind": "full_training",
//!   "verification_key": "hex-encoded-key",
//!   "public_input_digest": "hex-encoded-digest",
//!   "proof": "hex-encoded-proof"
//! }
//!
//! Response:
//! {
//!   "valid": true
//! }
//! ```
//!
//! A verifier has no error channel: transport, status and protocol
//! faults are logged and count as a failed verification.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::types::{ContributionKind, Proof, PublicInputDigest};
use crate::verification::{ProofVerifier, VerificationKeySet};

/// Failures while talking to the verification service.
#[derive(Debug, Error)]
pub enum VerifierClientError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("verification service error: {0}")]
    Service(String),
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// HTTP-based proof verifier.
///
/// This client is thread-safe (`Send + Sync`) and can be shared across
/// submitters. It uses the blocking `reqwest` client internally, so async
/// callers must run the engine on a blocking thread (e.g.
/// `tokio::task::spawn_blocking`).
pub struct HttpProofVerifier {
    base_url: String,
    client: Client,
    keys: VerificationKeySet,
}

impl HttpProofVerifier {
    /// Constructs a verifier pointing at `base_url`, e.g.
    /// `"http://127.0.0.1:8090"` (without a trailing slash).
    pub fn new(
        base_url: impl Into<String>,
        keys: VerificationKeySet,
        timeout: Duration,
    ) -> Result<Self, VerifierClientError> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            VerifierClientError::Transport(format!("failed to build HTTP client: {e}"))
        })?;

        Ok(Self {
            base_url: base_url.into(),
            client,
            keys,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Asks the service for a verdict.
    pub fn request_verdict(
        &self,
        kind: ContributionKind,
        digest: &PublicInputDigest,
        proof: &Proof,
    ) -> Result<bool, VerifierClientError> {
        let url = self.endpoint("/verify");
        let req_body = VerifyRequest::new(kind, self.keys.key_for(kind), digest, proof);

        let resp = self
            .client
            .post(&url)
            .json(&req_body)
            .send()
            .map_err(|e| VerifierClientError::Transport(format!("HTTP POST {url} failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(VerifierClientError::Service(format!(
                "verification service returned HTTP status {status}"
            )));
        }

        let body = resp.json::<VerifyResponse>().map_err(|e| {
            VerifierClientError::Protocol(format!("failed to parse JSON response: {e}"))
        })?;
        Ok(body.valid)
    }
}

/// Request payload sent to the verification service.
#[derive(Debug, Serialize)]
struct VerifyRequest {
    kind: ContributionKind,
    /// Hex-encoded verification key for `kind`.
    verification_key: String,
    /// Hex-encoded public-input digest.
    public_input_digest: String,
    /// Hex-encoded proof bytes.
    proof: String,
}

impl VerifyRequest {
    fn new(kind: ContributionKind, key: &[u8], digest: &PublicInputDigest, proof: &Proof) -> Self {
        Self {
            kind,
            verification_key: hex::encode(key),
            public_input_digest: hex::encode(digest.as_bytes()),
            proof: hex::encode(proof.as_bytes()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    valid: bool,
}

impl ProofVerifier for HttpProofVerifier {
    fn verify(&self, kind: ContributionKind, digest: &PublicInputDigest, proof: &Proof) -> bool {
        match self.request_verdict(kind, digest, proof) {
            Ok(valid) => {
                debug!(kind = %kind, valid, "remote proof verdict");
                valid
            }
            Err(e) => {
                warn!(kind = %kind, error = %e, "remote proof verification failed; rejecting");
                false
            }
        }
    }
}
