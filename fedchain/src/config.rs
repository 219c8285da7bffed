//! Top-level configuration for a coordinator node.
//!
//! This module aggregates configuration for:
//!
//! - engine wiring (initial model, engine and administrator identities),
//! - proof verification (verification keys, local or remote backend),
//! - reward tuning,
//! - storage (RocksDB path and creation flags),
//! - metrics exporter (enable flag + listen address).
//!
//! Every section has defaults; a JSON file may override any subset of
//! fields via [`FedChainConfig::from_json_file`].

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::coordination::{ConfigError, EngineConfig};
use crate::reward::RewardConfig;
use crate::storage::RocksDbConfig;
use crate::verification::{KeyedHashVerifier, ProofVerifier, VerificationKeySet};
use crate::verifier_client::HttpProofVerifier;

/// Where proofs are checked.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifierBackend {
    /// In-process [`KeyedHashVerifier`].
    #[default]
    Local,
    /// Remote sidecar through [`HttpProofVerifier`].
    Http,
}

/// Configuration for proof verification.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Verification key for gradient contributions.
    pub gradient_key: String,
    /// Verification key for full-training contributions.
    pub training_key: String,
    pub backend: VerifierBackend,
    /// Base URL of the verification service, e.g. `"http://127.0.0.1:8090"`.
    pub base_url: String,
    /// Request timeout for remote verification calls.
    pub timeout_ms: u64,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            gradient_key: "gradient-dummy-key".to_string(),
            training_key: "training-dummy-key".to_string(),
            backend: VerifierBackend::Local,
            base_url: "http://127.0.0.1:8090".to_string(),
            timeout_ms: 2_000,
        }
    }
}

impl VerifierConfig {
    pub fn keys(&self) -> Result<VerificationKeySet, ConfigError> {
        VerificationKeySet::new(self.gradient_key.as_bytes(), self.training_key.as_bytes())
    }

    /// Instantiates the configured verifier backend.
    pub fn build_verifier(&self) -> Result<Arc<dyn ProofVerifier>, ConfigError> {
        let keys = self.keys()?;
        match self.backend {
            VerifierBackend::Local => Ok(Arc::new(KeyedHashVerifier::new(&keys))),
            VerifierBackend::Http => {
                let client = HttpProofVerifier::new(
                    self.base_url.clone(),
                    keys,
                    Duration::from_millis(self.timeout_ms),
                )
                .map_err(|e| ConfigError::InvalidConfiguration(e.to_string()))?;
                Ok(Arc::new(client))
            }
        }
    }
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether to run a `/metrics` HTTP exporter.
    pub enabled: bool,
    /// Address to bind the metrics HTTP server to.
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        // Safe to unwrap: this is a fixed, valid address literal.
        let addr: SocketAddr = "127.0.0.1:9898"
            .parse()
            .expect("hard-coded metrics listen address should parse");
        Self {
            enabled: true,
            listen_addr: addr,
        }
    }
}

/// Top-level configuration for a coordinator node.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct FedChainConfig {
    pub engine: EngineConfig,
    pub verifier: VerifierConfig,
    pub reward: RewardConfig,
    pub storage: RocksDbConfig,
    pub metrics: MetricsConfig,
}

impl FedChainConfig {
    /// Reads a JSON config file; missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::InvalidConfiguration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(raw)
            .map_err(|e| ConfigError::InvalidConfiguration(format!("malformed config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reward::RewardPolicyKind;

    #[test]
    fn defaults_match_reference_deployment() {
        let cfg = FedChainConfig::default();
        assert_eq!(cfg.engine.initial_model_digest, "QmInitialModelHash");
        assert_eq!(cfg.verifier.gradient_key, "gradient-dummy-key");
        assert_eq!(cfg.verifier.training_key, "training-dummy-key");
        assert_eq!(cfg.reward.decimals, 18);
        assert_eq!(cfg.metrics.listen_addr.port(), 9898);
    }

    #[test]
    fn partial_json_overrides_only_given_fields() {
        let cfg = FedChainConfig::from_json_str(
            r#"{
                "engine": { "initial_model_digest": "QmOther" },
                "reward": { "policy": "flat", "training_tokens": 500 },
                "metrics": { "enabled": false }
            }"#,
        )
        .expect("valid config");

        assert_eq!(cfg.engine.initial_model_digest, "QmOther");
        assert_eq!(cfg.engine.engine_seed, EngineConfig::default().engine_seed);
        assert_eq!(cfg.reward.policy, RewardPolicyKind::Flat);
        assert_eq!(cfg.reward.training_tokens, 500);
        assert_eq!(cfg.reward.gradient_tokens, 100);
        assert!(!cfg.metrics.enabled);
        assert_eq!(cfg.verifier.backend, VerifierBackend::Local);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = FedChainConfig::from_json_str("{ not json").expect_err("rejected");
        assert!(matches!(err, ConfigError::InvalidConfiguration(_)));
    }

    #[test]
    fn empty_verification_key_fails_verifier_construction() {
        let cfg = VerifierConfig {
            training_key: String::new(),
            ..VerifierConfig::default()
        };
        assert!(cfg.build_verifier().is_err());
    }

    #[test]
    fn config_file_is_read_from_disk() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("fedchain.json");
        std::fs::write(&path, r#"{ "storage": { "path": "/tmp/fc" } }"#).expect("write config");

        let cfg = FedChainConfig::from_json_file(&path).expect("load config");
        assert_eq!(cfg.storage.path, "/tmp/fc");
        assert!(cfg.storage.create_if_missing);
    }
}
