use serde::Deserialize;

use crate::types::{AccountId, ModelDigest};

/// Engine wiring parameters.
///
/// Identities are derived from seeds the same way participant identities
/// are derived from public keys, which keeps local deployments and
/// simulations reproducible.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Content identifier of the version-0 model.
    pub initial_model_digest: String,
    /// Seed of the engine's own identity (the post-handoff authority).
    pub engine_seed: String,
    /// Seed of the deployment-time administrator.
    pub administrator_seed: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_model_digest: "QmInitialModelHash".to_string(),
            engine_seed: "fedchain-core".to_string(),
            administrator_seed: "fedchain-administrator".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn initial_model(&self) -> ModelDigest {
        ModelDigest::new(self.initial_model_digest.clone())
    }

    pub fn engine_id(&self) -> AccountId {
        AccountId::from_public_key(self.engine_seed.as_bytes())
    }

    pub fn administrator_id(&self) -> AccountId {
        AccountId::from_public_key(self.administrator_seed.as_bytes())
    }
}
