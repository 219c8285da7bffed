//! Reward policies for accepted contributions.
//!
//! A [`RewardPolicy`] is a pure function from an accepted contribution to
//! a token amount and, for full-training contributions, a request to mint
//! one collectible for the new model. How large a "fair" reward is stays
//! a tuning concern; the engine only relies on determinism.

use serde::Deserialize;

use crate::types::{Contribution, ContributionKind, ModelDigest, TokenAmount};

/// Basis points representing 100%.
pub const FULL_QUALITY_BPS: u32 = 10_000;

/// Request to mint a collectible for a finalized model.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CollectibleRequest {
    pub model_digest: ModelDigest,
}

/// What the engine should pay for a contribution.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RewardDecision {
    pub amount: TokenAmount,
    pub collectible: Option<CollectibleRequest>,
}

/// Deterministic, side-effect free reward computation.
pub trait RewardPolicy: Send + Sync {
    fn compute(&self, contribution: &Contribution) -> RewardDecision;
}

impl<P: RewardPolicy + ?Sized> RewardPolicy for Box<P> {
    fn compute(&self, contribution: &Contribution) -> RewardDecision {
        (**self).compute(contribution)
    }
}

fn collectible_for(contribution: &Contribution) -> Option<CollectibleRequest> {
    match contribution.kind() {
        ContributionKind::Gradient => None,
        ContributionKind::FullTraining => Some(CollectibleRequest {
            model_digest: contribution.public_inputs.update_digest.clone(),
        }),
    }
}

/// Scales a per-kind base reward by the declared quality.
///
/// `amount = base * min(quality_bps, 10_000) / 10_000`, which is monotone
/// in the declared quality and never exceeds `base`.
#[derive(Clone, Debug)]
pub struct MetricScaledRewardPolicy {
    gradient_base: TokenAmount,
    training_base: TokenAmount,
}

impl MetricScaledRewardPolicy {
    pub fn new(gradient_base: TokenAmount, training_base: TokenAmount) -> Self {
        Self {
            gradient_base,
            training_base,
        }
    }

    pub fn from_config(cfg: &RewardConfig) -> Self {
        Self::new(cfg.gradient_base_units(), cfg.training_base_units())
    }
}

impl Default for MetricScaledRewardPolicy {
    fn default() -> Self {
        Self::from_config(&RewardConfig::default())
    }
}

impl RewardPolicy for MetricScaledRewardPolicy {
    fn compute(&self, contribution: &Contribution) -> RewardDecision {
        let base = match contribution.kind() {
            ContributionKind::Gradient => self.gradient_base,
            ContributionKind::FullTraining => self.training_base,
        };
        let quality = contribution
            .public_inputs
            .metrics
            .quality_bps
            .min(FULL_QUALITY_BPS);
        // Divide first so large bases cannot overflow.
        let amount = (base / TokenAmount::from(FULL_QUALITY_BPS)) * TokenAmount::from(quality)
            + (base % TokenAmount::from(FULL_QUALITY_BPS)) * TokenAmount::from(quality)
                / TokenAmount::from(FULL_QUALITY_BPS);

        RewardDecision {
            amount,
            collectible: collectible_for(contribution),
        }
    }
}

/// Pays every accepted contribution of a kind the same amount.
#[derive(Clone, Debug)]
pub struct FlatRewardPolicy {
    gradient: TokenAmount,
    training: TokenAmount,
}

impl FlatRewardPolicy {
    pub fn new(gradient: TokenAmount, training: TokenAmount) -> Self {
        Self { gradient, training }
    }

    pub fn from_config(cfg: &RewardConfig) -> Self {
        Self::new(cfg.gradient_base_units(), cfg.training_base_units())
    }
}

impl RewardPolicy for FlatRewardPolicy {
    fn compute(&self, contribution: &Contribution) -> RewardDecision {
        let amount = match contribution.kind() {
            ContributionKind::Gradient => self.gradient,
            ContributionKind::FullTraining => self.training,
        };
        RewardDecision {
            amount,
            collectible: collectible_for(contribution),
        }
    }
}

/// Which policy a node runs.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardPolicyKind {
    #[default]
    MetricScaled,
    Flat,
}

/// Reward tuning, in whole tokens.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    pub policy: RewardPolicyKind,
    /// Decimals of the incentive token.
    pub decimals: u32,
    /// Base reward for a gradient contribution.
    pub gradient_tokens: u64,
    /// Base reward for a full-training contribution.
    pub training_tokens: u64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            policy: RewardPolicyKind::MetricScaled,
            decimals: 18,
            gradient_tokens: 100,
            training_tokens: 250,
        }
    }
}

impl RewardConfig {
    fn to_base_units(&self, tokens: u64) -> TokenAmount {
        10u128
            .checked_pow(self.decimals)
            .and_then(|unit| unit.checked_mul(TokenAmount::from(tokens)))
            .unwrap_or(TokenAmount::MAX)
    }

    pub fn gradient_base_units(&self) -> TokenAmount {
        self.to_base_units(self.gradient_tokens)
    }

    pub fn training_base_units(&self) -> TokenAmount {
        self.to_base_units(self.training_tokens)
    }

    /// Instantiates the configured policy.
    pub fn build_policy(&self) -> Box<dyn RewardPolicy> {
        match self.policy {
            RewardPolicyKind::MetricScaled => Box::new(MetricScaledRewardPolicy::from_config(self)),
            RewardPolicyKind::Flat => Box::new(FlatRewardPolicy::from_config(self)),
        }
    }
}
