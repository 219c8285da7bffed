//! Reward records and collectible identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{ContributionKey, ModelDigest};

/// Token amount in base units (18 decimals by default).
pub type TokenAmount = u128;

/// Identifier of a minted collectible (non-fungible model record).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct CollectibleId(pub u64);

impl fmt::Display for CollectibleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Reward granted for one accepted contribution.
///
/// Created only as a side effect of an accepted contribution and never
/// mutated afterwards.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RewardRecord {
    /// The contribution slot this reward pays for.
    pub contribution: ContributionKey,
    /// Tokens minted to the participant.
    pub amount: TokenAmount,
    /// Collectible minted for a full-training contribution.
    pub collectible: Option<CollectibleId>,
    /// Model digest the collectible references, when one was minted.
    pub model_digest: Option<ModelDigest>,
}
