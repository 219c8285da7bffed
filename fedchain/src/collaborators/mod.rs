//! External collaborators the engine rewards through.
//!
//! The engine depends on two token-bearing collaborators only through
//! these traits: a fungible [`TokenLedger`] and a [`CollectibleRegistry`]
//! of non-fungible model records. Both are governed by an
//! [`Authority`](crate::coordination::Authority) that the engine takes
//! over at deployment. In-memory implementations are provided for
//! simulations, tests and single-node deployments.

pub mod mem;

use thiserror::Error;

use crate::coordination::authority::AuthorityState;
use crate::coordination::error::AuthorityError;
use crate::types::{AccountId, CollectibleId, ModelDigest, TokenAmount};

pub use mem::{InMemoryCollectibleRegistry, InMemoryTokenLedger};

/// Failure reported by a collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error(transparent)]
    Authority(#[from] AuthorityError),
    #[error("insufficient balance: needed {needed}, available {available}")]
    InsufficientBalance {
        needed: TokenAmount,
        available: TokenAmount,
    },
    #[error("token supply overflow")]
    SupplyOverflow,
    #[error("unknown collectible {0}")]
    UnknownCollectible(CollectibleId),
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
}

/// Fungible incentive-token bookkeeping.
///
/// The engine only relies on `mint`, plus `burn` to compensate a mint
/// when a later step of the same submission fails.
pub trait TokenLedger: Send + Sync {
    /// Mints `amount` to `to`. Authority holder only.
    fn mint(&self, caller: &AccountId, to: &AccountId, amount: TokenAmount)
    -> Result<(), CollaboratorError>;

    /// Burns `amount` from `from`. Authority holder only.
    fn burn(
        &self,
        caller: &AccountId,
        from: &AccountId,
        amount: TokenAmount,
    ) -> Result<(), CollaboratorError>;

    /// Moves `amount` from `from` (the caller) to `to`.
    fn transfer(&self, from: &AccountId, to: &AccountId, amount: TokenAmount)
    -> Result<(), CollaboratorError>;

    fn balance_of(&self, who: &AccountId) -> TokenAmount;

    fn total_supply(&self) -> TokenAmount;

    fn authority(&self) -> AuthorityState;

    /// One-shot handoff of the mint authority.
    fn transfer_authority(
        &self,
        caller: &AccountId,
        new_authority: AccountId,
    ) -> Result<(), AuthorityError>;
}

/// Non-fungible records of finalized model versions.
pub trait CollectibleRegistry: Send + Sync {
    /// Mints a collectible referencing `model` to `to`. Authority holder only.
    fn mint(
        &self,
        caller: &AccountId,
        to: &AccountId,
        model: &ModelDigest,
    ) -> Result<CollectibleId, CollaboratorError>;

    /// Destroys a collectible. Authority holder only.
    fn burn(&self, caller: &AccountId, id: CollectibleId) -> Result<(), CollaboratorError>;

    fn owner_of(&self, id: CollectibleId) -> Option<AccountId>;

    fn token_uri(&self, id: CollectibleId) -> Option<String>;

    fn authority(&self) -> AuthorityState;

    /// One-shot handoff of the mint authority.
    fn transfer_authority(
        &self,
        caller: &AccountId,
        new_authority: AccountId,
    ) -> Result<(), AuthorityError>;
}
