//! In-memory token ledger and collectible registry.
//!
//! Both keep their state behind a `parking_lot::Mutex` so they can be
//! shared as `Arc<dyn ...>` between the engine, its governor and any
//! read-only API handlers.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::coordination::authority::{Authority, AuthorityState};
use crate::coordination::error::AuthorityError;
use crate::types::{AccountId, CollectibleId, ModelDigest, TokenAmount};

use super::{CollaboratorError, CollectibleRegistry, TokenLedger};

struct TokenState {
    authority: Authority,
    balances: HashMap<AccountId, TokenAmount>,
    total_supply: TokenAmount,
}

/// In-memory implementation of [`TokenLedger`].
pub struct InMemoryTokenLedger {
    state: Mutex<TokenState>,
}

impl InMemoryTokenLedger {
    /// Creates an empty ledger whose mint authority is `administrator`.
    pub fn new(administrator: AccountId) -> Self {
        Self {
            state: Mutex::new(TokenState {
                authority: Authority::new(administrator),
                balances: HashMap::new(),
                total_supply: 0,
            }),
        }
    }
}

impl TokenLedger for InMemoryTokenLedger {
    fn mint(
        &self,
        caller: &AccountId,
        to: &AccountId,
        amount: TokenAmount,
    ) -> Result<(), CollaboratorError> {
        let mut state = self.state.lock();
        state.authority.ensure_holder(caller)?;
        let supply = state
            .total_supply
            .checked_add(amount)
            .ok_or(CollaboratorError::SupplyOverflow)?;
        state.total_supply = supply;
        *state.balances.entry(*to).or_insert(0) += amount;
        Ok(())
    }

    fn burn(
        &self,
        caller: &AccountId,
        from: &AccountId,
        amount: TokenAmount,
    ) -> Result<(), CollaboratorError> {
        let mut state = self.state.lock();
        state.authority.ensure_holder(caller)?;
        let available = state.balances.get(from).copied().unwrap_or(0);
        if available < amount {
            return Err(CollaboratorError::InsufficientBalance {
                needed: amount,
                available,
            });
        }
        state.balances.insert(*from, available - amount);
        state.total_supply -= amount;
        Ok(())
    }

    fn transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: TokenAmount,
    ) -> Result<(), CollaboratorError> {
        let mut state = self.state.lock();
        let available = state.balances.get(from).copied().unwrap_or(0);
        if available < amount {
            return Err(CollaboratorError::InsufficientBalance {
                needed: amount,
                available,
            });
        }
        state.balances.insert(*from, available - amount);
        *state.balances.entry(*to).or_insert(0) += amount;
        Ok(())
    }

    fn balance_of(&self, who: &AccountId) -> TokenAmount {
        self.state.lock().balances.get(who).copied().unwrap_or(0)
    }

    fn total_supply(&self) -> TokenAmount {
        self.state.lock().total_supply
    }

    fn authority(&self) -> AuthorityState {
        self.state.lock().authority.state()
    }

    fn transfer_authority(
        &self,
        caller: &AccountId,
        new_authority: AccountId,
    ) -> Result<(), AuthorityError> {
        self.state.lock().authority.hand_off(caller, new_authority)
    }
}

struct CollectibleEntry {
    owner: AccountId,
    model: ModelDigest,
}

struct CollectibleState {
    authority: Authority,
    next_id: u64,
    entries: HashMap<CollectibleId, CollectibleEntry>,
}

/// In-memory implementation of [`CollectibleRegistry`].
///
/// Identifiers start at 1 and are never reused, even after a burn.
pub struct InMemoryCollectibleRegistry {
    state: Mutex<CollectibleState>,
}

impl InMemoryCollectibleRegistry {
    pub fn new(administrator: AccountId) -> Self {
        Self {
            state: Mutex::new(CollectibleState {
                authority: Authority::new(administrator),
                next_id: 1,
                entries: HashMap::new(),
            }),
        }
    }

    /// Number of live collectibles.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CollectibleRegistry for InMemoryCollectibleRegistry {
    fn mint(
        &self,
        caller: &AccountId,
        to: &AccountId,
        model: &ModelDigest,
    ) -> Result<CollectibleId, CollaboratorError> {
        let mut state = self.state.lock();
        state.authority.ensure_holder(caller)?;
        let id = CollectibleId(state.next_id);
        state.next_id += 1;
        state.entries.insert(
            id,
            CollectibleEntry {
                owner: *to,
                model: model.clone(),
            },
        );
        Ok(id)
    }

    fn burn(&self, caller: &AccountId, id: CollectibleId) -> Result<(), CollaboratorError> {
        let mut state = self.state.lock();
        state.authority.ensure_holder(caller)?;
        state
            .entries
            .remove(&id)
            .map(|_| ())
            .ok_or(CollaboratorError::UnknownCollectible(id))
    }

    fn owner_of(&self, id: CollectibleId) -> Option<AccountId> {
        self.state.lock().entries.get(&id).map(|e| e.owner)
    }

    fn token_uri(&self, id: CollectibleId) -> Option<String> {
        self.state.lock().entries.get(&id).map(|e| e.model.token_uri())
    }

    fn authority(&self) -> AuthorityState {
        self.state.lock().authority.state()
    }

    fn transfer_authority(
        &self,
        caller: &AccountId,
        new_authority: AccountId,
    ) -> Result<(), AuthorityError> {
        self.state.lock().authority.hand_off(caller, new_authority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HASH_LEN, Hash256};

    fn account(byte: u8) -> AccountId {
        AccountId(Hash256([byte; HASH_LEN]))
    }

    #[test]
    fn mint_transfer_and_burn_track_supply() {
        let admin = account(1);
        let ledger = InMemoryTokenLedger::new(admin);

        ledger.mint(&admin, &account(2), 100).expect("mint");
        ledger.transfer(&account(2), &account(3), 40).expect("transfer");
        assert_eq!(ledger.balance_of(&account(2)), 60);
        assert_eq!(ledger.balance_of(&account(3)), 40);
        assert_eq!(ledger.total_supply(), 100);

        ledger.burn(&admin, &account(3), 40).expect("burn");
        assert_eq!(ledger.balance_of(&account(3)), 0);
        assert_eq!(ledger.total_supply(), 60);
    }

    #[test]
    fn transfers_cannot_overdraw() {
        let admin = account(1);
        let ledger = InMemoryTokenLedger::new(admin);
        ledger.mint(&admin, &account(2), 5).expect("mint");

        let err = ledger
            .transfer(&account(2), &account(3), 6)
            .expect_err("overdraw");
        assert_eq!(
            err,
            CollaboratorError::InsufficientBalance {
                needed: 6,
                available: 5
            }
        );
        assert_eq!(ledger.balance_of(&account(2)), 5);
    }

    #[test]
    fn only_authority_mints() {
        let ledger = InMemoryTokenLedger::new(account(1));
        let err = ledger.mint(&account(9), &account(2), 1).expect_err("not authority");
        assert_eq!(err, CollaboratorError::Authority(AuthorityError::NotAuthorized));
        assert_eq!(ledger.total_supply(), 0);
    }

    #[test]
    fn collectibles_reference_model_digest() {
        let admin = account(1);
        let reg = InMemoryCollectibleRegistry::new(admin);

        let id = reg
            .mint(&admin, &account(4), &ModelDigest::new("QmModelV1"))
            .expect("mint");
        assert_eq!(id, CollectibleId(1));
        assert_eq!(reg.owner_of(id), Some(account(4)));
        assert_eq!(reg.token_uri(id).as_deref(), Some("ipfs://QmModelV1"));

        reg.burn(&admin, id).expect("burn");
        assert!(reg.owner_of(id).is_none());
        assert_eq!(
            reg.burn(&admin, id),
            Err(CollaboratorError::UnknownCollectible(id))
        );

        let next = reg
            .mint(&admin, &account(4), &ModelDigest::new("QmModelV2"))
            .expect("mint");
        assert_eq!(next, CollectibleId(2));
        assert_eq!(reg.len(), 1);
    }
}
