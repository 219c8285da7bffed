//! Contribution ledger abstraction used by the coordination engine.

use serde::{Deserialize, Serialize};

use crate::types::ContributionKey;

use super::error::LedgerError;

/// State of one `(participant, round, kind)` slot.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    /// Never reserved, or reserved and released after a failed attempt.
    Unseen,
    /// Reserved by an in-flight submission.
    Pending,
    /// A contribution for this slot was accepted. Terminal.
    Accepted,
}

/// Replay protection for contributions.
///
/// Implementations can be backed by in-memory maps, RocksDB, etc. The
/// engine calls these methods only while holding its transaction lock,
/// so `try_reserve` is an atomic check-and-set from the point of view of
/// concurrent submitters.
pub trait ContributionLedger: Send {
    /// Reserves `key` if it is `Unseen`.
    ///
    /// Returns `Ok(false)` when the slot is already pending or accepted;
    /// that is the normal replay-rejection path, not an error.
    fn try_reserve(&mut self, key: &ContributionKey) -> Result<bool, LedgerError>;

    /// Returns a `Pending` slot to `Unseen`.
    fn release(&mut self, key: &ContributionKey) -> Result<(), LedgerError>;

    /// Moves a `Pending` slot to `Accepted`.
    fn mark_accepted(&mut self, key: &ContributionKey) -> Result<(), LedgerError>;

    /// Current state of `key`.
    fn status(&self, key: &ContributionKey) -> Result<SlotStatus, LedgerError>;

    fn is_accepted(&self, key: &ContributionKey) -> Result<bool, LedgerError> {
        Ok(self.status(key)? == SlotStatus::Accepted)
    }
}

impl<L: ContributionLedger + ?Sized> ContributionLedger for Box<L> {
    fn try_reserve(&mut self, key: &ContributionKey) -> Result<bool, LedgerError> {
        (**self).try_reserve(key)
    }

    fn release(&mut self, key: &ContributionKey) -> Result<(), LedgerError> {
        (**self).release(key)
    }

    fn mark_accepted(&mut self, key: &ContributionKey) -> Result<(), LedgerError> {
        (**self).mark_accepted(key)
    }

    fn status(&self, key: &ContributionKey) -> Result<SlotStatus, LedgerError> {
        (**self).status(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountId, ContributionKind, HASH_LEN, Hash256, RoundId};

    /// Ledger that only remembers a single slot; enough to check the
    /// default method and trait-object use.
    #[derive(Default)]
    struct SingleSlotLedger {
        slot: Option<(ContributionKey, SlotStatus)>,
    }

    impl ContributionLedger for SingleSlotLedger {
        fn try_reserve(&mut self, key: &ContributionKey) -> Result<bool, LedgerError> {
            if self.slot.is_some() {
                return Ok(false);
            }
            self.slot = Some((*key, SlotStatus::Pending));
            Ok(true)
        }

        fn release(&mut self, _key: &ContributionKey) -> Result<(), LedgerError> {
            self.slot = None;
            Ok(())
        }

        fn mark_accepted(&mut self, key: &ContributionKey) -> Result<(), LedgerError> {
            self.slot = Some((*key, SlotStatus::Accepted));
            Ok(())
        }

        fn status(&self, key: &ContributionKey) -> Result<SlotStatus, LedgerError> {
            Ok(match self.slot {
                Some((k, s)) if k == *key => s,
                _ => SlotStatus::Unseen,
            })
        }
    }

    fn key() -> ContributionKey {
        ContributionKey::new(
            AccountId(Hash256([1u8; HASH_LEN])),
            RoundId(0),
            ContributionKind::Gradient,
        )
    }

    #[test]
    fn contribution_ledger_trait_is_object_safe() {
        let mut boxed: Box<dyn ContributionLedger> = Box::new(SingleSlotLedger::default());
        assert!(boxed.try_reserve(&key()).expect("reserve"));
        assert!(!boxed.try_reserve(&key()).expect("second reserve"));
    }

    #[test]
    fn is_accepted_follows_status() {
        let mut ledger = SingleSlotLedger::default();
        assert!(!ledger.is_accepted(&key()).expect("status"));
        ledger.try_reserve(&key()).expect("reserve");
        assert!(!ledger.is_accepted(&key()).expect("status"));
        ledger.mark_accepted(&key()).expect("accept");
        assert!(ledger.is_accepted(&key()).expect("status"));
    }
}
