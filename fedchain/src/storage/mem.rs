//! In-memory contribution ledger.
//!
//! This implementation is useful for unit tests, simulations and
//! single-process deployments that do not need replay protection to
//! survive a restart. Only pending and accepted slots are stored; a
//! released slot is simply removed.

use std::collections::HashMap;

use crate::coordination::error::LedgerError;
use crate::coordination::ledger::{ContributionLedger, SlotStatus};
use crate::types::ContributionKey;

/// In-memory implementation of [`ContributionLedger`].
#[derive(Default)]
pub struct InMemoryContributionLedger {
    slots: HashMap<ContributionKey, SlotStatus>,
}

impl InMemoryContributionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending or accepted slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl ContributionLedger for InMemoryContributionLedger {
    fn try_reserve(&mut self, key: &ContributionKey) -> Result<bool, LedgerError> {
        if self.slots.contains_key(key) {
            return Ok(false);
        }
        self.slots.insert(*key, SlotStatus::Pending);
        Ok(true)
    }

    fn release(&mut self, key: &ContributionKey) -> Result<(), LedgerError> {
        match self.slots.get(key) {
            Some(SlotStatus::Pending) => {
                self.slots.remove(key);
                Ok(())
            }
            _ => Err(LedgerError::NotPending(*key)),
        }
    }

    fn mark_accepted(&mut self, key: &ContributionKey) -> Result<(), LedgerError> {
        match self.slots.get_mut(key) {
            Some(slot @ SlotStatus::Pending) => {
                *slot = SlotStatus::Accepted;
                Ok(())
            }
            _ => Err(LedgerError::NotPending(*key)),
        }
    }

    fn status(&self, key: &ContributionKey) -> Result<SlotStatus, LedgerError> {
        Ok(self.slots.get(key).copied().unwrap_or(SlotStatus::Unseen))
    }
}
