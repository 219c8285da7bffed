//! Training-round bookkeeping.
//!
//! Only the open round accepts contributions. Finalizing it opens the
//! next one. For every round the book keeps the accepted participants in
//! acceptance order and what each of them was paid.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::types::{AccountId, RoundId, TokenAmount};

/// Accepted participants and rewards of one round.
#[derive(Clone, Debug, Default)]
struct RoundEntry {
    participants: Vec<AccountId>,
    rewards: HashMap<AccountId, TokenAmount>,
    finalized: bool,
}

/// Summary returned when a round is finalized.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct RoundSummary {
    pub round: RoundId,
    pub participants: Vec<AccountId>,
    pub total_rewards: TokenAmount,
}

#[derive(Clone, Debug, Default)]
pub struct RoundBook {
    open: RoundId,
    rounds: BTreeMap<RoundId, RoundEntry>,
}

impl RoundBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_round(&self) -> RoundId {
        self.open
    }

    pub fn is_open(&self, round: RoundId) -> bool {
        round == self.open
    }

    /// Records a paid, accepted contribution.
    pub fn record(&mut self, round: RoundId, participant: AccountId, amount: TokenAmount) {
        let entry = self.rounds.entry(round).or_default();
        if !entry.rewards.contains_key(&participant) {
            entry.participants.push(participant);
        }
        *entry.rewards.entry(participant).or_insert(0) += amount;
    }

    /// Closes the open round and opens the next one.
    pub fn finalize(&mut self) -> RoundSummary {
        let round = self.open;
        let entry = self.rounds.entry(round).or_default();
        entry.finalized = true;
        let summary = RoundSummary {
            round,
            participants: entry.participants.clone(),
            total_rewards: entry.rewards.values().sum(),
        };
        self.open = round.next();
        summary
    }

    pub fn is_finalized(&self, round: RoundId) -> bool {
        self.rounds.get(&round).is_some_and(|e| e.finalized)
    }

    /// Accepted participants of `round`, in acceptance order.
    pub fn participants(&self, round: RoundId) -> Vec<AccountId> {
        self.rounds
            .get(&round)
            .map(|e| e.participants.clone())
            .unwrap_or_default()
    }

    /// Total paid to `participant` in `round`.
    pub fn reward_of(&self, round: RoundId, participant: &AccountId) -> TokenAmount {
        self.rounds
            .get(&round)
            .and_then(|e| e.rewards.get(participant).copied())
            .unwrap_or(0)
    }
}
