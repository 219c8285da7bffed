//! One-way authority handoff from the deployer to the engine.
//!
//! At deployment the administrator controls the token-bearing
//! collaborators. Once the engine is wired up, each collaborator's
//! authority is handed to the engine exactly once. There is no way back:
//! afterwards the administrator is an ordinary caller and every
//! administrator-only operation fails with `NotAuthorized`.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::collaborators::{CollectibleRegistry, TokenLedger};
use crate::types::AccountId;

use super::error::AuthorityError;

/// Who currently controls a governed collaborator.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AuthorityState {
    AdministratorControlled { administrator: AccountId },
    EngineControlled { engine: AccountId },
}

/// Irreversible authority value embedded in each governed collaborator.
#[derive(Clone, Debug)]
pub struct Authority {
    state: AuthorityState,
}

impl Authority {
    /// Authority held by the deployment-time administrator.
    pub fn new(administrator: AccountId) -> Self {
        Self {
            state: AuthorityState::AdministratorControlled { administrator },
        }
    }

    pub fn state(&self) -> AuthorityState {
        self.state
    }

    /// Identity currently allowed to perform privileged operations.
    pub fn holder(&self) -> AccountId {
        match self.state {
            AuthorityState::AdministratorControlled { administrator } => administrator,
            AuthorityState::EngineControlled { engine } => engine,
        }
    }

    pub fn is_engine_controlled(&self) -> bool {
        matches!(self.state, AuthorityState::EngineControlled { .. })
    }

    /// Guard for privileged operations.
    pub fn ensure_holder(&self, caller: &AccountId) -> Result<(), AuthorityError> {
        if self.holder() != *caller {
            return Err(AuthorityError::NotAuthorized);
        }
        Ok(())
    }

    /// Transfers authority from the administrator to `engine`.
    ///
    /// Fails with `AlreadyTransferred` once the handoff happened, whoever
    /// the caller is, and with `NotAuthorized` if a non-administrator
    /// attempts the first handoff.
    pub fn hand_off(&mut self, caller: &AccountId, engine: AccountId) -> Result<(), AuthorityError> {
        match self.state {
            AuthorityState::EngineControlled { .. } => Err(AuthorityError::AlreadyTransferred),
            AuthorityState::AdministratorControlled { administrator } => {
                if administrator != *caller {
                    return Err(AuthorityError::NotAuthorized);
                }
                self.state = AuthorityState::EngineControlled { engine };
                Ok(())
            }
        }
    }
}

/// The collaborators whose authority the engine takes over.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GovernedCollaborator {
    TokenLedger,
    CollectibleRegistry,
}

/// Drives the handoff of both collaborators to the engine identity.
pub struct AuthorityGovernor {
    engine: AccountId,
    token: Arc<dyn TokenLedger>,
    collectibles: Arc<dyn CollectibleRegistry>,
}

impl AuthorityGovernor {
    pub fn new(
        engine: AccountId,
        token: Arc<dyn TokenLedger>,
        collectibles: Arc<dyn CollectibleRegistry>,
    ) -> Self {
        Self {
            engine,
            token,
            collectibles,
        }
    }

    pub fn engine(&self) -> AccountId {
        self.engine
    }

    pub fn state(&self, which: GovernedCollaborator) -> AuthorityState {
        match which {
            GovernedCollaborator::TokenLedger => self.token.authority(),
            GovernedCollaborator::CollectibleRegistry => self.collectibles.authority(),
        }
    }

    pub fn is_engine_controlled(&self, which: GovernedCollaborator) -> bool {
        matches!(
            self.state(which),
            AuthorityState::EngineControlled { engine } if engine == self.engine
        )
    }

    /// `true` once the engine controls every governed collaborator.
    pub fn fully_engine_controlled(&self) -> bool {
        self.is_engine_controlled(GovernedCollaborator::TokenLedger)
            && self.is_engine_controlled(GovernedCollaborator::CollectibleRegistry)
    }

    /// Hands one collaborator over to the engine.
    pub fn hand_off(
        &self,
        caller: &AccountId,
        which: GovernedCollaborator,
    ) -> Result<(), AuthorityError> {
        match which {
            GovernedCollaborator::TokenLedger => self.token.transfer_authority(caller, self.engine)?,
            GovernedCollaborator::CollectibleRegistry => {
                self.collectibles.transfer_authority(caller, self.engine)?
            }
        }
        info!(collaborator = ?which, engine = %self.engine, "authority handed off to engine");
        Ok(())
    }

    /// Hands both collaborators over.
    ///
    /// Nothing is transferred unless both are still administrator
    /// controlled.
    pub fn hand_off_all(&self, caller: &AccountId) -> Result<(), AuthorityError> {
        for which in [
            GovernedCollaborator::TokenLedger,
            GovernedCollaborator::CollectibleRegistry,
        ] {
            match self.state(which) {
                AuthorityState::EngineControlled { .. } => {
                    return Err(AuthorityError::AlreadyTransferred);
                }
                AuthorityState::AdministratorControlled { administrator } => {
                    if administrator != *caller {
                        return Err(AuthorityError::NotAuthorized);
                    }
                }
            }
        }
        self.hand_off(caller, GovernedCollaborator::TokenLedger)?;
        self.hand_off(caller, GovernedCollaborator::CollectibleRegistry)
    }
}
