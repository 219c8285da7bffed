//! Canonical model pointer with an append-only version history.

use crate::types::{AccountId, ModelDigest, ModelVersion};

use super::error::RegistryError;

/// Holds the current canonical model and every version before it.
///
/// The registry is owned by the engine and only mutated inside the
/// engine's commit section, so [`ModelRegistry::advance`] is atomic from
/// an outside observer's point of view.
#[derive(Clone, Debug)]
pub struct ModelRegistry {
    history: Vec<ModelVersion>,
}

impl ModelRegistry {
    /// Creates a registry at version 0 pointing at `initial`.
    pub fn new(initial: ModelDigest) -> Self {
        Self {
            history: vec![ModelVersion::genesis(initial)],
        }
    }

    /// The current canonical model.
    pub fn current(&self) -> &ModelVersion {
        // `history` is never empty: `new` seeds version 0 and nothing pops.
        &self.history[self.history.len() - 1]
    }

    /// Fails with `StaleVersion` unless the registry is at `expected_prior`.
    pub fn check_prior(&self, expected_prior: u64) -> Result<(), RegistryError> {
        let current = self.current().version;
        if current != expected_prior {
            return Err(RegistryError::StaleVersion {
                expected: expected_prior,
                current,
            });
        }
        Ok(())
    }

    /// Appends version `expected_prior + 1` pointing at `digest`.
    pub fn advance(
        &mut self,
        expected_prior: u64,
        digest: ModelDigest,
        contributor: Option<AccountId>,
    ) -> Result<ModelVersion, RegistryError> {
        let next = self.prepare_advance(expected_prior, digest, contributor)?;
        self.apply(next.clone());
        Ok(next)
    }

    /// First half of [`ModelRegistry::advance`]: validates the prior
    /// version and returns the version that would be appended, without
    /// changing anything.
    pub fn prepare_advance(
        &self,
        expected_prior: u64,
        digest: ModelDigest,
        contributor: Option<AccountId>,
    ) -> Result<ModelVersion, RegistryError> {
        self.check_prior(expected_prior)?;
        Ok(ModelVersion {
            version: expected_prior + 1,
            digest,
            contributor,
        })
    }

    /// Second half of [`ModelRegistry::advance`].
    ///
    /// `next` must come from `prepare_advance` on the current state; the
    /// engine guarantees this by holding its commit lock across both.
    pub(crate) fn apply(&mut self, next: ModelVersion) {
        debug_assert_eq!(next.version, self.current().version + 1);
        self.history.push(next);
    }

    /// All versions, oldest first.
    pub fn history(&self) -> &[ModelVersion] {
        &self.history
    }

    pub fn model_at(&self, version: u64) -> Option<&ModelVersion> {
        usize::try_from(version)
            .ok()
            .and_then(|idx| self.history.get(idx))
    }
}
