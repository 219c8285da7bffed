//! Canonical model pointer types.
//!
//! The engine never handles model bytes. It only stores and compares the
//! content identifier of an artefact kept in off-chain, content-addressed
//! storage (e.g. an IPFS CID such as `"QmInitialModelHash"`).

use std::fmt;

use serde::{Deserialize, Serialize};

use super::AccountId;

/// Content identifier of a model (or gradient) artefact.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ModelDigest(String);

impl ModelDigest {
    pub fn new(digest: impl Into<String>) -> Self {
        ModelDigest(digest.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An empty digest never names a valid artefact.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// URI under which collectibles reference the artefact.
    pub fn token_uri(&self) -> String {
        format!("ipfs://{}", self.0)
    }
}

impl fmt::Display for ModelDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry of the canonical model lineage.
///
/// Version 0 is created at initialisation with the configured initial
/// digest; every accepted full-training contribution appends the next
/// version. Entries are never mutated or removed.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ModelVersion {
    /// Monotonically increasing version counter, starting at 0.
    pub version: u64,
    /// Content identifier of the model artefact at this version.
    pub digest: ModelDigest,
    /// Participant whose full-training contribution produced this
    /// version; `None` for the initial model.
    pub contributor: Option<AccountId>,
}

impl ModelVersion {
    /// The initial (version 0) model.
    pub fn genesis(digest: ModelDigest) -> Self {
        Self {
            version: 0,
            digest,
            contributor: None,
        }
    }
}
