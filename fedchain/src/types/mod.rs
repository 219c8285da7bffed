//! Core domain types used by the coordination engine.
//!
//! This module defines strongly-typed hashes, participant identifiers,
//! round identifiers, model versions and contribution payloads that are
//! shared across the crate. The goal is to avoid "naked" byte buffers
//! and integers in public APIs and instead use domain-specific newtypes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Contributions, public inputs and submission outcomes.
pub mod contribution;
/// Canonical model pointer types.
pub mod model;
/// Reward records and collectible identifiers.
pub mod reward;

pub use contribution::{
    Contribution, ContributionKey, ContributionKind, ContributionOutcome, DeclaredMetrics, Proof,
    PublicInputDigest, PublicInputs, Submission,
};
pub use model::{ModelDigest, ModelVersion};
pub use reward::{CollectibleId, RewardRecord, TokenAmount};

/// Length in bytes of all 256-bit hash types used in this module.
pub const HASH_LEN: usize = 32;

/// Strongly-typed 256-bit hash wrapper (BLAKE3-256).
///
/// This is the backing representation for participant identifiers and
/// public-input digests. It is always exactly [`HASH_LEN`] bytes long.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Hash256(pub [u8; HASH_LEN]);

impl Hash256 {
    /// Computes a new [`Hash256`] as the BLAKE3-256 hash of `data`.
    pub fn compute(data: &[u8]) -> Self {
        let h = blake3::hash(data);
        Hash256(*h.as_bytes())
    }

    /// Returns the underlying 32-byte hash as a borrowed array.
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Lower-case hex encoding of the hash.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a 32-byte hex string.
    pub fn from_hex(hex_str: &str) -> Result<Self, HexError> {
        let bytes = hex::decode(hex_str).map_err(|_| HexError::Encoding)?;
        if bytes.len() != HASH_LEN {
            return Err(HexError::Length(bytes.len()));
        }
        let mut arr = [0u8; HASH_LEN];
        arr.copy_from_slice(&bytes);
        Ok(Hash256(arr))
    }
}

/// Failure to parse a hex-encoded [`Hash256`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HexError {
    #[error("invalid hex encoding")]
    Encoding,
    #[error("expected a 32-byte hash, got {0} bytes")]
    Length(usize),
}

/// Participant (or engine / administrator) identity.
///
/// Identities arrive already authenticated; the engine only compares
/// them. An `AccountId` is the BLAKE3 hash of the holder's public key.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub Hash256);

impl AccountId {
    /// Derives an [`AccountId`] from public key bytes.
    pub fn from_public_key(pk_bytes: &[u8]) -> Self {
        AccountId(Hash256::compute(pk_bytes))
    }

    /// Returns the underlying [`Hash256`] backing this identifier.
    pub fn as_hash(&self) -> &Hash256 {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_hex())
    }
}

/// Training round identifier.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct RoundId(pub u64);

impl RoundId {
    /// The round that follows this one.
    pub fn next(self) -> Self {
        RoundId(self.0 + 1)
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
