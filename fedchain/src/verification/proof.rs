//! Verification keys and the proof-verifier predicate.

use std::sync::Arc;

use crate::coordination::error::ConfigError;
use crate::types::{ContributionKind, HASH_LEN, Proof, PublicInputDigest};

/// Context string for deriving keyed-hash keys from verification keys.
const KEY_DERIVATION_CONTEXT: &str = "fedchain 2024 proof verifier key v1";

/// Stateless proof-verification predicate.
///
/// Implementations must be deterministic and side-effect free: the same
/// inputs always yield the same answer. Malformed proofs are rejected by
/// returning `false`, never by panicking.
pub trait ProofVerifier: Send + Sync {
    fn verify(&self, kind: ContributionKind, digest: &PublicInputDigest, proof: &Proof) -> bool;
}

impl<V: ProofVerifier + ?Sized> ProofVerifier for Arc<V> {
    fn verify(&self, kind: ContributionKind, digest: &PublicInputDigest, proof: &Proof) -> bool {
        (**self).verify(kind, digest, proof)
    }
}

impl<V: ProofVerifier + ?Sized> ProofVerifier for Box<V> {
    fn verify(&self, kind: ContributionKind, digest: &PublicInputDigest, proof: &Proof) -> bool {
        (**self).verify(kind, digest, proof)
    }
}

/// The two verification keys, fixed for the lifetime of a verifier.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VerificationKeySet {
    gradient: Vec<u8>,
    training: Vec<u8>,
}

impl VerificationKeySet {
    /// Builds a key set; both keys must be non-empty.
    pub fn new(gradient: impl Into<Vec<u8>>, training: impl Into<Vec<u8>>) -> Result<Self, ConfigError> {
        let gradient = gradient.into();
        let training = training.into();
        if gradient.is_empty() {
            return Err(ConfigError::InvalidConfiguration(
                "gradient verification key is empty".to_string(),
            ));
        }
        if training.is_empty() {
            return Err(ConfigError::InvalidConfiguration(
                "training verification key is empty".to_string(),
            ));
        }
        Ok(Self { gradient, training })
    }

    /// Key selected by `kind`.
    pub fn key_for(&self, kind: ContributionKind) -> &[u8] {
        match kind {
            ContributionKind::Gradient => &self.gradient,
            ContributionKind::FullTraining => &self.training,
        }
    }
}

/// Local verifier for keyed-hash attestations.
///
/// A proof is valid iff it equals the BLAKE3 keyed hash of the public-input
/// digest under a key derived from the verification key of the
/// contribution kind. Comparison is constant-time.
pub struct KeyedHashVerifier {
    gradient_key: [u8; HASH_LEN],
    training_key: [u8; HASH_LEN],
}

impl KeyedHashVerifier {
    pub fn new(keys: &VerificationKeySet) -> Self {
        Self {
            gradient_key: blake3::derive_key(
                KEY_DERIVATION_CONTEXT,
                keys.key_for(ContributionKind::Gradient),
            ),
            training_key: blake3::derive_key(
                KEY_DERIVATION_CONTEXT,
                keys.key_for(ContributionKind::FullTraining),
            ),
        }
    }

    fn derived_key(&self, kind: ContributionKind) -> &[u8; HASH_LEN] {
        match kind {
            ContributionKind::Gradient => &self.gradient_key,
            ContributionKind::FullTraining => &self.training_key,
        }
    }

    /// Produces the attestation this verifier accepts for `digest`.
    ///
    /// Used by simulated participants and tests.
    pub fn attest(&self, kind: ContributionKind, digest: &PublicInputDigest) -> Proof {
        let h = blake3::keyed_hash(self.derived_key(kind), digest.as_bytes());
        Proof(h.as_bytes().to_vec())
    }
}

impl ProofVerifier for KeyedHashVerifier {
    fn verify(&self, kind: ContributionKind, digest: &PublicInputDigest, proof: &Proof) -> bool {
        let Ok(bytes) = <[u8; HASH_LEN]>::try_from(proof.as_bytes()) else {
            return false;
        };
        let expected = blake3::keyed_hash(self.derived_key(kind), digest.as_bytes());
        // `blake3::Hash` equality is constant-time.
        expected == blake3::Hash::from(bytes)
    }
}

/// A verifier that accepts every proof.
///
/// Useful for tests that exercise the engine without caring about proofs.
pub struct AcceptAllVerifier;

impl ProofVerifier for AcceptAllVerifier {
    fn verify(&self, _kind: ContributionKind, _digest: &PublicInputDigest, _proof: &Proof) -> bool {
        true
    }
}

/// A verifier that rejects every proof.
pub struct RejectAllVerifier;

impl ProofVerifier for RejectAllVerifier {
    fn verify(&self, _kind: ContributionKind, _digest: &PublicInputDigest, _proof: &Proof) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Hash256;

    fn keys() -> VerificationKeySet {
        VerificationKeySet::new(b"gradient-dummy-key".to_vec(), b"training-dummy-key".to_vec())
            .expect("non-empty keys")
    }

    fn digest(byte: u8) -> PublicInputDigest {
        PublicInputDigest(Hash256([byte; HASH_LEN]))
    }

    #[test]
    fn empty_keys_are_invalid_configuration() {
        assert!(VerificationKeySet::new(Vec::new(), b"t".to_vec()).is_err());
        assert!(VerificationKeySet::new(b"g".to_vec(), Vec::new()).is_err());
    }

    #[test]
    fn attestation_verifies_only_for_its_kind_and_digest() {
        let v = KeyedHashVerifier::new(&keys());
        let proof = v.attest(ContributionKind::Gradient, &digest(1));

        assert!(v.verify(ContributionKind::Gradient, &digest(1), &proof));
        assert!(!v.verify(ContributionKind::FullTraining, &digest(1), &proof));
        assert!(!v.verify(ContributionKind::Gradient, &digest(2), &proof));
    }

    #[test]
    fn malformed_proofs_are_rejected_not_fatal() {
        let v = KeyedHashVerifier::new(&keys());
        assert!(!v.verify(ContributionKind::Gradient, &digest(1), &Proof(Vec::new())));
        assert!(!v.verify(ContributionKind::Gradient, &digest(1), &Proof(vec![0u8; 7])));
        assert!(!v.verify(ContributionKind::Gradient, &digest(1), &Proof(vec![0u8; 64])));
    }

    #[test]
    fn different_key_sets_do_not_cross_verify() {
        let a = KeyedHashVerifier::new(&keys());
        let b = KeyedHashVerifier::new(
            &VerificationKeySet::new(b"other-g".to_vec(), b"other-t".to_vec()).expect("keys"),
        );
        let proof = a.attest(ContributionKind::FullTraining, &digest(3));
        assert!(!b.verify(ContributionKind::FullTraining, &digest(3), &proof));
    }

    #[test]
    fn verifier_trait_is_object_safe() {
        let boxed: Box<dyn ProofVerifier> = Box::new(AcceptAllVerifier);
        assert!(boxed.verify(ContributionKind::Gradient, &digest(0), &Proof::default()));
        let shared: Arc<dyn ProofVerifier> = Arc::new(RejectAllVerifier);
        assert!(!shared.verify(ContributionKind::Gradient, &digest(0), &Proof::default()));
    }
}
