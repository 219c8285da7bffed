//! Proof verification for submitted contributions.
//!
//! This module defines the [`ProofVerifier`] predicate the coordination
//! engine uses as a hard gate, the [`VerificationKeySet`] it is configured
//! with, and a local keyed-hash verifier. A remote verifier lives in
//! [`crate::verifier_client`].

pub mod proof;

pub use proof::{
    AcceptAllVerifier, KeyedHashVerifier, ProofVerifier, RejectAllVerifier, VerificationKeySet,
};
