//! Clients for an external proof-verification service.
//!
//! This module provides a remote implementation of the
//! [`crate::verification::ProofVerifier`] trait for deployments that run
//! the actual proof system in a sidecar process and talk to it over HTTP.

pub mod http;

pub use http::{HttpProofVerifier, VerifierClientError};
