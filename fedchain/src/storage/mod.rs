//! Contribution ledger backends.
//!
//! This module provides concrete implementations of the
//! [`crate::coordination::ledger::ContributionLedger`] trait:
//!
//! - an in-memory ledger ([`mem::InMemoryContributionLedger`]) suitable for
//!   the bundled simulator and gateway, and for tests,
//! - a RocksDB-backed ledger ([`rocksdb::RocksDbContributionLedger`]) for
//!   nodes whose replay protection must survive restarts.

pub mod mem;
pub mod rocksdb;

pub use mem::InMemoryContributionLedger;
pub use rocksdb::{RocksDbConfig, RocksDbContributionLedger, StorageError};
