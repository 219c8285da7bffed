//! RocksDB-backed contribution ledger.
//!
//! Slot states are persisted in a dedicated column family so that replay
//! protection survives restarts:
//!
//! - `"contributions"`: maps `ContributionKey::to_bytes()` (41 bytes) to
//!   a one-byte slot status (`1` = pending, `2` = accepted).
//!
//! Released slots are deleted. Reads and writes are not wrapped in a
//! RocksDB transaction: the engine serializes every ledger call under its
//! own lock.
//!
//! A pending slot only means something while its submission is in
//! flight. `open` therefore deletes every pending entry it finds, so a
//! crash during verification does not leave the slot reserved forever.

use std::{path::Path, sync::Arc};

use rocksdb::{BoundColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::coordination::error::LedgerError;
use crate::coordination::ledger::{ContributionLedger, SlotStatus};
use crate::types::ContributionKey;

const CF_CONTRIBUTIONS: &str = "contributions";

const STATUS_PENDING: u8 = 1;
const STATUS_ACCEPTED: u8 = 2;

/// Configuration for [`RocksDbContributionLedger`].
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RocksDbConfig {
    /// Filesystem path to the RocksDB database directory.
    pub path: String,
    /// Whether to create the database and missing column families if they
    /// do not yet exist.
    pub create_if_missing: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: "data/fedchain-db".to_string(),
            create_if_missing: true,
        }
    }
}

/// Storage-level error type.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Underlying RocksDB error.
    #[error("rocksdb: {0}")]
    RocksDb(#[from] rocksdb::Error),
    /// Required column family was not found.
    #[error("missing column family {0}")]
    MissingColumnFamily(&'static str),
}

impl From<StorageError> for LedgerError {
    fn from(e: StorageError) -> Self {
        LedgerError::Storage(e.to_string())
    }
}

/// RocksDB-backed implementation of [`ContributionLedger`].
///
/// Slot state outlives the process. Rounds and the model lineage do not
/// (they live in the engine), so this backend needs a caller that
/// restores them too; the bundled binaries run on the in-memory ledger.
pub struct RocksDbContributionLedger {
    db: DB,
}

impl RocksDbContributionLedger {
    /// Opens (or creates) a ledger at the configured path.
    pub fn open(cfg: &RocksDbConfig) -> Result<Self, StorageError> {
        let path = Path::new(&cfg.path);

        let mut opts = Options::default();
        opts.create_if_missing(cfg.create_if_missing);
        opts.create_missing_column_families(cfg.create_if_missing);

        let cfs = vec![
            ColumnFamilyDescriptor::new("default", Options::default()),
            ColumnFamilyDescriptor::new(CF_CONTRIBUTIONS, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        let ledger = Self { db };
        let cleared = ledger.clear_pending()?;
        if cleared > 0 {
            warn!(cleared, path = %cfg.path, "released slots left pending by an interrupted run");
        }
        Ok(ledger)
    }

    /// Deletes every pending slot; returns how many were found.
    fn clear_pending(&self) -> Result<usize, StorageError> {
        let cf = self.cf()?;
        let mut batch = WriteBatch::default();
        let mut cleared = 0;
        for entry in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (key, status) = entry?;
            if status.as_ref() != [STATUS_PENDING].as_slice() {
                continue;
            }
            match ContributionKey::from_bytes(&key) {
                Some(slot) => debug!(slot = %slot, "releasing stale pending slot"),
                None => warn!(key = %hex::encode(&key), "releasing undecodable pending slot"),
            }
            batch.delete_cf(&cf, &key);
            cleared += 1;
        }
        if cleared > 0 {
            self.db.write(batch)?;
        }
        Ok(cleared)
    }

    fn cf(&self) -> Result<Arc<BoundColumnFamily<'_>>, StorageError> {
        self.db
            .cf_handle(CF_CONTRIBUTIONS)
            .ok_or(StorageError::MissingColumnFamily(CF_CONTRIBUTIONS))
    }

    fn load(&self, key: &ContributionKey) -> Result<SlotStatus, LedgerError> {
        let cf = self.cf()?;
        let raw = self
            .db
            .get_cf(&cf, key.to_bytes())
            .map_err(StorageError::from)?;
        match raw.as_deref() {
            None => Ok(SlotStatus::Unseen),
            Some([STATUS_PENDING]) => Ok(SlotStatus::Pending),
            Some([STATUS_ACCEPTED]) => Ok(SlotStatus::Accepted),
            Some(_) => Err(LedgerError::Corrupted("unknown slot status byte")),
        }
    }

    fn store(&self, key: &ContributionKey, status: u8) -> Result<(), LedgerError> {
        let cf = self.cf()?;
        self.db
            .put_cf(&cf, key.to_bytes(), [status])
            .map_err(StorageError::from)?;
        Ok(())
    }
}

impl ContributionLedger for RocksDbContributionLedger {
    fn try_reserve(&mut self, key: &ContributionKey) -> Result<bool, LedgerError> {
        if self.load(key)? != SlotStatus::Unseen {
            return Ok(false);
        }
        self.store(key, STATUS_PENDING)?;
        Ok(true)
    }

    fn release(&mut self, key: &ContributionKey) -> Result<(), LedgerError> {
        if self.load(key)? != SlotStatus::Pending {
            return Err(LedgerError::NotPending(*key));
        }
        let cf = self.cf()?;
        self.db
            .delete_cf(&cf, key.to_bytes())
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn mark_accepted(&mut self, key: &ContributionKey) -> Result<(), LedgerError> {
        if self.load(key)? != SlotStatus::Pending {
            return Err(LedgerError::NotPending(*key));
        }
        self.store(key, STATUS_ACCEPTED)
    }

    fn status(&self, key: &ContributionKey) -> Result<SlotStatus, LedgerError> {
        self.load(key)
    }
}
