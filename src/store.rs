//! Store Module
//!
//! Thin owner of the WAL and value managers for the surrounding database.
//!
//! ## Responsibilities
//! - Validate configuration and open both managers
//! - Commit transactions to the WAL
//! - Write a committed transaction's values into a value file
//! - Sync everything on close
//!
//! Memtables, heap files, compaction and replay sit above this type.

use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::value::{ValueManager, ValuePointer};
use crate::wal::{AppendResult, Change, Transaction, WalManager};

/// The storage core: WAL plus value files
#[derive(Debug)]
pub struct Store {
    config: Config,

    wal: WalManager,

    values: ValueManager,
}

impl Store {
    /// Open or create a store with the given config
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let wal = WalManager::open(&config)?;
        let values = ValueManager::open(&config.value_dir)?;

        info!(
            wal_dir = %config.wal_dir.display(),
            value_dir = %config.value_dir.display(),
            "Store opened"
        );

        Ok(Self { config, wal, values })
    }

    /// Durably log a transaction
    pub fn commit(&self, txn: &Transaction) -> Result<AppendResult> {
        self.wal.append(txn)
    }

    /// Write the value of every Set change into value file `file_id`.
    ///
    /// Pointers come back in change order, one per Set; deletes are skipped.
    pub fn write_values(&self, file_id: u64, txn: &Transaction) -> Result<Vec<ValuePointer>> {
        let file = self.values.file(file_id)?;

        txn.changes
            .iter()
            .filter_map(|change| match change {
                Change::Set { value, .. } => Some(value),
                Change::Delete { .. } => None,
            })
            .map(|value| -> Result<ValuePointer> {
                let offset = file.write(value)?;
                Ok(ValuePointer {
                    file_id,
                    offset,
                    size: value.len(),
                })
            })
            .collect()
    }

    pub fn read_value(&self, pointer: &ValuePointer) -> Result<Vec<u8>> {
        self.values.read(pointer)
    }

    /// Sync the active WAL segment and every open value file
    pub fn sync(&self) -> Result<()> {
        self.wal.sync()?;
        self.values.sync_all()
    }

    /// Sync and release everything
    pub fn close(self) -> Result<()> {
        self.sync()?;
        info!("Store closed");
        Ok(())
    }

    pub fn wal(&self) -> &WalManager {
        &self.wal
    }

    pub fn values(&self) -> &ValueManager {
        &self.values
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
