//! Durable storage for the shipledger custody ledger.
//!
//! This crate provides the storage layer: the `Shipment`/`Transfer` data model,
//! `ShipmentStore` for one checksummed record per shipment, `CounterStore` for
//! the two identifier sequences, `WriteAheadLog` for all-or-nothing mutations,
//! `StoreLayout` for directory structure management, and an integrity walk.

pub mod counters;
pub mod integrity;
pub mod layout;
pub mod records;
pub mod shipment;
pub mod types;
pub mod wal;

pub use counters::{CounterStore, Counters};
pub use integrity::{verify_store_integrity, IntegrityFailure, IntegrityReport};
pub use layout::{StoreLayout, LEDGER_FORMAT_VERSION};
pub use records::ShipmentStore;
pub use shipment::{Shipment, ShipmentState, Transfer};
pub use types::{Identity, ShipmentId, TransferId};
pub use wal::{RollbackStep, WalEntry, WalOpKind, WriteAheadLog};

use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use thiserror::Error;

/// Fsync a directory to ensure that a preceding `rename()` is durable.
///
/// POSIX does not guarantee a rename survives a crash until the parent
/// directory itself has been synced.
pub(crate) fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

/// Replace `dest` with `content` atomically: temp file in `dir`, fsync, rename, fsync dir.
pub(crate) fn write_atomic(dir: &Path, dest: &Path, content: &[u8]) -> Result<(), StoreError> {
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| StoreError::Io(e.error))?;
    fsync_dir(dir)?;
    Ok(())
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("integrity check failed for record '{record}': expected {expected}, got {actual}")]
    IntegrityFailure {
        record: String,
        expected: String,
        actual: String,
    },
    #[error("shipment record not found: {0}")]
    ShipmentNotFound(String),
    #[error("lock acquisition failed: {0}")]
    LockFailed(String),
    #[error("ledger format version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("write-ahead log error: {0}")]
    Wal(String),
}
