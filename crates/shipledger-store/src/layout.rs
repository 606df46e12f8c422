use crate::StoreError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Current ledger format version. Incremented on incompatible layout changes.
pub const LEDGER_FORMAT_VERSION: u32 = 1;
const VERSION_FILE: &str = "version";

/// Directory layout for a shipledger store.
///
/// Manages paths for shipment records, allocator counters, the write-ahead
/// log, and the format version marker. Directories are created on
/// [`initialize`](Self::initialize).
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct LedgerVersion {
    format_version: u32,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn ledger_dir(&self) -> PathBuf {
        self.root.join("ledger")
    }

    #[inline]
    pub fn shipments_dir(&self) -> PathBuf {
        self.ledger_dir().join("shipments")
    }

    #[inline]
    pub fn shipment_path(&self, id: u64) -> PathBuf {
        self.shipments_dir().join(format!("{id}.json"))
    }

    #[inline]
    pub fn counters_file(&self) -> PathBuf {
        self.ledger_dir().join("counters.json")
    }

    #[inline]
    pub fn wal_dir(&self) -> PathBuf {
        self.ledger_dir().join("wal")
    }

    #[inline]
    pub fn lock_file(&self) -> PathBuf {
        self.ledger_dir().join(".lock")
    }

    pub fn initialize(&self) -> Result<(), StoreError> {
        fs::create_dir_all(self.shipments_dir())?;
        fs::create_dir_all(self.wal_dir())?;

        let version_path = self.ledger_dir().join(VERSION_FILE);
        if version_path.exists() {
            self.verify_version()?;
        } else {
            let ver = LedgerVersion {
                format_version: LEDGER_FORMAT_VERSION,
            };
            let content = serde_json::to_string_pretty(&ver)?;
            crate::write_atomic(&self.ledger_dir(), &version_path, content.as_bytes())?;
        }

        Ok(())
    }

    pub fn verify_version(&self) -> Result<(), StoreError> {
        let version_path = self.ledger_dir().join(VERSION_FILE);
        let content = fs::read_to_string(&version_path)?;
        let ver: LedgerVersion = serde_json::from_str(&content)?;

        if ver.format_version != LEDGER_FORMAT_VERSION {
            return Err(StoreError::VersionMismatch {
                expected: LEDGER_FORMAT_VERSION,
                found: ver.format_version,
            });
        }
        Ok(())
    }
}
