use crate::layout::StoreLayout;
use crate::types::ShipmentId;
use crate::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// How to undo one durable write. Paths are relative to the ledger directory
/// so a store that was moved between crash and recovery still rolls back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum RollbackStep {
    /// The write created this file.
    RemoveFile { path: PathBuf },
    /// The write replaced this file; `contents` is what it held before.
    RestoreFile { path: PathBuf, contents: String },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WalOpKind {
    Create,
    Transfer,
}

impl WalOpKind {
    pub fn as_str(self) -> &'static str {
        match self {
            WalOpKind::Create => "create",
            WalOpKind::Transfer => "transfer",
        }
    }
}

impl fmt::Display for WalOpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One in-flight ledger mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalEntry {
    pub op_id: String,
    pub kind: WalOpKind,
    pub shipment_id: ShipmentId,
    pub started_at: String,
    pub steps: Vec<RollbackStep>,
}

/// Write-ahead log making ledger mutations all-or-nothing.
///
/// A mutation opens an entry with [`begin`](Self::begin), calls
/// [`guard_file`](Self::guard_file) ahead of every durable write, and
/// [`commit`](Self::commit)s once all writes landed. A failed mutation is
/// [`rollback`](Self::rollback)ed on the spot; entries a crash left behind
/// are undone by [`recover`](Self::recover) the next time the ledger opens.
pub struct WriteAheadLog {
    ledger_dir: PathBuf,
    wal_dir: PathBuf,
}

impl WriteAheadLog {
    pub fn new(layout: &StoreLayout) -> Self {
        Self {
            ledger_dir: layout.ledger_dir(),
            wal_dir: layout.wal_dir(),
        }
    }

    pub fn initialize(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.wal_dir)?;
        Ok(())
    }

    /// Open an entry for `kind` on `shipment_id`. Returns its op id.
    pub fn begin(&self, kind: WalOpKind, shipment_id: ShipmentId) -> Result<String, StoreError> {
        let now = chrono::Utc::now();
        // Lexical order of op ids is start order.
        let op_id = format!("{}-{kind}-{shipment_id}", now.format("%Y%m%dT%H%M%S%9f"));
        let entry = WalEntry {
            op_id: op_id.clone(),
            kind,
            shipment_id,
            started_at: now.to_rfc3339(),
            steps: Vec::new(),
        };
        self.write_entry(&entry)?;
        debug!("wal: begin {op_id}");
        Ok(op_id)
    }

    /// Snapshot `path` into the entry before it is written: its current
    /// contents if it exists, otherwise a note to delete it on rollback.
    pub fn guard_file(&self, op_id: &str, path: &Path) -> Result<(), StoreError> {
        let rel = path
            .strip_prefix(&self.ledger_dir)
            .unwrap_or(path)
            .to_path_buf();
        let step = if path.exists() {
            RollbackStep::RestoreFile {
                path: rel,
                contents: fs::read_to_string(path)?,
            }
        } else {
            RollbackStep::RemoveFile { path: rel }
        };

        let mut entry = self.read_entry(op_id)?;
        entry.steps.push(step);
        self.write_entry(&entry)
    }

    pub fn commit(&self, op_id: &str) -> Result<(), StoreError> {
        let path = self.entry_path(op_id);
        if path.exists() {
            fs::remove_file(&path)?;
            crate::fsync_dir(&self.wal_dir)?;
            debug!("wal: commit {op_id}");
        }
        Ok(())
    }

    /// Undo one in-flight mutation and drop its entry.
    pub fn rollback(&self, op_id: &str) -> Result<(), StoreError> {
        if !self.entry_path(op_id).exists() {
            return Ok(());
        }
        let entry = self.read_entry(op_id)?;
        warn!(
            "wal: rolling back {} of shipment {} ({op_id})",
            entry.kind, entry.shipment_id
        );
        self.undo(&entry);
        self.discard(op_id)
    }

    /// Entries still on disk, oldest first. Unreadable entries are deleted.
    pub fn pending(&self) -> Result<Vec<WalEntry>, StoreError> {
        if !self.wal_dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for dir_entry in fs::read_dir(&self.wal_dir)? {
            let path = dir_entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match load_entry(&path) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!("wal: discarding unreadable entry {}: {e}", path.display());
                    let _ = fs::remove_file(&path);
                }
            }
        }
        entries.sort_by(|a, b| a.op_id.cmp(&b.op_id));
        Ok(entries)
    }

    /// Undo every pending entry, newest first. Returns how many were undone.
    pub fn recover(&self) -> Result<usize, StoreError> {
        let entries = self.pending()?;
        for entry in entries.iter().rev() {
            info!(
                "wal: recovering interrupted {} of shipment {} ({})",
                entry.kind, entry.shipment_id, entry.op_id
            );
            self.undo(entry);
            self.discard(&entry.op_id)?;
        }
        Ok(entries.len())
    }

    fn undo(&self, entry: &WalEntry) {
        for step in entry.steps.iter().rev() {
            let result = match step {
                RollbackStep::RemoveFile { path } => {
                    let path = self.ledger_dir.join(path);
                    if path.exists() {
                        fs::remove_file(&path).map_err(StoreError::from)
                    } else {
                        Ok(())
                    }
                }
                RollbackStep::RestoreFile { path, contents } => {
                    let path = self.ledger_dir.join(path);
                    match path.parent() {
                        Some(dir) => crate::write_atomic(dir, &path, contents.as_bytes()),
                        None => Ok(()),
                    }
                }
            };
            match result {
                Ok(()) => debug!("wal: undid {step:?}"),
                Err(e) => warn!("wal: failed to undo {step:?}: {e}"),
            }
        }
    }

    fn discard(&self, op_id: &str) -> Result<(), StoreError> {
        let path = self.entry_path(op_id);
        if path.exists() {
            fs::remove_file(&path)?;
            crate::fsync_dir(&self.wal_dir)?;
        }
        Ok(())
    }

    fn entry_path(&self, op_id: &str) -> PathBuf {
        self.wal_dir.join(format!("{op_id}.json"))
    }

    fn write_entry(&self, entry: &WalEntry) -> Result<(), StoreError> {
        let content = serde_json::to_vec_pretty(entry)?;
        crate::write_atomic(&self.wal_dir, &self.entry_path(&entry.op_id), &content)
    }

    fn read_entry(&self, op_id: &str) -> Result<WalEntry, StoreError> {
        let path = self.entry_path(op_id);
        if !path.exists() {
            return Err(StoreError::Wal(format!("no in-flight entry '{op_id}'")));
        }
        load_entry(&path)
    }
}

fn load_entry(path: &Path) -> Result<WalEntry, StoreError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
