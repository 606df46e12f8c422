use fs2::FileExt;
use shipledger_store::{StoreError, StoreLayout};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Exclusive advisory lock on a ledger's `.lock` file, released on drop.
///
/// The [`Ledger`](crate::Ledger) holds one for its whole lifetime so only a
/// single process ever writes a given store.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
    path: PathBuf,
}

impl StoreLock {
    /// Take the lock for `layout`, failing at once if another holder has it.
    pub fn try_acquire(layout: &StoreLayout) -> Result<Self, StoreError> {
        let path = layout.lock_file();
        let file = open_lock_file(&path)?;

        if file.try_lock_exclusive().is_err() {
            return Err(StoreError::LockFailed(format!(
                "ledger at {} is held by another process",
                layout.root().display()
            )));
        }
        debug!("acquired store lock {}", path.display());
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn open_lock_file(path: &Path) -> Result<File, StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(path)?)
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        debug!("released store lock {}", self.path.display());
    }
}

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Route Ctrl-C into [`shutdown_requested`]. A second Ctrl-C exits immediately.
pub fn install_signal_handler() {
    let _ = ctrlc::set_handler(|| {
        if SHUTDOWN_REQUESTED.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
        eprintln!("\nshutdown requested, finishing in-flight request...");
    });
}

pub fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquiring_creates_the_lock_file() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path().join("nested"));

        let lock = StoreLock::try_acquire(&layout).unwrap();
        assert!(lock.path().exists());
        assert_eq!(lock.path(), layout.lock_file());
    }

    #[test]
    fn second_holder_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());

        let _held = StoreLock::try_acquire(&layout).unwrap();
        let err = StoreLock::try_acquire(&layout).unwrap_err();
        assert!(matches!(err, StoreError::LockFailed(_)));
        assert!(err.to_string().contains("held by another process"));
    }

    #[test]
    fn dropping_releases_the_lock() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());

        drop(StoreLock::try_acquire(&layout).unwrap());
        assert!(StoreLock::try_acquire(&layout).is_ok());
    }
}
