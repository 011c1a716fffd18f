//! Cross-process exclusive file lock released on drop

use fs2::FileExt;
use pdict_core::{Error, Result};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// Exclusive advisory lock on a lock file.
///
/// Acquisition blocks until the lock is free. The lock is not reentrant: a
/// second `acquire` on the same path from the same process blocks as well.
#[derive(Debug)]
pub struct FileLockGuard {
    lock_file: File,
    lock_path: PathBuf,
}

impl FileLockGuard {
    /// Open (creating if needed) the lock file and block until it is held
    pub fn acquire(lock_path: &Path) -> Result<Self> {
        if let Some(parent) = lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| Error::file_system(parent, "create lock directory", e))?;
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)
            .map_err(|e| Error::file_system(lock_path, "open lock file", e))?;

        lock_file
            .lock_exclusive()
            .map_err(|e| Error::file_system(lock_path, "lock", e))?;

        Ok(Self {
            lock_file,
            lock_path: lock_path.to_path_buf(),
        })
    }

    /// Non-blocking variant; `Ok(None)` when another holder has the lock
    pub fn try_acquire(lock_path: &Path) -> Result<Option<Self>> {
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)
            .map_err(|e| Error::file_system(lock_path, "open lock file", e))?;

        match lock_file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self {
                lock_file,
                lock_path: lock_path.to_path_buf(),
            })),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => Err(Error::file_system(lock_path, "lock", e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        // The lock file itself stays; other processes may be waiting on it
        let _ = FileExt::unlock(&self.lock_file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_lock_is_released_on_drop() {
        let temp_dir = TempDir::new().unwrap();
        let lock_path = temp_dir.path().join("test.lock");

        let guard = FileLockGuard::acquire(&lock_path).unwrap();
        assert!(FileLockGuard::try_acquire(&lock_path).unwrap().is_none());
        drop(guard);

        assert!(FileLockGuard::try_acquire(&lock_path).unwrap().is_some());
        assert!(lock_path.exists());
    }

    #[test]
    fn test_acquire_blocks_until_released() {
        let temp_dir = TempDir::new().unwrap();
        let lock_path = temp_dir.path().join("test.lock");

        let guard = FileLockGuard::acquire(&lock_path).unwrap();
        let (tx, rx) = mpsc::channel();
        let path = lock_path.clone();
        let waiter = thread::spawn(move || {
            let _guard = FileLockGuard::acquire(&path).unwrap();
            tx.send(()).unwrap();
        });

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        drop(guard);
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
        waiter.join().unwrap();
    }

    #[test]
    fn test_released_when_scope_unwinds() {
        let temp_dir = TempDir::new().unwrap();
        let lock_path = temp_dir.path().join("test.lock");

        let path = lock_path.clone();
        let result = thread::spawn(move || {
            let _guard = FileLockGuard::acquire(&path).unwrap();
            panic!("boom");
        })
        .join();
        assert!(result.is_err());

        assert!(FileLockGuard::try_acquire(&lock_path).unwrap().is_some());
    }
}
