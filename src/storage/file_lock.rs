// src/storage/file_lock.rs
//! Cross-process writer lock and atomic document replacement.
//!
//! Uses `fs2` advisory locks (flock on Unix, LockFileEx on Windows) so that
//! several server processes pointed at the same registry directory still
//! serialize their commits.

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Exclusive lock on the registry's lock file, released on drop.
///
/// The lock file itself is never deleted. Removing it while another process
/// waits on the old inode would let two writers hold "the" lock at once.
#[derive(Debug)]
pub struct WriterLock {
    file: File,
}

impl WriterLock {
    /// Tries to take the lock without blocking.
    ///
    /// # Returns
    /// - `Ok(Some(lock))` when acquired
    /// - `Ok(None)` when another holder has it
    /// - `Err` if the lock file cannot be opened or locking is unsupported
    pub fn try_acquire(path: &Path) -> io::Result<Option<Self>> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(WriterLock { file })),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Replaces `target` with `bytes` so that readers observe either the previous
/// complete file or the new one, never a partial write.
///
/// Writes to a uniquely named sibling, fsyncs it, then renames over the target.
pub fn write_atomic(target: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = target
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "target has no parent"))?;
    let file_name = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "target has no file name"))?;
    let temp_path = dir.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4().simple()));

    let result = (|| {
        let mut file = File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&temp_path, target)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
        return result;
    }

    // Persist the rename itself. Directories cannot be opened this way on Windows.
    #[cfg(unix)]
    {
        if let Ok(dir_handle) = File::open(dir) {
            let _ = dir_handle.sync_all();
        }
    }

    Ok(())
}
