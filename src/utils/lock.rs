use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{BackupError, Result};

pub const LOCK_FILE: &str = ".sqlbackup.lock";

/// Exclusive advisory lock on a backup directory.
///
/// The lock lives on the open handle, so the OS releases it when the process
/// exits. A lock file left behind by a dead process does not block anyone.
#[derive(Debug)]
pub struct DirectoryLock {
    file: File,
    path: PathBuf,
}

impl DirectoryLock {
    pub fn acquire(directory: &Path) -> Result<Self> {
        fs::create_dir_all(directory)?;
        let path = directory.join(LOCK_FILE);
        // Truncating before the lock is held would wipe the holder's PID.
        let mut file = OpenOptions::new().write(true).create(true).truncate(false).open(&path)?;

        if let Err(e) = file.try_lock_exclusive() {
            return Err(if is_contended(&e) {
                BackupError::DirectoryLocked(directory.to_path_buf())
            } else {
                e.into()
            });
        }

        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        tracing::debug!(path = %path.display(), "acquired directory lock");
        Ok(Self { file, path })
    }
}

fn is_contended(error: &io::Error) -> bool {
    error.kind() == io::ErrorKind::WouldBlock
        || error.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

impl Drop for DirectoryLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release directory lock");
        }
    }
}
