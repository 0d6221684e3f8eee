use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{LockError, UtilError};
use crate::Result;

const LOCK_SUFFIX: &str = ".lock";

/// RAII guard for atomically replacing a file.
///
/// Creates `<path>.lock` with O_CREAT|O_EXCL on construction. New contents
/// are written to the lock file, then [`commit`](LockFile::commit) renames it
/// over the target in one step. Dropping an uncommitted lock removes the
/// lock file, leaving the target untouched.
///
/// This is the write protocol for ref files: the target always holds either
/// its old contents or the complete new contents, never a truncated state.
#[derive(Debug)]
pub struct LockFile {
    target: PathBuf,
    lock_path: PathBuf,
    file: Option<File>,
    committed: bool,
}

impl LockFile {
    /// Acquire a lock on the given target path.
    ///
    /// Fails with [`LockError::AlreadyLocked`] if another writer holds the
    /// lock (the `.lock` file already exists).
    pub fn acquire(target: impl AsRef<Path>) -> Result<Self> {
        let target = target.as_ref().to_path_buf();
        let lock_path = PathBuf::from(format!("{}{}", target.display(), LOCK_SUFFIX));

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
            .map_err(|e| {
                if e.kind() == io::ErrorKind::AlreadyExists {
                    UtilError::Lock(LockError::AlreadyLocked {
                        path: lock_path.clone(),
                    })
                } else {
                    UtilError::Lock(LockError::Create {
                        path: lock_path.clone(),
                        source: e,
                    })
                }
            })?;

        Ok(Self {
            target,
            lock_path,
            file: Some(file),
            committed: false,
        })
    }

    /// The target file path (without the `.lock` suffix).
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Flush, fsync, and atomically rename the lock file over the target.
    pub fn commit(mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush().map_err(|e| self.commit_err(e))?;
            file.sync_all().map_err(|e| self.commit_err(e))?;
        }

        fs::rename(&self.lock_path, &self.target)
            .map_err(|e| self.commit_err(e))?;

        self.committed = true;
        Ok(())
    }

    /// Discard the pending write and remove the lock file.
    pub fn abort(mut self) -> Result<()> {
        self.file.take();
        if self.lock_path.exists() {
            fs::remove_file(&self.lock_path)?;
        }
        self.committed = true;
        Ok(())
    }

    fn commit_err(&self, source: io::Error) -> UtilError {
        UtilError::Lock(LockError::Commit {
            path: self.lock_path.clone(),
            source,
        })
    }
}

impl Write for LockFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("lock file already closed"))?
            .write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("lock file already closed"))?
            .flush()
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if !self.committed {
            self.file.take();
            let _ = fs::remove_file(&self.lock_path);
        }
    }
}
