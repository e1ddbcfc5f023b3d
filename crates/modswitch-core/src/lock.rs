//! Single-instance guard: an exclusive `flock` on a well-known file.
//!
//! The lock file also carries the holder's pid for operators. The lock lives
//! on the open file description, so it survives `fork` and is dropped by the
//! kernel if the daemon dies without cleaning up.

use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use tracing::{debug, warn};

/// Default lock file location.
pub const DEFAULT_LOCK_PATH: &str = "/var/run/modswitch.lock";

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("another instance is already running (lock file {})", path.display())]
    AlreadyRunning {
        path: PathBuf,
        /// Pid recorded by the current holder, when readable.
        holder: Option<u32>,
    },

    #[error("cannot open lock file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot lock {}: {source}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: Errno,
    },

    #[error("cannot write pid to {}: {source}", path.display())]
    WritePid {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// An exclusively held instance lock.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    file: Option<Flock<File>>,
}

impl InstanceLock {
    /// Open (creating if needed) and lock `path` without blocking.
    pub fn acquire(path: &Path) -> Result<Self, LockError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .mode(0o644)
            .open(path)
            .map_err(|source| LockError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(file) => {
                debug!(path = %path.display(), "instance lock acquired");
                Ok(Self {
                    path: path.to_path_buf(),
                    file: Some(file),
                })
            }
            Err((_, errno)) if errno == Errno::EWOULDBLOCK => Err(LockError::AlreadyRunning {
                path: path.to_path_buf(),
                holder: read_pid(path).ok().flatten(),
            }),
            Err((_, source)) => Err(LockError::Lock {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Replace the file contents with the current pid and a newline.
    pub fn write_pid(&mut self) -> Result<(), LockError> {
        let path = self.path.clone();
        let wrap = |source| LockError::WritePid {
            path: path.clone(),
            source,
        };
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| wrap(io::Error::from(io::ErrorKind::NotConnected)))?;

        file.set_len(0).map_err(wrap)?;
        file.seek(SeekFrom::Start(0)).map_err(wrap)?;
        writeln!(file, "{}", std::process::id()).map_err(wrap)?;
        file.flush().map_err(wrap)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Unlock and close the file. The file itself is left in place.
    pub fn release(&mut self) {
        let Some(file) = self.file.take() else {
            return;
        };
        match file.unlock() {
            Ok(_file) => debug!(path = %self.path.display(), "instance lock released"),
            // Closing the descriptor drops the lock anyway.
            Err((_file, err)) => warn!(path = %self.path.display(), error = %err, "unlock failed"),
        }
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        self.release();
    }
}

/// Read the pid recorded in a lock file, if it holds one.
pub fn read_pid(path: &Path) -> io::Result<Option<u32>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content.trim().parse().ok())
}
