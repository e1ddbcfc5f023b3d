#![allow(unsafe_code)]

//! Detaching from the controlling terminal.

use std::fs::{File, OpenOptions};
use std::path::Path;

use nix::errno::Errno;
use nix::unistd::{ForkResult, dup2_stderr, dup2_stdin, dup2_stdout, fork, setsid};
use tracing::info;

const NULL_DEVICE: &str = "/dev/null";

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("fork failed: {0}")]
    Fork(#[source] Errno),

    #[error("setsid failed: {0}")]
    Setsid(#[source] Errno),

    #[error("cannot open /dev/null: {0}")]
    NullDevice(#[source] std::io::Error),

    #[error("cannot redirect standard streams: {0}")]
    Redirect(#[source] Errno),

    #[error("cannot change directory to /: {0}")]
    Chdir(#[source] std::io::Error),
}

/// Fork into the background.
///
/// The parent exits with status 0 straight away. It must not run destructors:
/// it shares the instance lock's open file description with the child, and
/// unlocking it there would unlock it for the child too. Only the child
/// returns from this function, as a session leader with standard streams on
/// the null device and `/` as its working directory.
///
/// Call before any other thread exists.
pub fn daemonize() -> Result<(), ProcessError> {
    // SAFETY: the daemon is single-threaded at this point, so the child
    // cannot inherit a lock held by some other thread.
    match unsafe { fork() }.map_err(ProcessError::Fork)? {
        ForkResult::Parent { child } => {
            info!(pid = %child, "daemon detached");
            std::process::exit(0);
        }
        ForkResult::Child => {}
    }

    setsid().map_err(ProcessError::Setsid)?;
    redirect_stdio(Path::new(NULL_DEVICE))?;
    std::env::set_current_dir("/").map_err(ProcessError::Chdir)?;
    Ok(())
}

/// Point stdin at `target` for reading and stdout/stderr at it for writing.
fn redirect_stdio(target: &Path) -> Result<(), ProcessError> {
    let (input, output) = open_null(target)?;
    dup2_stdin(&input).map_err(ProcessError::Redirect)?;
    dup2_stdout(&output).map_err(ProcessError::Redirect)?;
    dup2_stderr(&output).map_err(ProcessError::Redirect)?;
    Ok(())
}

fn open_null(target: &Path) -> Result<(File, File), ProcessError> {
    let input = File::open(target).map_err(ProcessError::NullDevice)?;
    let output = OpenOptions::new()
        .write(true)
        .open(target)
        .map_err(ProcessError::NullDevice)?;
    Ok((input, output))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_null() {
        assert!(open_null(Path::new(NULL_DEVICE)).is_ok());
    }

    #[test]
    fn test_open_null_missing() {
        let err = open_null(Path::new("/nonexistent/null")).unwrap_err();
        assert!(matches!(err, ProcessError::NullDevice(_)));
    }
}
