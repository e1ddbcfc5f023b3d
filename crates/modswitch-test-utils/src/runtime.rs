//! Runtime locations for daemon tests.
//!
//! Helpers for pointing a daemon at a temporary lock file and a private
//! shared memory segment instead of the system-wide defaults.

use std::path::PathBuf;
use std::time::Duration;

use modswitch_core::RuntimePaths;
use tempfile::TempDir;

use crate::shm::unique_segment_name;

/// A poll delay short enough to keep loop tests fast.
pub const FAST_POLL_US: u64 = 200;

/// How long tests wait for the daemon loop to reach an expected state.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Test-scoped runtime paths with an owned temp directory.
///
/// The temp directory (and the lock file in it) is deleted when this value is
/// dropped, guaranteeing cleanup even on panic.
pub struct TestRuntime {
    pub paths: RuntimePaths,
    temp_dir: TempDir,
}

impl TestRuntime {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let paths = RuntimePaths {
            lock_file: temp_dir.path().join("modswitch.lock"),
            segment: unique_segment_name(),
        };
        Self {
            paths,
            temp_dir,
        }
    }

    /// Write `contents` as a config file in the temp directory.
    pub fn write_config(&self, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join("modswitch.conf");
        std::fs::write(&path, contents).expect("failed to write test config");
        path
    }
}

impl Default for TestRuntime {
    fn default() -> Self {
        Self::new()
    }
}
