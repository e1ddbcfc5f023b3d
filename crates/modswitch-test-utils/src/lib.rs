#![deny(unsafe_code)]

//! Shared test utilities for the modswitch workspace.
//!
//! Provides config builders, a scriptable stand-in for the GPIO lines,
//! collision-free shared memory names and tracing helpers so that tests in
//! every crate run without hardware or root.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! modswitch-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod lines;
pub mod runtime;
pub mod shm;
pub mod tracing_setup;

use std::time::{Duration, Instant};

/// Poll `condition` every millisecond until it holds or `timeout` passes.
///
/// Returns whether the condition was observed.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
}
