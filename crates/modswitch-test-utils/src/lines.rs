//! A scriptable [`LineSource`] for driving the daemon without hardware.

use std::sync::{Arc, Mutex, MutexGuard};

use modswitch_core::{GpioError, LineSource};
use nix::errno::Errno;

#[derive(Debug, Default)]
struct FakeState {
    levels: (bool, bool),
    fail_after: Option<usize>,
    reads: usize,
    releases: usize,
}

/// Two fake input lines.
///
/// Clones share state: hand one clone to the daemon and keep another to flip
/// levels, inject failures and check that the lines were released.
#[derive(Debug, Clone, Default)]
pub struct FakeLines {
    state: Arc<Mutex<FakeState>>,
}

impl FakeLines {
    /// Lines reading `sw0` and `sw1` as raw levels.
    pub fn new(sw0: bool, sw1: bool) -> Self {
        let lines = Self::default();
        lines.set(sw0, sw1);
        lines
    }

    /// Change the raw levels returned by subsequent reads.
    pub fn set(&self, sw0: bool, sw1: bool) {
        self.lock().levels = (sw0, sw1);
    }

    /// Make every read after the first `reads` successful ones fail with `EIO`.
    pub fn fail_after(self, reads: usize) -> Self {
        self.lock().fail_after = Some(reads);
        self
    }

    /// Successful reads so far.
    pub fn reads(&self) -> usize {
        self.lock().reads
    }

    pub fn is_released(&self) -> bool {
        self.lock().releases > 0
    }

    /// How many times `release` actually released (0 or 1).
    pub fn release_count(&self) -> usize {
        self.lock().releases
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LineSource for FakeLines {
    fn read_pair(&mut self) -> Result<(bool, bool), GpioError> {
        let mut state = self.lock();
        if state.releases > 0 {
            return Err(GpioError::ReadFailed(Errno::EBADF));
        }
        if state.fail_after.is_some_and(|limit| state.reads >= limit) {
            return Err(GpioError::ReadFailed(Errno::EIO));
        }
        state.reads += 1;
        Ok(state.levels)
    }

    fn release(&mut self) {
        let mut state = self.lock();
        if state.releases == 0 {
            state.releases = 1;
        }
    }
}
