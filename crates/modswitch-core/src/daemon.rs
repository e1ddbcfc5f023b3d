//! Daemon lifecycle: acquire resources, poll the switch, release in reverse.
//!
//! ```text
//! STARTING → LOCKED → (DAEMONIZED) → RUNNING → SHUTTING_DOWN → TERMINATED
//! ```
//!
//! The first three phases belong to the `modswitchd` binary (configuration,
//! [`InstanceLock::acquire`], [`process::daemonize`](crate::process::daemonize)).
//! A [`Daemon`] exists from RUNNING on and owns every resource, so dropping
//! it on any path releases them.

use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use modswitch_config::Settings;
use tracing::{debug, error, info};

use crate::encode::encode;
use crate::gpio::{GpioError, LineHandle, LineSource};
use crate::lock::{DEFAULT_LOCK_PATH, InstanceLock, LockError};
use crate::process::ProcessError;
use crate::shm::{DEFAULT_SEGMENT_NAME, SharedState, ShmError};
use crate::signals::ShutdownFlag;

/// Longest stretch the poll loop sleeps without looking at the shutdown flag.
const SHUTDOWN_CHECK_INTERVAL: Duration = Duration::from_millis(50);

/// Filesystem and namespace locations used at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    pub lock_file: PathBuf,
    pub segment: String,
}

impl Default for RuntimePaths {
    fn default() -> Self {
        Self {
            lock_file: PathBuf::from(DEFAULT_LOCK_PATH),
            segment: DEFAULT_SEGMENT_NAME.to_string(),
        }
    }
}

/// Lifecycle phase, logged at each transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Starting,
    Locked,
    Daemonized,
    Running,
    ShuttingDown,
    Terminated,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Starting => "starting",
            Self::Locked => "locked",
            Self::Daemonized => "daemonized",
            Self::Running => "running",
            Self::ShuttingDown => "shutting-down",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Errors from the daemon runtime.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("daemonize failed: {0}")]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Gpio(#[from] GpioError),

    #[error(transparent)]
    Shm(#[from] ShmError),

    #[error("cannot install signal handlers: {0}")]
    Signals(#[source] std::io::Error),
}

/// The running daemon and everything it holds.
pub struct Daemon<L: LineSource = LineHandle> {
    settings: Settings,
    phase: Phase,
    last_published: Option<u8>,
    // Declaration order is drop order: reverse of acquisition.
    lines: L,
    state: SharedState,
    lock: InstanceLock,
}

impl Daemon<LineHandle> {
    /// Record the pid, claim the GPIO lines and open the shared segment.
    pub fn start(
        settings: Settings,
        paths: &RuntimePaths,
        lock: InstanceLock,
    ) -> Result<Self, DaemonError> {
        Self::start_with(settings, paths, lock, |s| {
            LineHandle::acquire(&s.chip, [s.sw0_pin, s.sw1_pin], s.pull_mode)
        })
    }
}

impl<L: LineSource> Daemon<L> {
    /// [`Daemon::start`] with a caller-supplied line source.
    ///
    /// Whatever was acquired before a failing step is released on return.
    pub fn start_with<F>(
        settings: Settings,
        paths: &RuntimePaths,
        mut lock: InstanceLock,
        acquire_lines: F,
    ) -> Result<Self, DaemonError>
    where
        F: FnOnce(&Settings) -> Result<L, GpioError>,
    {
        lock.write_pid()?;
        let lines = acquire_lines(&settings)?;
        let state = SharedState::open(&paths.segment)?;

        info!(
            lock = %lock.path().display(),
            segment = %state.name(),
            delay_us = settings.poll_delay.as_micros() as u64,
            "daemon running"
        );

        Ok(Self {
            settings,
            phase: Phase::Running,
            last_published: None,
            lines,
            state,
            lock,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The byte written by the most recent successful poll.
    pub fn last_published(&self) -> Option<u8> {
        self.last_published
    }

    /// One cycle: sample both lines, encode, publish. Returns the published byte.
    pub fn poll_once(&mut self) -> Result<u8, DaemonError> {
        let (sw0, sw1) = self.lines.read_pair()?;
        let byte = encode(sw0, sw1, self.settings.pull_mode);
        self.state.publish(byte)?;

        if self.last_published != Some(byte) {
            info!(state = %char::from(byte), sw0, sw1, "switch state");
            self.last_published = Some(byte);
        }
        Ok(byte)
    }

    /// Poll until `shutdown` is raised or a cycle fails, then release
    /// everything. A failed read or publish is returned, never retried.
    pub fn run(&mut self, shutdown: &ShutdownFlag) -> Result<(), DaemonError> {
        let result = loop {
            if shutdown.is_raised() {
                info!("shutdown requested");
                break Ok(());
            }
            if let Err(err) = self.poll_once() {
                error!(error = %err, "poll failed, shutting down");
                break Err(err);
            }
            self.pause(shutdown);
        };
        self.shutdown();
        result
    }

    /// Sleep for the poll delay, waking early once `shutdown` is raised.
    fn pause(&self, shutdown: &ShutdownFlag) {
        let deadline = Instant::now() + self.settings.poll_delay;
        loop {
            let now = Instant::now();
            if now >= deadline || shutdown.is_raised() {
                return;
            }
            std::thread::sleep((deadline - now).min(SHUTDOWN_CHECK_INTERVAL));
        }
    }

    /// Release the lines, remove the segment and drop the instance lock.
    /// Runs at most once.
    pub fn shutdown(&mut self) {
        if matches!(self.phase, Phase::ShuttingDown | Phase::Terminated) {
            return;
        }
        self.set_phase(Phase::ShuttingDown);
        self.lines.release();
        self.state.close();
        self.lock.release();
        self.set_phase(Phase::Terminated);
    }

    fn set_phase(&mut self, phase: Phase) {
        debug!(from = %self.phase, to = %phase, "phase transition");
        self.phase = phase;
    }
}

impl<L: LineSource> Drop for Daemon<L> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
