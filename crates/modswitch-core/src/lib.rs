#![deny(unsafe_code)]

//! modswitch core: publish a 2-position switch through shared memory.
//!
//! The daemon samples two GPIO input lines, encodes them as one ASCII digit
//! (`'0'`..=`'3'`) and keeps that digit in a one-byte POSIX shared memory
//! segment. Other processes read the segment without touching the hardware.
//!
//! ```text
//! ┌───────────┐  read_pair  ┌────────┐  byte  ┌──────────────┐  mmap  ┌──────────┐
//! │ GPIO chip │────────────▶│ encode │───────▶│ /dev/shm/... │◀───────│ readers  │
//! └───────────┘             └────────┘        └──────────────┘        └──────────┘
//! ```
//!
//! `unsafe` is confined to the kernel interfaces in [`gpio`], [`shm`] and
//! [`process`].

/// Compile-time build metadata (version, git hash, profile).
pub mod build_info;
/// Poll loop and resource ownership.
pub mod daemon;
/// Switch samples to state digits.
pub mod encode;
/// GPIO character-device line handles.
pub mod gpio;
/// Single-instance file lock.
pub mod lock;
/// Daemonization.
pub mod process;
/// One-byte shared state segment.
pub mod shm;
/// SIGINT / SIGTERM shutdown flag.
pub mod signals;

pub use daemon::{Daemon, DaemonError, Phase, RuntimePaths};
pub use encode::encode;
pub use gpio::{GpioError, LineHandle, LineSource};
pub use lock::{InstanceLock, LockError};
pub use shm::{SharedState, SharedStateReader, ShmError};
pub use signals::ShutdownFlag;
