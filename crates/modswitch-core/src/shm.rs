#![allow(unsafe_code)]

//! The one-byte POSIX shared memory segment carrying the switch state.
//!
//! The daemon owns a [`SharedState`]: it creates the segment, overwrites the
//! byte on every poll and unlinks the name on shutdown. Any number of readers
//! map it read-only through [`SharedStateReader`]. There is no lock: a single
//! byte store is never observed half-written.

use std::fs::{File, Permissions};
use std::num::NonZeroUsize;
use std::os::unix::fs::PermissionsExt;
use std::ptr::NonNull;

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::mman::{MapFlags, ProtFlags, mmap, munmap, shm_open, shm_unlink};
use nix::sys::stat::Mode;
use tracing::{debug, info, warn};

/// Name of the segment the daemon publishes to.
pub const DEFAULT_SEGMENT_NAME: &str = "/modsw";

/// One byte: the ASCII state digit.
const SEGMENT_LEN: NonZeroUsize = NonZeroUsize::MIN;

/// Errors from opening or using the shared segment.
#[derive(Debug, thiserror::Error)]
pub enum ShmError {
    #[error("invalid segment name {0:?}: expected '/' followed by a name without '/'")]
    InvalidName(String),

    #[error("cannot publish to shared segment {name}: {op} failed: {source}")]
    PublishUnavailable {
        name: String,
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read shared segment {name}: {op} failed: {source}")]
    Unavailable {
        name: String,
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("shared segment {0} has no state byte yet")]
    Empty(String),

    #[error("shared segment {0} is already closed")]
    Closed(String),
}

/// The daemon's read-write view of the segment.
#[derive(Debug)]
pub struct SharedState {
    name: String,
    mapping: Option<Mapping>,
    file: Option<File>,
}

impl SharedState {
    /// Create the segment if absent (mode `0666`), size it to one byte and
    /// map it read-write.
    pub fn open(name: &str) -> Result<Self, ShmError> {
        check_name(name)?;
        let fail = |op: &'static str| {
            move |source: Errno| ShmError::PublishUnavailable {
                name: name.to_string(),
                op,
                source: source.into(),
            }
        };

        let fd = shm_open(
            name,
            OFlag::O_CREAT | OFlag::O_RDWR,
            Mode::from_bits_truncate(0o666),
        )
        .map_err(fail("shm_open"))?;
        let file = File::from(fd);

        // The creation mode is filtered by the umask; widen it so readers
        // running as other users can open the segment.
        if let Err(err) = file.set_permissions(Permissions::from_mode(0o666)) {
            warn!(segment = name, error = %err, "cannot make shared segment world-accessible");
        }

        file.set_len(SEGMENT_LEN.get() as u64)
            .map_err(|source| ShmError::PublishUnavailable {
                name: name.to_string(),
                op: "ftruncate",
                source,
            })?;

        let mapping = Mapping::new(&file, ProtFlags::PROT_READ | ProtFlags::PROT_WRITE)
            .map_err(fail("mmap"))?;

        info!(segment = name, "shared state segment ready");
        Ok(Self {
            name: name.to_string(),
            mapping: Some(mapping),
            file: Some(file),
        })
    }

    /// Overwrite the state byte.
    pub fn publish(&mut self, byte: u8) -> Result<(), ShmError> {
        let mapping = self
            .mapping
            .as_ref()
            .ok_or_else(|| ShmError::Closed(self.name.clone()))?;
        mapping.write(byte);
        Ok(())
    }

    /// The byte currently in the segment, or `None` once closed.
    pub fn current(&self) -> Option<u8> {
        self.mapping.as_ref().map(Mapping::read)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_closed(&self) -> bool {
        self.mapping.is_none() && self.file.is_none()
    }

    /// Unmap, close and unlink the segment so later readers fail instead of
    /// seeing a stale value. Safe to call repeatedly.
    pub fn close(&mut self) {
        if self.is_closed() {
            return;
        }
        drop(self.mapping.take());
        drop(self.file.take());
        match shm_unlink(self.name.as_str()) {
            Ok(()) => debug!(segment = %self.name, "shared state segment removed"),
            Err(Errno::ENOENT) => {}
            Err(err) => warn!(segment = %self.name, error = %err, "shm_unlink failed"),
        }
    }
}

impl Drop for SharedState {
    fn drop(&mut self) {
        self.close();
    }
}

/// A read-only view of a segment published by a running daemon.
#[derive(Debug)]
pub struct SharedStateReader {
    name: String,
    mapping: Mapping,
    _file: File,
}

impl SharedStateReader {
    /// Open and map an existing segment. Fails if no daemon has created it.
    pub fn open(name: &str) -> Result<Self, ShmError> {
        check_name(name)?;
        let fail = |op: &'static str| {
            move |source: std::io::Error| ShmError::Unavailable {
                name: name.to_string(),
                op,
                source,
            }
        };

        let fd = shm_open(name, OFlag::O_RDONLY, Mode::empty())
            .map_err(|errno| fail("shm_open")(errno.into()))?;
        let file = File::from(fd);

        // Mapping past the end of an empty object faults on first access.
        if file.metadata().map_err(fail("fstat"))?.len() < SEGMENT_LEN.get() as u64 {
            return Err(ShmError::Empty(name.to_string()));
        }

        let mapping = Mapping::new(&file, ProtFlags::PROT_READ)
            .map_err(|errno| fail("mmap")(errno.into()))?;

        Ok(Self {
            name: name.to_string(),
            mapping,
            _file: file,
        })
    }

    /// The byte currently published.
    pub fn read(&self) -> u8 {
        self.mapping.read()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// POSIX shared memory names are `/` followed by up to NAME_MAX non-`/` bytes.
fn check_name(name: &str) -> Result<(), ShmError> {
    let valid = name
        .strip_prefix('/')
        .is_some_and(|rest| !rest.is_empty() && rest.len() <= 255 && !rest.contains('/'));
    if valid {
        Ok(())
    } else {
        Err(ShmError::InvalidName(name.to_string()))
    }
}

/// A one-byte `MAP_SHARED` mapping, unmapped on drop.
#[derive(Debug)]
struct Mapping {
    ptr: NonNull<u8>,
}

// SAFETY: the mapping is valid process-wide until `munmap`, and all access
// goes through single-byte volatile loads and stores.
unsafe impl Send for Mapping {}

impl Mapping {
    fn new(file: &File, prot: ProtFlags) -> nix::Result<Self> {
        // SAFETY: a fresh mapping chosen by the kernel cannot alias any Rust
        // allocation; `file` is at least `SEGMENT_LEN` long.
        let ptr = unsafe { mmap(None, SEGMENT_LEN, prot, MapFlags::MAP_SHARED, file, 0)? };
        Ok(Self { ptr: ptr.cast() })
    }

    fn read(&self) -> u8 {
        // SAFETY: `ptr` points at one mapped, readable byte until drop.
        unsafe { self.ptr.as_ptr().read_volatile() }
    }

    /// Only called on mappings created with `PROT_WRITE`.
    fn write(&self, byte: u8) {
        // SAFETY: `ptr` points at one mapped byte; `SharedState` only maps
        // read-write.
        unsafe { self.ptr.as_ptr().write_volatile(byte) }
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        // SAFETY: `ptr` came from `mmap` with `SEGMENT_LEN` and is unmapped
        // exactly once, here.
        if let Err(err) = unsafe { munmap(self.ptr.cast(), SEGMENT_LEN.get()) } {
            warn!(error = %err, "munmap failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modswitch_test_utils::shm::unique_segment_name;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_publish_then_read() {
        let name = unique_segment_name();
        let mut state = SharedState::open(&name).unwrap();
        state.publish(b'2').unwrap();

        let reader = SharedStateReader::open(&name).unwrap();
        assert_eq!(reader.name(), name);
        assert_eq!(reader.read(), b'2');
        assert_eq!(state.current(), Some(b'2'));

        state.publish(b'3').unwrap();
        assert_eq!(reader.read(), b'3');
    }

    #[test]
    fn test_close_unlinks() {
        let name = unique_segment_name();
        let mut state = SharedState::open(&name).unwrap();
        state.publish(b'1').unwrap();
        state.close();

        let err = SharedStateReader::open(&name).unwrap_err();
        match err {
            ShmError::Unavailable { op, source, .. } => {
                assert_eq!(op, "shm_open");
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("expected Unavailable, got {other:?}"),
        }
    }

    #[test]
    fn test_close_is_idempotent() {
        let name = unique_segment_name();
        let mut state = SharedState::open(&name).unwrap();
        state.close();
        state.close();
        assert!(state.is_closed());
        assert_eq!(state.current(), None);
        assert!(matches!(state.publish(b'0'), Err(ShmError::Closed(_))));
    }

    #[test]
    fn test_drop_unlinks() {
        let name = unique_segment_name();
        {
            let mut state = SharedState::open(&name).unwrap();
            state.publish(b'0').unwrap();
        }
        assert!(SharedStateReader::open(&name).is_err());
    }

    #[test]
    fn test_reopen_existing_segment() {
        let name = unique_segment_name();
        let mut first = SharedState::open(&name).unwrap();
        first.publish(b'3').unwrap();

        let second = SharedState::open(&name).unwrap();
        assert_eq!(second.current(), Some(b'3'));
        // `second` unlinks on drop; `first` tolerates the name being gone.
        drop(second);
        first.close();
    }

    #[test]
    fn test_reader_missing_segment() {
        let name = unique_segment_name();
        assert!(matches!(
            SharedStateReader::open(&name),
            Err(ShmError::Unavailable { .. })
        ));
    }

    #[test]
    fn test_invalid_names() {
        for bad in ["", "/", "modsw", "/a/b"] {
            assert!(
                matches!(SharedState::open(bad), Err(ShmError::InvalidName(_))),
                "{bad:?} should be rejected"
            );
        }
        assert!(check_name(DEFAULT_SEGMENT_NAME).is_ok());
    }
}
