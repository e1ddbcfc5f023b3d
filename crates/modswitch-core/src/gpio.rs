#![allow(unsafe_code)]

//! GPIO line handles over the Linux character-device interface.
//!
//! Uses the v1 line-handle ioctls (`GPIO_GET_LINEHANDLE_IOCTL`,
//! `GPIOHANDLE_GET_LINE_VALUES_IOCTL`): one request claims both switch lines
//! as inputs with the configured bias, and each read samples both values
//! in a single call.

use std::fs::File;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::path::{Path, PathBuf};

use modswitch_config::PullMode;
use nix::errno::Errno;
use tracing::{debug, info};

/// Consumer name shown by `gpioinfo` for the claimed lines.
pub const CONSUMER_LABEL: &str = "modswitchd";

/// Errors from the hardware line reader.
#[derive(Debug, thiserror::Error)]
pub enum GpioError {
    #[error("cannot open GPIO controller {}: {source}", path.display())]
    HardwareUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line request for offsets {offsets:?} on {} rejected: {source}", chip.display())]
    LineRequestFailed {
        chip: PathBuf,
        offsets: [u32; 2],
        #[source]
        source: Errno,
    },

    #[error("reading line values failed: {0}")]
    ReadFailed(#[source] Errno),
}

/// Something that yields the two switch samples on demand.
///
/// Implemented by [`LineHandle`] for real hardware; tests drive the daemon
/// loop with scripted sources.
pub trait LineSource {
    /// Sample `(sw0, sw1)` raw line levels at the same instant.
    fn read_pair(&mut self) -> Result<(bool, bool), GpioError>;

    /// Give the lines back. Calling this more than once is a no-op.
    fn release(&mut self);
}

/// An exclusively held request for two input lines on one controller.
#[derive(Debug)]
pub struct LineHandle {
    chip_path: PathBuf,
    chip: Option<OwnedFd>,
    lines: Option<OwnedFd>,
}

impl LineHandle {
    /// Open `chip_path` and request `offsets` as inputs biased per `pull_mode`.
    ///
    /// On a rejected request the controller descriptor is closed before
    /// returning.
    pub fn acquire(
        chip_path: &Path,
        offsets: [u32; 2],
        pull_mode: PullMode,
    ) -> Result<Self, GpioError> {
        let chip: OwnedFd = File::open(chip_path)
            .map_err(|source| GpioError::HardwareUnavailable {
                path: chip_path.to_path_buf(),
                source,
            })?
            .into();

        let mut request = sys::GpioHandleRequest::new(offsets, request_flags(pull_mode));
        // SAFETY: `request` is a live, exclusively borrowed `gpiohandle_request`
        // for the whole call, and `chip` is an open descriptor.
        unsafe { sys::get_linehandle(chip.as_raw_fd(), &mut request) }.map_err(|source| {
            GpioError::LineRequestFailed {
                chip: chip_path.to_path_buf(),
                offsets,
                source,
            }
        })?;
        // SAFETY: on success the kernel stores a newly opened descriptor in
        // `request.fd` that nothing else owns.
        let lines = unsafe { OwnedFd::from_raw_fd(request.fd) };

        info!(
            chip = %chip_path.display(),
            sw0 = offsets[0],
            sw1 = offsets[1],
            bias = %pull_mode,
            "GPIO lines acquired"
        );

        Ok(Self {
            chip_path: chip_path.to_path_buf(),
            chip: Some(chip),
            lines: Some(lines),
        })
    }
}

impl LineSource for LineHandle {
    fn read_pair(&mut self) -> Result<(bool, bool), GpioError> {
        let lines = self
            .lines
            .as_ref()
            .ok_or(GpioError::ReadFailed(Errno::EBADF))?;

        let mut data = sys::GpioHandleData::zeroed();
        // SAFETY: `data` is a live, exclusively borrowed `gpiohandle_data` and
        // `lines` is the open line-handle descriptor.
        unsafe { sys::get_line_values(lines.as_raw_fd(), &mut data) }
            .map_err(GpioError::ReadFailed)?;

        Ok((data.values[0] != 0, data.values[1] != 0))
    }

    fn release(&mut self) {
        let had_lines = self.lines.take().is_some();
        let had_chip = self.chip.take().is_some();
        if had_lines || had_chip {
            debug!(chip = %self.chip_path.display(), "GPIO lines released");
        }
    }
}

impl Drop for LineHandle {
    fn drop(&mut self) {
        self.release();
    }
}

fn request_flags(pull_mode: PullMode) -> u32 {
    let bias = match pull_mode {
        PullMode::Up => sys::GPIOHANDLE_REQUEST_BIAS_PULL_UP,
        PullMode::Down => sys::GPIOHANDLE_REQUEST_BIAS_PULL_DOWN,
    };
    sys::GPIOHANDLE_REQUEST_INPUT | bias
}

/// Kernel ABI for `<linux/gpio.h>` line handles.
mod sys {
    use super::CONSUMER_LABEL;

    pub const GPIOHANDLES_MAX: usize = 64;

    pub const GPIOHANDLE_REQUEST_INPUT: u32 = 1 << 0;
    pub const GPIOHANDLE_REQUEST_BIAS_PULL_UP: u32 = 1 << 5;
    pub const GPIOHANDLE_REQUEST_BIAS_PULL_DOWN: u32 = 1 << 6;

    /// `struct gpiohandle_request`
    #[repr(C)]
    pub struct GpioHandleRequest {
        pub lineoffsets: [u32; GPIOHANDLES_MAX],
        pub flags: u32,
        pub default_values: [u8; GPIOHANDLES_MAX],
        pub consumer_label: [u8; 32],
        pub lines: u32,
        pub fd: i32,
    }

    impl GpioHandleRequest {
        pub fn new(offsets: [u32; 2], flags: u32) -> Self {
            let mut request = Self {
                lineoffsets: [0; GPIOHANDLES_MAX],
                flags,
                default_values: [0; GPIOHANDLES_MAX],
                consumer_label: [0; 32],
                lines: offsets.len() as u32,
                fd: -1,
            };
            request.lineoffsets[..offsets.len()].copy_from_slice(&offsets);
            // Leave at least one trailing NUL.
            let label = CONSUMER_LABEL.as_bytes();
            let n = label.len().min(request.consumer_label.len() - 1);
            request.consumer_label[..n].copy_from_slice(&label[..n]);
            request
        }
    }

    /// `struct gpiohandle_data`
    #[repr(C)]
    pub struct GpioHandleData {
        pub values: [u8; GPIOHANDLES_MAX],
    }

    impl GpioHandleData {
        pub fn zeroed() -> Self {
            Self {
                values: [0; GPIOHANDLES_MAX],
            }
        }
    }

    const _: () = assert!(std::mem::size_of::<GpioHandleRequest>() == 364);
    const _: () = assert!(std::mem::size_of::<GpioHandleData>() == 64);

    nix::ioctl_readwrite!(get_linehandle, 0xB4, 0x03, GpioHandleRequest);
    nix::ioctl_readwrite!(get_line_values, 0xB4, 0x08, GpioHandleData);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::NamedTempFile;

    #[test]
    fn test_request_flags() {
        assert_eq!(request_flags(PullMode::Up), 0b010_0001);
        assert_eq!(request_flags(PullMode::Down), 0b100_0001);
    }

    #[test]
    fn test_request_layout() {
        let request = sys::GpioHandleRequest::new([10, 7], 1);
        assert_eq!(request.lines, 2);
        assert_eq!(&request.lineoffsets[..3], &[10, 7, 0]);
        assert_eq!(&request.consumer_label[..10], CONSUMER_LABEL.as_bytes());
        assert_eq!(request.consumer_label[10], 0);
    }

    #[test]
    fn test_acquire_missing_chip() {
        let err = LineHandle::acquire(
            Path::new("/nonexistent/gpiochip9"),
            [10, 7],
            PullMode::Up,
        )
        .unwrap_err();
        assert!(matches!(err, GpioError::HardwareUnavailable { .. }));
        assert!(err.to_string().contains("/nonexistent/gpiochip9"));
    }

    #[test]
    fn test_acquire_on_non_gpio_file_is_rejected() {
        // A regular file opens fine but does not understand the GPIO ioctl.
        let file = NamedTempFile::new().unwrap();
        let err = LineHandle::acquire(file.path(), [10, 7], PullMode::Down).unwrap_err();
        match err {
            GpioError::LineRequestFailed { offsets, source, .. } => {
                assert_eq!(offsets, [10, 7]);
                assert_eq!(source, Errno::ENOTTY);
            }
            other => panic!("expected LineRequestFailed, got {other:?}"),
        }
    }
}
