#![deny(unsafe_code)]

//! Configuration loading and validation for the modswitch daemon.
//!
//! The configuration file is an ini file with two sections:
//!
//! ```ini
//! [gpio]
//! sw0_pin=10
//! sw1_pin=7
//! pullupdown=1   ; 1 = pull-up, 0 = pull-down
//! chip=/dev/gpiochip0
//!
//! [user]
//! delay_us=1000
//! ```
//!
//! Every key is optional and falls back to its built-in default. Unknown
//! sections or keys are rejected and reported with the line they appear on.
//! [`AppConfig::settings`] turns a validated file into the typed [`Settings`]
//! the daemon runs with.

mod ini;
/// Strict parsing and list-membership helpers.
pub mod util;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

/// Default location of the daemon configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/modswitch/modswitch.conf";

/// Default GPIO controller character device.
pub const DEFAULT_GPIO_CHIP: &str = "/dev/gpiochip0";

/// Controller line offsets a switch may be wired to (BCM 0-27 on the 40-pin header).
pub const USABLE_PINS: [i64; 28] = [
    0, 1, 2, 3, 4, 5, 6, 7, //
    8, 9, 10, 11, 12, 13, 14, 15, //
    16, 17, 18, 19, 20, 21, 22, 23, //
    24, 25, 26, 27,
];

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot load config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("bad config file (first error on line {line}): {message}")]
    Parse { line: usize, message: String },

    #[error("invalid {field}: {value} (usable pins are 0-27)")]
    InvalidPin { field: &'static str, value: i64 },

    #[error("invalid gpio.pullupdown mode: {0} (expected 0 for pull-down or 1 for pull-up)")]
    InvalidPullMode(i64),
}

/// Bias applied to both switch lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullMode {
    /// Lines idle low; a closed switch reads high.
    Down,
    /// Lines idle high; a closed switch reads low (active-low).
    Up,
}

impl PullMode {
    /// Map the configuration file encoding (`0` / `1`) to a mode.
    pub fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            0 => Some(Self::Down),
            1 => Some(Self::Up),
            _ => None,
        }
    }

    /// The configuration file encoding of this mode.
    pub fn as_raw(self) -> i64 {
        match self {
            Self::Down => 0,
            Self::Up => 1,
        }
    }
}

impl fmt::Display for PullMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Down => f.write_str("pull-down"),
            Self::Up => f.write_str("pull-up"),
        }
    }
}

/// Top-level configuration file contents.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Switch wiring.
    #[serde(default)]
    pub gpio: GpioConfig,

    /// Tunables.
    #[serde(default)]
    pub user: UserConfig,
}

/// The `[gpio]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GpioConfig {
    /// Line offset of switch 0 (low bit).
    #[serde(default = "default_sw0_pin")]
    pub sw0_pin: i64,

    /// Line offset of switch 1 (high bit).
    #[serde(default = "default_sw1_pin")]
    pub sw1_pin: i64,

    /// `1` for pull-up, `0` for pull-down.
    #[serde(default = "default_pullupdown")]
    pub pullupdown: i64,

    /// GPIO controller character device.
    #[serde(default = "default_chip")]
    pub chip: PathBuf,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            sw0_pin: default_sw0_pin(),
            sw1_pin: default_sw1_pin(),
            pullupdown: default_pullupdown(),
            chip: default_chip(),
        }
    }
}

fn default_sw0_pin() -> i64 {
    10
}

fn default_sw1_pin() -> i64 {
    7
}

fn default_pullupdown() -> i64 {
    PullMode::Up.as_raw()
}

fn default_chip() -> PathBuf {
    PathBuf::from(DEFAULT_GPIO_CHIP)
}

/// The `[user]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserConfig {
    /// Delay between two samples, in microseconds.
    #[serde(default = "default_delay_us")]
    pub delay_us: u64,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            delay_us: default_delay_us(),
        }
    }
}

fn default_delay_us() -> u64 {
    1000
}

/// Validated, typed view of the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub chip: PathBuf,
    pub sw0_pin: u32,
    pub sw1_pin: u32,
    pub pull_mode: PullMode,
    pub poll_delay: Duration,
}

impl AppConfig {
    /// Load and validate configuration from a file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from ini text.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let toml = ini::to_toml(s);
        let config: AppConfig = toml::from_str(&toml).map_err(|err| ConfigError::Parse {
            line: err.span().map_or(1, |span| line_of(&toml, span.start)),
            message: err.message().to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field against its accepted domain.
    ///
    /// Reports the first offending field together with its value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !util::contains(&USABLE_PINS, &self.gpio.sw0_pin) {
            return Err(ConfigError::InvalidPin {
                field: "gpio.sw0_pin",
                value: self.gpio.sw0_pin,
            });
        }
        if !util::contains(&USABLE_PINS, &self.gpio.sw1_pin) {
            return Err(ConfigError::InvalidPin {
                field: "gpio.sw1_pin",
                value: self.gpio.sw1_pin,
            });
        }
        if PullMode::from_raw(self.gpio.pullupdown).is_none() {
            return Err(ConfigError::InvalidPullMode(self.gpio.pullupdown));
        }
        Ok(())
    }

    /// Validate and convert into [`Settings`].
    pub fn settings(&self) -> Result<Settings, ConfigError> {
        self.validate()?;

        let pull_mode = PullMode::from_raw(self.gpio.pullupdown)
            .ok_or(ConfigError::InvalidPullMode(self.gpio.pullupdown))?;
        let sw0_pin = pin_offset("gpio.sw0_pin", self.gpio.sw0_pin)?;
        let sw1_pin = pin_offset("gpio.sw1_pin", self.gpio.sw1_pin)?;

        // Accepted as-is: both bits then always read the same line.
        if sw0_pin == sw1_pin {
            warn!(pin = sw0_pin, "sw0_pin and sw1_pin refer to the same line");
        }

        Ok(Settings {
            chip: self.gpio.chip.clone(),
            sw0_pin,
            sw1_pin,
            pull_mode,
            poll_delay: Duration::from_micros(self.user.delay_us),
        })
    }
}

fn pin_offset(field: &'static str, value: i64) -> Result<u32, ConfigError> {
    u32::try_from(value).map_err(|_| ConfigError::InvalidPin { field, value })
}

/// 1-based line number of a byte offset.
fn line_of(s: &str, offset: usize) -> usize {
    let end = offset.min(s.len());
    s.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() + 1
}
