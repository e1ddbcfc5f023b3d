//! Configuration builders for tests.
//!
//! Use [`TestConfigBuilder`] to create customised [`AppConfig`] values without
//! repeating boilerplate across crate boundaries.

use modswitch_config::{AppConfig, Settings};

/// Fluent builder for [`AppConfig`] in tests.
///
/// # Example
///
/// ```ignore
/// let settings = TestConfigBuilder::new()
///     .pins(10, 7)
///     .pullupdown(1)
///     .delay_us(100)
///     .settings();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn pins(mut self, sw0: i64, sw1: i64) -> Self {
        self.config.gpio.sw0_pin = sw0;
        self.config.gpio.sw1_pin = sw1;
        self
    }

    pub fn pullupdown(mut self, raw: i64) -> Self {
        self.config.gpio.pullupdown = raw;
        self
    }

    pub fn delay_us(mut self, delay_us: u64) -> Self {
        self.config.user.delay_us = delay_us;
        self
    }

    pub fn chip(mut self, chip: &str) -> Self {
        self.config.gpio.chip = chip.into();
        self
    }

    /// Build and validate. Panics if the configuration is invalid.
    pub fn settings(self) -> Settings {
        self.config
            .settings()
            .expect("test configuration should be valid")
    }

    /// Render the configuration in the on-disk file format.
    pub fn to_file_contents(&self) -> String {
        let gpio = &self.config.gpio;
        format!(
            "[gpio]\nsw0_pin={}\nsw1_pin={}\npullupdown={}\nchip={}\n\n[user]\ndelay_us={}\n",
            gpio.sw0_pin,
            gpio.sw1_pin,
            gpio.pullupdown,
            gpio.chip.display(),
            self.config.user.delay_us,
        )
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
