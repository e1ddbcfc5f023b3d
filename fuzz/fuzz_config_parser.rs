//! Fuzz target for the configuration file parser.
//!
//! Run with: cargo +nightly fuzz run fuzz_config_parser
//!
//! Anything `AppConfig::parse()` accepts must resolve to settings with usable
//! pins, and a rejection must point at a line that exists in the input.

#![no_main]

use libfuzzer_sys::fuzz_target;
use modswitch_config::{AppConfig, ConfigError, USABLE_PINS};

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    match AppConfig::parse(s) {
        Ok(config) => {
            let settings = config.settings().expect("parsed config must resolve");
            assert!(USABLE_PINS.contains(&i64::from(settings.sw0_pin)));
            assert!(USABLE_PINS.contains(&i64::from(settings.sw1_pin)));
        }
        Err(ConfigError::Parse { line, .. }) => {
            assert!(line >= 1);
            assert!(line <= s.matches('\n').count() + 1);
        }
        Err(_) => {}
    }
});
