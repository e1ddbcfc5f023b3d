//! Fuzz target for the command-line value parsers.
//!
//! Run with: cargo +nightly fuzz run fuzz_cli_values
//!
//! `parse_u64` must agree with `str::parse::<u64>` on plain digit strings and
//! reject everything else; `parse_single_char` must accept exactly one ASCII byte.

#![no_main]

use libfuzzer_sys::fuzz_target;
use modswitch_config::util::{parse_single_char, parse_u64};

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    let digits_only = !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    match parse_u64(s) {
        Ok(value) => assert_eq!(s.parse::<u64>().ok(), Some(value)),
        Err(_) => assert!(!digits_only || s.parse::<u64>().is_err()),
    }

    match parse_single_char(s) {
        Ok(byte) => assert_eq!(s.as_bytes(), [byte]),
        Err(_) => assert!(s.len() != 1 || !s.is_ascii()),
    }
});
