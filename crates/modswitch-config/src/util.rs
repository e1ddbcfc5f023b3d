//! Strict parsing and list-membership helpers shared by the daemon and the reader.
//!
//! Command-line values go through these instead of `str::parse` directly so that
//! `+5`, `" 5"` and multi-character targets are rejected with a clear message.

use std::fmt;

/// Why a command-line value could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("expected an unsigned decimal integer, got {0:?}")]
    NotUnsigned(String),

    #[error("value {0:?} does not fit in 64 bits")]
    OutOfRange(String),

    #[error("expected exactly one ASCII character, got {0:?}")]
    NotSingleChar(String),
}

/// Parse a whole string as an unsigned decimal integer.
///
/// Leading signs, whitespace and trailing garbage are all rejected.
pub fn parse_u64(s: &str) -> Result<u64, ParseError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::NotUnsigned(s.to_string()));
    }
    s.parse::<u64>()
        .map_err(|_| ParseError::OutOfRange(s.to_string()))
}

/// Parse a string holding exactly one ASCII character into its byte value.
pub fn parse_single_char(s: &str) -> Result<u8, ParseError> {
    match s.as_bytes() {
        [b] if b.is_ascii() => Ok(*b),
        _ => Err(ParseError::NotSingleChar(s.to_string())),
    }
}

/// Whether `value` appears in `list`.
pub fn contains<T: PartialEq>(list: &[T], value: &T) -> bool {
    list.iter().any(|item| item == value)
}

/// Render a byte for operator messages: printable ASCII as-is, anything else escaped.
pub fn display_byte(b: u8) -> impl fmt::Display {
    std::ascii::escape_default(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_u64_accepts_plain_digits() {
        assert_eq!(parse_u64("0"), Ok(0));
        assert_eq!(parse_u64("1000"), Ok(1000));
        assert_eq!(parse_u64("18446744073709551615"), Ok(u64::MAX));
    }

    #[test]
    fn test_parse_u64_rejects_garbage() {
        for bad in ["", "-1", "+1", " 1", "1 ", "12ab", "0x10"] {
            assert!(
                matches!(parse_u64(bad), Err(ParseError::NotUnsigned(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_u64_overflow() {
        assert_eq!(
            parse_u64("18446744073709551616"),
            Err(ParseError::OutOfRange("18446744073709551616".to_string()))
        );
    }

    #[test]
    fn test_parse_single_char() {
        assert_eq!(parse_single_char("2"), Ok(b'2'));
        assert!(parse_single_char("").is_err());
        assert!(parse_single_char("23").is_err());
        assert!(parse_single_char("é").is_err());
    }

    #[test]
    fn test_contains() {
        let pins = [0_i64, 1, 2];
        assert!(contains(&pins, &2));
        assert!(!contains(&pins, &3));
        assert!(!contains::<i64>(&[], &0));
    }

    #[test]
    fn test_display_byte_escapes_control() {
        assert_eq!(display_byte(b'1').to_string(), "1");
        assert_eq!(display_byte(0).to_string(), "\\x00");
    }
}
