//! Plain ini text to TOML, line for line.
//!
//! The configuration file is a classic ini file: `;` or `#` comment lines,
//! inline `;` comments after a value, `key=value` or `key: value` pairs and
//! unquoted strings. Each input line becomes exactly one output line, so
//! TOML error positions map straight back to the operator's file.

/// Rewrite ini `text` as TOML with the same number of lines.
pub(crate) fn to_toml(text: &str) -> String {
    text.lines().map(line).collect::<Vec<_>>().join("\n")
}

fn line(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with([';', '#']) {
        return String::new();
    }
    if trimmed.starts_with('[') {
        return match trimmed.find(']') {
            Some(end) => trimmed[..=end].to_string(),
            None => trimmed.to_string(),
        };
    }
    match trimmed.find(['=', ':']) {
        Some(at) => {
            let key = trimmed[..at].trim();
            let value = strip_inline_comment(&trimmed[at + 1..]).trim();
            format!("{key} = {}", value_literal(value))
        }
        // Left for the TOML parser to report on this line.
        None => trimmed.to_string(),
    }
}

/// Drop a `;` or `#` comment that follows whitespace.
fn strip_inline_comment(value: &str) -> &str {
    let mut prev_blank = false;
    for (i, c) in value.char_indices() {
        if prev_blank && (c == ';' || c == '#') {
            return &value[..i];
        }
        prev_blank = c.is_whitespace();
    }
    value
}

/// Integers and already-quoted strings pass through; anything else is quoted.
fn value_literal(value: &str) -> String {
    if is_integer(value) || is_quoted(value) {
        return value.to_string();
    }
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

fn is_integer(value: &str) -> bool {
    let digits = value.strip_prefix(['+', '-']).unwrap_or(value);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn is_quoted(value: &str) -> bool {
    value.len() >= 2 && value.starts_with('"') && value.ends_with('"')
}
