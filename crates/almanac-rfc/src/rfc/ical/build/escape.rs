//! Value and parameter escaping (RFC 5545 §3.3.11, RFC 6868).

/// Escapes a TEXT value.
///
/// Backslash, semicolon, comma and newline are escaped; a CR that is part of
/// a CRLF pair is dropped.
#[must_use]
pub fn escape_text(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + s.len() / 8);
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => result.push_str("\\\\"),
            ';' => result.push_str("\\;"),
            ',' => result.push_str("\\,"),
            '\n' => result.push_str("\\n"),
            '\r' if chars.peek() == Some(&'\n') => {}
            _ => result.push(c),
        }
    }

    result
}

/// Encodes a parameter value with caret escapes, quoting it when it holds
/// a character that would end an unquoted value.
#[must_use]
pub fn escape_param_value(s: &str) -> String {
    let mut encoded = String::with_capacity(s.len() + 2);
    for c in s.chars() {
        match c {
            '^' => encoded.push_str("^^"),
            '\n' => encoded.push_str("^n"),
            '"' => encoded.push_str("^'"),
            _ => encoded.push(c),
        }
    }

    if s.contains([':', ';', ',']) {
        format!("\"{encoded}\"")
    } else {
        encoded
    }
}
