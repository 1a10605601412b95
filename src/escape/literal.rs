/// Quote `s` as a MySQL string literal.
#[must_use]
pub fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    push_escaped_string(&mut out, s);
    out
}

/// Append `s` to `out` as a single-quoted literal.
///
/// Escapes the characters that are significant inside a MySQL string literal under the
/// default `sql_mode` (backslash escapes enabled): NUL, backspace, tab, newline, carriage
/// return, Ctrl-Z, both quote characters, and the backslash itself.
pub fn push_escaped_string(out: &mut String, s: &str) {
    out.reserve(s.len() + 2);
    out.push('\'');
    let bytes = s.as_bytes();
    let mut start = 0;
    for (idx, &b) in bytes.iter().enumerate() {
        let Some(replacement) = escape_byte(b) else {
            continue;
        };
        // escapable bytes are all ASCII, so `idx` is a char boundary
        out.push_str(&s[start..idx]);
        out.push_str(replacement);
        start = idx + 1;
    }
    out.push_str(&s[start..]);
    out.push('\'');
}

fn escape_byte(b: u8) -> Option<&'static str> {
    match b {
        b'\0' => Some("\\0"),
        0x08 => Some("\\b"),
        b'\t' => Some("\\t"),
        b'\n' => Some("\\n"),
        b'\r' => Some("\\r"),
        0x1a => Some("\\Z"),
        b'"' => Some("\\\""),
        b'\'' => Some("\\'"),
        b'\\' => Some("\\\\"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_characters() {
        assert_eq!(escape_string("a\nb\tc\r\0\x1a\x08"), r"'a\nb\tc\r\0\Z\b'");
    }

    #[test]
    fn multibyte_text_is_preserved() {
        assert_eq!(escape_string("héllo ✓ 'x'"), r"'héllo ✓ \'x\''");
    }

    #[test]
    fn empty_string() {
        assert_eq!(escape_string(""), "''");
    }
}
