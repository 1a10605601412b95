//! MySQL identifier and literal escaping.
//!
//! Everything the compiler and planner splice into statement text goes through this
//! module. Identifiers are wrapped in backticks with embedded backticks doubled; string
//! literals are single-quoted with the MySQL backslash escapes applied, so no value content
//! can terminate the literal early.

use std::fmt::Write as _;

use chrono::Timelike;

mod literal;

pub use literal::{escape_string, push_escaped_string};

use crate::types::RowValues;

/// Render `name` as a single backtick-quoted identifier.
///
/// Dots are kept inside the identifier; use [`escape_table_name`] for `schema.table` forms.
#[must_use]
pub fn escape_identifier(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    push_identifier(&mut out, name);
    out
}

pub(crate) fn push_identifier(out: &mut String, name: &str) {
    out.push('`');
    for ch in name.chars() {
        if ch == '`' {
            out.push_str("``");
        } else {
            out.push(ch);
        }
    }
    out.push('`');
}

/// Render a possibly schema-qualified table reference, quoting each dotted segment.
///
/// ```rust
/// use mysql_middleware::escape::escape_table_name;
///
/// assert_eq!(escape_table_name("shop.orders"), "`shop`.`orders`");
/// ```
#[must_use]
pub fn escape_table_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, segment) in name.split('.').enumerate() {
        if i > 0 {
            out.push('.');
        }
        push_identifier(&mut out, segment);
    }
    out
}

/// Render a value as MySQL literal syntax.
#[must_use]
pub fn escape_literal(value: &RowValues) -> String {
    let mut out = String::new();
    push_literal(&mut out, value);
    out
}

/// Render a list of values as a parenthesized literal list for `IN (...)`.
#[must_use]
pub fn escape_list(values: &[RowValues]) -> String {
    let mut out = String::with_capacity(values.len() * 8 + 2);
    out.push('(');
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        push_literal(&mut out, value);
    }
    out.push(')');
    out
}

pub(crate) fn push_literal(out: &mut String, value: &RowValues) {
    match value {
        RowValues::Null => out.push_str("NULL"),
        RowValues::Int(i) => {
            let _ = write!(out, "{i}");
        }
        RowValues::Float(f) => push_float(out, *f),
        RowValues::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        RowValues::Text(s) => push_escaped_string(out, s),
        RowValues::Timestamp(dt) => {
            // MySQL keeps at most microseconds
            let micros = dt.with_nanosecond(dt.nanosecond() / 1_000 * 1_000).unwrap_or(*dt);
            let text = micros.format("%Y-%m-%d %H:%M:%S%.f").to_string();
            push_escaped_string(out, &text);
        }
        RowValues::Blob(bytes) => push_hex(out, bytes),
        RowValues::JSON(json) => match json {
            serde_json::Value::Null => out.push_str("NULL"),
            serde_json::Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            serde_json::Value::Number(n) => {
                let _ = write!(out, "{n}");
            }
            serde_json::Value::String(s) => push_escaped_string(out, s),
            structured => push_escaped_string(out, &structured.to_string()),
        },
    }
}

fn push_float(out: &mut String, f: f64) {
    if f.is_finite() {
        let _ = write!(out, "{f}");
    } else {
        // NaN and infinities have no MySQL literal form
        out.push_str("NULL");
    }
}

fn push_hex(out: &mut String, bytes: &[u8]) {
    out.reserve(bytes.len() * 2 + 3);
    out.push_str("X'");
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out.push('\'');
}
