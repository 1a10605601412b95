//! Read-time boolean coercion for single-width integer and bit columns.
//!
//! A `TINYINT(1)`, `INT(1)` or `BIT(1)` column is read back as a boolean: `1` is `true`,
//! anything else `false`, and SQL `NULL` becomes an absent field rather than `false`.
//! Every decode path (point lookups, filtered queries, streams) goes through
//! [`boolean_cast`] so the rule cannot drift between them.

use lazy_static::lazy_static;
use regex::Regex;

const BOOLEAN_INT_TYPES: [&str; 4] = ["TINY", "TINYINT", "INT", "BOOLEAN"];
const BOOLEAN_BIT_TYPES: [&str; 1] = ["BIT"];

lazy_static! {
    static ref DECLARED_TYPE: Regex =
        Regex::new(r"^\s*([A-Za-z]+)\s*(?:\(\s*(\d+)\s*\))?").expect("static regex");
}

/// Declared type of a result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    /// Upper-case base type name, e.g. `TINYINT`.
    pub type_name: String,
    /// Declared display width / bit length, when known.
    pub length: Option<u32>,
}

impl ColumnMeta {
    #[must_use]
    pub fn new(name: impl Into<String>, type_name: &str, length: Option<u32>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.trim().to_ascii_uppercase(),
            length,
        }
    }

    /// Build from a declared type such as `tinyint(1)` or `bit(1)`.
    #[must_use]
    pub fn from_declared(name: impl Into<String>, declared: &str) -> Self {
        match DECLARED_TYPE.captures(declared) {
            Some(caps) => {
                let base = caps.get(1).map_or("", |m| m.as_str());
                let length = caps.get(2).and_then(|m| m.as_str().parse().ok());
                Self::new(name, base, length)
            }
            None => Self::new(name, declared, None),
        }
    }

    /// True when values of this column are coerced to booleans.
    #[must_use]
    pub fn is_boolean(&self) -> bool {
        self.length == Some(1)
            && (BOOLEAN_INT_TYPES.contains(&self.type_name.as_str())
                || BOOLEAN_BIT_TYPES.contains(&self.type_name.as_str()))
    }
}

/// Raw cell as delivered by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawCell<'a> {
    Null,
    Text(&'a str),
    Bytes(&'a [u8]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastOutcome {
    /// The column is not a boolean column; decode normally.
    NotApplicable,
    /// `NULL` in a boolean column: leave the field out of the row.
    Absent,
    Bool(bool),
}

#[must_use]
pub fn boolean_cast(column: &ColumnMeta, raw: RawCell<'_>) -> CastOutcome {
    if column.length != Some(1) {
        return CastOutcome::NotApplicable;
    }
    let ty = column.type_name.as_str();

    if BOOLEAN_BIT_TYPES.contains(&ty) {
        return match raw {
            RawCell::Null => CastOutcome::Absent,
            RawCell::Bytes(b) => CastOutcome::Bool(b.first() == Some(&1)),
            RawCell::Text(s) => CastOutcome::Bool(s.as_bytes().first() == Some(&1)),
        };
    }

    if BOOLEAN_INT_TYPES.contains(&ty) {
        return match raw {
            RawCell::Null => CastOutcome::Absent,
            RawCell::Text(s) => CastOutcome::Bool(s == "1"),
            RawCell::Bytes(b) => CastOutcome::Bool(b == b"1"),
        };
    }

    CastOutcome::NotApplicable
}
