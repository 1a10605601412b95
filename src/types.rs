use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde_json::Value as JsonValue;

/// Values that can be stored in a database row, used as filter operands, or bound as
/// statement parameters.
///
/// ```rust
/// use mysql_middleware::prelude::*;
///
/// let values = vec![
///     RowValues::Int(1),
///     RowValues::Text("alice".into()),
///     RowValues::Bool(true),
/// ];
/// # let _ = values;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// JSON objects and arrays; these must be serialized before reaching the insert planner.
    #[must_use]
    pub fn is_structured(&self) -> bool {
        matches!(self, Self::JSON(JsonValue::Object(_) | JsonValue::Array(_)))
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }
}

impl From<JsonValue> for RowValues {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => RowValues::Null,
            JsonValue::Bool(b) => RowValues::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => RowValues::Int(i),
                None => RowValues::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => RowValues::Text(s),
            other => RowValues::JSON(other),
        }
    }
}

impl From<i64> for RowValues {
    fn from(value: i64) -> Self {
        RowValues::Int(value)
    }
}

impl From<f64> for RowValues {
    fn from(value: f64) -> Self {
        RowValues::Float(value)
    }
}

impl From<bool> for RowValues {
    fn from(value: bool) -> Self {
        RowValues::Bool(value)
    }
}

impl From<&str> for RowValues {
    fn from(value: &str) -> Self {
        RowValues::Text(value.to_string())
    }
}

impl From<String> for RowValues {
    fn from(value: String) -> Self {
        RowValues::Text(value)
    }
}

impl From<Vec<u8>> for RowValues {
    fn from(value: Vec<u8>) -> Self {
        RowValues::Blob(value)
    }
}

impl From<NaiveDateTime> for RowValues {
    fn from(value: NaiveDateTime) -> Self {
        RowValues::Timestamp(value)
    }
}

/// A flat, insertion-ordered mapping from field name to value.
///
/// Field order matters: it decides the column order of generated INSERT and UPDATE
/// statements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowObject {
    fields: Vec<(String, RowValues)>,
}

impl RowObject {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    /// Insert or replace a field, keeping the original position on replace.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<RowValues>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Builder-style `insert`.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<RowValues>) -> Self {
        self.insert(name, value);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RowValues> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn remove(&mut self, name: &str) -> Option<RowValues> {
        let idx = self.fields.iter().position(|(k, _)| k == name)?;
        Some(self.fields.remove(idx).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RowValues)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Serialize JSON object/array values to their text form, leaving scalars and
    /// binary values untouched. Callers run this before handing rows to the planner.
    #[must_use]
    pub fn stringify_structured(mut self) -> Self {
        for (_, value) in &mut self.fields {
            if let RowValues::JSON(json) = value
                && matches!(json, JsonValue::Object(_) | JsonValue::Array(_))
            {
                *value = RowValues::Text(json.to_string());
            }
        }
        self
    }
}

impl<K: Into<String>, V: Into<RowValues>> FromIterator<(K, V)> for RowObject {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = RowObject::new();
        for (k, v) in iter {
            row.insert(k, v);
        }
        row
    }
}

impl IntoIterator for RowObject {
    type Item = (String, RowValues);
    type IntoIter = std::vec::IntoIter<(String, RowValues)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

/// Statement verb used by the bulk insert planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum)]
pub enum InsertVerb {
    /// Plain `INSERT`; duplicate keys fail the statement.
    #[default]
    Insert,
    /// `REPLACE`; rows with a duplicate key overwrite the existing row.
    Replace,
}

impl InsertVerb {
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            InsertVerb::Insert => "INSERT",
            InsertVerb::Replace => "REPLACE",
        }
    }
}

/// How `save_batch` writes rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum)]
pub enum SaveMethod {
    /// Size-bounded `INSERT` statements.
    #[default]
    Insert,
    /// Size-bounded `REPLACE` statements (idempotent on retry).
    Upsert,
    /// One `UPDATE ... WHERE id = ...` per row.
    Update,
}
