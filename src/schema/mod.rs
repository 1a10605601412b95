//! Table schemas: `CREATE TABLE` generation and reading a schema back from `DESCRIBE`.

use serde::{Deserialize, Serialize};

mod ddl;
mod stats;

pub use ddl::{SchemaOptions, table_schema_to_ddl};
pub use stats::{TableStats, table_stats_to_schema};

/// Kind of value a field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Integer,
    Number,
    Boolean,
    Binary,
    Null,
    Array,
    Object,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaField {
    /// External field name; may contain dots.
    pub name: String,
    pub kind: FieldKind,
    /// Number format hint, e.g. `int32` or `unixTimestamp`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default)]
    pub required: bool,
}

impl SchemaField {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            format: None,
            required: false,
        }
    }

    #[must_use]
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    #[must_use]
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub table: String,
    pub fields: Vec<SchemaField>,
}

impl TableSchema {
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn field(mut self, field: SchemaField) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }
}
