use serde::Deserialize;

use super::{FieldKind, SchemaField, TableSchema};
use crate::error::MysqlMiddlewareError;
use crate::naming::from_storage_name;
use crate::results::CustomDbRow;
use crate::types::RowValues;

/// One row of `DESCRIBE <table>`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TableStats {
    #[serde(rename = "Field")]
    pub field: String,
    /// Declared column type, e.g. `int(11)` or `longtext`.
    #[serde(rename = "Type")]
    pub type_name: String,
    /// `YES` when the column is nullable.
    #[serde(rename = "Null")]
    pub null: String,
}

impl TableStats {
    #[must_use]
    pub fn new(
        field: impl Into<String>,
        type_name: impl Into<String>,
        null: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            type_name: type_name.into(),
            null: null.into(),
        }
    }

    /// Read the `Field`, `Type` and `Null` columns of a `DESCRIBE` result row.
    pub(crate) fn from_row(row: &CustomDbRow) -> Result<Self, MysqlMiddlewareError> {
        let text = |column: &str| -> Result<String, MysqlMiddlewareError> {
            match row.get(column) {
                Some(RowValues::Text(s)) => Ok(s.clone()),
                Some(RowValues::Blob(b)) => Ok(String::from_utf8_lossy(b).into_owned()),
                Some(RowValues::Null) | None if column == "Null" => Ok(String::new()),
                _ => Err(MysqlMiddlewareError::SchemaError(format!(
                    "DESCRIBE row is missing the `{column}` column"
                ))),
            }
        };
        Ok(Self {
            field: text("Field")?,
            type_name: text("Type")?,
            null: text("Null")?,
        })
    }

    fn is_nullable(&self) -> bool {
        self.null.eq_ignore_ascii_case("YES")
    }

    fn kind(&self) -> Option<FieldKind> {
        let t = self.type_name.to_ascii_lowercase();
        let kind = if t.contains("text") || t.contains("char") {
            FieldKind::String
        } else if t.contains("lob") || t.contains("binary") {
            FieldKind::Binary
        } else if t.starts_with("tinyint") || t.contains("(1)") {
            FieldKind::Boolean
        } else if ["int", "bigint", "smallint", "mediumint"]
            .iter()
            .any(|prefix| t.starts_with(prefix))
        {
            FieldKind::Integer
        } else if t.starts_with("float") || t.starts_with("double") || t.starts_with("decimal") {
            FieldKind::Number
        } else {
            return None;
        };
        Some(kind)
    }
}

/// Rebuild a schema from `DESCRIBE` output. Non-nullable columns become required fields
/// and column names are mapped back to field names.
///
/// # Errors
/// Returns `SchemaError` for a column type with no field kind.
pub fn table_stats_to_schema(
    table: &str,
    stats: &[TableStats],
) -> Result<TableSchema, MysqlMiddlewareError> {
    let fields = stats
        .iter()
        .map(|stat| {
            let kind = stat.kind().ok_or_else(|| {
                MysqlMiddlewareError::SchemaError(format!(
                    "Unknown mysql field type {} {}",
                    stat.field, stat.type_name
                ))
            })?;
            Ok(SchemaField::new(from_storage_name(&stat.field), kind).required(!stat.is_nullable()))
        })
        .collect::<Result<Vec<_>, MysqlMiddlewareError>>()?;

    Ok(TableSchema {
        table: table.to_string(),
        fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn describe_rows_to_schema() {
        let stats = vec![
            TableStats::new("id", "varchar(255)", "NO"),
            TableStats::new("k1", "longtext", "YES"),
            TableStats::new("even", "tinyint(1)", "YES"),
            TableStats::new("n", "int(11)", "YES"),
            TableStats::new("score", "float", "YES"),
            TableStats::new("buf", "longblob", "YES"),
            TableStats::new("address_dot_city", "varchar(1)", "YES"),
        ];
        let schema = table_stats_to_schema("items", &stats).unwrap();
        assert_eq!(schema.table, "items");
        let kinds: Vec<_> = schema.fields.iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![
                FieldKind::String,
                FieldKind::String,
                FieldKind::Boolean,
                FieldKind::Integer,
                FieldKind::Number,
                FieldKind::Binary,
                FieldKind::String,
            ]
        );
        assert!(schema.get("id").unwrap().required);
        assert!(!schema.get("k1").unwrap().required);
        assert!(schema.get("address.city").is_some());
    }

    #[test]
    fn unknown_type_is_an_error() {
        let stats = vec![TableStats::new("at", "datetime", "YES")];
        assert!(matches!(
            table_stats_to_schema("t", &stats),
            Err(MysqlMiddlewareError::SchemaError(m)) if m.contains("datetime")
        ));
    }

    #[test]
    fn from_describe_row() {
        let row = CustomDbRow::new(
            Arc::new(vec![
                "Field".to_string(),
                "Type".to_string(),
                "Null".to_string(),
                "Key".to_string(),
            ]),
            vec![
                Some(RowValues::Text("id".into())),
                Some(RowValues::Blob(b"varchar(255)".to_vec())),
                Some(RowValues::Text("NO".into())),
                Some(RowValues::Text("PRI".into())),
            ],
        );
        let stats = TableStats::from_row(&row).unwrap();
        assert_eq!(stats, TableStats::new("id", "varchar(255)", "NO"));
    }

    #[test]
    fn deserializes_describe_json() {
        let stats: TableStats =
            serde_json::from_str(r#"{"Field":"n","Type":"int(11)","Null":"YES"}"#).unwrap();
        assert_eq!(stats.type_name, "int(11)");
    }
}
