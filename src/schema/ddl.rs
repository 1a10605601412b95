use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use super::{FieldKind, SchemaField, TableSchema};
use crate::compiler::push_column;
use crate::error::MysqlMiddlewareError;
use crate::escape::escape_table_name;

const ID_COLUMN: &str = "id VARCHAR(255) NOT NULL";

lazy_static! {
    static ref ENGINE_NAME: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("static regex");
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SchemaOptions {
    /// Storage engine for `ENGINE=`.
    pub engine: String,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self {
            engine: "InnoDB".to_string(),
        }
    }
}

fn column_type(field: &SchemaField) -> &'static str {
    match field.kind {
        FieldKind::String | FieldKind::Array | FieldKind::Object => "LONGTEXT",
        FieldKind::Integer => "INT(11)",
        FieldKind::Number => match field.format.as_deref() {
            Some("int32" | "unixTimestamp") => "INT(11)",
            _ => "FLOAT(11)",
        },
        FieldKind::Boolean => "TINYINT(1)",
        FieldKind::Binary => "LONGBLOB",
        FieldKind::Null => "VARCHAR(255)",
    }
}

/// Render `CREATE TABLE` for `schema`.
///
/// Every column other than `id` is nullable with `DEFAULT NULL`; `id` is always present and
/// is the primary key.
///
/// ```rust
/// use mysql_middleware::schema::{
///     FieldKind, SchemaField, SchemaOptions, TableSchema, table_schema_to_ddl,
/// };
///
/// let schema = TableSchema::new("users")
///     .field(SchemaField::new("id", FieldKind::String))
///     .field(SchemaField::new("address.city", FieldKind::String));
/// let ddl = table_schema_to_ddl(&schema, &SchemaOptions::default()).unwrap();
/// assert_eq!(
///     ddl,
///     "CREATE TABLE `users` (\nid VARCHAR(255) NOT NULL,\n`address_dot_city` LONGTEXT DEFAULT NULL,\nPRIMARY KEY (id)\n) ENGINE=InnoDB"
/// );
/// ```
///
/// # Errors
/// Returns `ValidationError` for an empty table name, an invalid engine name, or a field
/// name that cannot be mapped to a column.
pub fn table_schema_to_ddl(
    schema: &TableSchema,
    opts: &SchemaOptions,
) -> Result<String, MysqlMiddlewareError> {
    if schema.table.trim().is_empty() {
        return Err(MysqlMiddlewareError::validation("schema table must not be empty"));
    }
    if !ENGINE_NAME.is_match(&opts.engine) {
        return Err(MysqlMiddlewareError::validation(format!(
            "invalid storage engine `{}`",
            opts.engine
        )));
    }

    let mut columns = Vec::with_capacity(schema.fields.len() + 2);
    if schema.get("id").is_none() {
        columns.push(ID_COLUMN.to_string());
    }
    for field in &schema.fields {
        if field.name == "id" {
            columns.push(ID_COLUMN.to_string());
            continue;
        }
        let mut line = String::new();
        push_column(&mut line, &field.name)?;
        line.push(' ');
        line.push_str(column_type(field));
        line.push_str(" DEFAULT NULL");
        columns.push(line);
    }
    columns.push("PRIMARY KEY (id)".to_string());

    Ok(format!(
        "CREATE TABLE {} (\n{}\n) ENGINE={}",
        escape_table_name(&schema.table),
        columns.join(",\n"),
        opts.engine
    ))
}
