use crate::compiler::push_column;
use crate::error::MysqlMiddlewareError;
use crate::escape::{escape_table_name, push_literal};
use crate::naming::checked_storage_name;
use crate::types::{InsertVerb, RowObject, RowValues};

/// Between row tuples.
pub(super) const SEPARATOR: &str = ", ";

pub(super) fn validate_row(row: &RowObject) -> Result<(), MysqlMiddlewareError> {
    for (field, value) in row.iter() {
        checked_storage_name(field)?;
        if value.is_structured() {
            return Err(MysqlMiddlewareError::validation(format!(
                "field {field:?} holds a JSON object/array; serialize it before planning the insert"
            )));
        }
    }
    Ok(())
}

/// `VERB INTO `table` (`a`, `b`) VALUES `; shared by every statement with these columns.
pub(super) fn render_header(
    verb: InsertVerb,
    table: &str,
    columns: &[&str],
) -> Result<String, MysqlMiddlewareError> {
    let mut header = String::with_capacity(32 + columns.len() * 12);
    header.push_str(verb.as_sql());
    header.push_str(" INTO ");
    header.push_str(&escape_table_name(table));
    header.push_str(" (");
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            header.push_str(", ");
        }
        push_column(&mut header, column)?;
    }
    header.push_str(") VALUES ");
    Ok(header)
}

pub(super) fn render_tuple(row: &RowObject, columns: &[&str]) -> String {
    let mut tuple = String::with_capacity(columns.len() * 8 + 2);
    tuple.push('(');
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            tuple.push_str(", ");
        }
        push_literal(&mut tuple, row.get(column).unwrap_or(&RowValues::Null));
    }
    tuple.push(')');
    tuple
}
