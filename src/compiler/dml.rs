use crate::error::MysqlMiddlewareError;
use crate::escape::{escape_table_name, push_literal};
use crate::query::DbQuery;
use crate::types::RowObject;

use super::{
    CompiledSql, WhereClause, push_column, push_limit, push_order_by, validate_table, where_clause,
};

/// Compile a DELETE statement.
///
/// # Errors
/// Returns `ValidationError` for invalid names or operators, or when the query carries an
/// offset (MySQL DELETE has no OFFSET).
pub fn compile_delete(q: &DbQuery) -> Result<CompiledSql, MysqlMiddlewareError> {
    validate_table(q)?;
    let mut sql = String::from("DELETE FROM ");
    sql.push_str(&escape_table_name(&q.table));
    match where_clause(&q.filters)? {
        WhereClause::Unsatisfiable => return Ok(CompiledSql::Empty),
        WhereClause::Unfiltered => {}
        WhereClause::Predicate(text) => sql.push_str(&text),
    }
    push_order_by(&mut sql, &q.orders)?;
    push_limit(&mut sql, q, false)?;
    Ok(CompiledSql::Statement(sql))
}

/// Compile an UPDATE statement that applies `patch` to every row matching `q`.
///
/// The SET list follows the patch's field order; values are inlined as escaped literals.
///
/// # Errors
/// Returns `ValidationError` for an empty patch, invalid names or operators, or an offset.
pub fn compile_update(q: &DbQuery, patch: &RowObject) -> Result<CompiledSql, MysqlMiddlewareError> {
    validate_table(q)?;
    if patch.is_empty() {
        return Err(MysqlMiddlewareError::validation(format!(
            "update of {:?} has an empty patch",
            q.table
        )));
    }

    let mut sql = String::from("UPDATE ");
    sql.push_str(&escape_table_name(&q.table));
    sql.push_str(" SET ");
    for (i, (field, value)) in patch.iter().enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        push_column(&mut sql, field)?;
        sql.push_str(" = ");
        push_literal(&mut sql, value);
    }

    match where_clause(&q.filters)? {
        WhereClause::Unsatisfiable => return Ok(CompiledSql::Empty),
        WhereClause::Unfiltered => {}
        WhereClause::Predicate(text) => sql.push_str(&text),
    }
    push_order_by(&mut sql, &q.orders)?;
    push_limit(&mut sql, q, false)?;
    Ok(CompiledSql::Statement(sql))
}
