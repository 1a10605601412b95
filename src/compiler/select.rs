use crate::error::MysqlMiddlewareError;
use crate::escape::{escape_table_name, push_identifier};
use crate::query::DbQuery;

use super::{
    COUNT_ALIAS, CompiledSql, PLACEHOLDER_COLUMN, WhereClause, push_column, push_limit,
    push_order_by, validate_table, where_clause,
};

/// Compile a SELECT statement.
///
/// # Errors
/// Returns `ValidationError` for an empty table name, an invalid field name, or an
/// operator that cannot be applied to a list operand.
pub fn compile_select(q: &DbQuery) -> Result<CompiledSql, MysqlMiddlewareError> {
    validate_table(q)?;
    let predicate = match where_clause(&q.filters)? {
        WhereClause::Unsatisfiable => return Ok(CompiledSql::Empty),
        WhereClause::Unfiltered => None,
        WhereClause::Predicate(text) => Some(text),
    };

    let mut sql = String::from("SELECT ");
    if q.distinct {
        sql.push_str("DISTINCT ");
    }
    push_projection(&mut sql, q.selected_fields.as_deref())?;
    sql.push_str(" FROM ");
    sql.push_str(&escape_table_name(&q.table));
    if let Some(predicate) = predicate {
        sql.push_str(&predicate);
    }

    if !q.group_by.is_empty() {
        sql.push_str(" GROUP BY ");
        for (i, field) in q.group_by.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            push_column(&mut sql, field)?;
        }
    }

    push_order_by(&mut sql, &q.orders)?;
    push_limit(&mut sql, q, true)?;
    Ok(CompiledSql::Statement(sql))
}

/// Compile `SELECT COUNT(*) AS _count` over the query's filters.
///
/// Ordering, grouping, projection, and pagination do not affect the count and are ignored.
///
/// # Errors
/// Same as [`compile_select`].
pub fn compile_count(q: &DbQuery) -> Result<CompiledSql, MysqlMiddlewareError> {
    validate_table(q)?;
    let mut sql = String::from("SELECT COUNT(*) AS ");
    push_identifier(&mut sql, COUNT_ALIAS);
    sql.push_str(" FROM ");
    sql.push_str(&escape_table_name(&q.table));
    match where_clause(&q.filters)? {
        WhereClause::Unsatisfiable => return Ok(CompiledSql::Empty),
        WhereClause::Unfiltered => {}
        WhereClause::Predicate(text) => sql.push_str(&text),
    }
    Ok(CompiledSql::Statement(sql))
}

fn push_projection(
    sql: &mut String,
    fields: Option<&[String]>,
) -> Result<(), MysqlMiddlewareError> {
    match fields {
        None => sql.push('*'),
        Some([]) => push_identifier(sql, PLACEHOLDER_COLUMN),
        Some(fields) => {
            for (i, field) in fields.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                push_column(sql, field)?;
            }
        }
    }
    Ok(())
}
