//! Abstract query → MySQL statement text.
//!
//! All values are inlined as escaped literals; compiled statements never carry bound
//! parameters. A query containing an empty `IN` list compiles to [`CompiledSql::Empty`]
//! so callers can skip execution entirely.

use std::fmt::Write as _;

use crate::error::MysqlMiddlewareError;
use crate::escape::{escape_list, push_identifier, push_literal};
use crate::naming::checked_storage_name;
use crate::query::{DbQuery, Filter, FilterOperator, FilterValue, Order};
use crate::types::RowValues;

mod dml;
mod select;

pub use dml::{compile_delete, compile_update};
pub use select::{compile_count, compile_select};

/// Column returned when a query explicitly selects no fields.
pub const PLACEHOLDER_COLUMN: &str = "id";

/// Alias of the count column produced by [`compile_count`].
pub const COUNT_ALIAS: &str = "_count";

/// `LIMIT` value used when only an offset is given (the largest `BIGINT UNSIGNED`).
const UNBOUNDED_LIMIT: u64 = u64::MAX;

/// Result of compiling an abstract query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompiledSql {
    /// Statement text ready for execution.
    Statement(String),
    /// The query provably matches zero rows; do not execute anything.
    Empty,
}

impl CompiledSql {
    #[must_use]
    pub fn as_sql(&self) -> Option<&str> {
        match self {
            CompiledSql::Statement(sql) => Some(sql),
            CompiledSql::Empty => None,
        }
    }

    #[must_use]
    pub fn into_sql(self) -> Option<String> {
        match self {
            CompiledSql::Statement(sql) => Some(sql),
            CompiledSql::Empty => None,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, CompiledSql::Empty)
    }
}

/// Outcome of rendering the filter list.
enum WhereClause {
    /// No filters.
    Unfiltered,
    /// ` WHERE ...` text including the leading space.
    Predicate(String),
    /// At least one filter can never match.
    Unsatisfiable,
}

fn validate_table(q: &DbQuery) -> Result<(), MysqlMiddlewareError> {
    if q.table.trim().is_empty() {
        return Err(MysqlMiddlewareError::validation("query table must not be empty"));
    }
    Ok(())
}

pub(crate) fn push_column(out: &mut String, field: &str) -> Result<(), MysqlMiddlewareError> {
    let stored = checked_storage_name(field)?;
    push_identifier(out, &stored);
    Ok(())
}

/// Every filter is validated before an unsatisfiable one short-circuits the result.
fn where_clause(filters: &[Filter]) -> Result<WhereClause, MysqlMiddlewareError> {
    if filters.is_empty() {
        return Ok(WhereClause::Unfiltered);
    }

    let mut out = String::from(" WHERE ");
    let mut unsatisfiable = false;
    for (i, filter) in filters.iter().enumerate() {
        if i > 0 {
            out.push_str(" AND ");
        }
        push_column(&mut out, &filter.field)?;
        match &filter.value {
            FilterValue::Missing | FilterValue::Value(RowValues::Null) => {
                out.push_str(if filter.op == FilterOperator::Eq {
                    " IS NULL"
                } else {
                    " IS NOT NULL"
                });
            }
            FilterValue::List(values) => {
                if values.is_empty() {
                    unsatisfiable = true;
                    continue;
                }
                let keyword = match filter.op {
                    FilterOperator::Eq => " IN ",
                    FilterOperator::Ne => " NOT IN ",
                    other => {
                        return Err(MysqlMiddlewareError::validation(format!(
                            "operator {other} cannot be applied to a list on field {:?}",
                            filter.field
                        )));
                    }
                };
                out.push_str(keyword);
                out.push_str(&escape_list(values));
            }
            FilterValue::Value(value) => {
                let _ = write!(out, " {} ", filter.op);
                push_literal(&mut out, value);
            }
        }
    }

    if unsatisfiable {
        Ok(WhereClause::Unsatisfiable)
    } else {
        Ok(WhereClause::Predicate(out))
    }
}

fn push_order_by(out: &mut String, orders: &[Order]) -> Result<(), MysqlMiddlewareError> {
    if orders.is_empty() {
        return Ok(());
    }
    out.push_str(" ORDER BY ");
    for (i, order) in orders.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        push_column(out, &order.field)?;
        out.push_str(if order.descending { " DESC" } else { " ASC" });
    }
    Ok(())
}

fn push_limit(
    out: &mut String,
    q: &DbQuery,
    allow_offset: bool,
) -> Result<(), MysqlMiddlewareError> {
    // zero means unset, whether it came from the builder or from JSON
    let limit = q.limit.filter(|&n| n > 0);
    let offset = q.offset.filter(|&n| n > 0);
    match (limit, offset) {
        (None, None) => {}
        (Some(limit), None) => {
            let _ = write!(out, " LIMIT {limit}");
        }
        (limit, Some(offset)) => {
            if !allow_offset {
                return Err(MysqlMiddlewareError::validation(
                    "OFFSET is only supported for SELECT",
                ));
            }
            let limit = limit.unwrap_or(UNBOUNDED_LIMIT);
            let _ = write!(out, " LIMIT {limit} OFFSET {offset}");
        }
    }
    Ok(())
}
