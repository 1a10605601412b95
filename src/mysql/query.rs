use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value as JsonValue;
use sqlx::mysql::MySqlRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

use crate::error::MysqlMiddlewareError;
use crate::results::ResultSet;
use crate::typecast::{CastOutcome, ColumnMeta, RawCell, boolean_cast};
use crate::types::RowValues;

lazy_static! {
    static ref MAX_SIZE: Regex = Regex::new(r"max_size:\s*Some\((\d+)\)").expect("static regex");
}

/// Column metadata for the boolean cast.
pub(crate) fn column_metas(row: &MySqlRow) -> Vec<ColumnMeta> {
    row.columns()
        .iter()
        .map(|col| {
            let type_info = col.type_info();
            column_meta(col.name(), type_info.name(), declared_length(type_info))
        })
        .collect()
}

/// sqlx names `TINYINT(1)` `BOOLEAN`; `BIT(n)` and `INT(n)` keep their declared length.
fn column_meta(name: &str, type_name: &str, length: Option<u32>) -> ColumnMeta {
    match type_name {
        "BOOLEAN" => ColumnMeta::new(name, "TINYINT", Some(1)),
        "BIT" | "INT" => ColumnMeta::new(name, type_name, length),
        other => ColumnMeta::new(name, other, None),
    }
}

/// Declared column length from the wire column definition.
///
/// `MySqlTypeInfo` keeps it private and only shows it in its `Debug` form.
fn declared_length(type_info: &impl std::fmt::Debug) -> Option<u32> {
    let debug = format!("{type_info:?}");
    MAX_SIZE.captures(&debug)?.get(1)?.as_str().parse().ok()
}

/// Decode every cell of a text-protocol row. `None` marks a cell left out of the row object.
pub(crate) fn decode_row(
    row: &MySqlRow,
    metas: &[ColumnMeta],
) -> Result<Vec<Option<RowValues>>, MysqlMiddlewareError> {
    metas
        .iter()
        .enumerate()
        .map(|(idx, meta)| decode_cell(row, idx, meta))
        .collect()
}

fn decode_cell(
    row: &MySqlRow,
    idx: usize,
    meta: &ColumnMeta,
) -> Result<Option<RowValues>, MysqlMiddlewareError> {
    let is_null = row.try_get_raw(idx)?.is_null();
    let raw = if is_null {
        RawCell::Null
    } else {
        RawCell::Bytes(row.try_get_unchecked::<&[u8], _>(idx)?)
    };

    match boolean_cast(meta, raw) {
        CastOutcome::Bool(b) => return Ok(Some(RowValues::Bool(b))),
        CastOutcome::Absent => return Ok(None),
        CastOutcome::NotApplicable => {}
    }
    if is_null {
        return Ok(Some(RowValues::Null));
    }

    let value = match meta.type_name.as_str() {
        "NULL" => RowValues::Null,
        "BOOLEAN" => RowValues::Bool(row.try_get_unchecked::<bool, _>(idx)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR"
        | "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED" => {
            RowValues::Int(row.try_get_unchecked::<i64, _>(idx)?)
        }
        "BIGINT UNSIGNED" => {
            let n = row.try_get_unchecked::<u64, _>(idx)?;
            i64::try_from(n).map_or_else(|_| RowValues::Text(n.to_string()), RowValues::Int)
        }
        "FLOAT" | "DOUBLE" => RowValues::Float(row.try_get_unchecked::<f64, _>(idx)?),
        "DATETIME" | "TIMESTAMP" => match row.try_get_unchecked::<NaiveDateTime, _>(idx) {
            Ok(ts) => RowValues::Timestamp(ts),
            // zero dates
            Err(_) => text(row, idx)?,
        },
        "DATE" => match row.try_get_unchecked::<NaiveDate, _>(idx) {
            Ok(date) => RowValues::Timestamp(date.and_time(NaiveTime::MIN)),
            Err(_) => text(row, idx)?,
        },
        "JSON" => {
            let raw = row.try_get_unchecked::<&str, _>(idx)?;
            let value: JsonValue = serde_json::from_str(raw).map_err(|e| {
                MysqlMiddlewareError::ParameterError(format!(
                    "column `{}` holds invalid JSON: {e}",
                    meta.name
                ))
            })?;
            RowValues::JSON(value)
        }
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT"
        | "GEOMETRY" => RowValues::Blob(row.try_get_unchecked::<Vec<u8>, _>(idx)?),
        // DECIMAL, TIME, character types, ENUM, SET
        _ => text(row, idx)?,
    };
    Ok(Some(value))
}

fn text(row: &MySqlRow, idx: usize) -> Result<RowValues, MysqlMiddlewareError> {
    let bytes = row.try_get_unchecked::<&[u8], _>(idx)?;
    Ok(match std::str::from_utf8(bytes) {
        Ok(s) => RowValues::Text(s.to_string()),
        Err(_) => RowValues::Blob(bytes.to_vec()),
    })
}

/// Build a result set from text-protocol rows, applying the boolean cast to every cell.
///
/// # Errors
/// Returns an error if a cell cannot be decoded.
pub fn build_result_set(rows: &[MySqlRow]) -> Result<ResultSet, MysqlMiddlewareError> {
    let Some(first) = rows.first() else {
        return Ok(ResultSet::default());
    };
    let metas = column_metas(first);
    let column_names = Arc::new(metas.iter().map(|m| m.name.clone()).collect::<Vec<_>>());

    let mut result_set = ResultSet::with_capacity(rows.len());
    result_set.set_column_names(column_names);
    for row in rows {
        result_set.add_row_values(decode_row(row, &metas)?);
    }
    Ok(result_set)
}
