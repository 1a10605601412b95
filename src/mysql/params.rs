use sqlx::MySql;
use sqlx::mysql::MySqlArguments;
use sqlx::query::Query;
use sqlx::types::Json;

use crate::types::RowValues;

/// Bind `params` to the `?` placeholders of `query`, in order.
pub(crate) fn bind_params<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &'q [RowValues],
) -> Query<'q, MySql, MySqlArguments> {
    for param in params {
        query = match param {
            RowValues::Int(i) => query.bind(*i),
            RowValues::Float(f) => query.bind(*f),
            RowValues::Text(s) => query.bind(s.as_str()),
            RowValues::Bool(b) => query.bind(*b),
            RowValues::Timestamp(ts) => query.bind(*ts),
            RowValues::Null => query.bind(None::<String>),
            RowValues::JSON(value) => query.bind(Json(value)),
            RowValues::Blob(bytes) => query.bind(bytes.as_slice()),
        };
    }
    query
}
