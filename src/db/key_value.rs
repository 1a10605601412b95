use crate::compiler::{CompiledSql, compile_count, compile_delete, compile_select};
use crate::error::MysqlMiddlewareError;
use crate::escape::escape_table_name;
use crate::executor::SqlExecutor;
use crate::query::DbQuery;
use crate::stream::RowStream;
use crate::types::{RowObject, RowValues};

use super::{DbConfig, MysqlDb, by_ids, count_of};

/// An id and its stored bytes.
pub type KeyValueEntry = (String, Vec<u8>);

/// Key-value store over `(id VARCHAR(64) PRIMARY KEY, v LONGBLOB)` tables.
#[derive(Debug, Clone)]
pub struct MysqlKeyValueDb<E> {
    db: MysqlDb<E>,
}

impl<E: SqlExecutor> MysqlKeyValueDb<E> {
    /// # Errors
    /// Returns `ConfigError` if the planner limits in `config` are invalid.
    pub fn new(executor: E, config: DbConfig) -> Result<Self, MysqlMiddlewareError> {
        Ok(Self {
            db: MysqlDb::new(executor, config)?,
        })
    }

    #[must_use]
    pub fn from_db(db: MysqlDb<E>) -> Self {
        Self { db }
    }

    #[must_use]
    pub fn db(&self) -> &MysqlDb<E> {
        &self.db
    }

    /// # Errors
    /// Returns the executor's error when the server is unreachable.
    pub async fn ping(&self) -> Result<(), MysqlMiddlewareError> {
        self.db.ping().await
    }

    /// # Errors
    /// Returns `ValidationError` for an empty table name, or the executor's error.
    pub async fn create_table(
        &self,
        table: &str,
        drop_if_exists: bool,
    ) -> Result<(), MysqlMiddlewareError> {
        if drop_if_exists {
            self.drop_table(table).await?;
        }
        let sql = format!(
            "CREATE TABLE {} (`id` VARCHAR(64) PRIMARY KEY, `v` LONGBLOB NOT NULL)",
            super::checked_table(table)?
        );
        self.db.execute_sql(&sql, &[]).await?;
        Ok(())
    }

    /// # Errors
    /// Returns `ValidationError` for an empty table name, or the executor's error.
    pub async fn drop_table(&self, table: &str) -> Result<(), MysqlMiddlewareError> {
        self.db.drop_table(table).await
    }

    /// Entries for the ids that exist, in server order.
    ///
    /// # Errors
    /// Returns the executor's error, or `Other` for a row without an id or value.
    pub async fn get_by_ids<S: AsRef<str>>(
        &self,
        table: &str,
        ids: &[S],
    ) -> Result<Vec<KeyValueEntry>, MysqlMiddlewareError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let q = by_ids(table, ids).select(["id", "v"]);
        self.db
            .run_query(&q)
            .await?
            .into_iter()
            .map(entry_of)
            .collect()
    }

    /// # Errors
    /// Returns the executor's error.
    pub async fn delete_by_ids<S: AsRef<str>>(
        &self,
        table: &str,
        ids: &[S],
    ) -> Result<u64, MysqlMiddlewareError> {
        let CompiledSql::Statement(sql) = compile_delete(&by_ids(table, ids))? else {
            return Ok(0);
        };
        Ok(self.db.execute_sql(&sql, &[]).await?.affected_rows)
    }

    /// Store every entry, replacing existing values. One bound statement per entry, run in
    /// order.
    ///
    /// # Errors
    /// Returns the executor's error for the first entry, or `PartialBatchFailure` when a
    /// later entry fails.
    pub async fn save_batch(
        &self,
        table: &str,
        entries: &[KeyValueEntry],
    ) -> Result<(), MysqlMiddlewareError> {
        if entries.is_empty() {
            return Ok(());
        }
        let sql = format!(
            "REPLACE INTO {} (`id`, `v`) VALUES (?, ?)",
            super::checked_table(table)?
        );
        let total = entries.len();
        for (completed, (id, value)) in entries.iter().enumerate() {
            let params = [RowValues::Text(id.clone()), RowValues::Blob(value.clone())];
            if let Err(err) = self.db.execute_sql(&sql, &params).await {
                if completed == 0 {
                    return Err(err);
                }
                return Err(MysqlMiddlewareError::PartialBatchFailure {
                    completed,
                    total,
                    source: Box::new(err),
                });
            }
        }
        Ok(())
    }

    /// # Errors
    /// Returns `ValidationError` for an empty table name.
    pub fn stream_ids(
        &self,
        table: &str,
        limit: Option<u64>,
    ) -> Result<RowStream<String>, MysqlMiddlewareError> {
        Ok(self.stream(table, &["id"], limit)?.map(|row| id_of(&row)))
    }

    /// # Errors
    /// Returns `ValidationError` for an empty table name.
    pub fn stream_values(
        &self,
        table: &str,
        limit: Option<u64>,
    ) -> Result<RowStream<Vec<u8>>, MysqlMiddlewareError> {
        Ok(self.stream(table, &["v"], limit)?.map(|mut row| value_of(&mut row)))
    }

    /// # Errors
    /// Returns `ValidationError` for an empty table name.
    pub fn stream_entries(
        &self,
        table: &str,
        limit: Option<u64>,
    ) -> Result<RowStream<KeyValueEntry>, MysqlMiddlewareError> {
        Ok(self.stream(table, &["id", "v"], limit)?.map(entry_of))
    }

    fn stream(
        &self,
        table: &str,
        columns: &[&str],
        limit: Option<u64>,
    ) -> Result<RowStream, MysqlMiddlewareError> {
        let q = DbQuery::new(table)
            .select(columns.iter().copied())
            .limit(limit.unwrap_or(0));
        self.db.stream_query(&q)
    }

    /// # Errors
    /// Returns the executor's error.
    pub async fn count(&self, table: &str) -> Result<u64, MysqlMiddlewareError> {
        let CompiledSql::Statement(sql) = compile_count(&DbQuery::new(table))? else {
            return Ok(0);
        };
        count_of(&self.db.run_sql(&sql).await?)
    }

    /// Not supported by this store.
    ///
    /// # Errors
    /// Always returns `Unimplemented`.
    #[allow(clippy::unused_async)]
    pub async fn increment(
        &self,
        table: &str,
        id: &str,
        _by: i64,
    ) -> Result<i64, MysqlMiddlewareError> {
        Err(MysqlMiddlewareError::Unimplemented(format!(
            "MysqlKeyValueDb::increment({}, {id})",
            escape_table_name(table)
        )))
    }
}

fn id_of(row: &RowObject) -> Result<String, MysqlMiddlewareError> {
    match row.get("id") {
        Some(RowValues::Text(id)) => Ok(id.clone()),
        Some(RowValues::Blob(bytes)) => String::from_utf8(bytes.clone())
            .map_err(|_| MysqlMiddlewareError::Other("key is not valid UTF-8".to_string())),
        Some(RowValues::Int(n)) => Ok(n.to_string()),
        _ => Err(MysqlMiddlewareError::Other("row has no id".to_string())),
    }
}

fn value_of(row: &mut RowObject) -> Result<Vec<u8>, MysqlMiddlewareError> {
    match row.remove("v") {
        Some(RowValues::Blob(bytes)) => Ok(bytes),
        Some(RowValues::Text(text)) => Ok(text.into_bytes()),
        _ => Err(MysqlMiddlewareError::Other("row has no value".to_string())),
    }
}

fn entry_of(mut row: RowObject) -> Result<KeyValueEntry, MysqlMiddlewareError> {
    Ok((id_of(&row)?, value_of(&mut row)?))
}
