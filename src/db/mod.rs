//! Row-object facades over an [`SqlExecutor`].
//!
//! [`MysqlDb`] turns abstract queries and row batches into SQL with the compiler and the
//! insert planner, runs them, and hands back reverse-mapped row objects.
//! [`MysqlKeyValueDb`] stores opaque byte values under string ids in `(id, v)` tables.

use serde::Deserialize;

use crate::compiler::{
    COUNT_ALIAS, CompiledSql, compile_count, compile_delete, compile_select, compile_update,
};
use crate::error::MysqlMiddlewareError;
use crate::escape::escape_table_name;
use crate::executor::{ExecOutcome, SqlExecutor};
use crate::planner::{InsertPlanner, PlannerConfig};
use crate::query::DbQuery;
use crate::results::ResultSet;
use crate::schema::{
    SchemaOptions, TableSchema, TableStats, table_schema_to_ddl, table_stats_to_schema,
};
use crate::stream::RowStream;
use crate::types::{InsertVerb, RowObject, RowValues, SaveMethod};

mod key_value;

pub use key_value::{KeyValueEntry, MysqlKeyValueDb};

/// Facade settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DbConfig {
    /// Log every statement at debug level, and failed statements at error level.
    pub log_sql: bool,
    /// Log connection checks and streams that hold a connection open, at debug level.
    pub debug_connections: bool,
    pub planner: PlannerConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateTableOptions {
    /// Drop the table first. Destroys its data.
    pub drop_if_exists: bool,
    pub schema: SchemaOptions,
}

/// Row-object database over MySQL.
#[derive(Debug, Clone)]
pub struct MysqlDb<E> {
    executor: E,
    config: DbConfig,
    planner: InsertPlanner,
}

impl<E: SqlExecutor> MysqlDb<E> {
    /// # Errors
    /// Returns `ConfigError` if the planner limits in `config` are invalid.
    pub fn new(executor: E, config: DbConfig) -> Result<Self, MysqlMiddlewareError> {
        Ok(Self {
            planner: InsertPlanner::new(config.planner)?,
            executor,
            config,
        })
    }

    #[must_use]
    pub fn executor(&self) -> &E {
        &self.executor
    }

    #[must_use]
    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    /// # Errors
    /// Returns the executor's error when the server is unreachable.
    pub async fn ping(&self) -> Result<(), MysqlMiddlewareError> {
        let result = self.executor.ping().await;
        if self.config.debug_connections {
            match &result {
                Ok(()) => tracing::debug!("connection check ok"),
                Err(e) => tracing::debug!(error = %e, "connection check failed"),
            }
        }
        result
    }

    /// Run a row-returning statement as-is.
    ///
    /// # Errors
    /// Returns the executor's error.
    pub async fn run_sql(&self, sql: &str) -> Result<ResultSet, MysqlMiddlewareError> {
        if self.config.log_sql {
            tracing::debug!("{sql}");
        }
        self.executor
            .select(sql)
            .await
            .inspect_err(|e| self.log_failure(sql, e))
    }

    /// Run a statement that returns no rows, binding `params` to its `?` placeholders.
    ///
    /// # Errors
    /// Returns the executor's error.
    pub async fn execute_sql(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<ExecOutcome, MysqlMiddlewareError> {
        if self.config.log_sql {
            tracing::debug!(params = params.len(), "{sql}");
        }
        self.executor
            .execute(sql, params)
            .await
            .inspect_err(|e| self.log_failure(sql, e))
    }

    fn log_failure(&self, sql: &str, err: &MysqlMiddlewareError) {
        if self.config.log_sql {
            tracing::error!(error = %err, "statement failed: {sql}");
        }
    }

    /// Rows matching `q`, with field names mapped back and absent cells removed.
    ///
    /// A query whose projection is an empty list yields one empty object per matching row.
    ///
    /// # Errors
    /// Returns `ValidationError` if `q` cannot be compiled, or the executor's error.
    pub async fn run_query(&self, q: &DbQuery) -> Result<Vec<RowObject>, MysqlMiddlewareError> {
        let CompiledSql::Statement(sql) = compile_select(q)? else {
            return Ok(Vec::new());
        };
        let result_set = self.run_sql(&sql).await?;
        if q.selects_nothing() {
            return Ok(vec![RowObject::new(); result_set.results.len()]);
        }
        Ok(result_set.into_objects())
    }

    /// Number of rows matching the filters of `q`.
    ///
    /// # Errors
    /// Returns `ValidationError` if `q` cannot be compiled, the executor's error, or
    /// `Other` when the server returns no count.
    pub async fn run_query_count(&self, q: &DbQuery) -> Result<u64, MysqlMiddlewareError> {
        let CompiledSql::Statement(sql) = compile_count(q)? else {
            return Ok(0);
        };
        let result_set = self.run_sql(&sql).await?;
        count_of(&result_set)
    }

    /// Stream the rows matching `q`. Pausing the stream stops reading from the server.
    ///
    /// # Errors
    /// Returns `ValidationError` if `q` cannot be compiled.
    pub fn stream_query(&self, q: &DbQuery) -> Result<RowStream, MysqlMiddlewareError> {
        let CompiledSql::Statement(sql) = compile_select(q)? else {
            return Ok(RowStream::empty());
        };
        if self.config.log_sql {
            tracing::debug!("stream: {sql}");
        }
        if self.config.debug_connections {
            tracing::debug!(table = %q.table, "opening streaming connection");
        }
        let stream = self.executor.stream(&sql);
        if q.selects_nothing() {
            return Ok(stream.map(|_| Ok(RowObject::new())));
        }
        Ok(stream)
    }

    /// # Errors
    /// See [`MysqlDb::run_query`].
    pub async fn get_by_ids<S: AsRef<str>>(
        &self,
        table: &str,
        ids: &[S],
    ) -> Result<Vec<RowObject>, MysqlMiddlewareError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.run_query(&by_ids(table, ids)).await
    }

    /// Save `rows` into `table`.
    ///
    /// JSON objects and arrays are serialized to text first. `Insert` and `Upsert` become
    /// one or more size-bounded `INSERT`/`REPLACE` statements; `Update` issues one `UPDATE`
    /// per row keyed by its `id` field. Returns the total affected row count.
    ///
    /// # Errors
    /// Returns `ValidationError` before anything runs if a row cannot be rendered. If a
    /// statement after the first fails, returns `PartialBatchFailure`: the earlier statements
    /// are committed and are not rolled back.
    pub async fn save_batch(
        &self,
        table: &str,
        rows: Vec<RowObject>,
        method: SaveMethod,
    ) -> Result<u64, MysqlMiddlewareError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let rows: Vec<RowObject> = rows.into_iter().map(RowObject::stringify_structured).collect();

        let statements = match method {
            SaveMethod::Insert => self.planner.plan(table, &rows, InsertVerb::Insert)?.into_sqls(),
            SaveMethod::Upsert => self.planner.plan(table, &rows, InsertVerb::Replace)?.into_sqls(),
            SaveMethod::Update => update_statements(table, rows)?,
        };
        self.execute_in_order(statements).await
    }

    /// Run statements one after another, stopping at the first failure.
    async fn execute_in_order(&self, statements: Vec<String>) -> Result<u64, MysqlMiddlewareError> {
        let total = statements.len();
        let mut affected = 0;
        for (completed, sql) in statements.iter().enumerate() {
            match self.execute_sql(sql, &[]).await {
                Ok(outcome) => affected += outcome.affected_rows,
                Err(err) if completed == 0 => return Err(err),
                Err(err) => {
                    tracing::error!(completed, total, "batch stopped after a failed statement");
                    return Err(MysqlMiddlewareError::PartialBatchFailure {
                        completed,
                        total,
                        source: Box::new(err),
                    });
                }
            }
        }
        Ok(affected)
    }

    /// Apply `patch` to every row matching `q`. Returns the affected row count.
    ///
    /// # Errors
    /// Returns `ValidationError` for an empty patch or an uncompilable query, or the
    /// executor's error.
    pub async fn patch_by_query(
        &self,
        q: &DbQuery,
        patch: &RowObject,
    ) -> Result<u64, MysqlMiddlewareError> {
        let patch = patch.clone().stringify_structured();
        let CompiledSql::Statement(sql) = compile_update(q, &patch)? else {
            return Ok(0);
        };
        Ok(self.execute_sql(&sql, &[]).await?.affected_rows)
    }

    /// # Errors
    /// See [`MysqlDb::delete_by_query`].
    pub async fn delete_by_ids<S: AsRef<str>>(
        &self,
        table: &str,
        ids: &[S],
    ) -> Result<u64, MysqlMiddlewareError> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.delete_by_query(&by_ids(table, ids)).await
    }

    /// Delete every row matching `q`. Returns the affected row count.
    ///
    /// # Errors
    /// Returns `ValidationError` if `q` cannot be compiled, or the executor's error.
    pub async fn delete_by_query(&self, q: &DbQuery) -> Result<u64, MysqlMiddlewareError> {
        let CompiledSql::Statement(sql) = compile_delete(q)? else {
            return Ok(0);
        };
        Ok(self.execute_sql(&sql, &[]).await?.affected_rows)
    }

    /// Create a table for `schema`.
    ///
    /// # Errors
    /// Returns `ValidationError` if the DDL cannot be rendered, or the executor's error.
    pub async fn create_table(
        &self,
        schema: &TableSchema,
        opts: &CreateTableOptions,
    ) -> Result<(), MysqlMiddlewareError> {
        let ddl = table_schema_to_ddl(schema, &opts.schema)?;
        if opts.drop_if_exists {
            self.drop_table(&schema.table).await?;
        }
        self.execute_sql(&ddl, &[]).await?;
        Ok(())
    }

    /// Drop `table` if it exists.
    ///
    /// # Errors
    /// Returns `ValidationError` for an empty table name, or the executor's error.
    pub async fn drop_table(&self, table: &str) -> Result<(), MysqlMiddlewareError> {
        let sql = format!("DROP TABLE IF EXISTS {}", checked_table(table)?);
        self.execute_sql(&sql, &[]).await?;
        Ok(())
    }

    /// Names of the tables in the current database.
    ///
    /// # Errors
    /// Returns the executor's error.
    pub async fn get_tables(&self) -> Result<Vec<String>, MysqlMiddlewareError> {
        let result_set = self.run_sql("SHOW TABLES").await?;
        Ok(result_set
            .results
            .iter()
            .filter_map(|row| match row.get_by_index(0)? {
                RowValues::Text(name) => Some(name.clone()),
                RowValues::Blob(bytes) => String::from_utf8(bytes.clone()).ok(),
                _ => None,
            })
            .filter(|name| !name.is_empty())
            .collect())
    }

    /// Read the schema of `table` back from `DESCRIBE`.
    ///
    /// # Errors
    /// Returns `SchemaError` for a column type with no field kind, or the executor's error.
    pub async fn get_table_schema(&self, table: &str) -> Result<TableSchema, MysqlMiddlewareError> {
        let sql = format!("DESCRIBE {}", checked_table(table)?);
        let result_set = self.run_sql(&sql).await?;
        let stats = result_set
            .results
            .iter()
            .map(TableStats::from_row)
            .collect::<Result<Vec<_>, _>>()?;
        table_stats_to_schema(table, &stats)
    }
}

fn by_ids<S: AsRef<str>>(table: &str, ids: &[S]) -> DbQuery {
    DbQuery::new(table).filter_in("id", ids.iter().map(|id| id.as_ref().to_string()))
}

fn checked_table(table: &str) -> Result<String, MysqlMiddlewareError> {
    if table.trim().is_empty() {
        return Err(MysqlMiddlewareError::validation("table name must not be empty"));
    }
    Ok(escape_table_name(table))
}

fn count_of(result_set: &ResultSet) -> Result<u64, MysqlMiddlewareError> {
    let value = result_set
        .results
        .first()
        .and_then(|row| row.get(COUNT_ALIAS))
        .ok_or_else(|| MysqlMiddlewareError::Other("count query returned no rows".to_string()))?;
    match value {
        RowValues::Int(n) => u64::try_from(*n)
            .map_err(|_| MysqlMiddlewareError::Other(format!("negative row count {n}"))),
        RowValues::Text(s) => s
            .parse()
            .map_err(|_| MysqlMiddlewareError::Other(format!("invalid row count `{s}`"))),
        other => Err(MysqlMiddlewareError::Other(format!("invalid row count {other:?}"))),
    }
}

/// One `UPDATE ... WHERE id = ...` per row. Rows without an `id` are rejected; rows with
/// nothing but an `id` have nothing to update and are skipped.
fn update_statements(
    table: &str,
    rows: Vec<RowObject>,
) -> Result<Vec<String>, MysqlMiddlewareError> {
    let mut statements = Vec::with_capacity(rows.len());
    for mut row in rows {
        let id = row
            .remove("id")
            .filter(|id| !id.is_null())
            .ok_or_else(|| MysqlMiddlewareError::validation("every updated row needs an id"))?;
        if row.is_empty() {
            continue;
        }
        let q = DbQuery::new(table).filter_eq("id", id);
        if let Some(sql) = compile_update(&q, &row)?.into_sql() {
            statements.push(sql);
        }
    }
    Ok(statements)
}
