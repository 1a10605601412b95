use async_trait::async_trait;
use futures_util::TryStreamExt;
use sqlx::Connection;
use sqlx::mysql::MySqlPool;

use super::params::bind_params;
use super::query::{build_result_set, column_metas, decode_row};
use crate::error::MysqlMiddlewareError;
use crate::executor::{ExecOutcome, SqlExecutor};
use crate::results::{ResultSet, object_from_cells};
use crate::stream::{DEFAULT_STREAM_BUFFER, RowSink, RowStream};
use crate::types::RowValues;

/// [`SqlExecutor`] over a sqlx MySQL pool.
///
/// Statements without parameters go over the text protocol unprepared, so inlined SQL of
/// any size does not fill the per-connection statement cache.
#[derive(Debug, Clone)]
pub struct MysqlExecutor {
    pool: MySqlPool,
    stream_buffer: usize,
}

impl MysqlExecutor {
    #[must_use]
    pub fn new(pool: MySqlPool) -> Self {
        Self {
            pool,
            stream_buffer: DEFAULT_STREAM_BUFFER,
        }
    }

    #[must_use]
    pub fn with_stream_buffer(mut self, rows: usize) -> Self {
        self.stream_buffer = rows.max(1);
        self
    }

    #[must_use]
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

#[async_trait]
impl SqlExecutor for MysqlExecutor {
    async fn select(&self, sql: &str) -> Result<ResultSet, MysqlMiddlewareError> {
        let rows = sqlx::raw_sql(sql).fetch_all(&self.pool).await?;
        build_result_set(&rows)
    }

    async fn execute(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<ExecOutcome, MysqlMiddlewareError> {
        let result = if params.is_empty() {
            sqlx::raw_sql(sql).execute(&self.pool).await?
        } else {
            bind_params(sqlx::query(sql), params)
                .execute(&self.pool)
                .await?
        };
        let insert_id = result.last_insert_id();
        Ok(ExecOutcome {
            affected_rows: result.rows_affected(),
            insert_id: (insert_id != 0).then_some(insert_id),
        })
    }

    fn stream(&self, sql: &str) -> RowStream {
        let (sink, stream) = RowStream::channel(self.stream_buffer);
        tokio::spawn(pump_rows(self.pool.clone(), sql.to_string(), sink));
        stream
    }

    async fn ping(&self) -> Result<(), MysqlMiddlewareError> {
        let mut conn = self.pool.acquire().await?;
        conn.ping().await?;
        Ok(())
    }
}

/// Read rows from the server only while the consumer is not paused.
async fn pump_rows(pool: MySqlPool, sql: String, mut sink: RowSink) {
    let mut rows = sqlx::raw_sql(&sql).fetch(&pool);
    let mut columns = None;

    loop {
        if !sink.wait_resumed().await {
            tracing::debug!("row stream cancelled by consumer");
            return;
        }
        let next = tokio::select! {
            biased;
            () = sink.cancelled() => return,
            next = rows.try_next() => next,
        };
        let row = match next {
            Ok(Some(row)) => row,
            Ok(None) => return,
            Err(e) => {
                sink.send(Err(e.into())).await;
                return;
            }
        };

        let (metas, names) = columns.get_or_insert_with(|| {
            let metas = column_metas(&row);
            let names = metas.iter().map(|m| m.name.clone()).collect::<Vec<_>>();
            (metas, names)
        });
        let item = decode_row(&row, metas).map(|values| object_from_cells(names, values));
        let failed = item.is_err();
        if !sink.send(item).await || failed {
            return;
        }
    }
}
