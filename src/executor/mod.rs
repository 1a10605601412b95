//! The seam between SQL generation and a live connection.
//!
//! [`crate::db::MysqlDb`] and [`crate::db::MysqlKeyValueDb`] only talk to an
//! [`SqlExecutor`], so they can run against the sqlx-backed
//! [`crate::mysql::MysqlExecutor`] or an in-memory recorder in tests.

use async_trait::async_trait;

use crate::error::MysqlMiddlewareError;
use crate::results::ResultSet;
use crate::stream::RowStream;
use crate::types::RowValues;

/// Outcome of a statement that does not return rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    pub affected_rows: u64,
    /// Last generated `AUTO_INCREMENT` value, when the statement produced one.
    pub insert_id: Option<u64>,
}

impl ExecOutcome {
    #[must_use]
    pub fn affected(affected_rows: u64) -> Self {
        Self {
            affected_rows,
            insert_id: None,
        }
    }
}

#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Run a row-returning statement. Boolean columns are already coerced and
    /// column names are still in storage form.
    async fn select(&self, sql: &str) -> Result<ResultSet, MysqlMiddlewareError>;

    /// Run a statement that returns no rows. `params` bind to `?` placeholders in order;
    /// pass an empty slice for fully inlined SQL.
    async fn execute(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<ExecOutcome, MysqlMiddlewareError>;

    /// Stream the rows of a statement as reverse-mapped row objects.
    fn stream(&self, sql: &str) -> RowStream;

    /// Check that the server is reachable.
    async fn ping(&self) -> Result<(), MysqlMiddlewareError>;
}

#[async_trait]
impl<E: SqlExecutor + ?Sized> SqlExecutor for std::sync::Arc<E> {
    async fn select(&self, sql: &str) -> Result<ResultSet, MysqlMiddlewareError> {
        (**self).select(sql).await
    }

    async fn execute(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<ExecOutcome, MysqlMiddlewareError> {
        (**self).execute(sql, params).await
    }

    fn stream(&self, sql: &str) -> RowStream {
        (**self).stream(sql)
    }

    async fn ping(&self) -> Result<(), MysqlMiddlewareError> {
        (**self).ping().await
    }
}
