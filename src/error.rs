use thiserror::Error;

#[derive(Debug, Error)]
pub enum MysqlMiddlewareError {
    #[cfg(feature = "mysql")]
    #[error(transparent)]
    MysqlError(#[from] sqlx::Error),

    /// The abstract query, patch, or row batch cannot be compiled.
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    /// Statement `completed + 1` of a `total`-statement insert plan failed after at least
    /// one earlier statement succeeded. Statements `1..=completed` are not rolled back.
    #[error("Bulk insert failed after {completed} of {total} statements: {source}")]
    PartialBatchFailure {
        completed: usize,
        total: usize,
        #[source]
        source: Box<MysqlMiddlewareError>,
    },

    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("Unimplemented feature: {0}")]
    Unimplemented(String),

    #[error("Other database error: {0}")]
    Other(String),
}

impl MysqlMiddlewareError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        MysqlMiddlewareError::ValidationError(msg.into())
    }

    /// True when some statements of a split insert already committed.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        matches!(self, MysqlMiddlewareError::PartialBatchFailure { .. })
    }
}
