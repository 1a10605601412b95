use std::time::Duration;

use serde::Deserialize;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};

use super::executor::MysqlExecutor;
use crate::db::{DbConfig, MysqlDb, MysqlKeyValueDb};
use crate::error::MysqlMiddlewareError;
use crate::planner::PlannerConfig;
use crate::stream::DEFAULT_STREAM_BUFFER;

/// Options for configuring a MySQL pool.
///
/// Deserializable from the JSON an adapter factory receives:
///
/// ```rust
/// use mysql_middleware::prelude::*;
///
/// let opts = MysqlOptions::from_json(
///     r#"{"host":"localhost","user":"root","password":"secret","database":"app","logSql":true}"#,
/// )
/// .unwrap();
/// assert_eq!(opts.port, 3306);
/// assert!(opts.log_sql);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MysqlOptions {
    pub host: Option<String>,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub charset: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    /// Rows buffered per streamed query.
    pub stream_buffer: usize,
    /// Log every statement at debug level.
    pub log_sql: bool,
    /// Log pool connect/release events at debug level.
    pub debug_connections: bool,
    pub planner: PlannerConfig,
}

impl Default for MysqlOptions {
    fn default() -> Self {
        Self {
            host: None,
            port: 3306,
            user: None,
            password: None,
            database: None,
            charset: "utf8mb4".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 30,
            stream_buffer: DEFAULT_STREAM_BUFFER,
            log_sql: false,
            debug_connections: false,
            planner: PlannerConfig::default(),
        }
    }
}

impl MysqlOptions {
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            host: Some(host.into()),
            user: Some(user.into()),
            database: Some(database.into()),
            ..Self::default()
        }
    }

    /// Parse options from JSON; missing fields take their defaults.
    ///
    /// # Errors
    /// Returns `ConfigError` if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self, MysqlMiddlewareError> {
        serde_json::from_str(json)
            .map_err(|e| MysqlMiddlewareError::ConfigError(format!("invalid MySQL options: {e}")))
    }

    /// Check that every required field is present and limits are sane.
    ///
    /// # Errors
    /// Returns `ConfigError` naming the first problem found.
    pub fn validate(&self) -> Result<(), MysqlMiddlewareError> {
        if self.host.as_deref().is_none_or(str::is_empty) {
            return Err(MysqlMiddlewareError::ConfigError("host is required".to_string()));
        }
        if self.user.as_deref().is_none_or(str::is_empty) {
            return Err(MysqlMiddlewareError::ConfigError("user is required".to_string()));
        }
        if self.database.as_deref().is_none_or(str::is_empty) {
            return Err(MysqlMiddlewareError::ConfigError(
                "database is required".to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(MysqlMiddlewareError::ConfigError(
                "max_connections must be greater than zero".to_string(),
            ));
        }
        self.planner.validate()
    }

    /// Settings the DB facade needs from these options.
    #[must_use]
    pub fn db_config(&self) -> DbConfig {
        DbConfig {
            log_sql: self.log_sql,
            debug_connections: self.debug_connections,
            planner: self.planner,
        }
    }

    fn connect_options(&self) -> MySqlConnectOptions {
        let mut opts = MySqlConnectOptions::new()
            .host(self.host.as_deref().unwrap_or_default())
            .port(self.port)
            .username(self.user.as_deref().unwrap_or_default())
            .database(self.database.as_deref().unwrap_or_default())
            .charset(&self.charset);
        if let Some(password) = &self.password {
            opts = opts.password(password);
        }
        opts
    }
}

/// Fluent builder for MySQL options.
#[derive(Debug, Clone)]
pub struct MysqlOptionsBuilder {
    opts: MysqlOptions,
}

impl MysqlOptionsBuilder {
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            opts: MysqlOptions::new(host, user, database),
        }
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.opts.port = port;
        self
    }

    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.opts.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.opts.charset = charset.into();
        self
    }

    #[must_use]
    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.opts.max_connections = max_connections;
        self
    }

    #[must_use]
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.opts.acquire_timeout_secs = timeout.as_secs();
        self
    }

    #[must_use]
    pub fn stream_buffer(mut self, rows: usize) -> Self {
        self.opts.stream_buffer = rows;
        self
    }

    #[must_use]
    pub fn log_sql(mut self, enabled: bool) -> Self {
        self.opts.log_sql = enabled;
        self
    }

    #[must_use]
    pub fn debug_connections(mut self, enabled: bool) -> Self {
        self.opts.debug_connections = enabled;
        self
    }

    #[must_use]
    pub fn planner(mut self, planner: PlannerConfig) -> Self {
        self.opts.planner = planner;
        self
    }

    #[must_use]
    pub fn finish(self) -> MysqlOptions {
        self.opts
    }

    /// Build a `ConfigAndPool` for MySQL.
    ///
    /// # Errors
    ///
    /// Returns `MysqlMiddlewareError` if validation or pool creation fails.
    pub async fn build(self) -> Result<ConfigAndPool, MysqlMiddlewareError> {
        ConfigAndPool::new_mysql(self.finish()).await
    }
}

/// A connected pool plus the options it was built from.
///
/// Constructed once at startup and handed to every consumer; there is no hidden global pool.
#[derive(Debug, Clone)]
pub struct ConfigAndPool {
    pub pool: MySqlPool,
    pub options: MysqlOptions,
}

impl ConfigAndPool {
    #[must_use]
    pub fn mysql_builder(
        host: impl Into<String>,
        user: impl Into<String>,
        database: impl Into<String>,
    ) -> MysqlOptionsBuilder {
        MysqlOptionsBuilder::new(host, user, database)
    }

    /// Asynchronous initializer for `ConfigAndPool` with MySQL using a sqlx pool.
    ///
    /// # Errors
    /// Returns `MysqlMiddlewareError::ConfigError` if required options are missing or
    /// `MysqlMiddlewareError::ConnectionError` if the pool cannot connect.
    pub async fn new_mysql(opts: MysqlOptions) -> Result<Self, MysqlMiddlewareError> {
        opts.validate()?;

        let mut pool_opts = MySqlPoolOptions::new()
            .max_connections(opts.max_connections)
            .acquire_timeout(Duration::from_secs(opts.acquire_timeout_secs));

        if opts.debug_connections {
            pool_opts = pool_opts
                .after_connect(|_conn, meta| {
                    Box::pin(async move {
                        tracing::debug!(age = ?meta.age, "mysql connection opened");
                        Ok(())
                    })
                })
                .after_release(|_conn, meta| {
                    Box::pin(async move {
                        tracing::debug!(
                            age = ?meta.age,
                            idle_for = ?meta.idle_for,
                            "mysql connection released"
                        );
                        Ok(true)
                    })
                });
        }

        let pool = pool_opts
            .connect_with(opts.connect_options())
            .await
            .map_err(|e| {
                MysqlMiddlewareError::ConnectionError(format!("Failed to create MySQL pool: {e}"))
            })?;

        tracing::debug!(
            host = opts.host.as_deref().unwrap_or_default(),
            database = opts.database.as_deref().unwrap_or_default(),
            max_connections = opts.max_connections,
            "mysql pool ready"
        );

        Ok(ConfigAndPool {
            pool,
            options: opts,
        })
    }

    #[must_use]
    pub fn executor(&self) -> MysqlExecutor {
        MysqlExecutor::new(self.pool.clone()).with_stream_buffer(self.options.stream_buffer)
    }

    /// Row-object facade over this pool.
    ///
    /// # Errors
    /// Returns `ConfigError` if the planner limits are invalid.
    pub fn db(&self) -> Result<MysqlDb<MysqlExecutor>, MysqlMiddlewareError> {
        MysqlDb::new(self.executor(), self.options.db_config())
    }

    /// Key-value facade over this pool.
    ///
    /// # Errors
    /// Returns `ConfigError` if the planner limits are invalid.
    pub fn key_value_db(&self) -> Result<MysqlKeyValueDb<MysqlExecutor>, MysqlMiddlewareError> {
        MysqlKeyValueDb::new(self.executor(), self.options.db_config())
    }

    /// Close every connection. Later queries on this pool fail.
    pub async fn close(&self) {
        self.pool.close().await;
        if self.options.debug_connections {
            tracing::debug!("mysql pool closed");
        }
    }
}
