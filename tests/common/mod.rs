#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mysql_middleware::prelude::*;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::writer::MakeWriter;

/// In-memory executor that records every statement and replays canned results.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    executed: Mutex<Vec<(String, Vec<RowValues>)>>,
    selected: Mutex<Vec<String>>,
    streamed: Mutex<Vec<String>>,
    select_results: Mutex<VecDeque<ResultSet>>,
    stream_rows: Mutex<Vec<RowObject>>,
    /// Zero-based index of the `execute` call that fails.
    fail_execute_at: Option<usize>,
}

impl RecordingExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_at(index: usize) -> Arc<Self> {
        Arc::new(Self {
            fail_execute_at: Some(index),
            ..Self::default()
        })
    }

    pub fn push_select(&self, result: ResultSet) {
        self.select_results.lock().unwrap().push_back(result);
    }

    pub fn set_stream_rows(&self, rows: Vec<RowObject>) {
        *self.stream_rows.lock().unwrap() = rows;
    }

    pub fn executed(&self) -> Vec<(String, Vec<RowValues>)> {
        self.executed.lock().unwrap().clone()
    }

    pub fn executed_sql(&self) -> Vec<String> {
        self.executed().into_iter().map(|(sql, _)| sql).collect()
    }

    pub fn selected(&self) -> Vec<String> {
        self.selected.lock().unwrap().clone()
    }

    pub fn streamed(&self) -> Vec<String> {
        self.streamed.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.executed.lock().unwrap().len()
            + self.selected.lock().unwrap().len()
            + self.streamed.lock().unwrap().len()
    }
}

#[async_trait]
impl SqlExecutor for RecordingExecutor {
    async fn select(&self, sql: &str) -> Result<ResultSet, MysqlMiddlewareError> {
        self.selected.lock().unwrap().push(sql.to_string());
        Ok(self
            .select_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }

    async fn execute(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<ExecOutcome, MysqlMiddlewareError> {
        let mut executed = self.executed.lock().unwrap();
        let index = executed.len();
        executed.push((sql.to_string(), params.to_vec()));
        if self.fail_execute_at == Some(index) {
            return Err(MysqlMiddlewareError::ExecutionError(format!(
                "statement {index} rejected"
            )));
        }
        Ok(ExecOutcome::affected(1))
    }

    fn stream(&self, sql: &str) -> RowStream {
        self.streamed.lock().unwrap().push(sql.to_string());
        RowStream::from_rows(self.stream_rows.lock().unwrap().clone())
    }

    async fn ping(&self) -> Result<(), MysqlMiddlewareError> {
        Ok(())
    }
}

/// A result set with the given storage column names and rows.
pub fn result_set(columns: &[&str], rows: Vec<Vec<Option<RowValues>>>) -> ResultSet {
    let mut rs = ResultSet::with_capacity(rows.len());
    rs.set_column_names(Arc::new(columns.iter().map(|c| c.to_string()).collect()));
    for row in rows {
        rs.add_row_values(row);
    }
    rs
}

pub fn db(executor: &Arc<RecordingExecutor>) -> MysqlDb<Arc<RecordingExecutor>> {
    MysqlDb::new(executor.clone(), DbConfig::default()).unwrap()
}

/// Formatted log lines collected in memory.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Capture logs on this thread until the guard is dropped.
pub fn capture_logs(level: tracing::Level) -> (DefaultGuard, CapturedLogs) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_max_level(level)
        .with_ansi(false)
        .without_time()
        .finish();
    (tracing::subscriber::set_default(subscriber), logs)
}

pub fn with_captured_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let (guard, logs) = capture_logs(tracing::Level::INFO);
    let out = f();
    drop(guard);
    (out, logs.text())
}
