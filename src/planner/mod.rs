//! Size-bounded bulk INSERT/REPLACE planning.
//!
//! A batch of rows becomes one statement when it fits under the wire limit
//! (`max_allowed_packet`), otherwise several statements packed greedily up to
//! `split_threshold` bytes of row tuples each. Executing the statements in order has the
//! same effect as one logical insert of every row; nothing is dropped or truncated.

use std::collections::HashSet;
use std::ops::Range;

use serde::Deserialize;

use crate::error::MysqlMiddlewareError;
use crate::types::{InsertVerb, RowObject};

mod render;

use render::{SEPARATOR, render_header, render_tuple, validate_row};

/// MySQL's default `max_allowed_packet`.
pub const DEFAULT_MAX_PACKET_SIZE: usize = 1_048_576;
/// Accumulated tuple bytes after which a split statement is closed.
pub const DEFAULT_SPLIT_THRESHOLD: usize = 800_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlannerConfig {
    /// Hard limit for a single statement, in bytes.
    pub max_packet_size: usize,
    /// Tuple bytes per statement once a batch has to be split.
    pub split_threshold: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            split_threshold: DEFAULT_SPLIT_THRESHOLD,
        }
    }
}

impl PlannerConfig {
    /// # Errors
    /// Returns `ConfigError` when either limit is zero or the threshold exceeds the packet size.
    pub fn validate(&self) -> Result<(), MysqlMiddlewareError> {
        if self.max_packet_size == 0 || self.split_threshold == 0 {
            return Err(MysqlMiddlewareError::ConfigError(
                "planner limits must be greater than zero".to_string(),
            ));
        }
        if self.split_threshold > self.max_packet_size {
            return Err(MysqlMiddlewareError::ConfigError(format!(
                "split threshold {} exceeds max packet size {}",
                self.split_threshold, self.max_packet_size
            )));
        }
        Ok(())
    }
}

/// One executable statement of an insert plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStatement {
    pub sql: String,
    /// Number of row tuples in `sql`.
    pub row_count: usize,
}

/// Ordered statements produced for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertPlan {
    pub statements: Vec<InsertStatement>,
}

impl InsertPlan {
    #[must_use]
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    #[must_use]
    pub fn total_rows(&self) -> usize {
        self.statements.iter().map(|s| s.row_count).sum()
    }

    pub fn sqls(&self) -> impl Iterator<Item = &str> {
        self.statements.iter().map(|s| s.sql.as_str())
    }

    #[must_use]
    pub fn into_sqls(self) -> Vec<String> {
        self.statements.into_iter().map(|s| s.sql).collect()
    }
}

/// Stateless planner carrying its size limits.
#[derive(Debug, Clone, Copy, Default)]
pub struct InsertPlanner {
    config: PlannerConfig,
}

impl InsertPlanner {
    /// # Errors
    /// Returns `ConfigError` if `config` fails [`PlannerConfig::validate`].
    pub fn new(config: PlannerConfig) -> Result<Self, MysqlMiddlewareError> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Plan `verb INTO table` statements for `rows`.
    ///
    /// Rows need not share one schema: each statement lists the union of the fields of the
    /// rows it carries, and a row missing one of those fields gets `NULL` for it.
    ///
    /// # Errors
    /// Returns `ValidationError` for an empty table name, a field name that cannot be
    /// mapped, or a structured (JSON object/array) value that was not serialized first.
    pub fn plan(
        &self,
        table: &str,
        rows: &[RowObject],
        verb: InsertVerb,
    ) -> Result<InsertPlan, MysqlMiddlewareError> {
        if rows.is_empty() {
            return Ok(InsertPlan::default());
        }
        if table.trim().is_empty() {
            return Err(MysqlMiddlewareError::validation("insert table must not be empty"));
        }
        for row in rows {
            validate_row(row)?;
        }

        let columns = field_union(rows);
        let header = render_header(verb, table, &columns)?;
        let tuples: Vec<String> = rows.iter().map(|row| render_tuple(row, &columns)).collect();

        let tuple_bytes: usize = tuples.iter().map(String::len).sum();
        let total_bytes = header.len() + tuple_bytes + SEPARATOR.len() * (tuples.len() - 1);
        if total_bytes <= self.config.max_packet_size {
            return Ok(InsertPlan {
                statements: vec![assemble(&header, &tuples)],
            });
        }

        let chunks = pack(&tuples, self.config.split_threshold);
        let mut statements = Vec::with_capacity(chunks.len());
        for range in chunks {
            let chunk_rows = &rows[range.clone()];
            let chunk_columns = chunk_union(&columns, chunk_rows);
            let statement = if chunk_columns.len() == columns.len() {
                assemble(&header, &tuples[range])
            } else {
                let chunk_header = render_header(verb, table, &chunk_columns)?;
                let chunk_tuples: Vec<String> = chunk_rows
                    .iter()
                    .map(|row| render_tuple(row, &chunk_columns))
                    .collect();
                assemble(&chunk_header, &chunk_tuples)
            };
            if statement.sql.len() > self.config.max_packet_size {
                tracing::warn!(
                    table,
                    bytes = statement.sql.len(),
                    max_packet_size = self.config.max_packet_size,
                    "single row exceeds the packet size; emitting it alone"
                );
            }
            statements.push(statement);
        }

        tracing::info!(
            table,
            rows = rows.len(),
            bytes = total_bytes,
            statements = statements.len(),
            "split bulk {} into multiple statements",
            verb.as_sql()
        );
        Ok(InsertPlan { statements })
    }
}

/// Plan with the default limits.
///
/// # Errors
/// See [`InsertPlanner::plan`].
pub fn plan_insert(
    table: &str,
    rows: &[RowObject],
    verb: InsertVerb,
) -> Result<InsertPlan, MysqlMiddlewareError> {
    InsertPlanner::default().plan(table, rows, verb)
}

/// Field names in first-seen order across `rows`.
fn field_union(rows: &[RowObject]) -> Vec<&str> {
    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    for row in rows {
        for key in row.keys() {
            if seen.insert(key) {
                columns.push(key);
            }
        }
    }
    columns
}

/// Subset of `columns` (kept in order) that appears in at least one of `rows`.
fn chunk_union<'a>(columns: &[&'a str], rows: &[RowObject]) -> Vec<&'a str> {
    let present: HashSet<&str> = rows.iter().flat_map(RowObject::keys).collect();
    columns
        .iter()
        .copied()
        .filter(|c| present.contains(c))
        .collect()
}

/// Greedy packing: close a chunk when the next tuple would push it past `threshold`.
/// A tuple larger than `threshold` still gets a chunk of its own.
fn pack(tuples: &[String], threshold: usize) -> Vec<Range<usize>> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut acc = 0;
    for (i, tuple) in tuples.iter().enumerate() {
        let added = if i > start {
            tuple.len() + SEPARATOR.len()
        } else {
            tuple.len()
        };
        if i > start && acc + added > threshold {
            chunks.push(start..i);
            start = i;
            acc = tuple.len();
        } else {
            acc += added;
        }
    }
    chunks.push(start..tuples.len());
    chunks
}

fn assemble(header: &str, tuples: &[String]) -> InsertStatement {
    let body: usize = tuples.iter().map(String::len).sum();
    let mut sql = String::with_capacity(header.len() + body + SEPARATOR.len() * tuples.len());
    sql.push_str(header);
    for (i, tuple) in tuples.iter().enumerate() {
        if i > 0 {
            sql.push_str(SEPARATOR);
        }
        sql.push_str(tuple);
    }
    InsertStatement {
        sql,
        row_count: tuples.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RowValues;

    fn item(id: usize) -> RowObject {
        RowObject::new()
            .with("id", format!("id{id}"))
            .with("k1", format!("v{id}"))
            .with("even", id % 2 == 0)
    }

    #[test]
    fn zero_rows_zero_statements() {
        let plan = plan_insert("t", &[], InsertVerb::Insert).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn small_batch_is_one_statement() {
        let rows: Vec<_> = (1..=3).map(item).collect();
        let plan = plan_insert("TEST_TABLE", &rows, InsertVerb::Insert).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(
            plan.statements[0].sql,
            "INSERT INTO `TEST_TABLE` (`id`, `k1`, `even`) VALUES \
             ('id1', 'v1', false), ('id2', 'v2', true), ('id3', 'v3', false)"
        );
        assert_eq!(plan.total_rows(), 3);
    }

    #[test]
    fn replace_verb_and_missing_fields() {
        let rows = vec![
            RowObject::new().with("id", "a").with("x", 1_i64),
            RowObject::new().with("id", "b").with("y.z", 2_i64),
        ];
        let plan = plan_insert("t", &rows, InsertVerb::Replace).unwrap();
        assert_eq!(
            plan.statements[0].sql,
            "REPLACE INTO `t` (`id`, `x`, `y_dot_z`) VALUES ('a', 1, NULL), ('b', NULL, 2)"
        );
    }

    #[test]
    fn large_batch_is_split_without_losing_rows() {
        let rows: Vec<_> = (0..10)
            .map(|i| item(i).with("lng", "xxx".repeat(80_000)))
            .collect();
        let plan = plan_insert("TEST_TABLE", &rows, InsertVerb::Insert).unwrap();
        assert!(plan.len() > 1);
        assert_eq!(plan.total_rows(), rows.len());
        for statement in &plan.statements {
            assert!(statement.sql.len() <= DEFAULT_MAX_PACKET_SIZE);
        }
        // ids appear exactly once, in order
        let joined: String = plan.sqls().collect::<Vec<_>>().join("\n");
        let mut last = 0;
        for i in 0..10 {
            let needle = format!("('id{i}'");
            assert_eq!(joined.matches(&needle).count(), 1);
            let pos = joined.find(&needle).unwrap();
            assert!(pos >= last);
            last = pos;
        }
    }

    #[test]
    fn oversized_single_row_is_emitted_alone() {
        let planner = InsertPlanner::new(PlannerConfig {
            max_packet_size: 1_000,
            split_threshold: 500,
        })
        .unwrap();
        let rows = vec![
            item(1),
            item(2).with("big", "y".repeat(2_000)),
            item(3),
        ];
        let plan = planner.plan("t", &rows, InsertVerb::Insert).unwrap();
        assert_eq!(plan.len(), 3);
        assert_eq!(plan.statements[1].row_count, 1);
        assert!(plan.statements[1].sql.len() > 1_000);
        assert_eq!(plan.total_rows(), 3);
    }

    #[test]
    fn split_statements_use_their_own_columns() {
        let planner = InsertPlanner::new(PlannerConfig {
            max_packet_size: 80,
            split_threshold: 40,
        })
        .unwrap();
        let rows = vec![
            RowObject::new().with("id", "a").with("only_first", "x".repeat(30)),
            RowObject::new().with("id", "b").with("other", 1_i64),
        ];
        let plan = planner.plan("t", &rows, InsertVerb::Insert).unwrap();
        assert_eq!(plan.len(), 2);
        assert!(plan.statements[0].sql.starts_with("INSERT INTO `t` (`id`, `only_first`) VALUES"));
        assert_eq!(plan.statements[1].sql, "INSERT INTO `t` (`id`, `other`) VALUES ('b', 1)");
    }

    #[test]
    fn pack_respects_threshold() {
        let tuples: Vec<String> = (0..6).map(|_| "x".repeat(10)).collect();
        // 10 + 12 + 12 = 34 fits in 35; a fourth would not
        assert_eq!(pack(&tuples, 35), vec![0..3, 3..6]);
        assert_eq!(pack(&tuples, 5), (0..6).map(|i| i..i + 1).collect::<Vec<_>>());
    }

    #[test]
    fn structured_values_are_rejected() {
        let rows = vec![RowObject::new().with("id", "a").with(
            "meta",
            RowValues::JSON(serde_json::json!({"k": 1})),
        )];
        let err = plan_insert("t", &rows, InsertVerb::Insert).unwrap_err();
        assert!(matches!(err, MysqlMiddlewareError::ValidationError(_)));

        let rows: Vec<_> = rows.into_iter().map(RowObject::stringify_structured).collect();
        let plan = plan_insert("t", &rows, InsertVerb::Insert).unwrap();
        assert_eq!(
            plan.statements[0].sql,
            r#"INSERT INTO `t` (`id`, `meta`) VALUES ('a', '{\"k\":1}')"#
        );
    }

    #[test]
    fn config_validation() {
        assert!(InsertPlanner::new(PlannerConfig {
            max_packet_size: 10,
            split_threshold: 20,
        })
        .is_err());
        assert!(PlannerConfig::default().validate().is_ok());
    }
}
