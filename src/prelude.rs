//! Everything needed to build queries, plan inserts, and run them through a facade.

pub use crate::compiler::{
    CompiledSql, compile_count, compile_delete, compile_select, compile_update,
};
pub use crate::db::{CreateTableOptions, DbConfig, KeyValueEntry, MysqlDb, MysqlKeyValueDb};
pub use crate::error::MysqlMiddlewareError;
pub use crate::escape::{escape_identifier, escape_list, escape_literal, escape_table_name};
pub use crate::executor::{ExecOutcome, SqlExecutor};
pub use crate::naming::{from_storage_name, to_storage_name};
pub use crate::planner::{InsertPlan, InsertPlanner, PlannerConfig, plan_insert};
pub use crate::query::{DbQuery, Filter, FilterOperator, FilterValue, Order};
pub use crate::results::{CustomDbRow, ResultSet};
pub use crate::schema::{FieldKind, SchemaField, SchemaOptions, TableSchema};
pub use crate::stream::RowStream;
pub use crate::types::{InsertVerb, RowObject, RowValues, SaveMethod};

#[cfg(feature = "mysql")]
pub use crate::mysql::{ConfigAndPool, MysqlExecutor, MysqlOptions, MysqlOptionsBuilder};
