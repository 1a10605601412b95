// MySQL module - the sqlx-backed executor
//
// - config: connection options, builder, and pool setup
// - params: binding `RowValues` to `?` placeholders
// - query: decoding rows into result sets with the boolean cast applied
// - executor: the `SqlExecutor` implementation

pub mod config;
pub mod executor;
mod params;
pub mod query;

pub use config::{ConfigAndPool, MysqlOptions, MysqlOptionsBuilder};
pub use executor::MysqlExecutor;
pub use query::build_result_set;
