//! Compile backend-agnostic queries into MySQL statements and run them.
//!
//! ```rust
//! use mysql_middleware::prelude::*;
//!
//! let q = DbQuery::new("TBL1")
//!     .filter_in("a", ["a1", "a2", "a3"])
//!     .order("created", true)
//!     .limit(10);
//! let sql = compile_select(&q).unwrap();
//! assert_eq!(
//!     sql.as_sql(),
//!     Some("SELECT * FROM `TBL1` WHERE `a` IN ('a1', 'a2', 'a3') ORDER BY `created` DESC LIMIT 10")
//! );
//! ```

pub mod compiler;
pub mod db;
pub mod error;
pub mod escape;
pub mod executor;
#[cfg(feature = "mysql")]
pub mod mysql;
pub mod naming;
pub mod planner;
pub mod prelude;
pub mod query;
pub mod results;
pub mod schema;
pub mod stream;
pub mod typecast;
pub mod types;

pub use error::MysqlMiddlewareError;
pub use types::{RowObject, RowValues};
