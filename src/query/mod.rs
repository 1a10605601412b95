//! Backend-agnostic query description.
//!
//! A [`DbQuery`] says *what* to read, delete, or update (filters, ordering, grouping,
//! projection, pagination) without any SQL syntax; [`crate::compiler`] turns it into
//! MySQL text.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::error::MysqlMiddlewareError;
use crate::types::RowValues;

/// Comparison operators supported in filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum FilterOperator {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `<`
    Lt,
    /// `<=`
    Lte,
}

impl FilterOperator {
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            FilterOperator::Eq => "=",
            FilterOperator::Ne => "!=",
            FilterOperator::Gt => ">",
            FilterOperator::Gte => ">=",
            FilterOperator::Lt => "<",
            FilterOperator::Lte => "<=",
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for FilterOperator {
    type Err = MysqlMiddlewareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "=" | "==" => Ok(FilterOperator::Eq),
            "!=" | "<>" => Ok(FilterOperator::Ne),
            ">" => Ok(FilterOperator::Gt),
            ">=" => Ok(FilterOperator::Gte),
            "<" => Ok(FilterOperator::Lt),
            "<=" => Ok(FilterOperator::Lte),
            other => Err(MysqlMiddlewareError::validation(format!(
                "unknown filter operator {other:?}"
            ))),
        }
    }
}

impl TryFrom<String> for FilterOperator {
    type Error = MysqlMiddlewareError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Right-hand side of a filter.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "JsonValue")]
pub enum FilterValue {
    /// No value at all; compiled the same way as `NULL`.
    Missing,
    /// A single operand. `RowValues::Null` compiles to `IS NULL` / `IS NOT NULL`.
    Value(RowValues),
    /// Membership test. An empty list makes the whole query provably empty.
    List(Vec<RowValues>),
}

impl FilterValue {
    /// True for both `Missing` and an explicit `NULL` operand.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, FilterValue::Missing | FilterValue::Value(RowValues::Null))
    }
}

impl From<JsonValue> for FilterValue {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => FilterValue::Missing,
            JsonValue::Array(items) => {
                FilterValue::List(items.into_iter().map(RowValues::from).collect())
            }
            other => FilterValue::Value(RowValues::from(other)),
        }
    }
}

macro_rules! filter_value_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for FilterValue {
                fn from(value: $ty) -> Self {
                    FilterValue::Value(value.into())
                }
            }
        )*
    };
}

filter_value_from!(
    RowValues,
    i64,
    f64,
    bool,
    &str,
    String,
    Vec<u8>,
    chrono::NaiveDateTime,
);

impl From<Vec<RowValues>> for FilterValue {
    fn from(values: Vec<RowValues>) -> Self {
        FilterValue::List(values)
    }
}

impl<T: Into<RowValues>> From<Option<T>> for FilterValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FilterValue::Missing, |v| FilterValue::Value(v.into()))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Filter {
    pub field: String,
    pub op: FilterOperator,
    #[serde(default = "missing_value")]
    pub value: FilterValue,
}

fn missing_value() -> FilterValue {
    FilterValue::Missing
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Order {
    pub field: String,
    #[serde(default)]
    pub descending: bool,
}

/// Abstract query over a single table.
///
/// ```rust
/// use mysql_middleware::prelude::*;
///
/// let q = DbQuery::new("TBL1")
///     .filter_eq("a", "b")
///     .filter("c", FilterOperator::Gt, "2019")
///     .order("aaa", false)
///     .order("bbb", true)
///     .limit(15);
/// let sql = compile_select(&q).unwrap();
/// assert_eq!(
///     sql.as_sql(),
///     Some("SELECT * FROM `TBL1` WHERE `a` = 'b' AND `c` > '2019' ORDER BY `aaa` ASC, `bbb` DESC LIMIT 15"),
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbQuery {
    pub table: String,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub orders: Vec<Order>,
    #[serde(default)]
    pub group_by: Vec<String>,
    /// `None` selects every column; `Some(vec![])` selects no real fields.
    #[serde(default)]
    pub selected_fields: Option<Vec<String>>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
    #[serde(default)]
    pub distinct: bool,
}

impl DbQuery {
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    /// Parse a query from its JSON description.
    ///
    /// # Errors
    /// Returns `ValidationError` when the JSON is malformed or names an unknown operator.
    pub fn from_json(json: &str) -> Result<Self, MysqlMiddlewareError> {
        serde_json::from_str(json)
            .map_err(|e| MysqlMiddlewareError::validation(format!("invalid query: {e}")))
    }

    #[must_use]
    pub fn filter(
        mut self,
        field: impl Into<String>,
        op: FilterOperator,
        value: impl Into<FilterValue>,
    ) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            op,
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn filter_eq(self, field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.filter(field, FilterOperator::Eq, value)
    }

    #[must_use]
    pub fn filter_in<I, V>(self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<RowValues>,
    {
        let list = values.into_iter().map(Into::into).collect();
        self.filter(field, FilterOperator::Eq, FilterValue::List(list))
    }

    #[must_use]
    pub fn order(mut self, field: impl Into<String>, descending: bool) -> Self {
        self.orders.push(Order {
            field: field.into(),
            descending,
        });
        self
    }

    #[must_use]
    pub fn group_by<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by.extend(fields.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Set the row limit; `0` clears it.
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = (limit > 0).then_some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = (offset > 0).then_some(offset);
        self
    }

    #[must_use]
    pub fn distinct(mut self, distinct: bool) -> Self {
        self.distinct = distinct;
        self
    }

    /// True when the projection was set to an empty list.
    #[must_use]
    pub fn selects_nothing(&self) -> bool {
        self.selected_fields.as_ref().is_some_and(Vec::is_empty)
    }
}
