use std::collections::HashMap;
use std::sync::Arc;

use super::row::{CustomDbRow, index_columns};
use crate::types::{RowObject, RowValues};

/// Rows returned by a query, sharing one column list.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// The rows returned by the query
    pub results: Vec<CustomDbRow>,
    /// The number of rows in `results`
    pub rows_affected: usize,
    column_names: Option<Arc<Vec<String>>>,
    column_index_cache: Option<Arc<HashMap<String, usize>>>,
}

impl ResultSet {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            results: Vec::with_capacity(capacity),
            ..ResultSet::default()
        }
    }

    /// Set the column names shared by all rows added afterwards.
    pub fn set_column_names(&mut self, column_names: Arc<Vec<String>>) {
        self.column_index_cache = Some(Arc::new(index_columns(&column_names)));
        self.column_names = Some(column_names);
    }

    /// Add a row using the shared column names. Ignored until column names are set.
    pub fn add_row_values(&mut self, values: Vec<Option<RowValues>>) {
        if let (Some(column_names), Some(cache)) = (&self.column_names, &self.column_index_cache) {
            self.results.push(CustomDbRow {
                column_names: column_names.clone(),
                values,
                column_index_cache: cache.clone(),
            });
            self.rows_affected += 1;
        }
    }

    /// Reverse-mapped, absent-stripped row objects.
    #[must_use]
    pub fn into_objects(self) -> Vec<RowObject> {
        self.results.into_iter().map(CustomDbRow::into_object).collect()
    }
}
