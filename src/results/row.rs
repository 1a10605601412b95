use std::collections::HashMap;
use std::sync::Arc;

use crate::naming::from_storage_name;
use crate::types::{RowObject, RowValues};

/// A row from a query result.
///
/// Cells are `None` when the driver produced no value for the column (a `NULL` in a
/// boolean column); such fields are dropped by [`CustomDbRow::into_object`].
#[derive(Debug, Clone)]
pub struct CustomDbRow {
    /// Storage column names, shared across all rows in a result set
    pub column_names: Arc<Vec<String>>,
    /// The values for this row
    pub values: Vec<Option<RowValues>>,
    #[doc(hidden)]
    pub(crate) column_index_cache: Arc<HashMap<String, usize>>,
}

impl CustomDbRow {
    /// Create a new database row
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>, values: Vec<Option<RowValues>>) -> Self {
        let cache = Arc::new(index_columns(&column_names));
        Self {
            column_names,
            values,
            column_index_cache: cache,
        }
    }

    /// Get the index of a column by its storage name
    #[must_use]
    pub fn get_column_index(&self, column_name: &str) -> Option<usize> {
        if let Some(&idx) = self.column_index_cache.get(column_name) {
            return Some(idx);
        }
        self.column_names.iter().position(|col| col == column_name)
    }

    /// Get a value by storage column name; `None` for unknown or absent cells.
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        let idx = self.get_column_index(column_name)?;
        self.values.get(idx)?.as_ref()
    }

    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.values.get(index)?.as_ref()
    }

    /// Convert to a row object keyed by external field names, without absent cells.
    #[must_use]
    pub fn into_object(self) -> RowObject {
        object_from_cells(&self.column_names, self.values)
    }
}

/// Pair storage column names with decoded cells, reverse-mapping names and dropping absent cells.
pub(crate) fn object_from_cells(
    column_names: &[String],
    values: Vec<Option<RowValues>>,
) -> RowObject {
    let mut object = RowObject::with_capacity(values.len());
    for (name, value) in column_names.iter().zip(values) {
        if let Some(value) = value {
            object.insert(from_storage_name(name).into_owned(), value);
        }
    }
    object
}

pub(crate) fn index_columns(column_names: &[String]) -> HashMap<String, usize> {
    column_names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.clone(), i))
        .collect()
}
