//! Materialized row type produced by result set iteration.

use std::sync::Arc;

use super::column::{ColumnDescriptor, ColumnIndex, ColumnInfo};
use super::convert::FromValue;
use super::value::Value;
use crate::error::{Error, Result};

/// A row copied out of a result set.
#[derive(Debug, Clone)]
pub struct Row {
    /// Column values.
    values: Vec<Value>,
    /// Shared column information (reference counted).
    column_info: Arc<ColumnInfo>,
}

impl Row {
    /// Create a new row with values and shared column info.
    pub fn new(values: Vec<Value>, column_info: Arc<ColumnInfo>) -> Self {
        Self {
            values,
            column_info,
        }
    }

    /// Get the raw value by column index (0-based).
    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Get a typed value by ordinal or name.
    ///
    /// Fails with `NullAccess` when the value is NULL.
    pub fn get<T: FromValue>(&self, column: impl ColumnIndex) -> Result<T> {
        let index = column.resolve(&self.column_info)?;
        match &self.values[index] {
            Value::Null => Err(Error::null_access(self.column_info.columns[index].name.clone())),
            value => T::from_value(value),
        }
    }

    /// Get a typed value, substituting `fallback` for NULL.
    pub fn get_or<T: FromValue>(&self, column: impl ColumnIndex, fallback: T) -> Result<T> {
        let index = column.resolve(&self.column_info)?;
        match &self.values[index] {
            Value::Null => Ok(fallback),
            value => T::from_value(value),
        }
    }

    /// Check whether a column is NULL in this row.
    pub fn is_null(&self, column: impl ColumnIndex) -> Result<bool> {
        let index = column.resolve(&self.column_info)?;
        Ok(self.values[index].is_null())
    }

    /// Get the number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the row is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get all values.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Get column information.
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.column_info.columns
    }

    /// Get column names.
    pub fn column_names(&self) -> Vec<&str> {
        self.column_info.column_names()
    }

    /// Iterate over values.
    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }
}

impl IntoIterator for Row {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

impl<'a> IntoIterator for &'a Row {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CType, Nullability, SqlType};

    fn make_test_column_info() -> Arc<ColumnInfo> {
        Arc::new(ColumnInfo::new(vec![
            ColumnDescriptor {
                ordinal: 0,
                name: "name".to_string(),
                sql_type: SqlType::VarChar { size: 100 },
                c_type: CType::Char,
                size: 100,
                scale: 0,
                nullable: Nullability::Nullable,
            },
            ColumnDescriptor {
                ordinal: 1,
                name: "value".to_string(),
                sql_type: SqlType::Integer,
                c_type: CType::SLong,
                size: 10,
                scale: 0,
                nullable: Nullability::NoNulls,
            },
        ]))
    }

    #[test]
    fn test_row_access() {
        let row = Row::new(
            vec![Value::Text("test".to_string()), Value::Integer(42)],
            make_test_column_info(),
        );

        assert_eq!(row.len(), 2);
        assert_eq!(row.value(0), Some(&Value::Text("test".to_string())));
        assert_eq!(row.get::<i32>("value").unwrap(), 42);
        assert_eq!(row.get::<String>(1).unwrap(), "42");
    }

    #[test]
    fn test_row_null_handling() {
        let row = Row::new(vec![Value::Null, Value::Integer(1)], make_test_column_info());

        assert!(row.is_null(0).unwrap());
        assert!(matches!(row.get::<String>(0), Err(Error::NullAccess { .. })));
        assert_eq!(row.get_or(0, "fallback".to_string()).unwrap(), "fallback");
        assert!(matches!(row.get::<i32>(5), Err(Error::IndexRange { .. })));
    }
}
