//! Column descriptors for result sets.
//!
//! Descriptors are read once when a result set is opened and stay fixed for
//! that result set's lifetime.

use std::collections::HashMap;

use super::sql_type::{CType, SqlType};
use crate::error::{Error, Result};
use crate::native::constants::{SQL_NO_NULLS, SQL_NULLABLE};

/// Nullability tri-state reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nullability {
    Nullable,
    NoNulls,
    Unknown,
}

impl Nullability {
    pub fn from_code(code: i16) -> Self {
        match code {
            SQL_NULLABLE => Nullability::Nullable,
            SQL_NO_NULLS => Nullability::NoNulls,
            _ => Nullability::Unknown,
        }
    }
}

/// Description of one result set column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    /// 0-based column ordinal.
    pub ordinal: usize,
    /// Column name (or label).
    pub name: String,
    /// Native SQL type.
    pub sql_type: SqlType,
    /// C type the column is bound or fetched as.
    pub c_type: CType,
    /// Declared column size.
    pub size: usize,
    /// Decimal digits.
    pub scale: i16,
    /// Whether NULL values are allowed.
    pub nullable: Nullability,
}

/// Shared column information for all rows of a result set.
#[derive(Debug, Clone, Default)]
pub struct ColumnInfo {
    /// Column definitions in ordinal order.
    pub columns: Vec<ColumnDescriptor>,
    by_name: HashMap<String, usize>,
}

impl ColumnInfo {
    /// Create column info, indexing names. The first column wins on duplicates.
    pub fn new(columns: Vec<ColumnDescriptor>) -> Self {
        let mut by_name = HashMap::with_capacity(columns.len());
        for (i, col) in columns.iter().enumerate() {
            by_name.entry(col.name.clone()).or_insert(i);
        }
        Self { columns, by_name }
    }

    /// Get column names.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Find column index by name.
    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Get a column descriptor, failing with `IndexRange` when out of range.
    pub fn column(&self, index: usize) -> Result<&ColumnDescriptor> {
        self.columns.get(index).ok_or_else(|| {
            Error::index_range(format!(
                "column {} out of range (columns: {})",
                index,
                self.columns.len()
            ))
        })
    }

    /// Resolve a column name to its ordinal, failing with `IndexRange`.
    pub fn resolve(&self, name: &str) -> Result<usize> {
        self.find_by_name(name)
            .ok_or_else(|| Error::index_range(format!("no column named '{}'", name)))
    }
}

/// Column reference by ordinal or by name.
pub trait ColumnIndex {
    fn resolve(&self, info: &ColumnInfo) -> Result<usize>;
}

impl ColumnIndex for usize {
    fn resolve(&self, info: &ColumnInfo) -> Result<usize> {
        info.column(*self).map(|_| *self)
    }
}

impl ColumnIndex for &str {
    fn resolve(&self, info: &ColumnInfo) -> Result<usize> {
        info.resolve(self)
    }
}

impl ColumnIndex for &String {
    fn resolve(&self, info: &ColumnInfo) -> Result<usize> {
        info.resolve(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(ordinal: usize, name: &str) -> ColumnDescriptor {
        ColumnDescriptor {
            ordinal,
            name: name.to_string(),
            sql_type: SqlType::Integer,
            c_type: CType::SLong,
            size: 10,
            scale: 0,
            nullable: Nullability::Nullable,
        }
    }

    #[test]
    fn test_duplicate_names_first_wins() {
        let info = ColumnInfo::new(vec![
            descriptor(0, "id"),
            descriptor(1, "name"),
            descriptor(2, "id"),
        ]);
        assert_eq!(info.find_by_name("id"), Some(0));
        assert_eq!(info.resolve("name").unwrap(), 1);
        assert!(matches!(info.resolve("nope"), Err(Error::IndexRange { .. })));
    }

    #[test]
    fn test_column_index_out_of_range() {
        let info = ColumnInfo::new(vec![descriptor(0, "id")]);
        assert_eq!(0usize.resolve(&info).unwrap(), 0);
        assert!(matches!(1usize.resolve(&info), Err(Error::IndexRange { .. })));
        assert_eq!("id".resolve(&info).unwrap(), 0);
    }

    #[test]
    fn test_nullability_codes() {
        assert_eq!(Nullability::from_code(0), Nullability::NoNulls);
        assert_eq!(Nullability::from_code(1), Nullability::Nullable);
        assert_eq!(Nullability::from_code(2), Nullability::Unknown);
    }
}
