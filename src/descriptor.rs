//! Read access to the implementation row descriptor of a statement.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::handle::HandleGuard;
use crate::native::constants::{
    SQL_ATTR_READONLY, SQL_ATTR_WRITE, SQL_PRED_BASIC, SQL_PRED_CHAR, SQL_PRED_NONE,
    SQL_PRED_SEARCHABLE, SQL_UNNAMED,
};
use crate::native::{DescField, DescValue, NativeHandle};
use crate::types::Nullability;

/// How a column can be used in a WHERE clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Searchability {
    None,
    /// Only with LIKE.
    Char,
    /// With everything except LIKE.
    Basic,
    Searchable,
}

impl Searchability {
    fn from_code(code: i64) -> Self {
        match code as i16 {
            SQL_PRED_NONE => Searchability::None,
            SQL_PRED_CHAR => Searchability::Char,
            SQL_PRED_BASIC => Searchability::Basic,
            _ => Searchability::Searchable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Updatability {
    ReadOnly,
    Write,
    Unknown,
}

impl Updatability {
    fn from_code(code: i64) -> Self {
        match code as i16 {
            SQL_ATTR_READONLY => Updatability::ReadOnly,
            SQL_ATTR_WRITE => Updatability::Write,
            _ => Updatability::Unknown,
        }
    }
}

/// The driver-allocated description of the current result columns.
///
/// Records are addressed by 0-based column ordinal. The descriptor reflects
/// whatever result shape the statement currently has.
#[derive(Debug, Clone)]
pub struct ImplementationRowDescriptor {
    statement: Arc<HandleGuard>,
    desc: NativeHandle,
}

impl ImplementationRowDescriptor {
    pub(crate) fn new(statement: Arc<HandleGuard>) -> Result<Self> {
        let desc = statement.ok(
            statement
                .driver()
                .implementation_row_descriptor(statement.handle()),
            "SQLGetStmtAttr(SQL_ATTR_IMP_ROW_DESC)",
        )?;
        Ok(Self { statement, desc })
    }

    pub fn native_handle(&self) -> NativeHandle {
        self.desc
    }

    /// Number of records.
    pub fn count(&self) -> Result<usize> {
        let n = self.statement.ok(
            self.statement.driver().desc_count(self.desc),
            "SQLGetDescField(SQL_DESC_COUNT)",
        )?;
        Ok(n.max(0) as usize)
    }

    fn field(&self, record: usize, field: DescField) -> Result<DescValue> {
        let count = self.count()?;
        if record >= count {
            return Err(Error::index_range(format!(
                "descriptor record {} out of range (records: {})",
                record, count
            )));
        }
        self.statement.ok(
            self.statement
                .driver()
                .desc_field(self.desc, record as i16 + 1, field),
            "SQLGetDescField",
        )
    }

    fn integer(&self, record: usize, field: DescField) -> Result<i64> {
        match self.field(record, field)? {
            DescValue::Integer(n) => Ok(n),
            DescValue::Text(_) => Err(Error::type_incompatible(format!(
                "descriptor field {:?} is not numeric",
                field
            ))),
        }
    }

    fn text(&self, record: usize, field: DescField) -> Result<String> {
        match self.field(record, field)? {
            DescValue::Text(s) => Ok(s),
            DescValue::Integer(_) => Err(Error::type_incompatible(format!(
                "descriptor field {:?} is not text",
                field
            ))),
        }
    }

    fn flag(&self, record: usize, field: DescField) -> Result<bool> {
        Ok(self.integer(record, field)? != 0)
    }

    pub fn alloc_type(&self, record: usize) -> Result<i16> {
        Ok(self.integer(record, DescField::AllocType)? as i16)
    }

    pub fn auto_unique_value(&self, record: usize) -> Result<bool> {
        self.flag(record, DescField::AutoUniqueValue)
    }

    pub fn base_column_name(&self, record: usize) -> Result<String> {
        self.text(record, DescField::BaseColumnName)
    }

    pub fn base_table_name(&self, record: usize) -> Result<String> {
        self.text(record, DescField::BaseTableName)
    }

    pub fn case_sensitive(&self, record: usize) -> Result<bool> {
        self.flag(record, DescField::CaseSensitive)
    }

    pub fn catalog_name(&self, record: usize) -> Result<String> {
        self.text(record, DescField::CatalogName)
    }

    pub fn concise_type(&self, record: usize) -> Result<i16> {
        Ok(self.integer(record, DescField::ConciseType)? as i16)
    }

    /// Maximum characters needed to display the column.
    pub fn display_size(&self, record: usize) -> Result<i64> {
        self.integer(record, DescField::DisplaySize)
    }

    pub fn fixed_prec_scale(&self, record: usize) -> Result<bool> {
        self.flag(record, DescField::FixedPrecScale)
    }

    pub fn label(&self, record: usize) -> Result<String> {
        self.text(record, DescField::Label)
    }

    pub fn length(&self, record: usize) -> Result<i64> {
        self.integer(record, DescField::Length)
    }

    pub fn local_type_name(&self, record: usize) -> Result<String> {
        self.text(record, DescField::LocalTypeName)
    }

    pub fn name(&self, record: usize) -> Result<String> {
        self.text(record, DescField::Name)
    }

    pub fn nullable(&self, record: usize) -> Result<Nullability> {
        Ok(Nullability::from_code(self.integer(record, DescField::Nullable)? as i16))
    }

    pub fn num_prec_radix(&self, record: usize) -> Result<i64> {
        self.integer(record, DescField::NumPrecRadix)
    }

    pub fn octet_length(&self, record: usize) -> Result<i64> {
        self.integer(record, DescField::OctetLength)
    }

    pub fn precision(&self, record: usize) -> Result<i16> {
        Ok(self.integer(record, DescField::Precision)? as i16)
    }

    pub fn rowver(&self, record: usize) -> Result<bool> {
        self.flag(record, DescField::RowVer)
    }

    pub fn scale(&self, record: usize) -> Result<i16> {
        Ok(self.integer(record, DescField::Scale)? as i16)
    }

    pub fn schema_name(&self, record: usize) -> Result<String> {
        self.text(record, DescField::SchemaName)
    }

    pub fn searchable(&self, record: usize) -> Result<Searchability> {
        Ok(Searchability::from_code(self.integer(record, DescField::Searchable)?))
    }

    pub fn table_name(&self, record: usize) -> Result<String> {
        self.text(record, DescField::TableName)
    }

    /// Verbose type code: date and time types report the datetime class.
    pub fn type_code(&self, record: usize) -> Result<i16> {
        Ok(self.integer(record, DescField::Type)? as i16)
    }

    pub fn type_name(&self, record: usize) -> Result<String> {
        self.text(record, DescField::TypeName)
    }

    /// Whether the column has no name.
    pub fn unnamed(&self, record: usize) -> Result<bool> {
        Ok(self.integer(record, DescField::Unnamed)? == SQL_UNNAMED as i64)
    }

    pub fn is_unsigned(&self, record: usize) -> Result<bool> {
        self.flag(record, DescField::Unsigned)
    }

    pub fn updatable(&self, record: usize) -> Result<Updatability> {
        Ok(Updatability::from_code(self.integer(record, DescField::Updatable)?))
    }
}
