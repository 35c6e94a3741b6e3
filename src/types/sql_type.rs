//! SQL and C data type enums with type-specific attributes.
//!
//! `SqlType` describes how the data source stores a value; `CType` describes
//! the layout of the client buffer the value is converted into.
//!
//! Note: Nullability is a column property, not a type property.

use crate::error::{Error, Result};
use crate::native::constants::*;

/// SQL data type with type-specific attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    /// CHAR(size) - fixed-length string.
    Char { size: usize },
    /// VARCHAR(size) - variable-length string.
    VarChar { size: usize },
    /// Long variable-length character data (TEXT, CLOB, ...).
    LongVarChar,
    /// NCHAR(size).
    WChar { size: usize },
    /// NVARCHAR(size).
    WVarChar { size: usize },
    /// Long variable-length wide character data.
    WLongVarChar,
    /// BINARY(size).
    Binary { size: usize },
    /// VARBINARY(size).
    VarBinary { size: usize },
    /// Long variable-length binary data (BLOB, IMAGE, ...).
    LongVarBinary,
    /// Single bit.
    Bit,
    /// 8-bit integer.
    TinyInt,
    /// 16-bit integer.
    SmallInt,
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    BigInt,
    /// Single precision float.
    Real,
    /// FLOAT(precision).
    Float,
    /// Double precision float.
    Double,
    /// DECIMAL(precision, scale).
    Decimal { precision: usize, scale: i16 },
    /// NUMERIC(precision, scale).
    Numeric { precision: usize, scale: i16 },
    /// DATE.
    Date,
    /// TIME.
    Time,
    /// TIMESTAMP with fractional second digits.
    Timestamp { precision: i16 },
    /// Table-valued parameter.
    Table,
    /// Any type code this engine has no special handling for.
    Other { code: i16, size: usize },
}

impl SqlType {
    /// Create from a raw SQL type code and its described size and scale.
    pub fn from_raw(code: i16, size: usize, scale: i16) -> Self {
        match code {
            SQL_CHAR => SqlType::Char { size },
            SQL_VARCHAR => SqlType::VarChar { size },
            SQL_LONGVARCHAR => SqlType::LongVarChar,
            SQL_WCHAR => SqlType::WChar { size },
            SQL_WVARCHAR => SqlType::WVarChar { size },
            SQL_WLONGVARCHAR => SqlType::WLongVarChar,
            SQL_BINARY => SqlType::Binary { size },
            SQL_VARBINARY => SqlType::VarBinary { size },
            SQL_LONGVARBINARY => SqlType::LongVarBinary,
            SQL_BIT => SqlType::Bit,
            SQL_TINYINT => SqlType::TinyInt,
            SQL_SMALLINT => SqlType::SmallInt,
            SQL_INTEGER => SqlType::Integer,
            SQL_BIGINT => SqlType::BigInt,
            SQL_REAL => SqlType::Real,
            SQL_FLOAT => SqlType::Float,
            SQL_DOUBLE => SqlType::Double,
            SQL_DECIMAL => SqlType::Decimal {
                precision: size,
                scale,
            },
            SQL_NUMERIC => SqlType::Numeric {
                precision: size,
                scale,
            },
            SQL_TYPE_DATE => SqlType::Date,
            SQL_TYPE_TIME => SqlType::Time,
            SQL_TYPE_TIMESTAMP => SqlType::Timestamp { precision: scale },
            SQL_SS_TABLE => SqlType::Table,
            _ => SqlType::Other { code, size },
        }
    }

    /// Get the raw SQL type code.
    pub fn code(&self) -> i16 {
        match self {
            SqlType::Char { .. } => SQL_CHAR,
            SqlType::VarChar { .. } => SQL_VARCHAR,
            SqlType::LongVarChar => SQL_LONGVARCHAR,
            SqlType::WChar { .. } => SQL_WCHAR,
            SqlType::WVarChar { .. } => SQL_WVARCHAR,
            SqlType::WLongVarChar => SQL_WLONGVARCHAR,
            SqlType::Binary { .. } => SQL_BINARY,
            SqlType::VarBinary { .. } => SQL_VARBINARY,
            SqlType::LongVarBinary => SQL_LONGVARBINARY,
            SqlType::Bit => SQL_BIT,
            SqlType::TinyInt => SQL_TINYINT,
            SqlType::SmallInt => SQL_SMALLINT,
            SqlType::Integer => SQL_INTEGER,
            SqlType::BigInt => SQL_BIGINT,
            SqlType::Real => SQL_REAL,
            SqlType::Float => SQL_FLOAT,
            SqlType::Double => SQL_DOUBLE,
            SqlType::Decimal { .. } => SQL_DECIMAL,
            SqlType::Numeric { .. } => SQL_NUMERIC,
            SqlType::Date => SQL_TYPE_DATE,
            SqlType::Time => SQL_TYPE_TIME,
            SqlType::Timestamp { .. } => SQL_TYPE_TIMESTAMP,
            SqlType::Table => SQL_SS_TABLE,
            SqlType::Other { code, .. } => *code,
        }
    }

    /// Long types cannot be bound up front and are always read with get_data.
    pub fn is_long(&self) -> bool {
        matches!(
            self,
            SqlType::LongVarChar | SqlType::WLongVarChar | SqlType::LongVarBinary
        )
    }

    /// Column size as reported to the driver when binding a parameter.
    pub fn column_size(&self) -> usize {
        match self {
            SqlType::Char { size }
            | SqlType::VarChar { size }
            | SqlType::WChar { size }
            | SqlType::WVarChar { size }
            | SqlType::Binary { size }
            | SqlType::VarBinary { size }
            | SqlType::Other { size, .. } => *size,
            SqlType::Decimal { precision, .. } | SqlType::Numeric { precision, .. } => *precision,
            SqlType::Bit => 1,
            SqlType::TinyInt => 3,
            SqlType::SmallInt => 5,
            SqlType::Integer => 10,
            SqlType::BigInt => 19,
            SqlType::Real => 7,
            SqlType::Float | SqlType::Double => 15,
            SqlType::Date => 10,
            SqlType::Time => 8,
            SqlType::Timestamp { .. } => 23,
            SqlType::LongVarChar
            | SqlType::WLongVarChar
            | SqlType::LongVarBinary
            | SqlType::Table => 0,
        }
    }

    /// Decimal digits (scale) of the type, 0 when not applicable.
    pub fn decimal_digits(&self) -> i16 {
        match self {
            SqlType::Decimal { scale, .. } | SqlType::Numeric { scale, .. } => *scale,
            SqlType::Timestamp { precision } => *precision,
            _ => 0,
        }
    }

    /// The C type a column of this type is bound as.
    ///
    /// Decimal and numeric columns travel as text so no precision is lost.
    pub fn default_c_type(&self) -> CType {
        match self {
            SqlType::Bit => CType::Bit,
            SqlType::TinyInt => CType::STinyInt,
            SqlType::SmallInt => CType::SShort,
            SqlType::Integer => CType::SLong,
            SqlType::BigInt => CType::SBigInt,
            SqlType::Real => CType::Float,
            SqlType::Float | SqlType::Double => CType::Double,
            SqlType::Date => CType::Date,
            SqlType::Time => CType::Time,
            SqlType::Timestamp { .. } => CType::Timestamp,
            SqlType::Binary { .. } | SqlType::VarBinary { .. } | SqlType::LongVarBinary => {
                CType::Binary
            }
            _ => CType::Char,
        }
    }
}

impl std::fmt::Display for SqlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlType::Char { size } => write!(f, "CHAR({})", size),
            SqlType::VarChar { size } => write!(f, "VARCHAR({})", size),
            SqlType::LongVarChar => write!(f, "LONGVARCHAR"),
            SqlType::WChar { size } => write!(f, "NCHAR({})", size),
            SqlType::WVarChar { size } => write!(f, "NVARCHAR({})", size),
            SqlType::WLongVarChar => write!(f, "WLONGVARCHAR"),
            SqlType::Binary { size } => write!(f, "BINARY({})", size),
            SqlType::VarBinary { size } => write!(f, "VARBINARY({})", size),
            SqlType::LongVarBinary => write!(f, "LONGVARBINARY"),
            SqlType::Bit => write!(f, "BIT"),
            SqlType::TinyInt => write!(f, "TINYINT"),
            SqlType::SmallInt => write!(f, "SMALLINT"),
            SqlType::Integer => write!(f, "INTEGER"),
            SqlType::BigInt => write!(f, "BIGINT"),
            SqlType::Real => write!(f, "REAL"),
            SqlType::Float => write!(f, "FLOAT"),
            SqlType::Double => write!(f, "DOUBLE"),
            SqlType::Decimal { precision, scale } => write!(f, "DECIMAL({},{})", precision, scale),
            SqlType::Numeric { precision, scale } => write!(f, "NUMERIC({},{})", precision, scale),
            SqlType::Date => write!(f, "DATE"),
            SqlType::Time => write!(f, "TIME"),
            SqlType::Timestamp { .. } => write!(f, "TIMESTAMP"),
            SqlType::Table => write!(f, "TABLE"),
            SqlType::Other { code, .. } => write!(f, "SQL_TYPE({})", code),
        }
    }
}

/// Layout of a client-side buffer element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CType {
    /// Null-terminated UTF-8 text.
    Char,
    /// Raw bytes; length carried by the indicator.
    Binary,
    Bit,
    STinyInt,
    UTinyInt,
    SShort,
    UShort,
    SLong,
    ULong,
    SBigInt,
    UBigInt,
    Float,
    Double,
    /// Date struct: year i16, month u16, day u16.
    Date,
    /// Time struct: hour u16, minute u16, second u16.
    Time,
    /// Timestamp struct: date, time and a u32 nanosecond fraction.
    Timestamp,
}

impl CType {
    /// Create from a raw C type code.
    pub fn from_code(code: i16) -> Result<Self> {
        Ok(match code {
            SQL_C_CHAR => CType::Char,
            SQL_C_BINARY => CType::Binary,
            SQL_C_BIT => CType::Bit,
            SQL_C_STINYINT => CType::STinyInt,
            SQL_C_UTINYINT => CType::UTinyInt,
            SQL_C_SSHORT => CType::SShort,
            SQL_C_USHORT => CType::UShort,
            SQL_C_SLONG => CType::SLong,
            SQL_C_ULONG => CType::ULong,
            SQL_C_SBIGINT => CType::SBigInt,
            SQL_C_UBIGINT => CType::UBigInt,
            SQL_C_FLOAT => CType::Float,
            SQL_C_DOUBLE => CType::Double,
            SQL_C_TYPE_DATE => CType::Date,
            SQL_C_TYPE_TIME => CType::Time,
            SQL_C_TYPE_TIMESTAMP => CType::Timestamp,
            other => {
                return Err(Error::type_incompatible(format!(
                    "unsupported C data type {}",
                    other
                )))
            }
        })
    }

    /// Get the raw C type code.
    pub fn code(&self) -> i16 {
        match self {
            CType::Char => SQL_C_CHAR,
            CType::Binary => SQL_C_BINARY,
            CType::Bit => SQL_C_BIT,
            CType::STinyInt => SQL_C_STINYINT,
            CType::UTinyInt => SQL_C_UTINYINT,
            CType::SShort => SQL_C_SSHORT,
            CType::UShort => SQL_C_USHORT,
            CType::SLong => SQL_C_SLONG,
            CType::ULong => SQL_C_ULONG,
            CType::SBigInt => SQL_C_SBIGINT,
            CType::UBigInt => SQL_C_UBIGINT,
            CType::Float => SQL_C_FLOAT,
            CType::Double => SQL_C_DOUBLE,
            CType::Date => SQL_C_TYPE_DATE,
            CType::Time => SQL_C_TYPE_TIME,
            CType::Timestamp => SQL_C_TYPE_TIMESTAMP,
        }
    }

    /// Element width for fixed-size layouts, `None` for text and binary.
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            CType::Char | CType::Binary => None,
            CType::Bit | CType::STinyInt | CType::UTinyInt => Some(1),
            CType::SShort | CType::UShort => Some(2),
            CType::SLong | CType::ULong | CType::Float => Some(4),
            CType::SBigInt | CType::UBigInt | CType::Double => Some(8),
            CType::Date | CType::Time => Some(6),
            CType::Timestamp => Some(16),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_varchar() {
        assert_eq!(
            SqlType::from_raw(SQL_VARCHAR, 10, 0),
            SqlType::VarChar { size: 10 }
        );
    }

    #[test]
    fn test_from_raw_decimal_keeps_scale() {
        let t = SqlType::from_raw(SQL_DECIMAL, 12, 2);
        assert_eq!(
            t,
            SqlType::Decimal {
                precision: 12,
                scale: 2
            }
        );
        assert_eq!(t.decimal_digits(), 2);
        assert_eq!(t.default_c_type(), CType::Char);
    }

    #[test]
    fn test_unknown_code_round_trips() {
        let t = SqlType::from_raw(-150, 8, 0);
        assert_eq!(t.code(), -150);
        assert_eq!(t.column_size(), 8);
    }

    #[test]
    fn test_long_types() {
        assert!(SqlType::LongVarChar.is_long());
        assert!(SqlType::LongVarBinary.is_long());
        assert!(!SqlType::VarChar { size: 4000 }.is_long());
    }

    #[test]
    fn test_c_type_codes() {
        for c in [CType::Char, CType::SLong, CType::Timestamp, CType::UBigInt] {
            assert_eq!(CType::from_code(c.code()).unwrap(), c);
        }
        assert!(matches!(
            CType::from_code(12345),
            Err(Error::TypeIncompatible { .. })
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", SqlType::VarChar { size: 50 }), "VARCHAR(50)");
        assert_eq!(format!("{}", SqlType::Integer), "INTEGER");
    }
}
