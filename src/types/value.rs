//! Value type for column and parameter data.

use super::datetime::{Date, Time, Timestamp};
use std::fmt;

/// A single column or parameter value.
///
/// This is the closed set of logical types the engine marshals; every bound
/// buffer element decodes into exactly one of these variants.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// NULL value.
    Null,
    /// BIT.
    Bit(bool),
    /// TINYINT.
    TinyInt(i8),
    /// SMALLINT.
    SmallInt(i16),
    /// INTEGER.
    Integer(i32),
    /// BIGINT.
    BigInt(i64),
    /// Unsigned BIGINT (only produced from unsigned C buffers).
    UBigInt(u64),
    /// REAL.
    Real(f32),
    /// DOUBLE / FLOAT.
    Double(f64),
    /// Character data, including decimal and numeric values rendered as text.
    Text(String),
    /// Binary data.
    Binary(Vec<u8>),
    /// DATE.
    Date(Date),
    /// TIME.
    Time(Time),
    /// TIMESTAMP.
    Timestamp(Timestamp),
}

impl Value {
    /// Check if the value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get the value as a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get the value as raw bytes.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Binary(b) => Some(b),
            Value::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Try to widen an integral value.
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Value::Bit(b) => Some(*b as i128),
            Value::TinyInt(v) => Some(*v as i128),
            Value::SmallInt(v) => Some(*v as i128),
            Value::Integer(v) => Some(*v as i128),
            Value::BigInt(v) => Some(*v as i128),
            Value::UBigInt(v) => Some(*v as i128),
            _ => None,
        }
    }

    /// Try to convert a numeric value to f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            other => other.as_i128().map(|v| v as f64),
        }
    }

    /// Short name of the variant, used in conversion errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bit(_) => "BIT",
            Value::TinyInt(_) => "TINYINT",
            Value::SmallInt(_) => "SMALLINT",
            Value::Integer(_) => "INTEGER",
            Value::BigInt(_) => "BIGINT",
            Value::UBigInt(_) => "UBIGINT",
            Value::Real(_) => "REAL",
            Value::Double(_) => "DOUBLE",
            Value::Text(_) => "TEXT",
            Value::Binary(_) => "BINARY",
            Value::Date(_) => "DATE",
            Value::Time(_) => "TIME",
            Value::Timestamp(_) => "TIMESTAMP",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bit(b) => write!(f, "{}", *b as u8),
            Value::TinyInt(v) => write!(f, "{}", v),
            Value::SmallInt(v) => write!(f, "{}", v),
            Value::Integer(v) => write!(f, "{}", v),
            Value::BigInt(v) => write!(f, "{}", v),
            Value::UBigInt(v) => write!(f, "{}", v),
            Value::Real(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{}", s),
            Value::Binary(bytes) => write!(f, "<BINARY: {} bytes>", bytes.len()),
            Value::Date(d) => write!(f, "{}", d),
            Value::Time(t) => write!(f, "{}", t),
            Value::Timestamp(ts) => write!(f, "{}", ts),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_null() {
        let val = Value::Null;
        assert!(val.is_null());
        assert_eq!(val.as_str(), None);
        assert_eq!(format!("{}", val), "NULL");
    }

    #[test]
    fn test_value_text() {
        let val = Value::Text("hello".to_string());
        assert!(!val.is_null());
        assert_eq!(val.as_str(), Some("hello"));
        assert_eq!(val.as_bytes(), Some(&b"hello"[..]));
    }

    #[test]
    fn test_value_numeric_widening() {
        assert_eq!(Value::SmallInt(-3).as_i128(), Some(-3));
        assert_eq!(Value::UBigInt(u64::MAX).as_i128(), Some(u64::MAX as i128));
        assert_eq!(Value::Integer(4).as_f64(), Some(4.0));
        assert_eq!(Value::Text("4".into()).as_i128(), None);
    }
}
