//! Connection and statement attributes.

use crate::native::constants::{SQL_IS_INTEGER, SQL_IS_UINTEGER, SQL_NTS};

/// Payload of an attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    Binary(Vec<u8>),
    Text(String),
    Signed(isize),
    Unsigned(usize),
}

/// A native attribute code with its declared length and value.
///
/// Lists of attributes are applied in order before connecting or executing;
/// the first one the driver rejects aborts the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    code: i32,
    length: i32,
    value: AttributeValue,
}

impl Attribute {
    pub fn new(code: i32, length: i32, value: AttributeValue) -> Self {
        Self {
            code,
            length,
            value,
        }
    }

    /// Null-terminated text attribute.
    pub fn text(code: i32, value: impl Into<String>) -> Self {
        Self::new(code, SQL_NTS as i32, AttributeValue::Text(value.into()))
    }

    pub fn signed(code: i32, value: isize) -> Self {
        Self::new(code, SQL_IS_INTEGER, AttributeValue::Signed(value))
    }

    pub fn unsigned(code: i32, value: usize) -> Self {
        Self::new(code, SQL_IS_UINTEGER, AttributeValue::Unsigned(value))
    }

    pub fn binary(code: i32, value: Vec<u8>) -> Self {
        let length = value.len() as i32;
        Self::new(code, length, AttributeValue::Binary(value))
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn length(&self) -> i32 {
        self.length
    }

    pub fn value(&self) -> &AttributeValue {
        &self.value
    }

    /// Integer payload, if the attribute carries a non-negative integer.
    pub fn as_usize(&self) -> Option<usize> {
        match self.value {
            AttributeValue::Unsigned(v) => Some(v),
            AttributeValue::Signed(v) => usize::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.value {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_set_length() {
        assert_eq!(Attribute::text(109, "db").length(), SQL_NTS as i32);
        assert_eq!(Attribute::binary(1, vec![1, 2, 3]).length(), 3);
        assert_eq!(Attribute::unsigned(102, 0).as_usize(), Some(0));
        assert_eq!(Attribute::signed(0, -1).as_usize(), None);
        assert_eq!(Attribute::text(109, "db").as_text(), Some("db"));
    }
}
