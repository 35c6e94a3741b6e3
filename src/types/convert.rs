//! Dispatch tables between logical Rust types and native buffers.
//!
//! `FromValue` decides which Rust types a fetched value may be read as;
//! `Parameter` maps a Rust type to the (C type, SQL type) pair it is bound
//! with. Both are sealed: the supported set is fixed at compile time.

use super::datetime::{parse_date, parse_time, parse_timestamp, Date, Time, Timestamp};
use super::sql_type::{CType, SqlType};
use super::value::Value;
use crate::error::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

mod sealed {
    pub trait Sealed {}
}

/// Types a fetched value can be converted into.
pub trait FromValue: Sized + sealed::Sealed {
    /// Convert a non-null value.
    ///
    /// Returns `Error::TypeIncompatible` if the value cannot be represented.
    fn from_value(value: &Value) -> Result<Self>;
}

/// Types that can be bound as scalar or array parameters.
pub trait Parameter: sealed::Sealed {
    /// Client buffer layout used for this type.
    fn c_type() -> CType;

    /// SQL type used when the parameter has not been described.
    fn sql_type() -> SqlType;

    /// The value to write into the buffer element.
    fn to_value(&self) -> Result<Value>;
}

fn incompatible(value: &Value, target: &str) -> Error {
    Error::type_incompatible(format!("cannot convert {} to {}", value.kind(), target))
}

fn integral(value: &Value, target: &str) -> Result<i128> {
    if let Some(v) = value.as_i128() {
        return Ok(v);
    }
    match value {
        Value::Real(_) | Value::Double(_) => {
            let f = value.as_f64().unwrap_or(f64::NAN);
            if f.is_finite() && f.fract() == 0.0 {
                Ok(f as i128)
            } else {
                Err(Error::type_incompatible(format!(
                    "{} value {} is not integral for {}",
                    value.kind(),
                    f,
                    target
                )))
            }
        }
        Value::Text(s) => s.trim().parse::<i128>().map_err(|_| {
            Error::type_incompatible(format!("cannot parse '{}' as {}", s, target))
        }),
        other => Err(incompatible(other, target)),
    }
}

macro_rules! integer_conversions {
    ($($t:ty => $c:ident, $sql:expr, $variant:ident);* $(;)?) => {
        $(
            impl sealed::Sealed for $t {}

            impl FromValue for $t {
                fn from_value(value: &Value) -> Result<Self> {
                    let wide = integral(value, stringify!($t))?;
                    <$t>::try_from(wide).map_err(|_| {
                        Error::type_incompatible(format!(
                            "value {} out of range for {}",
                            wide,
                            stringify!($t)
                        ))
                    })
                }
            }

            impl Parameter for $t {
                fn c_type() -> CType {
                    CType::$c
                }

                fn sql_type() -> SqlType {
                    $sql
                }

                fn to_value(&self) -> Result<Value> {
                    Ok(Value::$variant((*self).into()))
                }
            }
        )*
    };
}

integer_conversions! {
    i8 => STinyInt, SqlType::TinyInt, TinyInt;
    u8 => UTinyInt, SqlType::TinyInt, SmallInt;
    i16 => SShort, SqlType::SmallInt, SmallInt;
    u16 => UShort, SqlType::Integer, Integer;
    i32 => SLong, SqlType::Integer, Integer;
    u32 => ULong, SqlType::BigInt, BigInt;
    i64 => SBigInt, SqlType::BigInt, BigInt;
    u64 => UBigInt, SqlType::BigInt, UBigInt;
}

fn floating(value: &Value, target: &str) -> Result<f64> {
    if let Some(f) = value.as_f64() {
        return Ok(f);
    }
    match value {
        Value::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| Error::type_incompatible(format!("cannot parse '{}' as {}", s, target))),
        other => Err(incompatible(other, target)),
    }
}

impl sealed::Sealed for f32 {}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Result<Self> {
        floating(value, "f32").map(|f| f as f32)
    }
}

impl Parameter for f32 {
    fn c_type() -> CType {
        CType::Float
    }

    fn sql_type() -> SqlType {
        SqlType::Real
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::Real(*self))
    }
}

impl sealed::Sealed for f64 {}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        floating(value, "f64")
    }
}

impl Parameter for f64 {
    fn c_type() -> CType {
        CType::Double
    }

    fn sql_type() -> SqlType {
        SqlType::Double
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::Double(*self))
    }
}

impl sealed::Sealed for bool {}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bit(b) => Ok(*b),
            Value::Text(s) => match s.trim() {
                "1" | "true" | "TRUE" => Ok(true),
                "0" | "false" | "FALSE" => Ok(false),
                _ => Err(Error::type_incompatible(format!(
                    "cannot parse '{}' as bool",
                    s
                ))),
            },
            other => integral(other, "bool").map(|v| v != 0),
        }
    }
}

impl Parameter for bool {
    fn c_type() -> CType {
        CType::Bit
    }

    fn sql_type() -> SqlType {
        SqlType::Bit
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::Bit(*self))
    }
}

impl sealed::Sealed for String {}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            Value::Binary(_) | Value::Null => Err(incompatible(value, "String")),
            other => Ok(other.to_string()),
        }
    }
}

impl sealed::Sealed for Vec<u8> {}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self> {
        value
            .as_bytes()
            .map(|b| b.to_vec())
            .ok_or_else(|| incompatible(value, "Vec<u8>"))
    }
}

impl sealed::Sealed for Value {}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

impl sealed::Sealed for Date {}

impl FromValue for Date {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Date(d) => Ok(*d),
            Value::Timestamp(ts) => Ok(ts.date()),
            Value::Text(s) => parse_date(s),
            other => Err(incompatible(other, "Date")),
        }
    }
}

impl Parameter for Date {
    fn c_type() -> CType {
        CType::Date
    }

    fn sql_type() -> SqlType {
        SqlType::Date
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::Date(*self))
    }
}

impl sealed::Sealed for Time {}

impl FromValue for Time {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Time(t) => Ok(*t),
            Value::Timestamp(ts) => Ok(ts.time()),
            Value::Text(s) => parse_time(s),
            other => Err(incompatible(other, "Time")),
        }
    }
}

impl Parameter for Time {
    fn c_type() -> CType {
        CType::Time
    }

    fn sql_type() -> SqlType {
        SqlType::Time
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::Time(*self))
    }
}

impl sealed::Sealed for Timestamp {}

impl FromValue for Timestamp {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Timestamp(ts) => Ok(*ts),
            Value::Date(d) => Ok(Timestamp::from(*d)),
            Value::Text(s) => parse_timestamp(s),
            other => Err(incompatible(other, "Timestamp")),
        }
    }
}

impl Parameter for Timestamp {
    fn c_type() -> CType {
        CType::Timestamp
    }

    fn sql_type() -> SqlType {
        SqlType::Timestamp { precision: 9 }
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::Timestamp(*self))
    }
}

impl sealed::Sealed for NaiveDate {}

impl FromValue for NaiveDate {
    fn from_value(value: &Value) -> Result<Self> {
        Date::from_value(value)?.to_naive()
    }
}

impl Parameter for NaiveDate {
    fn c_type() -> CType {
        CType::Date
    }

    fn sql_type() -> SqlType {
        SqlType::Date
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::Date(Date::try_from(*self)?))
    }
}

impl sealed::Sealed for NaiveTime {}

impl FromValue for NaiveTime {
    fn from_value(value: &Value) -> Result<Self> {
        Time::from_value(value)?.to_naive()
    }
}

impl Parameter for NaiveTime {
    fn c_type() -> CType {
        CType::Time
    }

    fn sql_type() -> SqlType {
        SqlType::Time
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::Time(Time::from(*self)))
    }
}

impl sealed::Sealed for NaiveDateTime {}

impl FromValue for NaiveDateTime {
    fn from_value(value: &Value) -> Result<Self> {
        Timestamp::from_value(value)?.to_naive()
    }
}

impl Parameter for NaiveDateTime {
    fn c_type() -> CType {
        CType::Timestamp
    }

    fn sql_type() -> SqlType {
        SqlType::Timestamp { precision: 9 }
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::Timestamp(Timestamp::try_from(*self)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_widening_and_narrowing() {
        assert_eq!(i64::from_value(&Value::Integer(7)).unwrap(), 7);
        assert_eq!(i16::from_value(&Value::BigInt(300)).unwrap(), 300);
        assert!(matches!(
            i8::from_value(&Value::BigInt(300)),
            Err(Error::TypeIncompatible { .. })
        ));
        assert!(u32::from_value(&Value::Integer(-1)).is_err());
    }

    #[test]
    fn test_integer_from_text_and_float() {
        assert_eq!(i32::from_value(&Value::Text(" 42 ".into())).unwrap(), 42);
        assert_eq!(i32::from_value(&Value::Double(3.0)).unwrap(), 3);
        assert!(i32::from_value(&Value::Double(3.5)).is_err());
        assert!(i32::from_value(&Value::Date(Date::new(2020, 1, 1))).is_err());
    }

    #[test]
    fn test_string_renders_scalars() {
        assert_eq!(String::from_value(&Value::Integer(5)).unwrap(), "5");
        assert_eq!(
            String::from_value(&Value::Date(Date::new(2020, 1, 2))).unwrap(),
            "2020-01-02"
        );
        assert!(String::from_value(&Value::Binary(vec![1])).is_err());
    }

    #[test]
    fn test_temporal_conversions() {
        let ts = Timestamp {
            year: 2022,
            month: 3,
            day: 4,
            hour: 5,
            minute: 6,
            second: 7,
            fraction: 0,
        };
        assert_eq!(Date::from_value(&Value::Timestamp(ts)).unwrap(), Date::new(2022, 3, 4));
        assert_eq!(Time::from_value(&Value::Timestamp(ts)).unwrap(), Time::new(5, 6, 7));
        let naive = NaiveDateTime::from_value(&Value::Timestamp(ts)).unwrap();
        assert_eq!(Timestamp::try_from(naive).unwrap(), ts);
    }

    #[test]
    fn test_parameter_table() {
        assert_eq!(i32::c_type(), CType::SLong);
        assert_eq!(i32::sql_type(), SqlType::Integer);
        assert_eq!(7u8.to_value().unwrap(), Value::SmallInt(7));
        assert_eq!(f64::c_type(), CType::Double);
        assert_eq!(true.to_value().unwrap(), Value::Bit(true));
    }
}
