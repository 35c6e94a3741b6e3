//! Logical data types exchanged with the engine.

mod column;
mod convert;
mod datetime;
mod row;
mod sql_type;
mod value;

pub use column::{ColumnDescriptor, ColumnIndex, ColumnInfo, Nullability};
pub use convert::{FromValue, Parameter};
pub use datetime::{parse_date, parse_time, parse_timestamp, Date, Time, Timestamp};
pub use row::Row;
pub use sql_type::{CType, SqlType};
pub use value::Value;
