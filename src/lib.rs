//! Statement and result binding over a handle-based database driver.
//!
//! The crate owns the lifecycle of native environment, connection and
//! statement handles, manages per-column and per-parameter buffers, and
//! marshals values between native buffer layouts and Rust types. Drivers
//! plug in through the [`native::Driver`] trait; [`native::memory::MemoryDriver`]
//! is an in-process implementation.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use odbc_bind::native::memory::MemoryDriver;
//! use odbc_bind::{ConnectOptions, Connection, Nulls, Result, Statement, Transaction};
//!
//! fn main() -> Result<()> {
//!     let conn = Connection::open(Arc::new(MemoryDriver::new()), &ConnectOptions::dsn("demo", "", ""))?;
//!     let stmt = Statement::new(&conn)?;
//!     stmt.just_execute_direct("CREATE TABLE simple (a INT, b VARCHAR(10))", 1)?;
//!
//!     let tx = Transaction::new(&conn)?;
//!     stmt.prepare("INSERT INTO simple (a, b) VALUES (?, ?)")?;
//!     stmt.bind_array(0, &[1, 2, 3], Nulls::Sentinel(&2))?;
//!     stmt.bind_strings(1, &["one", "two", "three"], 10, Nulls::None)?;
//!     stmt.just_execute(3)?;
//!     tx.commit()?;
//!
//!     let result = stmt.execute_direct("SELECT a, b FROM simple ORDER BY b", 1)?;
//!     while result.next()? {
//!         let a: Option<i32> = result.get_opt(0)?;
//!         let b: String = result.get("b")?;
//!         println!("{:?} {}", a, b);
//!     }
//!     Ok(())
//! }
//! ```

pub mod async_gate;
pub mod attribute;
pub mod catalog;
pub mod connection;
pub mod cursor;
pub mod descriptor;
pub mod error;
mod handle;
pub mod native;
pub mod statement;
pub mod transaction;
pub mod tvp;
pub mod types;

// Re-export main types
pub use async_gate::EventHandle;
pub use attribute::{Attribute, AttributeValue};
pub use catalog::Catalog;
pub use connection::{list_datasources, list_drivers, ConnectOptions, Connection, InfoValue};
pub use cursor::{ResultSet, RowsIter};
pub use descriptor::{ImplementationRowDescriptor, Searchability, Updatability};
pub use error::{Error, Result};
pub use native::{DataSourceInfo, Driver, DriverInfo, ParamDirection};
pub use statement::{BatchOps, Nulls, Statement};
pub use transaction::Transaction;
pub use tvp::TableValuedParameter;
pub use types::{
    ColumnDescriptor, ColumnIndex, ColumnInfo, CType, Date, FromValue, Nullability, Parameter,
    Row, SqlType, Time, Timestamp, Value,
};
