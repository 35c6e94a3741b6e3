//! Table-valued parameters.
//!
//! A table-valued parameter sends a whole rowset through one parameter
//! marker. Each column of the rowset is an array buffer of `row_count`
//! elements, multiplexed under the parameter's ordinal.

use crate::error::{Error, Result};
use crate::native::{BoundBuffer, ParamDirection};
use crate::statement::{fill_buffer, fill_strings, Nulls, Statement};
use crate::types::{CType, Parameter, SqlType};

/// Column-wise binder for one table-valued parameter.
///
/// # Example
///
/// ```
/// # use std::sync::Arc;
/// # use odbc_bind::native::memory::MemoryDriver;
/// # use odbc_bind::{ConnectOptions, Connection, Nulls, Statement, TableValuedParameter};
/// # fn main() -> odbc_bind::Result<()> {
/// # let conn = Connection::open(Arc::new(MemoryDriver::new()), &ConnectOptions::dsn("tvp", "", ""))?;
/// let stmt = Statement::new(&conn)?;
/// stmt.just_execute_direct("CREATE TABLE t (id INT, name VARCHAR(10))", 1)?;
/// stmt.prepare("INSERT INTO t SELECT * FROM ?")?;
/// let mut tvp = TableValuedParameter::open(&stmt, 0, 2)?;
/// tvp.bind(0, &[1, 2], Nulls::None)?;
/// tvp.bind_strings(1, &["one", "two"], 10, Nulls::None)?;
/// tvp.close()?;
/// stmt.just_execute(1)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TableValuedParameter {
    statement: Statement,
    index: usize,
    row_count: usize,
    closed: bool,
}

impl TableValuedParameter {
    /// Start binding `row_count` rows to parameter `index`, which must be of
    /// table type. Replaces whatever was bound there before.
    pub fn open(statement: &Statement, index: usize, row_count: usize) -> Result<Self> {
        if row_count == 0 {
            return Err(Error::programming("a table-valued parameter needs at least one row"));
        }
        statement.open_table_parameter(index, row_count)?;
        Ok(Self {
            statement: statement.clone(),
            index,
            row_count,
            closed: false,
        })
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    fn install(&self, buffer: BoundBuffer) -> Result<()> {
        if self.closed {
            return Err(Error::programming("table-valued parameter is closed"));
        }
        if buffer.count() != self.row_count {
            return Err(Error::programming(format!(
                "column {} has {} values for {} rows",
                buffer.ordinal(),
                buffer.count(),
                self.row_count
            )));
        }
        self.statement.with_table_parameter(self.index, |table| {
            table.columns.insert(buffer);
            Ok(())
        })
    }

    /// Bind column `column` from fixed-width values.
    pub fn bind<T: Parameter + PartialEq>(
        &mut self,
        column: usize,
        values: &[T],
        nulls: Nulls<'_, T>,
    ) -> Result<()> {
        let buffer = fill_buffer(column, T::sql_type(), values, &nulls, ParamDirection::In)?;
        self.install(buffer)
    }

    /// Bind column `column` from strings of at most `value_size` bytes.
    pub fn bind_strings<S: AsRef<str>>(
        &mut self,
        column: usize,
        values: &[S],
        value_size: usize,
        nulls: Nulls<'_, str>,
    ) -> Result<()> {
        let sql_type = SqlType::VarChar { size: value_size };
        let buffer = fill_strings(column, sql_type, values, value_size, &nulls)?;
        self.install(buffer)
    }

    /// Bind column `column` as all NULL.
    pub fn bind_null(&mut self, column: usize) -> Result<()> {
        let mut buffer = BoundBuffer::new(
            column,
            CType::Char,
            SqlType::VarChar { size: 1 },
            1,
            self.row_count,
        );
        for i in 0..self.row_count {
            buffer.set_null(i);
        }
        self.install(buffer)
    }

    /// Finish binding. Columns must be bound without gaps, starting at 0.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.statement.with_table_parameter(self.index, |table| {
            let bound = table.columns.len();
            match table.columns.last_ordinal() {
                Some(last) if last + 1 == bound => Ok(()),
                Some(last) => Err(Error::programming(format!(
                    "table-valued parameter columns are not contiguous: {} bound, highest {}",
                    bound, last
                ))),
                None => Err(Error::programming("table-valued parameter has no columns")),
            }
        })?;
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ConnectOptions, Connection};
    use crate::native::memory::MemoryDriver;
    use std::sync::Arc;

    fn prepared() -> (Connection, Statement) {
        let conn =
            Connection::open(Arc::new(MemoryDriver::new()), &ConnectOptions::dsn("tvp", "", ""))
                .unwrap();
        let stmt = Statement::new(&conn).unwrap();
        stmt.just_execute_direct("CREATE TABLE t (id INT, name VARCHAR(10))", 1)
            .unwrap();
        stmt.prepare("INSERT INTO t SELECT * FROM ?").unwrap();
        (conn, stmt)
    }

    #[test]
    fn test_rows_inserted() {
        let (_conn, stmt) = prepared();
        let mut tvp = TableValuedParameter::open(&stmt, 0, 3).unwrap();
        tvp.bind(0, &[1, 2, 3], Nulls::None).unwrap();
        tvp.bind_strings(1, &["a", "", "c"], 10, Nulls::Sentinel("")).unwrap();
        tvp.close().unwrap();
        stmt.just_execute(1).unwrap();
        assert_eq!(stmt.affected_rows().unwrap(), 3);

        let result = stmt
            .execute_direct("SELECT id, name FROM t WHERE name IS NULL", 1)
            .unwrap();
        assert!(result.next().unwrap());
        assert_eq!(result.get::<i32>(0).unwrap(), 2);
        assert!(!result.next().unwrap());
    }

    #[test]
    fn test_row_count_mismatch() {
        let (_conn, stmt) = prepared();
        let mut tvp = TableValuedParameter::open(&stmt, 0, 2).unwrap();
        let err = tvp.bind(0, &[1, 2, 3], Nulls::None).unwrap_err();
        assert!(matches!(err, Error::Programming { .. }));
    }

    #[test]
    fn test_gap_in_columns() {
        let (_conn, stmt) = prepared();
        let mut tvp = TableValuedParameter::open(&stmt, 0, 1).unwrap();
        tvp.bind_null(1).unwrap();
        assert!(matches!(tvp.close(), Err(Error::Programming { .. })));
        tvp.bind(0, &[5i64], Nulls::None).unwrap();
        tvp.close().unwrap();
        assert!(matches!(tvp.bind_null(0), Err(Error::Programming { .. })));
    }

    #[test]
    fn test_scalar_parameter_rejected() {
        let (_conn, stmt) = prepared();
        stmt.prepare("INSERT INTO t (id) VALUES (?)").unwrap();
        let err = TableValuedParameter::open(&stmt, 0, 1).unwrap_err();
        assert!(matches!(err, Error::TypeIncompatible { .. }));
    }
}
