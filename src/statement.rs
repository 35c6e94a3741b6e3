//! Statements: preparation, parameter binding and execution.
//!
//! Parameter buffers belong to the statement and persist across executions
//! until [`Statement::reset_parameters`], a new prepare, or close. Every
//! execution produces a new [`ResultSet`]; results of earlier executions
//! become stale.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, warn};

use crate::async_gate::{AsyncGate, AsyncOp, EventHandle};
use crate::attribute::Attribute;
use crate::connection::Connection;
use crate::cursor::ResultSet;
use crate::descriptor::ImplementationRowDescriptor;
use crate::error::{Error, Result};
use crate::handle::HandleGuard;
use crate::native::constants::{SQL_ATTR_PARAMSET_SIZE, SQL_ATTR_QUERY_TIMEOUT};
use crate::native::{
    BoundBuffer, CatalogQuery, FreeStmt, HandleKind, NativeHandle, ParamDescription,
    ParamDirection, ParameterSet, SqlResult, TableParameter,
};
use crate::types::{CType, FromValue, Parameter, SqlType, Value};

/// How NULL elements of a bound array are marked.
#[derive(Debug, Clone, Copy)]
pub enum Nulls<'a, T: ?Sized> {
    /// No element is NULL.
    None,
    /// Elements equal to this value are NULL.
    Sentinel(&'a T),
    /// Per-element flags, one per value; `true` marks NULL.
    Flags(&'a [bool]),
}

impl<T: ?Sized + PartialEq> Nulls<'_, T> {
    fn check(&self, len: usize) -> Result<()> {
        match self {
            Nulls::Flags(flags) if flags.len() != len => Err(Error::programming(format!(
                "{} null flags for {} values",
                flags.len(),
                len
            ))),
            _ => Ok(()),
        }
    }

    fn is_null(&self, index: usize, value: &T) -> bool {
        match self {
            Nulls::None => false,
            Nulls::Sentinel(sentinel) => *sentinel == value,
            Nulls::Flags(flags) => flags[index],
        }
    }
}

/// Array sizes for one execution.
///
/// `parameters` is the number of parameter-array elements the driver
/// consumes; `rowset` the number of rows fetched per round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOps {
    pub parameters: usize,
    pub rowset: usize,
}

impl BatchOps {
    pub fn new(parameters: usize, rowset: usize) -> Self {
        Self {
            parameters: parameters.max(1),
            rowset: rowset.max(1),
        }
    }
}

impl Default for BatchOps {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl From<usize> for BatchOps {
    fn from(n: usize) -> Self {
        Self::new(n, n)
    }
}

/// Fill a fixed-width buffer from typed values.
pub(crate) fn fill_buffer<T: Parameter + PartialEq>(
    ordinal: usize,
    sql_type: SqlType,
    values: &[T],
    nulls: &Nulls<'_, T>,
    direction: ParamDirection,
) -> Result<BoundBuffer> {
    check_len(ordinal, values.len(), nulls)?;
    let c_type = T::c_type();
    let width = c_type.fixed_width().ok_or_else(|| {
        Error::type_incompatible(format!("{:?} parameters need an explicit element size", c_type))
    })?;
    let mut buffer =
        BoundBuffer::new(ordinal, c_type, sql_type, width, values.len()).with_direction(direction);
    for (i, v) in values.iter().enumerate() {
        if nulls.is_null(i, v) {
            buffer.set_null(i);
        } else {
            buffer.write_value(i, &v.to_value()?)?;
        }
    }
    Ok(buffer)
}

/// Fill a character buffer of `value_size + 1` bytes per element.
pub(crate) fn fill_strings<S: AsRef<str>>(
    ordinal: usize,
    sql_type: SqlType,
    values: &[S],
    value_size: usize,
    nulls: &Nulls<'_, str>,
) -> Result<BoundBuffer> {
    check_len(ordinal, values.len(), nulls)?;
    let mut buffer = BoundBuffer::new(ordinal, CType::Char, sql_type, value_size + 1, values.len());
    for (i, v) in values.iter().enumerate() {
        let s = v.as_ref();
        if nulls.is_null(i, s) {
            buffer.set_null(i);
            continue;
        }
        if s.len() > value_size {
            return Err(Error::database(
                "22001",
                format!(
                    "string data, right truncation: parameter {} element {} is {} bytes, limit {}",
                    ordinal,
                    i,
                    s.len(),
                    value_size
                ),
            ));
        }
        buffer.write_value(i, &Value::Text(s.to_string()))?;
    }
    Ok(buffer)
}

/// Fill a binary buffer as wide as the longest value.
pub(crate) fn fill_binary<B: AsRef<[u8]>>(
    ordinal: usize,
    sql_type: Option<SqlType>,
    values: &[B],
    nulls: &Nulls<'_, [u8]>,
) -> Result<BoundBuffer> {
    check_len(ordinal, values.len(), nulls)?;
    let width = values.iter().map(|v| v.as_ref().len()).max().unwrap_or(0).max(1);
    let sql_type = sql_type.unwrap_or(SqlType::VarBinary { size: width });
    let mut buffer = BoundBuffer::new(ordinal, CType::Binary, sql_type, width, values.len());
    for (i, v) in values.iter().enumerate() {
        let bytes = v.as_ref();
        if nulls.is_null(i, bytes) {
            buffer.set_null(i);
        } else {
            buffer.write_value(i, &Value::Binary(bytes.to_vec()))?;
        }
    }
    Ok(buffer)
}

fn check_len<T: ?Sized + PartialEq>(ordinal: usize, len: usize, nulls: &Nulls<'_, T>) -> Result<()> {
    if len == 0 {
        return Err(Error::programming(format!(
            "parameter {}: cannot bind an empty array",
            ordinal
        )));
    }
    nulls.check(len)
}

#[derive(Default)]
struct StatementState {
    conn: Option<Connection>,
    guard: Option<Arc<HandleGuard>>,
    params: ParameterSet,
    /// Parameter types declared by the caller, by 0-based index.
    described: BTreeMap<usize, SqlType>,
    timeout: Duration,
    prepared: bool,
    /// Bumped by every prepare, execution and close.
    generation: u64,
    gate: AsyncGate,
    /// Status of an asynchronous operation that finished immediately.
    early: Option<Result<()>>,
    pending_rowset: usize,
}

impl StatementState {
    fn open_guard(&self) -> Result<Arc<HandleGuard>> {
        match (&self.guard, &self.conn) {
            (Some(guard), Some(conn)) if conn.connected() => Ok(Arc::clone(guard)),
            _ => Err(Error::programming("statement is not open on a connected connection")),
        }
    }

    /// The open handle, failing while an asynchronous operation is pending.
    fn ready(&self) -> Result<Arc<HandleGuard>> {
        self.gate.ensure_idle()?;
        self.open_guard()
    }

    fn ensure_prepared(&self) -> Result<()> {
        if self.prepared {
            Ok(())
        } else {
            Err(Error::programming("statement is not prepared"))
        }
    }

    fn apply_timeout(&self, guard: &HandleGuard) -> Result<()> {
        if self.timeout.is_zero() {
            return Ok(());
        }
        let attribute = Attribute::unsigned(SQL_ATTR_QUERY_TIMEOUT, self.timeout.as_secs() as usize);
        guard.ok(
            guard.driver().set_attribute(guard.handle(), &attribute),
            "SQLSetStmtAttr(SQL_ATTR_QUERY_TIMEOUT)",
        )
    }

    /// Validate bound arrays against the batch and tell the driver its size.
    fn paramset_size(&self, guard: &HandleGuard, batch: BatchOps) -> Result<usize> {
        let size = if self.params.buffers.min_count().is_none() && self.params.tables.is_empty() {
            1
        } else {
            batch.parameters.max(1)
        };
        if let Some(shortest) = self.params.buffers.min_count() {
            if shortest < size {
                return Err(Error::programming(format!(
                    "batch of {} parameter sets but a bound array holds only {}",
                    size, shortest
                )));
            }
        }
        let attribute = Attribute::unsigned(SQL_ATTR_PARAMSET_SIZE, size);
        guard.ok(
            guard.driver().set_attribute(guard.handle(), &attribute),
            "SQLSetStmtAttr(SQL_ATTR_PARAMSET_SIZE)",
        )?;
        Ok(size)
    }

    fn close(&mut self) {
        if let Some(guard) = self.guard.take() {
            if !guard
                .driver()
                .free_stmt(guard.handle(), FreeStmt::Close)
                .is_success()
            {
                warn!(raw = guard.handle().raw(), "closing cursor failed");
            }
        }
        self.conn = None;
        self.params.clear();
        self.described.clear();
        self.prepared = false;
        self.generation += 1;
        self.gate.abandon();
        self.early = None;
    }

    /// Register `event` and enter the pending state for `op`.
    fn begin_async(&mut self, guard: &HandleGuard, op: AsyncOp, event: &EventHandle) -> Result<()> {
        if !guard.driver().supports_async() {
            return Err(Error::not_supported("asynchronous statement execution"));
        }
        self.gate.begin(op)?;
        let registered = guard.driver().set_async_event(guard.handle(), Some(event.clone()));
        if let Err(e) = guard.ok(registered, "SQLSetStmtAttr(SQL_ATTR_ASYNC_STMT_EVENT)") {
            self.gate.abandon();
            return Err(e);
        }
        Ok(())
    }

    /// Record the immediate status of an asynchronous call.
    ///
    /// Returns `true` when the caller has to wait for the event.
    fn settle(&mut self, guard: &HandleGuard, status: SqlResult<()>, context: &str) -> bool {
        match status {
            SqlResult::StillExecuting => true,
            other => {
                self.early = Some(guard.ok(other, context));
                false
            }
        }
    }

    /// Leave the pending state for `op` and collect the final status.
    fn finish_async(&mut self, guard: &HandleGuard, op: AsyncOp, context: &str) -> Result<()> {
        self.gate.finish(op)?;
        let outcome = match self.early.take() {
            Some(outcome) => outcome,
            None => guard
                .ok(guard.driver().complete_async(guard.handle()), context)
                .map(|_| ()),
        };
        if !guard
            .driver()
            .set_async_event(guard.handle(), None)
            .is_success()
        {
            warn!(raw = guard.handle().raw(), "failed to clear asynchronous event");
        }
        outcome
    }

    fn num_params(&self, guard: &HandleGuard) -> Result<usize> {
        let n = guard.ok(guard.driver().num_params(guard.handle()), "SQLNumParams")?;
        Ok(n.max(0) as usize)
    }

    fn check_index(&self, guard: &HandleGuard, index: usize) -> Result<()> {
        let count = self.num_params(guard)?;
        if index >= count {
            return Err(Error::index_range(format!(
                "parameter {} out of range (parameters: {})",
                index, count
            )));
        }
        Ok(())
    }

    /// Type a parameter is bound as: caller's declaration, then the driver's
    /// description, then `fallback`.
    fn parameter_sql_type(&self, guard: &HandleGuard, index: usize, fallback: SqlType) -> SqlType {
        if let Some(sql_type) = self.described.get(&index) {
            return *sql_type;
        }
        match guard.driver().describe_param(guard.handle(), index as u16 + 1) {
            SqlResult::Success(d) | SqlResult::SuccessWithInfo(d) => {
                SqlType::from_raw(d.sql_type, d.size, d.decimal_digits)
            }
            _ => {
                debug!(index, %fallback, "parameter not described by driver, using default type");
                fallback
            }
        }
    }

    /// Common checks before binding parameter `index`.
    fn bindable(&self, index: usize) -> Result<Arc<HandleGuard>> {
        let guard = self.ready()?;
        self.ensure_prepared()?;
        self.check_index(&guard, index)?;
        Ok(guard)
    }

    fn install(&mut self, buffer: BoundBuffer) {
        self.params.tables.remove(&buffer.ordinal());
        self.params.buffers.insert(buffer);
    }
}

/// A statement on a connection.
///
/// Clones refer to the same native statement.
///
/// # Example
///
/// ```
/// # use std::sync::Arc;
/// # use odbc_bind::native::memory::MemoryDriver;
/// # use odbc_bind::{ConnectOptions, Connection, Nulls, Statement};
/// # fn main() -> odbc_bind::Result<()> {
/// # let conn = Connection::open(Arc::new(MemoryDriver::new()), &ConnectOptions::dsn("doc", "", ""))?;
/// let stmt = Statement::new(&conn)?;
/// stmt.just_execute_direct("CREATE TABLE t (id INT, name VARCHAR(10))", 1)?;
/// stmt.prepare("INSERT INTO t VALUES (?, ?)")?;
/// stmt.bind_array(0, &[1, 2, 3], Nulls::None)?;
/// stmt.bind_strings(1, &["a", "bb", "ccc"], 10, Nulls::None)?;
/// stmt.just_execute(3)?;
///
/// let result = stmt.execute_direct("SELECT id, name FROM t ORDER BY id", 1)?;
/// while result.next()? {
///     let id: i32 = result.get(0)?;
///     let name: String = result.get("name")?;
///     assert_eq!(name.len(), id as usize);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct Statement {
    state: Arc<Mutex<StatementState>>,
}

impl Statement {
    /// Create a statement and open it on `conn`.
    pub fn new(conn: &Connection) -> Result<Self> {
        let stmt = Self::default();
        stmt.open(conn)?;
        Ok(stmt)
    }

    fn lock(&self) -> MutexGuard<'_, StatementState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate the native statement on `conn`, closing any previous one.
    pub fn open(&self, conn: &Connection) -> Result<()> {
        self.open_with_attributes(conn, &[])
    }

    /// Like [`open`](Self::open), applying statement attributes in order.
    pub fn open_with_attributes(&self, conn: &Connection, attributes: &[Attribute]) -> Result<()> {
        let dbc = conn.dbc_guard()?;
        let mut state = self.lock();
        state.close();
        let guard = HandleGuard::acquire(conn.driver(), HandleKind::Statement, Some(&dbc))?;
        for attribute in attributes {
            guard.ok(
                conn.driver().set_attribute(guard.handle(), attribute),
                "SQLSetStmtAttr",
            )?;
        }
        state.guard = Some(guard);
        state.conn = Some(conn.clone());
        Ok(())
    }

    /// Whether the statement is open on a connected connection.
    pub fn connected(&self) -> bool {
        self.lock().open_guard().is_ok()
    }

    pub fn connection(&self) -> Option<Connection> {
        self.lock().conn.clone()
    }

    /// Release the native statement and all parameter buffers.
    pub fn close(&self) {
        self.lock().close();
    }

    /// Request cancellation of the running execution.
    pub fn cancel(&self) -> Result<()> {
        let guard = self.lock().open_guard()?;
        guard.ok(guard.driver().cancel(guard.handle()), "SQLCancel")
    }

    pub fn native_statement_handle(&self) -> Option<NativeHandle> {
        self.lock().guard.as_ref().map(|g| g.handle())
    }

    /// Query timeout applied before every prepare and execution. Zero disables it.
    pub fn set_timeout(&self, timeout: Duration) {
        self.lock().timeout = timeout;
    }

    pub(crate) fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Compile `query`. Parameter bindings and declarations are reset.
    pub fn prepare(&self, query: &str) -> Result<()> {
        let mut state = self.lock();
        let guard = state.ready()?;
        state.apply_timeout(&guard)?;
        state.generation += 1;
        state.prepared = false;
        guard.ok(guard.driver().prepare(guard.handle(), query), "SQLPrepare")?;
        state.prepared = true;
        state.params.clear();
        state.described.clear();
        debug!(query, "prepared");
        Ok(())
    }

    /// Start preparing `query`; see [`Connection::async_connect`] for the protocol.
    pub fn async_prepare(&self, query: &str, event: &EventHandle) -> Result<bool> {
        let mut state = self.lock();
        let guard = state.ready()?;
        state.apply_timeout(&guard)?;
        state.begin_async(&guard, AsyncOp::Prepare, event)?;
        state.generation += 1;
        state.prepared = false;
        let status = guard.driver().prepare(guard.handle(), query);
        Ok(state.settle(&guard, status, "SQLPrepare"))
    }

    pub fn complete_prepare(&self) -> Result<()> {
        let mut state = self.lock();
        let guard = state.open_guard()?;
        state.finish_async(&guard, AsyncOp::Prepare, "SQLPrepare")?;
        state.prepared = true;
        state.params.clear();
        state.described.clear();
        Ok(())
    }

    fn run(&self, query: Option<&str>, batch: BatchOps) -> Result<(Arc<HandleGuard>, u64)> {
        let mut state = self.lock();
        let guard = state.ready()?;
        if query.is_none() {
            state.ensure_prepared()?;
        }
        state.apply_timeout(&guard)?;
        let size = state.paramset_size(&guard, batch)?;
        state.generation += 1;
        let driver = Arc::clone(guard.driver());
        let (status, context) = match query {
            Some(q) => {
                state.prepared = false;
                (
                    driver.exec_direct(guard.handle(), q, &mut state.params, size),
                    "SQLExecDirect",
                )
            }
            None => (
                driver.execute(guard.handle(), &mut state.params, size),
                "SQLExecute",
            ),
        };
        guard.check(status, context)?;
        debug!(query, parameter_sets = size, "executed");
        Ok((guard, state.generation))
    }

    /// Execute the prepared statement over the bound parameters.
    pub fn execute(&self, batch: impl Into<BatchOps>) -> Result<ResultSet> {
        let batch = batch.into();
        let (guard, generation) = self.run(None, batch)?;
        ResultSet::open(self.clone(), guard, generation, batch.rowset)
    }

    /// Execute without producing a result set.
    pub fn just_execute(&self, batch: impl Into<BatchOps>) -> Result<()> {
        self.run(None, batch.into()).map(|_| ())
    }

    /// Prepare and execute `query` in one call.
    pub fn execute_direct(&self, query: &str, batch: impl Into<BatchOps>) -> Result<ResultSet> {
        let batch = batch.into();
        let (guard, generation) = self.run(Some(query), batch)?;
        ResultSet::open(self.clone(), guard, generation, batch.rowset)
    }

    pub fn just_execute_direct(&self, query: &str, batch: impl Into<BatchOps>) -> Result<()> {
        self.run(Some(query), batch.into()).map(|_| ())
    }

    fn start_execute(
        &self,
        query: Option<&str>,
        event: &EventHandle,
        batch: BatchOps,
    ) -> Result<bool> {
        let mut state = self.lock();
        let guard = state.ready()?;
        if query.is_none() {
            state.ensure_prepared()?;
        }
        state.apply_timeout(&guard)?;
        let size = state.paramset_size(&guard, batch)?;
        state.begin_async(&guard, AsyncOp::Execute, event)?;
        state.generation += 1;
        state.pending_rowset = batch.rowset;
        let driver = Arc::clone(guard.driver());
        let (status, context) = match query {
            Some(q) => {
                state.prepared = false;
                (
                    driver.exec_direct(guard.handle(), q, &mut state.params, size),
                    "SQLExecDirect",
                )
            }
            None => (
                driver.execute(guard.handle(), &mut state.params, size),
                "SQLExecute",
            ),
        };
        Ok(state.settle(&guard, status, context))
    }

    /// Start executing `query` asynchronously.
    pub fn async_execute_direct(
        &self,
        event: &EventHandle,
        query: &str,
        batch: impl Into<BatchOps>,
    ) -> Result<bool> {
        self.start_execute(Some(query), event, batch.into())
    }

    /// Start executing the prepared statement asynchronously.
    pub fn async_execute(&self, event: &EventHandle, batch: impl Into<BatchOps>) -> Result<bool> {
        self.start_execute(None, event, batch.into())
    }

    /// Finish an asynchronous execution and open its result set.
    pub fn complete_execute(&self) -> Result<ResultSet> {
        let (guard, generation, rowset) = {
            let mut state = self.lock();
            let guard = state.open_guard()?;
            state.finish_async(&guard, AsyncOp::Execute, "SQLExecute")?;
            (guard, state.generation, state.pending_rowset)
        };
        ResultSet::open(self.clone(), guard, generation, rowset)
    }

    /// Run a catalog function and open its result set.
    pub(crate) fn catalog(&self, query: &CatalogQuery<'_>) -> Result<ResultSet> {
        let context = match query {
            CatalogQuery::Tables { .. } => "SQLTables",
            CatalogQuery::TablePrivileges { .. } => "SQLTablePrivileges",
            CatalogQuery::Columns { .. } => "SQLColumns",
            CatalogQuery::PrimaryKeys { .. } => "SQLPrimaryKeys",
            CatalogQuery::Procedures { .. } => "SQLProcedures",
            CatalogQuery::ProcedureColumns { .. } => "SQLProcedureColumns",
        };
        let (guard, generation) = {
            let mut state = self.lock();
            let guard = state.ready()?;
            state.generation += 1;
            state.prepared = false;
            guard.ok(guard.driver().catalog(guard.handle(), query), context)?;
            (guard, state.generation)
        };
        ResultSet::open(self.clone(), guard, generation, 1)
    }

    /// Columns of matching procedures. Empty patterns match everything.
    pub fn procedure_columns(
        &self,
        catalog: &str,
        schema: &str,
        procedure: &str,
        column: &str,
    ) -> Result<ResultSet> {
        self.catalog(&CatalogQuery::ProcedureColumns {
            catalog: Some(catalog),
            schema: Some(schema),
            procedure: Some(procedure),
            column: Some(column),
        })
    }

    /// Rows affected by the last execution, -1 when unknown.
    pub fn affected_rows(&self) -> Result<i64> {
        let guard = self.lock().ready()?;
        guard.ok(guard.driver().row_count(guard.handle()), "SQLRowCount")
    }

    /// Number of result columns of the prepared or executed statement.
    pub fn columns(&self) -> Result<usize> {
        let guard = self.lock().ready()?;
        let n = guard.ok(guard.driver().num_result_cols(guard.handle()), "SQLNumResultCols")?;
        Ok(n.max(0) as usize)
    }

    /// Number of parameter markers of the prepared statement.
    pub fn parameters(&self) -> Result<usize> {
        let state = self.lock();
        let guard = state.ready()?;
        state.ensure_prepared()?;
        state.num_params(&guard)
    }

    fn describe_parameter(&self, index: usize) -> Result<ParamDescription> {
        let state = self.lock();
        let guard = state.bindable(index)?;
        if let Some(sql_type) = state.described.get(&index) {
            return Ok(ParamDescription {
                sql_type: sql_type.code(),
                size: sql_type.column_size(),
                decimal_digits: sql_type.decimal_digits(),
                nullable: crate::native::constants::SQL_NULLABLE_UNKNOWN,
            });
        }
        guard.ok(
            guard.driver().describe_param(guard.handle(), index as u16 + 1),
            "SQLDescribeParam",
        )
    }

    pub fn parameter_type(&self, index: usize) -> Result<SqlType> {
        let d = self.describe_parameter(index)?;
        Ok(SqlType::from_raw(d.sql_type, d.size, d.decimal_digits))
    }

    pub fn parameter_size(&self, index: usize) -> Result<usize> {
        Ok(self.describe_parameter(index)?.size)
    }

    pub fn parameter_scale(&self, index: usize) -> Result<i16> {
        Ok(self.describe_parameter(index)?.decimal_digits)
    }

    /// Declare parameter types so binding needs no driver description.
    ///
    /// Declarations survive rebinding until the next prepare or close.
    pub fn describe_parameters(&self, types: &[(usize, SqlType)]) {
        let mut state = self.lock();
        for (index, sql_type) in types {
            state.described.insert(*index, *sql_type);
        }
    }

    /// Bind one input value.
    pub fn bind<T: Parameter + PartialEq>(&self, index: usize, value: &T) -> Result<()> {
        self.bind_param(index, std::slice::from_ref(value), Nulls::None, ParamDirection::In)
    }

    /// Bind an input array for batch execution.
    pub fn bind_array<T: Parameter + PartialEq>(
        &self,
        index: usize,
        values: &[T],
        nulls: Nulls<'_, T>,
    ) -> Result<()> {
        self.bind_param(index, values, nulls, ParamDirection::In)
    }

    /// Bind values with an explicit direction. Output elements are read back
    /// with [`parameter_value`](Self::parameter_value).
    pub fn bind_param<T: Parameter + PartialEq>(
        &self,
        index: usize,
        values: &[T],
        nulls: Nulls<'_, T>,
        direction: ParamDirection,
    ) -> Result<()> {
        let mut state = self.lock();
        let guard = state.bindable(index)?;
        let sql_type = state.parameter_sql_type(&guard, index, T::sql_type());
        let buffer = fill_buffer(index, sql_type, values, &nulls, direction)?;
        state.install(buffer);
        Ok(())
    }

    /// Bind an array of strings, each at most `value_size` bytes.
    ///
    /// A longer string fails with a database error (state 22001).
    pub fn bind_strings<S: AsRef<str>>(
        &self,
        index: usize,
        values: &[S],
        value_size: usize,
        nulls: Nulls<'_, str>,
    ) -> Result<()> {
        let mut state = self.lock();
        let guard = state.bindable(index)?;
        let sql_type =
            state.parameter_sql_type(&guard, index, SqlType::VarChar { size: value_size });
        let buffer = fill_strings(index, sql_type, values, value_size, &nulls)?;
        state.install(buffer);
        Ok(())
    }

    /// Bind an array of binary values.
    pub fn bind_binary<B: AsRef<[u8]>>(
        &self,
        index: usize,
        values: &[B],
        nulls: Nulls<'_, [u8]>,
    ) -> Result<()> {
        let mut state = self.lock();
        let guard = state.bindable(index)?;
        let described = match state.described.get(&index) {
            Some(t) => Some(*t),
            None => match guard.driver().describe_param(guard.handle(), index as u16 + 1) {
                SqlResult::Success(d) | SqlResult::SuccessWithInfo(d) => {
                    Some(SqlType::from_raw(d.sql_type, d.size, d.decimal_digits))
                }
                _ => None,
            },
        };
        let buffer = fill_binary(index, described, values, &nulls)?;
        state.install(buffer);
        Ok(())
    }

    /// Bind `count` NULL elements.
    pub fn bind_null(&self, index: usize, count: usize) -> Result<()> {
        let mut state = self.lock();
        let guard = state.bindable(index)?;
        let sql_type = state.parameter_sql_type(&guard, index, SqlType::VarChar { size: 1 });
        let buffer = BoundBuffer::new(index, CType::Char, sql_type, 1, count.max(1));
        state.install(buffer);
        Ok(())
    }

    /// Read element `element` of a bound parameter, typically after
    /// executing with an output direction.
    pub fn parameter_value<T: FromValue>(&self, index: usize, element: usize) -> Result<T> {
        let state = self.lock();
        let buffer = state
            .params
            .buffers
            .get(index)
            .ok_or_else(|| Error::index_range(format!("parameter {} is not bound", index)))?;
        if element >= buffer.count() {
            return Err(Error::index_range(format!(
                "parameter {} has {} elements, requested {}",
                index,
                buffer.count(),
                element
            )));
        }
        match buffer.value(element)? {
            Value::Null => Err(Error::null_access(format!("parameter {}", index))),
            value => T::from_value(&value),
        }
    }

    /// Unbind all parameters. Declared types are kept.
    pub fn reset_parameters(&self) {
        let mut state = self.lock();
        state.params.clear();
        if let Some(guard) = &state.guard {
            if !guard
                .driver()
                .free_stmt(guard.handle(), FreeStmt::ResetParams)
                .is_success()
            {
                warn!(raw = guard.handle().raw(), "resetting parameters failed");
            }
        }
    }

    /// The implementation row descriptor of the current result shape.
    pub fn implementation_row_descriptor(&self) -> Result<ImplementationRowDescriptor> {
        let guard = self.lock().ready()?;
        ImplementationRowDescriptor::new(guard)
    }

    /// Start a table-valued parameter at `index` with `row_count` rows.
    pub(crate) fn open_table_parameter(&self, index: usize, row_count: usize) -> Result<()> {
        let mut state = self.lock();
        let guard = state.bindable(index)?;
        let sql_type = state.parameter_sql_type(&guard, index, SqlType::Table);
        if sql_type != SqlType::Table {
            return Err(Error::type_incompatible(format!(
                "parameter {} is {}, not a table type",
                index, sql_type
            )));
        }
        state.params.buffers.remove(index);
        state.params.tables.insert(
            index,
            TableParameter {
                row_count,
                columns: Default::default(),
            },
        );
        Ok(())
    }

    pub(crate) fn with_table_parameter<R>(
        &self,
        index: usize,
        f: impl FnOnce(&mut TableParameter) -> Result<R>,
    ) -> Result<R> {
        let mut state = self.lock();
        let table = state.params.tables.get_mut(&index).ok_or_else(|| {
            Error::programming(format!("table parameter {} is not open", index))
        })?;
        f(table)
    }
}

impl std::fmt::Debug for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("Statement")
            .field("handle", &state.guard.as_ref().map(|g| g.handle()))
            .field("prepared", &state.prepared)
            .field("parameters", &state.params.buffers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectOptions;
    use crate::native::memory::MemoryDriver;

    fn setup() -> (Connection, Statement) {
        let conn =
            Connection::open(Arc::new(MemoryDriver::new()), &ConnectOptions::dsn("stmt", "", ""))
                .unwrap();
        let stmt = Statement::new(&conn).unwrap();
        stmt.just_execute_direct("CREATE TABLE t (id INT, name VARCHAR(5), data VARBINARY(8))", 1)
            .unwrap();
        (conn, stmt)
    }

    #[test]
    fn test_batch_ops_from_usize() {
        assert_eq!(BatchOps::from(10), BatchOps::new(10, 10));
        assert_eq!(BatchOps::new(0, 0), BatchOps::default());
    }

    #[test]
    fn test_unopened_statement_is_programming_error() {
        let stmt = Statement::default();
        assert!(!stmt.connected());
        assert!(matches!(stmt.prepare("SELECT 1"), Err(Error::Programming { .. })));
    }

    #[test]
    fn test_bind_requires_prepare_and_valid_index() {
        let (_conn, stmt) = setup();
        assert!(matches!(stmt.bind(0, &1i32), Err(Error::Programming { .. })));
        stmt.prepare("INSERT INTO t (id, name) VALUES (?, ?)").unwrap();
        assert_eq!(stmt.parameters().unwrap(), 2);
        assert!(matches!(stmt.bind(2, &1i32), Err(Error::IndexRange { .. })));
        assert_eq!(stmt.parameter_type(1).unwrap(), SqlType::VarChar { size: 5 });
    }

    #[test]
    fn test_string_longer_than_value_size() {
        let (_conn, stmt) = setup();
        stmt.prepare("INSERT INTO t (name) VALUES (?)").unwrap();
        let err = stmt.bind_strings(0, &["toolong"], 3, Nulls::None).unwrap_err();
        assert_eq!(err.state(), Some("22001"));
    }

    #[test]
    fn test_null_flags_must_match_values() {
        let (_conn, stmt) = setup();
        stmt.prepare("INSERT INTO t (id) VALUES (?)").unwrap();
        let err = stmt.bind_array(0, &[1, 2], Nulls::Flags(&[true])).unwrap_err();
        assert!(matches!(err, Error::Programming { .. }));
    }

    #[test]
    fn test_batch_larger_than_arrays() {
        let (_conn, stmt) = setup();
        stmt.prepare("INSERT INTO t (id) VALUES (?)").unwrap();
        stmt.bind_array(0, &[1, 2], Nulls::None).unwrap();
        assert!(matches!(stmt.just_execute(3), Err(Error::Programming { .. })));
        stmt.just_execute(2).unwrap();
        assert_eq!(stmt.affected_rows().unwrap(), 2);
    }

    #[test]
    fn test_sentinel_nulls_and_binary() {
        let (_conn, stmt) = setup();
        stmt.prepare("INSERT INTO t (id, data) VALUES (?, ?)").unwrap();
        stmt.bind_array(0, &[1, -1, 3], Nulls::Sentinel(&-1)).unwrap();
        let blobs: [&[u8]; 3] = [b"\x01", b"", b"\x02\x03"];
        stmt.bind_binary(1, &blobs, Nulls::Flags(&[false, true, false])).unwrap();
        stmt.just_execute(3).unwrap();

        let result = stmt.execute_direct("SELECT id, data FROM t WHERE id IS NULL", 1).unwrap();
        assert!(result.next().unwrap());
        assert!(result.is_null(0).unwrap());
        assert!(result.is_null(1).unwrap());
        assert!(!result.next().unwrap());
    }

    #[test]
    fn test_declared_types_override_description() {
        let (_conn, stmt) = setup();
        stmt.prepare("SELECT ?").unwrap();
        stmt.describe_parameters(&[(0, SqlType::BigInt)]);
        assert_eq!(stmt.parameter_type(0).unwrap(), SqlType::BigInt);
        stmt.bind(0, &7i32).unwrap();
        let result = stmt.execute(1).unwrap();
        assert_eq!(result.column_datatype(0).unwrap(), SqlType::BigInt);
        assert!(result.next().unwrap());
        assert_eq!(result.get::<i64>(0).unwrap(), 7);
    }

    #[test]
    fn test_output_parameter_readback() {
        let (_conn, stmt) = setup();
        stmt.prepare("CALL increment(?)").unwrap();
        stmt.bind_param(0, &[41i64], Nulls::None, ParamDirection::InOut).unwrap();
        stmt.just_execute(1).unwrap();
        assert_eq!(stmt.parameter_value::<i64>(0, 0).unwrap(), 42);
        assert!(matches!(stmt.parameter_value::<i64>(0, 1), Err(Error::IndexRange { .. })));
    }

    #[test]
    fn test_close_invalidates_handle() {
        let (_conn, stmt) = setup();
        assert!(stmt.native_statement_handle().is_some());
        stmt.close();
        assert!(stmt.native_statement_handle().is_none());
        assert!(matches!(stmt.columns(), Err(Error::Programming { .. })));
    }
}
