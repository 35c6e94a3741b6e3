//! Result sets: cursor navigation and typed retrieval.
//!
//! A [`ResultSet`] binds one buffer per bindable column, sized for a whole
//! rowset. Long columns, and columns the caller unbinds, are read on demand
//! with the driver's piecewise `get_data`; such reads must go in ascending
//! column order within a row on drivers that enforce it.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::stream::{self, Stream};
use tracing::{debug, warn};

use crate::async_gate::{AsyncGate, AsyncOp, EventHandle};
use crate::attribute::Attribute;
use crate::descriptor::ImplementationRowDescriptor;
use crate::error::{Error, Result};
use crate::handle::HandleGuard;
use crate::native::buffer::{decode_element, decode_text, is_truncated};
use crate::native::constants::{SQL_ATTR_ROW_ARRAY_SIZE, SQL_NO_TOTAL, SQL_NULL_DATA};
use crate::native::{BoundBuffer, BufferTable, FetchOrientation, SqlResult};
use crate::statement::Statement;
use crate::types::{
    CType, ColumnDescriptor, ColumnIndex, ColumnInfo, FromValue, Nullability, Row, SqlType, Value,
};

/// Bytes requested per piece when reading variable-length data on demand.
const CHUNK: usize = 1024;

/// Character or binary columns wider than this are read on demand.
const MAX_BOUND_WIDTH: usize = 8000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    BeforeFirst,
    OnRow,
    AtEnd,
}

/// Outcome of an asynchronous advance, applied by `complete_next`.
#[derive(Debug, Clone, Copy)]
enum Step {
    /// Next row is already in the current window.
    Within,
    Fetched(usize),
    Exhausted,
}

/// Buffer width for a column, or `None` when it must be read on demand.
fn bound_width(descriptor: &ColumnDescriptor) -> Option<usize> {
    if descriptor.sql_type.is_long() {
        return None;
    }
    if let Some(width) = descriptor.c_type.fixed_width() {
        return Some(width);
    }
    let size = descriptor.size;
    if size == 0 || size > MAX_BOUND_WIDTH {
        return None;
    }
    match (descriptor.c_type, descriptor.sql_type) {
        // sign and decimal point
        (CType::Char, SqlType::Decimal { .. } | SqlType::Numeric { .. }) => Some(size + 3),
        (CType::Char, _) => Some(size + 1),
        _ => Some(size),
    }
}

struct ResultState {
    statement: Statement,
    guard: Arc<HandleGuard>,
    generation: u64,
    columns: Arc<ColumnInfo>,
    buffers: BufferTable,
    rowset_size: usize,
    /// Rows in the current window.
    rows: usize,
    /// 0-based row within the window.
    row: usize,
    /// 1-based absolute number of the window's first row, 0 when unknown.
    window_start: usize,
    cursor: CursorState,
    affected_rows: i64,
    /// Values read on demand (or saved by `unbind`) for the current row.
    cache: BTreeMap<usize, Value>,
    gate: AsyncGate,
    early: Option<Result<Step>>,
}

impl ResultState {
    fn ensure_live(&self) -> Result<()> {
        if self.statement.generation() != self.generation {
            return Err(Error::programming(
                "result set is stale: its statement was re-executed or closed",
            ));
        }
        Ok(())
    }

    fn ready(&self) -> Result<()> {
        self.ensure_live()?;
        self.gate.ensure_idle()
    }

    /// Describe the current result shape and bind its buffers.
    fn load_shape(&mut self) -> Result<()> {
        let driver = Arc::clone(self.guard.driver());
        let handle = self.guard.handle();
        let count = self
            .guard
            .ok(driver.num_result_cols(handle), "SQLNumResultCols")?
            .max(0) as usize;
        let mut columns = Vec::with_capacity(count);
        for i in 0..count {
            let d = self
                .guard
                .ok(driver.describe_col(handle, i as u16 + 1), "SQLDescribeCol")?;
            let sql_type = SqlType::from_raw(d.sql_type, d.size, d.decimal_digits);
            columns.push(ColumnDescriptor {
                ordinal: i,
                name: d.name,
                sql_type,
                c_type: sql_type.default_c_type(),
                size: d.size,
                scale: d.decimal_digits,
                nullable: Nullability::from_code(d.nullable),
            });
        }

        self.buffers.clear();
        if count > 0 {
            let attribute = Attribute::unsigned(SQL_ATTR_ROW_ARRAY_SIZE, self.rowset_size);
            self.guard.ok(
                driver.set_attribute(handle, &attribute),
                "SQLSetStmtAttr(SQL_ATTR_ROW_ARRAY_SIZE)",
            )?;
        }
        for descriptor in &columns {
            match bound_width(descriptor) {
                Some(width) => {
                    self.buffers.insert(BoundBuffer::new(
                        descriptor.ordinal,
                        descriptor.c_type,
                        descriptor.sql_type,
                        width,
                        self.rowset_size,
                    ));
                }
                None => debug!(column = %descriptor.name, "column left unbound"),
            }
        }
        self.columns = Arc::new(ColumnInfo::new(columns));
        self.affected_rows = match driver.row_count(handle) {
            SqlResult::Success(n) | SqlResult::SuccessWithInfo(n) => n,
            _ => -1,
        };
        self.cursor = CursorState::BeforeFirst;
        self.rows = 0;
        self.row = 0;
        self.window_start = 0;
        self.cache.clear();
        Ok(())
    }

    fn fetch_status(&mut self, orientation: FetchOrientation) -> SqlResult<usize> {
        self.guard.driver().fetch_scroll(
            self.guard.handle(),
            orientation,
            self.rowset_size,
            &mut self.buffers,
        )
    }

    /// Apply a fetched window or the end of data.
    fn land(&mut self, fetched: Option<usize>, backward: bool) -> bool {
        self.cache.clear();
        self.row = 0;
        match fetched {
            Some(n) if n > 0 => {
                let tracked = match self.cursor {
                    CursorState::OnRow => self.window_start + self.rows,
                    _ => 1,
                };
                self.window_start = match self.guard.driver().row_number(self.guard.handle()) {
                    SqlResult::Success(n) | SqlResult::SuccessWithInfo(n) if n > 0 => n as usize,
                    _ => tracked,
                };
                self.rows = n;
                self.cursor = CursorState::OnRow;
                true
            }
            _ => {
                self.rows = 0;
                self.window_start = 0;
                self.cursor = if backward {
                    CursorState::BeforeFirst
                } else {
                    CursorState::AtEnd
                };
                false
            }
        }
    }

    fn fetch(&mut self, orientation: FetchOrientation) -> Result<bool> {
        if self.columns.is_empty() {
            self.cursor = CursorState::AtEnd;
            return Ok(false);
        }
        let backward = match orientation {
            FetchOrientation::Prior => true,
            FetchOrientation::Absolute(n) | FetchOrientation::Relative(n) => n <= 0,
            _ => false,
        };
        let status = self.fetch_status(orientation);
        let fetched = self.guard.check(status, "SQLFetchScroll")?;
        let landed = self.land(fetched, backward);
        debug!(?orientation, rows = self.rows, "fetched rowset");
        Ok(landed)
    }

    /// Move to `row` of the current window.
    fn seek(&mut self, row: usize) -> Result<()> {
        if row != self.row || self.rowset_size > 1 {
            self.guard.ok(
                self.guard.driver().set_pos(self.guard.handle(), row),
                "SQLSetPos",
            )?;
        }
        self.row = row;
        self.cache.clear();
        Ok(())
    }

    fn next(&mut self) -> Result<bool> {
        match self.cursor {
            CursorState::AtEnd => Ok(false),
            CursorState::OnRow if self.row + 1 < self.rows => {
                self.seek(self.row + 1)?;
                Ok(true)
            }
            _ => self.fetch(FetchOrientation::Next),
        }
    }

    fn prior(&mut self) -> Result<bool> {
        match self.cursor {
            CursorState::BeforeFirst => Ok(false),
            CursorState::OnRow if self.row > 0 => {
                self.seek(self.row - 1)?;
                Ok(true)
            }
            CursorState::OnRow => {
                let target = self.window_start.saturating_sub(1);
                self.fetch(FetchOrientation::Absolute(target as i64))
            }
            CursorState::AtEnd => self.last(),
        }
    }

    fn last(&mut self) -> Result<bool> {
        if !self.fetch(FetchOrientation::Last)? {
            return Ok(false);
        }
        self.seek(self.rows - 1)?;
        Ok(true)
    }

    fn move_to(&mut self, row: usize) -> Result<bool> {
        if self.cursor == CursorState::OnRow
            && self.window_start > 0
            && row >= self.window_start
            && row < self.window_start + self.rows
        {
            self.seek(row - self.window_start)?;
            return Ok(true);
        }
        self.fetch(FetchOrientation::Absolute(row as i64))
    }

    fn position(&self) -> usize {
        match self.cursor {
            CursorState::OnRow => self.window_start + self.row,
            _ => 0,
        }
    }

    fn ensure_on_row(&self) -> Result<()> {
        if self.cursor != CursorState::OnRow {
            return Err(Error::programming("result set is not positioned on a row"));
        }
        Ok(())
    }

    fn bound_value(&self, column: usize) -> Result<Option<Value>> {
        match self.buffers.get(column) {
            Some(buffer)
                if !is_truncated(buffer.c_type(), buffer.indicator(self.row), buffer.width()) =>
            {
                buffer.value(self.row).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Value of `column` in the current row.
    fn value(&mut self, column: usize) -> Result<Value> {
        self.ensure_on_row()?;
        if let Some(value) = self.cache.get(&column) {
            return Ok(value.clone());
        }
        if let Some(value) = self.bound_value(column)? {
            return Ok(value);
        }
        let value = self.read_unbound(column)?;
        self.cache.insert(column, value.clone());
        Ok(value)
    }

    fn read_unbound(&self, column: usize) -> Result<Value> {
        let c_type = self.columns.column(column)?.c_type;
        let driver = self.guard.driver();
        let handle = self.guard.handle();
        let number = column as u16 + 1;

        if let Some(width) = c_type.fixed_width() {
            let mut buf = vec![0u8; width];
            let status = driver.get_data(handle, number, c_type, &mut buf);
            return match self.guard.check(status, "SQLGetData")? {
                Some(indicator) => decode_element(c_type, &buf, indicator),
                None => Err(Error::programming(format!(
                    "column {} was already read in this row",
                    column
                ))),
            };
        }

        let capacity = match c_type {
            CType::Char => CHUNK - 1,
            _ => CHUNK,
        };
        let mut chunk = vec![0u8; CHUNK];
        let mut data = Vec::new();
        loop {
            let status = driver.get_data(handle, number, c_type, &mut chunk);
            let Some(indicator) = self.guard.check(status, "SQLGetData")? else {
                break;
            };
            if indicator == SQL_NULL_DATA {
                return Ok(Value::Null);
            }
            let more = indicator == SQL_NO_TOTAL || indicator as usize > capacity;
            let n = if more { capacity } else { indicator as usize };
            data.extend_from_slice(&chunk[..n]);
            if !more {
                break;
            }
        }
        Ok(match c_type {
            CType::Char => Value::Text(decode_text(&data, false)?),
            _ => Value::Binary(data),
        })
    }

    fn is_null(&self, column: usize) -> Result<bool> {
        self.ensure_on_row()?;
        if let Some(value) = self.cache.get(&column) {
            return Ok(value.is_null());
        }
        Ok(self
            .buffers
            .get(column)
            .map(|b| b.is_null(self.row))
            .unwrap_or(false))
    }

    fn unbind(&mut self, column: usize) -> Result<()> {
        if !self.buffers.contains(column) {
            return Ok(());
        }
        if self.cursor == CursorState::OnRow && !self.cache.contains_key(&column) {
            if let Some(value) = self.bound_value(column)? {
                self.cache.insert(column, value);
            }
        }
        self.buffers.remove(column);
        Ok(())
    }

    fn current_row(&mut self) -> Result<Row> {
        let values = (0..self.columns.len())
            .map(|i| self.value(i))
            .collect::<Result<Vec<_>>>()?;
        Ok(Row::new(values, Arc::clone(&self.columns)))
    }

    fn finish_step(&mut self) -> Result<Step> {
        self.gate.finish(AsyncOp::Fetch)?;
        let outcome = match self.early.take() {
            Some(outcome) => outcome,
            None => {
                let status = self.guard.driver().complete_async(self.guard.handle());
                self.guard
                    .check(status, "SQLFetchScroll")
                    .map(|n| n.map_or(Step::Exhausted, Step::Fetched))
            }
        };
        if !self
            .guard
            .driver()
            .set_async_event(self.guard.handle(), None)
            .is_success()
        {
            warn!(raw = self.guard.handle().raw(), "failed to clear asynchronous event");
        }
        outcome
    }
}

/// A cursor over the active result of a statement execution.
///
/// Clones share one cursor. A result set stays usable until its statement is
/// executed again or closed; after that every operation fails with a
/// programming error.
#[derive(Clone)]
pub struct ResultSet {
    state: Arc<Mutex<ResultState>>,
}

impl ResultSet {
    pub(crate) fn open(
        statement: Statement,
        guard: Arc<HandleGuard>,
        generation: u64,
        rowset_size: usize,
    ) -> Result<Self> {
        let mut state = ResultState {
            statement,
            guard,
            generation,
            columns: Arc::new(ColumnInfo::default()),
            buffers: BufferTable::new(),
            rowset_size: rowset_size.max(1),
            rows: 0,
            row: 0,
            window_start: 0,
            cursor: CursorState::BeforeFirst,
            affected_rows: -1,
            cache: BTreeMap::new(),
            gate: AsyncGate::default(),
            early: None,
        };
        state.load_shape()?;
        Ok(Self {
            state: Arc::new(Mutex::new(state)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, ResultState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Advance to the next row. Returns `false` once past the last row, and
    /// keeps returning `false` afterwards.
    pub fn next(&self) -> Result<bool> {
        let mut state = self.lock();
        state.ready()?;
        state.next()
    }

    /// Step back one row. Needs a scrollable cursor when crossing a rowset.
    pub fn prior(&self) -> Result<bool> {
        let mut state = self.lock();
        state.ready()?;
        state.prior()
    }

    pub fn first(&self) -> Result<bool> {
        let mut state = self.lock();
        state.ready()?;
        state.fetch(FetchOrientation::First)
    }

    pub fn last(&self) -> Result<bool> {
        let mut state = self.lock();
        state.ready()?;
        state.last()
    }

    /// Move to the 1-based absolute `row`; 0 moves before the first row.
    pub fn move_to(&self, row: usize) -> Result<bool> {
        let mut state = self.lock();
        state.ready()?;
        state.move_to(row)
    }

    /// Move `rows` forward (or backward when negative), one row at a time.
    ///
    /// Stops at either end of the result; returns whether the cursor is on a row.
    pub fn skip(&self, rows: i64) -> Result<bool> {
        let mut state = self.lock();
        state.ready()?;
        let mut on_row = state.cursor == CursorState::OnRow;
        for _ in 0..rows.unsigned_abs() {
            on_row = if rows > 0 { state.next()? } else { state.prior()? };
            if !on_row {
                break;
            }
        }
        Ok(on_row)
    }

    pub fn at_end(&self) -> bool {
        self.lock().cursor == CursorState::AtEnd
    }

    /// 1-based number of the current row, 0 when not on a row.
    pub fn position(&self) -> usize {
        self.lock().position()
    }

    /// Rows in the current rowset window.
    pub fn rows(&self) -> usize {
        self.lock().rows
    }

    pub fn rowset_size(&self) -> usize {
        self.lock().rowset_size
    }

    /// Rows affected by the execution that produced this result, -1 when unknown.
    pub fn affected_rows(&self) -> i64 {
        self.lock().affected_rows
    }

    pub fn has_affected_rows(&self) -> bool {
        self.lock().affected_rows != -1
    }

    /// Value of `column` in the current row.
    ///
    /// Fails with a null access error when the value is NULL.
    pub fn get<T: FromValue>(&self, column: impl ColumnIndex) -> Result<T> {
        let mut state = self.lock();
        state.ready()?;
        let index = column.resolve(&state.columns)?;
        match state.value(index)? {
            Value::Null => Err(Error::null_access(state.columns.column(index)?.name.clone())),
            value => T::from_value(&value),
        }
    }

    /// Like [`get`](Self::get), returning `fallback` for NULL.
    pub fn get_or<T: FromValue>(&self, column: impl ColumnIndex, fallback: T) -> Result<T> {
        Ok(self.get_opt(column)?.unwrap_or(fallback))
    }

    /// Like [`get`](Self::get), returning `None` for NULL.
    pub fn get_opt<T: FromValue>(&self, column: impl ColumnIndex) -> Result<Option<T>> {
        let mut state = self.lock();
        state.ready()?;
        let index = column.resolve(&state.columns)?;
        match state.value(index)? {
            Value::Null => Ok(None),
            value => T::from_value(&value).map(Some),
        }
    }

    /// Read `column` into `out`. `out` is left untouched on failure.
    pub fn get_ref<T: FromValue>(&self, column: impl ColumnIndex, out: &mut T) -> Result<()> {
        *out = self.get(column)?;
        Ok(())
    }

    /// Whether `column` is NULL in the current row.
    ///
    /// For an unbound column this is only meaningful once the column has
    /// been read in the current row; before that it reports `false`.
    pub fn is_null(&self, column: impl ColumnIndex) -> Result<bool> {
        let state = self.lock();
        state.ready()?;
        let index = column.resolve(&state.columns)?;
        state.is_null(index)
    }

    pub fn is_bound(&self, column: impl ColumnIndex) -> Result<bool> {
        let state = self.lock();
        let index = column.resolve(&state.columns)?;
        Ok(state.buffers.contains(index))
    }

    /// Release the buffer of `column`; later reads go through `get_data`.
    pub fn unbind(&self, column: impl ColumnIndex) -> Result<()> {
        let mut state = self.lock();
        state.ready()?;
        let index = column.resolve(&state.columns)?;
        state.unbind(index)
    }

    /// Release every column buffer.
    pub fn unbind_all(&self) -> Result<()> {
        let mut state = self.lock();
        state.ready()?;
        for index in 0..state.columns.len() {
            state.unbind(index)?;
        }
        Ok(())
    }

    /// Number of columns.
    pub fn columns(&self) -> usize {
        self.lock().columns.len()
    }

    pub fn column_info(&self) -> Arc<ColumnInfo> {
        Arc::clone(&self.lock().columns)
    }

    /// Ordinal of the first column named `name`.
    pub fn column(&self, name: &str) -> Result<usize> {
        self.lock().columns.resolve(name)
    }

    pub fn column_descriptor(&self, column: impl ColumnIndex) -> Result<ColumnDescriptor> {
        let state = self.lock();
        let index = column.resolve(&state.columns)?;
        state.columns.column(index).cloned()
    }

    pub fn column_name(&self, column: usize) -> Result<String> {
        Ok(self.column_descriptor(column)?.name)
    }

    pub fn column_size(&self, column: impl ColumnIndex) -> Result<usize> {
        Ok(self.column_descriptor(column)?.size)
    }

    pub fn column_decimal_digits(&self, column: impl ColumnIndex) -> Result<i16> {
        Ok(self.column_descriptor(column)?.scale)
    }

    pub fn column_datatype(&self, column: impl ColumnIndex) -> Result<SqlType> {
        Ok(self.column_descriptor(column)?.sql_type)
    }

    pub fn column_datatype_name(&self, column: impl ColumnIndex) -> Result<String> {
        Ok(self.column_descriptor(column)?.sql_type.to_string())
    }

    pub fn column_c_datatype(&self, column: impl ColumnIndex) -> Result<CType> {
        Ok(self.column_descriptor(column)?.c_type)
    }

    /// Advance to the next result of a multi-statement batch.
    ///
    /// Columns and buffers are rebuilt for the new shape; returns `false`
    /// when there are no more results.
    pub fn next_result(&self) -> Result<bool> {
        let mut state = self.lock();
        state.ready()?;
        let status = state.guard.driver().more_results(state.guard.handle());
        match state.guard.check(status, "SQLMoreResults")? {
            Some(()) => {
                state.load_shape()?;
                Ok(true)
            }
            None => {
                state.columns = Arc::new(ColumnInfo::default());
                state.buffers.clear();
                state.land(None, false);
                Ok(false)
            }
        }
    }

    /// Start advancing to the next row asynchronously.
    ///
    /// Returns `true` when the caller has to wait on `event` before calling
    /// [`complete_next`](Self::complete_next).
    pub fn async_next(&self, event: &EventHandle) -> Result<bool> {
        let mut state = self.lock();
        state.ready()?;
        let guard = Arc::clone(&state.guard);
        if !guard.driver().supports_async() {
            return Err(Error::not_supported("asynchronous fetch"));
        }
        state.gate.begin(AsyncOp::Fetch)?;
        let step = match state.cursor {
            CursorState::AtEnd => Some(Ok(Step::Exhausted)),
            CursorState::OnRow if state.row + 1 < state.rows => Some(Ok(Step::Within)),
            _ if state.columns.is_empty() => Some(Ok(Step::Exhausted)),
            _ => None,
        };
        let registered = guard.driver().set_async_event(guard.handle(), Some(event.clone()));
        if let Err(e) = guard.ok(registered, "SQLSetStmtAttr(SQL_ATTR_ASYNC_STMT_EVENT)") {
            state.gate.abandon();
            return Err(e);
        }
        if let Some(step) = step {
            state.early = Some(step);
            event.signal();
            return Ok(false);
        }
        match state.fetch_status(FetchOrientation::Next) {
            SqlResult::StillExecuting => Ok(true),
            status => {
                let step = guard
                    .check(status, "SQLFetchScroll")
                    .map(|n| n.map_or(Step::Exhausted, Step::Fetched));
                state.early = Some(step);
                Ok(false)
            }
        }
    }

    /// Finish an asynchronous advance; returns whether the cursor is on a row.
    pub fn complete_next(&self) -> Result<bool> {
        let mut state = self.lock();
        state.ensure_live()?;
        match state.finish_step()? {
            Step::Within => {
                let row = state.row + 1;
                state.seek(row)?;
                Ok(true)
            }
            Step::Fetched(n) => Ok(state.land(Some(n), false)),
            Step::Exhausted => Ok(state.land(None, false)),
        }
    }

    /// The current row as an owned [`Row`].
    pub fn current_row(&self) -> Result<Row> {
        let mut state = self.lock();
        state.ready()?;
        state.current_row()
    }

    /// Iterate the remaining rows.
    ///
    /// Single pass; an error while advancing ends the iteration and is logged.
    pub fn rows_iter(&self) -> RowsIter {
        RowsIter {
            result: self.clone(),
            done: false,
        }
    }

    /// Stream the remaining rows using asynchronous fetches.
    pub fn into_stream(self) -> impl Stream<Item = Result<Row>> {
        stream::unfold(Some(self), |result| async move {
            let result = result?;
            let event = EventHandle::new();
            let advanced = match result.async_next(&event) {
                Ok(true) => {
                    event.wait().await;
                    result.complete_next()
                }
                Ok(false) => result.complete_next(),
                Err(e) => Err(e),
            };
            match advanced.and_then(|on_row| on_row.then(|| result.current_row()).transpose()) {
                Ok(Some(row)) => Some((Ok(row), Some(result))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }

    pub fn statement(&self) -> Statement {
        self.lock().statement.clone()
    }

    pub fn implementation_row_descriptor(&self) -> Result<ImplementationRowDescriptor> {
        let state = self.lock();
        state.ensure_live()?;
        ImplementationRowDescriptor::new(Arc::clone(&state.guard))
    }
}

impl std::fmt::Debug for ResultSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ResultSet")
            .field("columns", &state.columns.column_names())
            .field("rowset_size", &state.rowset_size)
            .field("position", &state.position())
            .finish()
    }
}

/// Iterator over the remaining rows of a [`ResultSet`].
pub struct RowsIter {
    result: ResultSet,
    done: bool,
}

impl Iterator for RowsIter {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        if self.done {
            return None;
        }
        let row = self
            .result
            .next()
            .and_then(|on_row| on_row.then(|| self.result.current_row()).transpose());
        match row {
            Ok(Some(row)) => Some(row),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                warn!(error = %e, "row iteration stopped");
                self.done = true;
                None
            }
        }
    }
}
