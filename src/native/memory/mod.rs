//! In-process reference driver.
//!
//! `MemoryDriver` implements [`Driver`] over named in-memory databases so
//! the engine can run without an installed driver manager. Data sources are
//! created on first connect. A source registered with
//! [`MemoryDriver::with_offline_source`] refuses connections.
//!
//! Asynchronous mode: once an event is registered on a handle, operations on
//! it run to completion, signal the event and report `StillExecuting`; the
//! real status is collected with `complete_async`.

mod catalog;
mod sql;
mod storage;

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use self::sql::{parse_batch, Batch, ParamTarget};
use self::storage::{display_size, octet_length, type_name, Bindings, Database, ResultColumn, ResultData};
use super::constants::*;
use super::{
    BufferTable, CatalogQuery, ColumnDescription, Completion, DataSourceInfo, DescField,
    DescValue, DiagRecord, Driver, DriverInfo, FetchOrientation, FreeStmt, HandleKind,
    NativeHandle, ParamDescription, ParameterSet, SqlResult,
};
use crate::async_gate::EventHandle;
use crate::attribute::Attribute;
use crate::error::Error;
use crate::native::buffer::encode_element;
use crate::types::{CType, FromValue, SqlType, Value};

const DRIVER_NAME: &str = "MemoryDriver";
const DRIVER_VERSION: &str = "01.00.0000";
const DBMS_NAME: &str = "MemoryDB";
const DBMS_VERSION: &str = "01.00.0000";

fn diag(state: &str, message: impl Into<String>) -> DiagRecord {
    DiagRecord::new(state, 0, message)
}

fn invalid_handle(handle: usize) -> DiagRecord {
    diag("HY000", format!("invalid handle {}", handle))
}

fn sequence_error(message: impl Into<String>) -> DiagRecord {
    diag("HY010", message)
}

#[derive(Debug)]
struct Dbc {
    env: usize,
    database: Option<String>,
    autocommit: bool,
    snapshot: Option<Database>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    BeforeFirst,
    /// 0-based index of the first row of the current rowset.
    At(usize),
    AfterEnd,
}

/// Progress of piecewise reads within the current row.
#[derive(Debug, Default, Clone, Copy)]
struct ReadState {
    /// 1-based column last read, 0 before any read.
    column: u16,
    offset: usize,
    done: bool,
}

#[derive(Debug)]
struct Cursor {
    data: ResultData,
    position: Position,
    window_len: usize,
    row_in_window: usize,
    read: ReadState,
}

impl Cursor {
    fn new(data: ResultData) -> Self {
        Self {
            data,
            position: Position::BeforeFirst,
            window_len: 0,
            row_in_window: 0,
            read: ReadState::default(),
        }
    }

    fn current_row(&self) -> Result<&Vec<Value>, DiagRecord> {
        match self.position {
            Position::At(start) => self
                .data
                .rows
                .get(start + self.row_in_window)
                .ok_or_else(|| diag("24000", "invalid cursor state")),
            _ => Err(diag("24000", "invalid cursor state: not positioned on a row")),
        }
    }
}

#[derive(Debug)]
struct Stmt {
    dbc: usize,
    ird: usize,
    batch: Option<Batch>,
    shape: Vec<ResultColumn>,
    current: Option<Cursor>,
    pending_results: VecDeque<ResultData>,
    max_rows: usize,
    cursor_type: usize,
}

impl Stmt {
    fn columns(&self) -> &[ResultColumn] {
        match &self.current {
            Some(cursor) => &cursor.data.columns,
            None => &self.shape,
        }
    }

    fn close_cursor(&mut self) {
        self.current = None;
        self.pending_results.clear();
    }
}

#[derive(Debug, Default)]
struct State {
    next_handle: usize,
    envs: HashSet<usize>,
    dbcs: HashMap<usize, Dbc>,
    stmts: HashMap<usize, Stmt>,
    /// Implementation row descriptor -> owning statement.
    descs: HashMap<usize, usize>,
    diags: HashMap<usize, Vec<DiagRecord>>,
    events: HashMap<usize, EventHandle>,
    pending: HashMap<usize, SqlResult<usize>>,
    databases: HashMap<String, Database>,
    offline: HashSet<String>,
}

impl State {
    fn allocate_id(&mut self) -> usize {
        self.next_handle += 1;
        self.next_handle
    }

    fn push_diag(&mut self, handle: usize, record: DiagRecord) {
        self.diags.entry(handle).or_default().push(record);
    }

    fn fail<T>(&mut self, handle: usize, record: DiagRecord) -> SqlResult<T> {
        self.push_diag(handle, record);
        SqlResult::Error
    }

    fn dbc(&self, raw: usize) -> Result<&Dbc, DiagRecord> {
        self.dbcs.get(&raw).ok_or_else(|| invalid_handle(raw))
    }

    fn dbc_mut(&mut self, raw: usize) -> Result<&mut Dbc, DiagRecord> {
        self.dbcs.get_mut(&raw).ok_or_else(|| invalid_handle(raw))
    }

    fn stmt(&self, raw: usize) -> Result<&Stmt, DiagRecord> {
        self.stmts.get(&raw).ok_or_else(|| invalid_handle(raw))
    }

    fn stmt_mut(&mut self, raw: usize) -> Result<&mut Stmt, DiagRecord> {
        self.stmts.get_mut(&raw).ok_or_else(|| invalid_handle(raw))
    }

    fn database_name(&self, dbc: usize) -> Result<String, DiagRecord> {
        self.dbc(dbc)?
            .database
            .clone()
            .ok_or_else(|| diag("08003", "connection not open"))
    }

    fn statement_database(&self, stmt: usize) -> Result<(String, &Database), DiagRecord> {
        let name = self.database_name(self.stmt(stmt)?.dbc)?;
        let db = self
            .databases
            .get(&name)
            .ok_or_else(|| diag("08S01", format!("database '{}' is gone", name)))?;
        Ok((name, db))
    }

    fn open(&mut self, dbc: usize, name: &str) -> Result<(), DiagRecord> {
        if name.is_empty() {
            return Err(diag("IM002", "data source name not found and no default driver specified"));
        }
        if self.offline.contains(&name.to_ascii_lowercase()) {
            return Err(DiagRecord::new(
                "08001",
                10061,
                format!("client unable to establish connection to '{}'", name),
            ));
        }
        let conn = self.dbc_mut(dbc)?;
        if conn.database.is_some() {
            return Err(diag("08002", "connection name in use"));
        }
        conn.database = Some(name.to_string());
        conn.autocommit = true;
        conn.snapshot = None;
        self.databases.entry(name.to_string()).or_default();
        Ok(())
    }

    /// Execute the statement's batch and make the first result current.
    fn run(
        &mut self,
        stmt_raw: usize,
        params: &mut ParameterSet,
        paramset_size: usize,
    ) -> Result<(), DiagRecord> {
        let stmt = self.stmt(stmt_raw)?;
        let batch = stmt
            .batch
            .clone()
            .ok_or_else(|| sequence_error("statement is not prepared"))?;
        let (dbc_raw, max_rows) = (stmt.dbc, stmt.max_rows);
        let name = self.database_name(dbc_raw)?;
        let changes = batch.statements.iter().any(|s| s.is_change());

        let conn = self.dbc_mut(dbc_raw)?;
        let snapshot_needed = changes && !conn.autocommit && conn.snapshot.is_none();
        let db = self
            .databases
            .get_mut(&name)
            .ok_or_else(|| diag("08S01", format!("database '{}' is gone", name)))?;
        if snapshot_needed {
            let copy = db.clone();
            if let Some(conn) = self.dbcs.get_mut(&dbc_raw) {
                conn.snapshot = Some(copy);
            }
        }
        let db = self
            .databases
            .get_mut(&name)
            .ok_or_else(|| diag("08S01", format!("database '{}' is gone", name)))?;

        self.stmts
            .get_mut(&stmt_raw)
            .ok_or_else(|| invalid_handle(stmt_raw))?
            .close_cursor();

        let elements = if batch.param_count > 0 {
            paramset_size.max(1)
        } else {
            1
        };
        let mut results = VecDeque::with_capacity(batch.statements.len());
        for statement in &batch.statements {
            let mut combined: Option<ResultData> = None;
            for element in 0..elements {
                let mut bindings = Bindings {
                    params: &mut *params,
                    element,
                };
                let outcome = db.execute(statement, &mut bindings)?;
                match combined.as_mut() {
                    Some(c) => c.absorb(outcome),
                    None => combined = Some(outcome),
                }
            }
            if let Some(mut result) = combined {
                if max_rows > 0 {
                    result.rows.truncate(max_rows);
                }
                results.push_back(result);
            }
        }

        let stmt = self.stmt_mut(stmt_raw)?;
        stmt.current = results.pop_front().map(Cursor::new);
        stmt.pending_results = results;
        Ok(())
    }

    fn describe(&self, column: &ResultColumn) -> ColumnDescription {
        ColumnDescription {
            name: column.name.clone(),
            sql_type: column.sql_type.code(),
            size: column.sql_type.column_size(),
            decimal_digits: column.sql_type.decimal_digits(),
            nullable: if column.nullable {
                SQL_NULLABLE
            } else {
                SQL_NO_NULLS
            },
        }
    }
}

/// Write `text` null-terminated into `buf`; returns (full length, truncated).
fn write_text(buf: &mut [u8], text: &str) -> (usize, bool) {
    let bytes = text.as_bytes();
    let n = bytes.len().min(buf.len().saturating_sub(1));
    buf[..n].copy_from_slice(&bytes[..n]);
    if n < buf.len() {
        buf[n] = 0;
    }
    (bytes.len(), n < bytes.len())
}

fn write_fixed(buf: &mut [u8], bytes: &[u8]) -> Result<usize, DiagRecord> {
    if buf.len() < bytes.len() {
        return Err(diag("HY090", "invalid string or buffer length"));
    }
    buf[..bytes.len()].copy_from_slice(bytes);
    Ok(bytes.len())
}

fn conversion_error(error: Error) -> DiagRecord {
    match error {
        Error::BufferTooSmall { .. } => diag("HY090", error.to_string()),
        other => diag("22018", other.to_string()),
    }
}

/// The in-memory driver.
#[derive(Debug, Default)]
pub struct MemoryDriver {
    state: Mutex<State>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a data source that refuses every connection attempt.
    pub fn with_offline_source(self, name: &str) -> Self {
        self.lock().offline.insert(name.to_ascii_lowercase());
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn call<T>(
        &self,
        handle: NativeHandle,
        f: impl FnOnce(&mut State) -> Result<T, DiagRecord>,
    ) -> SqlResult<T> {
        let mut state = self.lock();
        state.diags.remove(&handle.raw());
        match f(&mut state) {
            Ok(v) => SqlResult::Success(v),
            Err(record) => state.fail(handle.raw(), record),
        }
    }

    /// Defer the status of an operation when an event is registered on `handle`.
    fn deferred<T>(
        &self,
        handle: NativeHandle,
        result: SqlResult<T>,
        count: impl FnOnce(&T) -> usize,
    ) -> SqlResult<T> {
        let mut state = self.lock();
        let Some(event) = state.events.get(&handle.raw()).cloned() else {
            return result;
        };
        let status = match &result {
            SqlResult::Success(v) => SqlResult::Success(count(v)),
            SqlResult::SuccessWithInfo(v) => SqlResult::SuccessWithInfo(count(v)),
            SqlResult::NoData => SqlResult::NoData,
            SqlResult::NeedData => SqlResult::NeedData,
            SqlResult::StillExecuting | SqlResult::Error => SqlResult::Error,
        };
        state.pending.insert(handle.raw(), status);
        drop(state);
        event.signal();
        SqlResult::StillExecuting
    }
}

impl Driver for MemoryDriver {
    fn alloc_handle(
        &self,
        kind: HandleKind,
        parent: Option<NativeHandle>,
    ) -> SqlResult<NativeHandle> {
        let mut state = self.lock();
        let parent_raw = parent.map(|p| p.raw()).unwrap_or(0);
        state.diags.remove(&parent_raw);
        let result = match kind {
            HandleKind::Environment => {
                let id = state.allocate_id();
                state.envs.insert(id);
                Ok(id)
            }
            HandleKind::Connection => {
                if state.envs.contains(&parent_raw) {
                    let id = state.allocate_id();
                    state.dbcs.insert(
                        id,
                        Dbc {
                            env: parent_raw,
                            database: None,
                            autocommit: true,
                            snapshot: None,
                        },
                    );
                    Ok(id)
                } else {
                    Err(invalid_handle(parent_raw))
                }
            }
            HandleKind::Statement => match state.database_name(parent_raw) {
                Ok(_) => {
                    let id = state.allocate_id();
                    let ird = state.allocate_id();
                    state.descs.insert(ird, id);
                    state.stmts.insert(
                        id,
                        Stmt {
                            dbc: parent_raw,
                            ird,
                            batch: None,
                            shape: Vec::new(),
                            current: None,
                            pending_results: VecDeque::new(),
                            max_rows: 0,
                            cursor_type: SQL_CURSOR_FORWARD_ONLY,
                        },
                    );
                    Ok(id)
                }
                Err(record) => Err(record),
            },
            HandleKind::Descriptor => Err(diag("HYC00", "explicit descriptors are not supported")),
        };
        match result {
            Ok(id) => SqlResult::Success(NativeHandle::new(id, kind)),
            Err(record) => state.fail(parent_raw, record),
        }
    }

    fn free_handle(&self, handle: NativeHandle) -> SqlResult<()> {
        self.call(handle, |state| {
            let raw = handle.raw();
            match handle.kind() {
                HandleKind::Environment => {
                    if state.dbcs.values().any(|c| c.env == raw) {
                        return Err(sequence_error("environment still has connections"));
                    }
                    if !state.envs.remove(&raw) {
                        return Err(invalid_handle(raw));
                    }
                }
                HandleKind::Connection => {
                    let conn = state.dbc(raw)?;
                    if conn.database.is_some() {
                        return Err(sequence_error("connection is still open"));
                    }
                    if state.stmts.values().any(|s| s.dbc == raw) {
                        return Err(sequence_error("connection still has statements"));
                    }
                    state.dbcs.remove(&raw);
                }
                HandleKind::Statement => {
                    let stmt = state.stmts.remove(&raw).ok_or_else(|| invalid_handle(raw))?;
                    state.descs.remove(&stmt.ird);
                    state.diags.remove(&stmt.ird);
                }
                HandleKind::Descriptor => {
                    return Err(diag(
                        "HY017",
                        "invalid use of an automatically allocated descriptor handle",
                    ));
                }
            }
            state.events.remove(&raw);
            state.pending.remove(&raw);
            Ok(())
        })
    }

    fn diagnostics(&self, handle: NativeHandle) -> Vec<DiagRecord> {
        self.lock()
            .diags
            .get(&handle.raw())
            .cloned()
            .unwrap_or_default()
    }

    fn set_attribute(&self, handle: NativeHandle, attribute: &Attribute) -> SqlResult<()> {
        self.call(handle, |state| {
            let raw = handle.raw();
            let number = || {
                attribute
                    .as_usize()
                    .ok_or_else(|| diag("HY024", "invalid attribute value"))
            };
            match (handle.kind(), attribute.code()) {
                (HandleKind::Environment, SQL_ATTR_ODBC_VERSION) => {
                    number()?;
                    if !state.envs.contains(&raw) {
                        return Err(invalid_handle(raw));
                    }
                }
                (HandleKind::Connection, SQL_ATTR_AUTOCOMMIT) => {
                    let on = number()? == SQL_AUTOCOMMIT_ON;
                    let conn = state.dbc_mut(raw)?;
                    if on {
                        conn.snapshot = None;
                    }
                    conn.autocommit = on;
                }
                (
                    HandleKind::Connection,
                    SQL_ATTR_LOGIN_TIMEOUT | SQL_ATTR_CONNECTION_TIMEOUT | SQL_ATTR_ACCESS_MODE,
                ) => {
                    number()?;
                    state.dbc(raw)?;
                }
                (HandleKind::Connection, SQL_ATTR_CURRENT_CATALOG) => {
                    let name = attribute
                        .as_text()
                        .ok_or_else(|| diag("HY024", "invalid attribute value"))?
                        .to_string();
                    let conn = state.dbc_mut(raw)?;
                    if conn.database.is_none() {
                        return Err(diag("08003", "connection not open"));
                    }
                    if conn.snapshot.is_some() {
                        return Err(diag("25000", "invalid transaction state"));
                    }
                    conn.database = Some(name.clone());
                    state.databases.entry(name).or_default();
                }
                (HandleKind::Statement, SQL_ATTR_MAX_ROWS) => {
                    let max = number()?;
                    state.stmt_mut(raw)?.max_rows = max;
                }
                (HandleKind::Statement, SQL_ATTR_CURSOR_TYPE) => {
                    let cursor_type = number()?;
                    if cursor_type != SQL_CURSOR_FORWARD_ONLY && cursor_type != SQL_CURSOR_STATIC {
                        return Err(diag("HYC00", "only forward-only and static cursors"));
                    }
                    state.stmt_mut(raw)?.cursor_type = cursor_type;
                }
                (
                    HandleKind::Statement,
                    SQL_ATTR_QUERY_TIMEOUT
                    | SQL_ATTR_ROW_ARRAY_SIZE
                    | SQL_ATTR_PARAMSET_SIZE
                    | SQL_ATTR_ASYNC_ENABLE,
                ) => {
                    number()?;
                    state.stmt(raw)?;
                }
                (_, code) => {
                    return Err(diag("HY092", format!("invalid attribute identifier {}", code)))
                }
            }
            Ok(())
        })
    }

    fn get_connect_attr(&self, dbc: NativeHandle, attribute: i32, buf: &mut [u8]) -> SqlResult<usize> {
        let mut state = self.lock();
        state.diags.remove(&dbc.raw());
        if attribute != SQL_ATTR_CURRENT_CATALOG {
            return state.fail(dbc.raw(), diag("HY092", format!("invalid attribute identifier {}", attribute)));
        }
        match state.database_name(dbc.raw()) {
            Ok(name) => {
                let (len, truncated) = write_text(buf, &name);
                if truncated {
                    state.push_diag(dbc.raw(), diag("01004", "string data, right truncated"));
                    SqlResult::SuccessWithInfo(len)
                } else {
                    SqlResult::Success(len)
                }
            }
            Err(record) => state.fail(dbc.raw(), record),
        }
    }

    fn connect(&self, dbc: NativeHandle, dsn: &str, _user: &str, _password: &str) -> SqlResult<()> {
        let result = self.call(dbc, |state| state.open(dbc.raw(), dsn));
        self.deferred(dbc, result, |_| 0)
    }

    fn driver_connect(&self, dbc: NativeHandle, connection_string: &str) -> SqlResult<()> {
        let name = connection_string
            .split(';')
            .filter_map(|pair| pair.split_once('='))
            .find(|(k, _)| {
                let k = k.trim();
                k.eq_ignore_ascii_case("DSN") || k.eq_ignore_ascii_case("DATABASE")
            })
            .map(|(_, v)| v.trim().to_string())
            .unwrap_or_default();
        let result = self.call(dbc, |state| state.open(dbc.raw(), &name));
        self.deferred(dbc, result, |_| 0)
    }

    fn disconnect(&self, dbc: NativeHandle) -> SqlResult<()> {
        self.call(dbc, |state| {
            let conn = state.dbc_mut(dbc.raw())?;
            let name = conn
                .database
                .take()
                .ok_or_else(|| diag("08003", "connection not open"))?;
            if let Some(snapshot) = conn.snapshot.take() {
                state.databases.insert(name, snapshot);
            }
            Ok(())
        })
    }

    fn get_info(&self, dbc: NativeHandle, info_type: u16, buf: &mut [u8]) -> SqlResult<usize> {
        let mut state = self.lock();
        state.diags.remove(&dbc.raw());
        let text = match info_type {
            SQL_DRIVER_NAME => Some(Ok(DRIVER_NAME.to_string())),
            SQL_DRIVER_VER => Some(Ok(DRIVER_VERSION.to_string())),
            SQL_DBMS_NAME => Some(Ok(DBMS_NAME.to_string())),
            SQL_DBMS_VER => Some(Ok(DBMS_VERSION.to_string())),
            SQL_DATABASE_NAME => Some(state.database_name(dbc.raw())),
            _ => None,
        };
        let written = match text {
            Some(Ok(text)) => {
                let (len, truncated) = write_text(buf, &text);
                if truncated {
                    state.push_diag(dbc.raw(), diag("01004", "string data, right truncated"));
                    return SqlResult::SuccessWithInfo(len);
                }
                Ok(len)
            }
            Some(Err(record)) => Err(record),
            None => match info_type {
                SQL_MAX_CONCURRENT_ACTIVITIES => write_fixed(buf, &0u16.to_ne_bytes()),
                SQL_TXN_CAPABLE => write_fixed(buf, &SQL_TC_ALL.to_ne_bytes()),
                SQL_MAX_COLUMN_NAME_LEN => write_fixed(buf, &128u16.to_ne_bytes()),
                SQL_ASYNC_DBC_FUNCTIONS => write_fixed(buf, &1u32.to_ne_bytes()),
                other => Err(diag("HY096", format!("information type {} out of range", other))),
            },
        };
        match written {
            Ok(len) => SqlResult::Success(len),
            Err(record) => state.fail(dbc.raw(), record),
        }
    }

    fn end_transaction(&self, dbc: NativeHandle, completion: Completion) -> SqlResult<()> {
        self.call(dbc, |state| {
            let name = state.database_name(dbc.raw())?;
            let snapshot = state.dbc_mut(dbc.raw())?.snapshot.take();
            if let (Completion::Rollback, Some(snapshot)) = (completion, snapshot) {
                state.databases.insert(name, snapshot);
            }
            Ok(())
        })
    }

    fn drivers(&self, env: NativeHandle) -> SqlResult<Vec<DriverInfo>> {
        self.call(env, |state| {
            if !state.envs.contains(&env.raw()) {
                return Err(invalid_handle(env.raw()));
            }
            Ok(vec![DriverInfo {
                name: DRIVER_NAME.to_string(),
                attributes: vec![
                    ("APILevel".to_string(), "1".to_string()),
                    ("ConnectFunctions".to_string(), "YYN".to_string()),
                    ("FileUsage".to_string(), "0".to_string()),
                ],
            }])
        })
    }

    fn data_sources(&self, env: NativeHandle) -> SqlResult<Vec<DataSourceInfo>> {
        self.call(env, |state| {
            if !state.envs.contains(&env.raw()) {
                return Err(invalid_handle(env.raw()));
            }
            let mut names: Vec<&String> = state.databases.keys().collect();
            names.sort();
            Ok(names
                .into_iter()
                .map(|name| DataSourceInfo {
                    name: name.clone(),
                    driver: DRIVER_NAME.to_string(),
                })
                .collect())
        })
    }

    fn prepare(&self, stmt: NativeHandle, text: &str) -> SqlResult<()> {
        let result = self.call(stmt, |state| {
            let batch = parse_batch(text)?;
            let shape = {
                let (_, db) = state.statement_database(stmt.raw())?;
                match batch.statements.first() {
                    Some(first) => db.shape(first)?,
                    None => Vec::new(),
                }
            };
            let s = state.stmt_mut(stmt.raw())?;
            s.close_cursor();
            s.batch = Some(batch);
            s.shape = shape;
            Ok(())
        });
        self.deferred(stmt, result, |_| 0)
    }

    fn execute(
        &self,
        stmt: NativeHandle,
        params: &mut ParameterSet,
        paramset_size: usize,
    ) -> SqlResult<()> {
        let result = self.call(stmt, |state| state.run(stmt.raw(), params, paramset_size));
        self.deferred(stmt, result, |_| 0)
    }

    fn exec_direct(
        &self,
        stmt: NativeHandle,
        text: &str,
        params: &mut ParameterSet,
        paramset_size: usize,
    ) -> SqlResult<()> {
        let result = self.call(stmt, |state| {
            let batch = parse_batch(text)?;
            state.statement_database(stmt.raw())?;
            let s = state.stmt_mut(stmt.raw())?;
            s.batch = Some(batch);
            s.shape.clear();
            state.run(stmt.raw(), params, paramset_size)
        });
        self.deferred(stmt, result, |_| 0)
    }

    fn num_params(&self, stmt: NativeHandle) -> SqlResult<i16> {
        self.call(stmt, |state| {
            let batch = state
                .stmt(stmt.raw())?
                .batch
                .as_ref()
                .ok_or_else(|| sequence_error("statement is not prepared"))?;
            Ok(batch.param_count as i16)
        })
    }

    fn describe_param(&self, stmt: NativeHandle, number: u16) -> SqlResult<ParamDescription> {
        self.call(stmt, |state| {
            let batch = state
                .stmt(stmt.raw())?
                .batch
                .as_ref()
                .ok_or_else(|| sequence_error("statement is not prepared"))?;
            let targets = batch.param_targets();
            let target = (number as usize)
                .checked_sub(1)
                .and_then(|i| targets.get(i))
                .ok_or_else(|| diag("07009", format!("invalid parameter number {}", number)))?;
            let (_, db) = state.statement_database(stmt.raw())?;
            let (sql_type, nullable) = match target {
                ParamTarget::Column { table, column } => {
                    let def = db.column_type(table, column)?;
                    (def.sql_type, def.nullable)
                }
                ParamTarget::Position { table, position } => {
                    let def = db.table(table)?.columns.get(*position).ok_or_else(|| {
                        diag("21S01", "insert value list does not match column list")
                    })?;
                    (def.sql_type, def.nullable)
                }
                ParamTarget::Table => (SqlType::Table, false),
                ParamTarget::Procedure => (SqlType::BigInt, true),
                ParamTarget::Unknown => {
                    return Err(diag(
                        "HYC00",
                        format!("type of parameter {} cannot be determined", number),
                    ))
                }
            };
            Ok(ParamDescription {
                sql_type: sql_type.code(),
                size: sql_type.column_size(),
                decimal_digits: sql_type.decimal_digits(),
                nullable: if nullable { SQL_NULLABLE } else { SQL_NO_NULLS },
            })
        })
    }

    fn num_result_cols(&self, stmt: NativeHandle) -> SqlResult<i16> {
        self.call(stmt, |state| Ok(state.stmt(stmt.raw())?.columns().len() as i16))
    }

    fn describe_col(&self, stmt: NativeHandle, number: u16) -> SqlResult<ColumnDescription> {
        self.call(stmt, |state| {
            let s = state.stmt(stmt.raw())?;
            let column = (number as usize)
                .checked_sub(1)
                .and_then(|i| s.columns().get(i))
                .ok_or_else(|| diag("07009", format!("invalid descriptor index {}", number)))?;
            Ok(state.describe(column))
        })
    }

    fn row_count(&self, stmt: NativeHandle) -> SqlResult<i64> {
        self.call(stmt, |state| {
            Ok(state
                .stmt(stmt.raw())?
                .current
                .as_ref()
                .map(|c| c.data.row_count)
                .unwrap_or(-1))
        })
    }

    fn fetch_scroll(
        &self,
        stmt: NativeHandle,
        orientation: FetchOrientation,
        rowset_size: usize,
        columns: &mut BufferTable,
    ) -> SqlResult<usize> {
        let result = {
            let mut state = self.lock();
            state.diags.remove(&stmt.raw());
            let outcome = fetch(&mut state, stmt.raw(), orientation, rowset_size, columns);
            match outcome {
                Ok(Some((rows, false))) => SqlResult::Success(rows),
                Ok(Some((rows, true))) => {
                    state.push_diag(stmt.raw(), diag("01004", "string data, right truncated"));
                    SqlResult::SuccessWithInfo(rows)
                }
                Ok(None) => SqlResult::NoData,
                Err(record) => state.fail(stmt.raw(), record),
            }
        };
        self.deferred(stmt, result, |rows| *rows)
    }

    fn row_number(&self, stmt: NativeHandle) -> SqlResult<i64> {
        self.call(stmt, |state| {
            let s = state.stmt(stmt.raw())?;
            Ok(match s.current.as_ref().map(|c| c.position) {
                Some(Position::At(start)) => start as i64 + 1,
                _ => 0,
            })
        })
    }

    fn set_pos(&self, stmt: NativeHandle, row: usize) -> SqlResult<()> {
        self.call(stmt, |state| {
            let cursor = state
                .stmt_mut(stmt.raw())?
                .current
                .as_mut()
                .ok_or_else(|| diag("24000", "invalid cursor state"))?;
            if !matches!(cursor.position, Position::At(_)) || row >= cursor.window_len {
                return Err(diag("HY107", format!("row value {} out of range", row)));
            }
            cursor.row_in_window = row;
            cursor.read = ReadState::default();
            Ok(())
        })
    }

    fn get_data(&self, stmt: NativeHandle, column: u16, c_type: CType, buf: &mut [u8]) -> SqlResult<i64> {
        let mut state = self.lock();
        state.diags.remove(&stmt.raw());
        match get_data(&mut state, stmt.raw(), column, c_type, buf) {
            Ok(Piece::Complete(indicator)) => SqlResult::Success(indicator),
            Ok(Piece::Partial(indicator)) => {
                state.push_diag(stmt.raw(), diag("01004", "string data, right truncated"));
                SqlResult::SuccessWithInfo(indicator)
            }
            Ok(Piece::Exhausted) => SqlResult::NoData,
            Err(record) => state.fail(stmt.raw(), record),
        }
    }

    fn more_results(&self, stmt: NativeHandle) -> SqlResult<()> {
        let result = {
            let mut state = self.lock();
            state.diags.remove(&stmt.raw());
            match state.stmt_mut(stmt.raw()) {
                Ok(s) => match s.pending_results.pop_front() {
                    Some(next) => {
                        s.current = Some(Cursor::new(next));
                        SqlResult::Success(())
                    }
                    None => {
                        s.current = None;
                        SqlResult::NoData
                    }
                },
                Err(record) => state.fail(stmt.raw(), record),
            }
        };
        self.deferred(stmt, result, |_| 0)
    }

    fn free_stmt(&self, stmt: NativeHandle, option: FreeStmt) -> SqlResult<()> {
        self.call(stmt, |state| {
            let s = state.stmt_mut(stmt.raw())?;
            if option == FreeStmt::Close {
                s.close_cursor();
            }
            Ok(())
        })
    }

    fn cancel(&self, stmt: NativeHandle) -> SqlResult<()> {
        self.call(stmt, |state| state.stmt(stmt.raw()).map(|_| ()))
    }

    fn catalog(&self, stmt: NativeHandle, query: &CatalogQuery<'_>) -> SqlResult<()> {
        self.call(stmt, |state| {
            let data = {
                let (name, db) = state.statement_database(stmt.raw())?;
                catalog::run(db, &name, query)
            };
            let s = state.stmt_mut(stmt.raw())?;
            s.close_cursor();
            s.batch = None;
            s.shape.clear();
            s.current = Some(Cursor::new(data));
            Ok(())
        })
    }

    fn implementation_row_descriptor(&self, stmt: NativeHandle) -> SqlResult<NativeHandle> {
        self.call(stmt, |state| {
            let ird = state.stmt(stmt.raw())?.ird;
            Ok(NativeHandle::new(ird, HandleKind::Descriptor))
        })
    }

    fn desc_count(&self, desc: NativeHandle) -> SqlResult<i16> {
        self.call(desc, |state| {
            let owner = *state.descs.get(&desc.raw()).ok_or_else(|| invalid_handle(desc.raw()))?;
            Ok(state.stmt(owner)?.columns().len() as i16)
        })
    }

    fn desc_field(&self, desc: NativeHandle, record: i16, field: DescField) -> SqlResult<DescValue> {
        self.call(desc, |state| {
            let owner = *state.descs.get(&desc.raw()).ok_or_else(|| invalid_handle(desc.raw()))?;
            let s = state.stmt(owner)?;
            let column = usize::try_from(record)
                .ok()
                .and_then(|r| r.checked_sub(1))
                .and_then(|i| s.columns().get(i))
                .ok_or_else(|| diag("07009", format!("invalid descriptor index {}", record)))?;
            let catalog = state.database_name(s.dbc).unwrap_or_default();
            Ok(descriptor_field(column, &catalog, field))
        })
    }

    fn supports_async(&self) -> bool {
        true
    }

    fn set_async_event(&self, handle: NativeHandle, event: Option<EventHandle>) -> SqlResult<()> {
        self.call(handle, |state| {
            let known = match handle.kind() {
                HandleKind::Connection => state.dbcs.contains_key(&handle.raw()),
                HandleKind::Statement => state.stmts.contains_key(&handle.raw()),
                _ => false,
            };
            if !known {
                return Err(invalid_handle(handle.raw()));
            }
            match event {
                Some(event) => {
                    state.events.insert(handle.raw(), event);
                }
                None => {
                    state.events.remove(&handle.raw());
                }
            }
            Ok(())
        })
    }

    fn complete_async(&self, handle: NativeHandle) -> SqlResult<usize> {
        let mut state = self.lock();
        match state.pending.remove(&handle.raw()) {
            Some(status) => status,
            None => {
                state.diags.remove(&handle.raw());
                state.fail(handle.raw(), sequence_error("no asynchronous operation is pending"))
            }
        }
    }
}

fn fetch(
    state: &mut State,
    stmt: usize,
    orientation: FetchOrientation,
    rowset_size: usize,
    columns: &mut BufferTable,
) -> Result<Option<(usize, bool)>, DiagRecord> {
    let s = state.stmt_mut(stmt)?;
    let scrollable = s.cursor_type == SQL_CURSOR_STATIC;
    let cursor = s
        .current
        .as_mut()
        .filter(|c| !c.data.columns.is_empty())
        .ok_or_else(|| diag("24000", "invalid cursor state: no open result set"))?;
    if orientation != FetchOrientation::Next && !scrollable {
        return Err(diag("HY106", "fetch type out of range for a forward-only cursor"));
    }

    let len = cursor.data.rows.len() as i64;
    let size = rowset_size.max(1) as i64;
    let target: i64 = match (orientation, cursor.position) {
        (FetchOrientation::Next, Position::BeforeFirst) => 0,
        (FetchOrientation::Next, Position::At(start)) => start as i64 + cursor.window_len.max(1) as i64,
        (FetchOrientation::Next, Position::AfterEnd) => len,
        (FetchOrientation::Prior, Position::BeforeFirst) => -1,
        (FetchOrientation::Prior, Position::At(start)) => {
            if start == 0 {
                -1
            } else {
                (start as i64 - size).max(0)
            }
        }
        (FetchOrientation::Prior, Position::AfterEnd) => {
            if len == 0 {
                -1
            } else {
                (len - size).max(0)
            }
        }
        (FetchOrientation::First, _) => 0,
        (FetchOrientation::Last, _) => (len - size).max(0),
        (FetchOrientation::Absolute(n), _) => match n {
            0 => -1,
            n if n > 0 => n - 1,
            n => len + n,
        },
        (FetchOrientation::Relative(n), Position::BeforeFirst) => {
            if n > 0 {
                n - 1
            } else {
                -1
            }
        }
        (FetchOrientation::Relative(n), Position::At(start)) => start as i64 + n,
        (FetchOrientation::Relative(n), Position::AfterEnd) => {
            if n < 0 {
                len + n
            } else {
                len
            }
        }
    };

    cursor.read = ReadState::default();
    cursor.row_in_window = 0;
    if target < 0 {
        cursor.position = Position::BeforeFirst;
        cursor.window_len = 0;
        return Ok(None);
    }
    if target >= len {
        cursor.position = Position::AfterEnd;
        cursor.window_len = 0;
        return Ok(None);
    }
    let start = target as usize;
    let count = (len - target).min(size) as usize;
    cursor.position = Position::At(start);
    cursor.window_len = count;

    let mut truncated = false;
    for buffer in columns.iter_mut() {
        let ordinal = buffer.ordinal();
        if ordinal >= cursor.data.columns.len() {
            return Err(diag("07009", format!("bound column {} does not exist", ordinal + 1)));
        }
        if buffer.count() < count {
            return Err(diag("HY090", "bound buffer shorter than the rowset"));
        }
        for j in 0..count {
            let value = &cursor.data.rows[start + j][ordinal];
            truncated |= buffer.write_value(j, value).map_err(conversion_error)?;
        }
    }
    Ok(Some((count, truncated)))
}

enum Piece {
    Complete(i64),
    Partial(i64),
    Exhausted,
}

fn get_data(
    state: &mut State,
    stmt: usize,
    column: u16,
    c_type: CType,
    buf: &mut [u8],
) -> Result<Piece, DiagRecord> {
    let cursor = state
        .stmt_mut(stmt)?
        .current
        .as_mut()
        .ok_or_else(|| diag("24000", "invalid cursor state"))?;
    let index = (column as usize)
        .checked_sub(1)
        .filter(|i| *i < cursor.data.columns.len())
        .ok_or_else(|| diag("07009", format!("invalid descriptor index {}", column)))?;
    let value = cursor.current_row()?[index].clone();

    let read = &mut cursor.read;
    if column < read.column {
        return Err(diag(
            "07009",
            format!(
                "column {} requested after column {}; unbound columns must be read in ascending order",
                column, read.column
            ),
        ));
    }
    if column == read.column && read.done {
        return Ok(Piece::Exhausted);
    }
    if column > read.column {
        *read = ReadState {
            column,
            offset: 0,
            done: false,
        };
    }

    if value.is_null() {
        read.done = true;
        return Ok(Piece::Complete(SQL_NULL_DATA));
    }

    let bytes = match c_type {
        CType::Char => String::from_value(&value).map_err(conversion_error)?.into_bytes(),
        CType::Binary => Vec::<u8>::from_value(&value).map_err(conversion_error)?,
        _ => {
            let indicator = encode_element(c_type, &value, buf).map_err(conversion_error)?;
            read.done = true;
            return Ok(Piece::Complete(indicator));
        }
    };
    let remaining = &bytes[read.offset.min(bytes.len())..];
    let capacity = match c_type {
        CType::Char => buf.len().saturating_sub(1),
        _ => buf.len(),
    };
    let n = remaining.len().min(capacity);
    buf[..n].copy_from_slice(&remaining[..n]);
    if c_type == CType::Char && n < buf.len() {
        buf[n] = 0;
    }
    let indicator = remaining.len() as i64;
    read.offset += n;
    if n < remaining.len() {
        Ok(Piece::Partial(indicator))
    } else {
        read.done = true;
        Ok(Piece::Complete(indicator))
    }
}

fn is_numeric(sql_type: &SqlType) -> bool {
    matches!(
        sql_type,
        SqlType::TinyInt
            | SqlType::SmallInt
            | SqlType::Integer
            | SqlType::BigInt
            | SqlType::Real
            | SqlType::Float
            | SqlType::Double
            | SqlType::Decimal { .. }
            | SqlType::Numeric { .. }
    )
}

fn descriptor_field(column: &ResultColumn, catalog: &str, field: DescField) -> DescValue {
    let t = &column.sql_type;
    let int = DescValue::Integer;
    let text = |s: &str| DescValue::Text(s.to_string());
    let from_table = !column.table.is_empty();
    match field {
        DescField::AllocType => int(SQL_DESC_ALLOC_AUTO as i64),
        DescField::AutoUniqueValue => int(0),
        DescField::BaseColumnName => text(&column.base_column),
        DescField::BaseTableName | DescField::TableName => text(&column.table),
        DescField::CaseSensitive => int((t.default_c_type() == CType::Char && !is_numeric(t)) as i64),
        DescField::CatalogName => text(if from_table { catalog } else { "" }),
        DescField::ConciseType => int(t.code() as i64),
        DescField::Type => int(match t {
            SqlType::Date | SqlType::Time | SqlType::Timestamp { .. } => SQL_DATETIME as i64,
            other => other.code() as i64,
        }),
        DescField::DisplaySize => int(display_size(t)),
        DescField::FixedPrecScale => int(0),
        DescField::Label | DescField::Name => text(&column.name),
        DescField::Length => int(t.column_size() as i64),
        DescField::LocalTypeName | DescField::TypeName => text(type_name(t)),
        DescField::Nullable => int(if column.nullable {
            SQL_NULLABLE as i64
        } else {
            SQL_NO_NULLS as i64
        }),
        DescField::NumPrecRadix => int(match t {
            SqlType::Real | SqlType::Float | SqlType::Double => 2,
            other if is_numeric(other) => 10,
            _ => 0,
        }),
        DescField::OctetLength => int(octet_length(t)),
        DescField::Precision => int(match t {
            SqlType::Time | SqlType::Timestamp { .. } => t.decimal_digits() as i64,
            other if is_numeric(other) => other.column_size() as i64,
            _ => 0,
        }),
        DescField::RowVer => int(0),
        DescField::Scale => int(match t {
            SqlType::Decimal { scale, .. } | SqlType::Numeric { scale, .. } => *scale as i64,
            _ => 0,
        }),
        DescField::SchemaName => text(if from_table { storage::SCHEMA } else { "" }),
        DescField::Searchable => int(if t.is_long() {
            SQL_PRED_CHAR as i64
        } else {
            SQL_PRED_SEARCHABLE as i64
        }),
        DescField::Unnamed => int(if column.name.is_empty() {
            SQL_UNNAMED as i64
        } else {
            SQL_NAMED as i64
        }),
        DescField::Unsigned => int(!is_numeric(t) as i64),
        DescField::Updatable => int(if from_table {
            SQL_ATTR_WRITE as i64
        } else {
            SQL_ATTR_READONLY as i64
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::BoundBuffer;

    fn connected(driver: &MemoryDriver) -> (NativeHandle, NativeHandle, NativeHandle) {
        let env = driver.alloc_handle(HandleKind::Environment, None);
        let SqlResult::Success(env) = env else {
            panic!("environment allocation failed");
        };
        let SqlResult::Success(dbc) = driver.alloc_handle(HandleKind::Connection, Some(env)) else {
            panic!("connection allocation failed");
        };
        assert!(driver.connect(dbc, "unit", "", "").is_success());
        let SqlResult::Success(stmt) = driver.alloc_handle(HandleKind::Statement, Some(dbc)) else {
            panic!("statement allocation failed");
        };
        (env, dbc, stmt)
    }

    fn exec(driver: &MemoryDriver, stmt: NativeHandle, text: &str) {
        let result = driver.exec_direct(stmt, text, &mut ParameterSet::default(), 1);
        assert!(result.is_success(), "{}: {:?}", text, driver.diagnostics(stmt));
    }

    #[test]
    fn test_free_order_is_enforced() {
        let driver = MemoryDriver::new();
        let (env, dbc, stmt) = connected(&driver);
        assert_eq!(driver.free_handle(dbc), SqlResult::Error);
        assert_eq!(driver.diagnostics(dbc)[0].state, "HY010");
        assert!(driver.free_handle(stmt).is_success());
        assert!(driver.disconnect(dbc).is_success());
        assert_eq!(driver.free_handle(env), SqlResult::Error);
        assert!(driver.free_handle(dbc).is_success());
        assert!(driver.free_handle(env).is_success());
    }

    #[test]
    fn test_fetch_rowsets_and_get_data() {
        let driver = MemoryDriver::new();
        let (_, _, stmt) = connected(&driver);
        exec(&driver, stmt, "CREATE TABLE t (id INT, name VARCHAR(20))");
        exec(
            &driver,
            stmt,
            "INSERT INTO t VALUES (1, 'one'); INSERT INTO t VALUES (2, 'two'); INSERT INTO t VALUES (3, 'three')",
        );
        exec(&driver, stmt, "SELECT id, name FROM t ORDER BY id");

        let mut columns = BufferTable::new();
        columns.insert(BoundBuffer::new(0, CType::SLong, SqlType::Integer, 4, 2));
        let fetched = driver.fetch_scroll(stmt, FetchOrientation::Next, 2, &mut columns);
        assert_eq!(fetched, SqlResult::Success(2));
        assert_eq!(columns.get(0).unwrap().value(1).unwrap(), Value::Integer(2));

        // Piecewise read of an unbound column.
        assert!(driver.set_pos(stmt, 1).is_success());
        let mut buf = [0u8; 3];
        assert_eq!(
            driver.get_data(stmt, 2, CType::Char, &mut buf),
            SqlResult::SuccessWithInfo(3)
        );
        assert_eq!(&buf[..2], b"tw");
        assert_eq!(driver.get_data(stmt, 2, CType::Char, &mut buf), SqlResult::Success(1));
        assert_eq!(buf[0], b'o');
        assert_eq!(driver.get_data(stmt, 2, CType::Char, &mut buf), SqlResult::NoData);
        assert_eq!(driver.get_data(stmt, 1, CType::Char, &mut buf), SqlResult::Error);
        assert_eq!(driver.diagnostics(stmt)[0].state, "07009");

        let fetched = driver.fetch_scroll(stmt, FetchOrientation::Next, 2, &mut columns);
        assert_eq!(fetched, SqlResult::Success(1));
        assert_eq!(driver.row_number(stmt), SqlResult::Success(3));
        let fetched = driver.fetch_scroll(stmt, FetchOrientation::Next, 2, &mut columns);
        assert_eq!(fetched, SqlResult::NoData);
    }

    #[test]
    fn test_forward_only_rejects_scrolling() {
        let driver = MemoryDriver::new();
        let (_, _, stmt) = connected(&driver);
        exec(&driver, stmt, "SELECT 1");
        let mut columns = BufferTable::new();
        let result = driver.fetch_scroll(stmt, FetchOrientation::Last, 1, &mut columns);
        assert_eq!(result, SqlResult::Error);
        assert_eq!(driver.diagnostics(stmt)[0].state, "HY106");
    }

    #[test]
    fn test_rollback_restores_snapshot() {
        let driver = MemoryDriver::new();
        let (_, dbc, stmt) = connected(&driver);
        exec(&driver, stmt, "CREATE TABLE t (id INT)");
        let off = Attribute::unsigned(SQL_ATTR_AUTOCOMMIT, SQL_AUTOCOMMIT_OFF);
        assert!(driver.set_attribute(dbc, &off).is_success());
        exec(&driver, stmt, "INSERT INTO t VALUES (1)");
        assert!(driver.end_transaction(dbc, Completion::Rollback).is_success());
        exec(&driver, stmt, "SELECT COUNT(*) FROM t");
        let mut buf = [0u8; 8];
        let mut columns = BufferTable::new();
        assert!(driver
            .fetch_scroll(stmt, FetchOrientation::Next, 1, &mut columns)
            .is_success());
        assert!(driver.get_data(stmt, 1, CType::SBigInt, &mut buf).is_success());
        assert_eq!(i64::from_ne_bytes(buf), 0);
    }

    #[test]
    fn test_async_status_is_deferred() {
        let driver = MemoryDriver::new();
        let (_, _, stmt) = connected(&driver);
        let event = EventHandle::new();
        assert!(driver.set_async_event(stmt, Some(event.clone())).is_success());
        let result = driver.exec_direct(stmt, "SELEC", &mut ParameterSet::default(), 1);
        assert_eq!(result, SqlResult::StillExecuting);
        assert!(event.is_signaled());
        assert_eq!(driver.complete_async(stmt), SqlResult::Error);
        assert_eq!(driver.diagnostics(stmt)[0].state, "42000");
        assert_eq!(driver.complete_async(stmt), SqlResult::Error);
        assert_eq!(driver.diagnostics(stmt)[0].state, "HY010");
    }

    #[test]
    fn test_offline_source_refuses_connection() {
        let driver = MemoryDriver::new().with_offline_source("down");
        let SqlResult::Success(env) = driver.alloc_handle(HandleKind::Environment, None) else {
            panic!("environment allocation failed");
        };
        let SqlResult::Success(dbc) = driver.alloc_handle(HandleKind::Connection, Some(env)) else {
            panic!("connection allocation failed");
        };
        assert_eq!(driver.driver_connect(dbc, "DSN=down;UID=x"), SqlResult::Error);
        let diag = &driver.diagnostics(dbc)[0];
        assert_eq!((diag.state.as_str(), diag.native), ("08001", 10061));
    }
}
