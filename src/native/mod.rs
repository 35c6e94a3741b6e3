//! Native driver manager interface.
//!
//! The engine is written against the [`Driver`] trait, which mirrors the
//! handle-based call-level interface: every operation takes a
//! [`NativeHandle`], reports a [`SqlResult`] status, and leaves details in
//! per-handle diagnostic records. Buffers are lent per call rather than
//! registered by address; a driver must be done with a lent buffer before it
//! returns, even when it reports `StillExecuting`.

pub mod buffer;
pub mod constants;
pub mod memory;

use crate::async_gate::EventHandle;
use crate::attribute::Attribute;
use crate::types::CType;

pub use buffer::{BoundBuffer, BufferTable, ParamDirection, ParameterSet, TableParameter};

/// Kind of a native handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Environment,
    Connection,
    Statement,
    Descriptor,
}

/// Opaque native handle value plus its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeHandle {
    raw: usize,
    kind: HandleKind,
}

impl NativeHandle {
    pub fn new(raw: usize, kind: HandleKind) -> Self {
        Self { raw, kind }
    }

    pub fn raw(&self) -> usize {
        self.raw
    }

    pub fn kind(&self) -> HandleKind {
        self.kind
    }
}

/// Status of a native call.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlResult<T> {
    Success(T),
    SuccessWithInfo(T),
    NoData,
    StillExecuting,
    NeedData,
    Error,
}

impl<T> SqlResult<T> {
    /// Transform the value of a successful call.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> SqlResult<U> {
        match self {
            SqlResult::Success(v) => SqlResult::Success(f(v)),
            SqlResult::SuccessWithInfo(v) => SqlResult::SuccessWithInfo(f(v)),
            SqlResult::NoData => SqlResult::NoData,
            SqlResult::StillExecuting => SqlResult::StillExecuting,
            SqlResult::NeedData => SqlResult::NeedData,
            SqlResult::Error => SqlResult::Error,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SqlResult::Success(_) | SqlResult::SuccessWithInfo(_))
    }
}

/// One native diagnostic record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagRecord {
    /// Five-character SQL state.
    pub state: String,
    /// Driver-specific error number.
    pub native: i32,
    pub message: String,
}

impl DiagRecord {
    pub fn new(state: impl Into<String>, native: i32, message: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            native,
            message: message.into(),
        }
    }
}

/// Result of describing a column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescription {
    pub name: String,
    pub sql_type: i16,
    pub size: usize,
    pub decimal_digits: i16,
    pub nullable: i16,
}

/// Result of describing a parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamDescription {
    pub sql_type: i16,
    pub size: usize,
    pub decimal_digits: i16,
    pub nullable: i16,
}

/// Fetch orientation for `fetch_scroll`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOrientation {
    Next,
    Prior,
    First,
    Last,
    /// 1-based absolute row number; negative values count from the end.
    Absolute(i64),
    Relative(i64),
}

/// Options for `free_stmt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeStmt {
    Close,
    Unbind,
    ResetParams,
}

/// Transaction completion type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Commit,
    Rollback,
}

/// Catalog function to run on a statement handle.
///
/// `None` means "argument not supplied"; `Some("")` and `Some("%")` differ
/// for the special enumeration forms (all catalogs, all schemas, all table types).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogQuery<'a> {
    Tables {
        catalog: Option<&'a str>,
        schema: Option<&'a str>,
        table: Option<&'a str>,
        table_type: Option<&'a str>,
    },
    TablePrivileges {
        catalog: Option<&'a str>,
        schema: Option<&'a str>,
        table: Option<&'a str>,
    },
    Columns {
        catalog: Option<&'a str>,
        schema: Option<&'a str>,
        table: Option<&'a str>,
        column: Option<&'a str>,
    },
    PrimaryKeys {
        catalog: Option<&'a str>,
        schema: Option<&'a str>,
        table: Option<&'a str>,
    },
    Procedures {
        catalog: Option<&'a str>,
        schema: Option<&'a str>,
        procedure: Option<&'a str>,
    },
    ProcedureColumns {
        catalog: Option<&'a str>,
        schema: Option<&'a str>,
        procedure: Option<&'a str>,
        column: Option<&'a str>,
    },
}

/// Fields of an implementation row descriptor record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescField {
    AllocType,
    AutoUniqueValue,
    BaseColumnName,
    BaseTableName,
    CaseSensitive,
    CatalogName,
    ConciseType,
    DisplaySize,
    FixedPrecScale,
    Label,
    Length,
    LocalTypeName,
    Name,
    Nullable,
    NumPrecRadix,
    OctetLength,
    Precision,
    RowVer,
    Scale,
    SchemaName,
    Searchable,
    TableName,
    Type,
    TypeName,
    Unnamed,
    Unsigned,
    Updatable,
}

/// Value of a descriptor field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescValue {
    Integer(i64),
    Text(String),
}

/// A configured driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverInfo {
    pub name: String,
    /// Keyword/value attributes.
    pub attributes: Vec<(String, String)>,
}

/// A configured data source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSourceInfo {
    pub name: String,
    /// Driver description.
    pub driver: String,
}

/// The native driver manager.
///
/// Column and parameter numbers are 1-based, as in the native API.
pub trait Driver: Send + Sync {
    /// Allocate a handle of `kind` under `parent` (none for environments).
    fn alloc_handle(&self, kind: HandleKind, parent: Option<NativeHandle>)
        -> SqlResult<NativeHandle>;

    /// Free a handle. Children must already be freed.
    fn free_handle(&self, handle: NativeHandle) -> SqlResult<()>;

    /// Diagnostic records left by the last call on `handle`.
    fn diagnostics(&self, handle: NativeHandle) -> Vec<DiagRecord>;

    /// Set an environment, connection or statement attribute.
    fn set_attribute(&self, handle: NativeHandle, attribute: &Attribute) -> SqlResult<()>;

    /// Read a text connection attribute into `buf`; returns the full length.
    fn get_connect_attr(&self, dbc: NativeHandle, attribute: i32, buf: &mut [u8])
        -> SqlResult<usize>;

    fn connect(&self, dbc: NativeHandle, dsn: &str, user: &str, password: &str)
        -> SqlResult<()>;

    fn driver_connect(&self, dbc: NativeHandle, connection_string: &str) -> SqlResult<()>;

    fn disconnect(&self, dbc: NativeHandle) -> SqlResult<()>;

    /// Read an info value into `buf`; returns the full length in bytes.
    fn get_info(&self, dbc: NativeHandle, info_type: u16, buf: &mut [u8]) -> SqlResult<usize>;

    fn end_transaction(&self, dbc: NativeHandle, completion: Completion) -> SqlResult<()>;

    fn drivers(&self, env: NativeHandle) -> SqlResult<Vec<DriverInfo>>;

    fn data_sources(&self, env: NativeHandle) -> SqlResult<Vec<DataSourceInfo>>;

    fn prepare(&self, stmt: NativeHandle, text: &str) -> SqlResult<()>;

    /// Execute the prepared statement `paramset_size` times over the lent parameters.
    fn execute(&self, stmt: NativeHandle, params: &mut ParameterSet, paramset_size: usize)
        -> SqlResult<()>;

    fn exec_direct(
        &self,
        stmt: NativeHandle,
        text: &str,
        params: &mut ParameterSet,
        paramset_size: usize,
    ) -> SqlResult<()>;

    fn num_params(&self, stmt: NativeHandle) -> SqlResult<i16>;

    fn describe_param(&self, stmt: NativeHandle, number: u16) -> SqlResult<ParamDescription>;

    fn num_result_cols(&self, stmt: NativeHandle) -> SqlResult<i16>;

    fn describe_col(&self, stmt: NativeHandle, number: u16) -> SqlResult<ColumnDescription>;

    /// Rows affected by the last execution, -1 when unknown.
    fn row_count(&self, stmt: NativeHandle) -> SqlResult<i64>;

    /// Fetch a rowset of up to `rowset_size` rows into the lent column buffers.
    ///
    /// Returns the number of rows placed in the buffers.
    fn fetch_scroll(
        &self,
        stmt: NativeHandle,
        orientation: FetchOrientation,
        rowset_size: usize,
        columns: &mut BufferTable,
    ) -> SqlResult<usize>;

    /// 1-based number of the first row of the current rowset, 0 when not on a row.
    fn row_number(&self, stmt: NativeHandle) -> SqlResult<i64>;

    /// Position the cursor on row `row` (0-based) of the current rowset.
    fn set_pos(&self, stmt: NativeHandle, row: usize) -> SqlResult<()>;

    /// Read (part of) a column of the current row into `buf`.
    ///
    /// Returns the indicator: `SQL_NULL_DATA`, the remaining length before this
    /// call, or `SQL_NO_TOTAL`. Truncation is reported as `SuccessWithInfo`
    /// and a fully consumed column as `NoData`.
    fn get_data(&self, stmt: NativeHandle, column: u16, c_type: CType, buf: &mut [u8])
        -> SqlResult<i64>;

    fn more_results(&self, stmt: NativeHandle) -> SqlResult<()>;

    fn free_stmt(&self, stmt: NativeHandle, option: FreeStmt) -> SqlResult<()>;

    fn cancel(&self, stmt: NativeHandle) -> SqlResult<()>;

    /// Run a catalog function, leaving its result set open on `stmt`.
    fn catalog(&self, stmt: NativeHandle, query: &CatalogQuery<'_>) -> SqlResult<()>;

    /// The implicitly allocated implementation row descriptor of `stmt`.
    fn implementation_row_descriptor(&self, stmt: NativeHandle) -> SqlResult<NativeHandle>;

    fn desc_count(&self, desc: NativeHandle) -> SqlResult<i16>;

    fn desc_field(&self, desc: NativeHandle, record: i16, field: DescField)
        -> SqlResult<DescValue>;

    /// Whether event-based asynchronous execution is available.
    fn supports_async(&self) -> bool {
        false
    }

    /// Register (or clear) the completion event of a connection or statement handle.
    fn set_async_event(&self, handle: NativeHandle, event: Option<EventHandle>) -> SqlResult<()> {
        let _ = (handle, event);
        SqlResult::Error
    }

    /// Collect the status of the asynchronous operation pending on `handle`.
    ///
    /// For fetches the value is the number of rows fetched; other operations report 0.
    fn complete_async(&self, handle: NativeHandle) -> SqlResult<usize> {
        let _ = handle;
        SqlResult::Error
    }
}
