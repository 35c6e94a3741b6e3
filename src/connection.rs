//! Connections to a data source.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, warn};

use crate::async_gate::{AsyncGate, AsyncOp, EventHandle};
use crate::attribute::Attribute;
use crate::error::{Error, Result};
use crate::handle::HandleGuard;
use crate::native::constants::*;
use crate::native::{
    Completion, DataSourceInfo, Driver, DriverInfo, HandleKind, NativeHandle, SqlResult,
};

/// Where to connect.
#[derive(Clone)]
enum Target {
    Dsn {
        dsn: String,
        user: String,
        password: String,
    },
    ConnectionString(String),
}

/// Connection parameters.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use odbc_bind::{Attribute, ConnectOptions};
/// use odbc_bind::native::constants::SQL_ATTR_ACCESS_MODE;
///
/// let options = ConnectOptions::connection_string("DSN=sales;UID=report")
///     .with_login_timeout(Duration::from_secs(5))
///     .with_attribute(Attribute::unsigned(SQL_ATTR_ACCESS_MODE, 1));
/// assert_eq!(options.login_timeout(), Duration::from_secs(5));
/// ```
#[derive(Clone)]
pub struct ConnectOptions {
    target: Target,
    login_timeout: Duration,
    attributes: Vec<Attribute>,
}

impl ConnectOptions {
    /// Connect to a data source name with credentials.
    pub fn dsn(dsn: impl Into<String>, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self::new(Target::Dsn {
            dsn: dsn.into(),
            user: user.into(),
            password: password.into(),
        })
    }

    /// Connect with a driver connection string, passed to the driver verbatim.
    pub fn connection_string(connection_string: impl Into<String>) -> Self {
        Self::new(Target::ConnectionString(connection_string.into()))
    }

    fn new(target: Target) -> Self {
        Self {
            target,
            login_timeout: Duration::ZERO,
            attributes: Vec::new(),
        }
    }

    /// Set the login timeout. Zero means no timeout.
    pub fn with_login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }

    /// Append an attribute applied before connecting, in insertion order.
    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn login_timeout(&self) -> Duration {
        self.login_timeout
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("ConnectOptions");
        match &self.target {
            Target::Dsn { dsn, user, .. } => s
                .field("dsn", dsn)
                .field("user", user)
                .field("password", &"<redacted>"),
            Target::ConnectionString(_) => s.field("connection_string", &"<redacted>"),
        };
        s.field("login_timeout", &self.login_timeout)
            .field("attributes", &self.attributes)
            .finish()
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Types an info value can be read as: text, or a fixed-size integer.
pub trait InfoValue: Sized + sealed::Sealed {
    /// Decode the value; `fetch` fills a buffer and returns the full length.
    #[doc(hidden)]
    fn read(fetch: &mut dyn FnMut(&mut [u8]) -> Result<usize>) -> Result<Self>;
}

/// Read a variable-length text value, growing the buffer until it fits.
fn read_text(fetch: &mut dyn FnMut(&mut [u8]) -> Result<usize>) -> Result<String> {
    let mut buf = vec![0u8; 256];
    loop {
        let len = fetch(&mut buf)?;
        if len < buf.len() {
            buf.truncate(len);
            return String::from_utf8(buf)
                .map_err(|e| Error::type_incompatible(format!("text value is not UTF-8: {}", e)));
        }
        buf = vec![0u8; len + 1];
    }
}

impl sealed::Sealed for String {}

impl InfoValue for String {
    fn read(fetch: &mut dyn FnMut(&mut [u8]) -> Result<usize>) -> Result<Self> {
        read_text(fetch)
    }
}

macro_rules! fixed_info {
    ($($t:ty),*) => {
        $(
            impl sealed::Sealed for $t {}

            impl InfoValue for $t {
                fn read(fetch: &mut dyn FnMut(&mut [u8]) -> Result<usize>) -> Result<Self> {
                    let mut buf = [0u8; std::mem::size_of::<$t>()];
                    fetch(&mut buf)?;
                    Ok(<$t>::from_ne_bytes(buf))
                }
            }
        )*
    };
}

fixed_info!(u16, u32, u64);

#[derive(Default)]
struct ConnectionState {
    env: Option<Arc<HandleGuard>>,
    dbc: Option<Arc<HandleGuard>>,
    /// Open transaction scopes.
    transactions: usize,
    /// An inner scope ended without committing.
    rollback: bool,
    /// Bumped on every successful connect; scopes from an older epoch are void.
    epoch: u64,
    gate: AsyncGate,
    /// Status of an asynchronous connect that finished immediately.
    early: Option<Result<()>>,
}

impl ConnectionState {
    fn connected_dbc(&self) -> Result<Arc<HandleGuard>> {
        match &self.dbc {
            Some(dbc) if dbc.is_connected() => Ok(Arc::clone(dbc)),
            _ => Err(Error::programming("connection is not open")),
        }
    }
}

/// A connection to a data source.
///
/// Clones refer to the same native connection; the handle is released when
/// the last clone, and every statement created from it, is gone.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use odbc_bind::native::memory::MemoryDriver;
/// use odbc_bind::{ConnectOptions, Connection};
///
/// # fn main() -> odbc_bind::Result<()> {
/// let conn = Connection::open(Arc::new(MemoryDriver::new()), &ConnectOptions::dsn("demo", "", ""))?;
/// assert!(conn.connected());
/// assert_eq!(conn.dbms_name()?, "MemoryDB");
/// conn.disconnect()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Connection {
    driver: Arc<dyn Driver>,
    state: Arc<Mutex<ConnectionState>>,
}

impl Connection {
    /// Create an unallocated connection.
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self {
            driver,
            state: Arc::default(),
        }
    }

    /// Create a connection and connect it.
    pub fn open(driver: Arc<dyn Driver>, options: &ConnectOptions) -> Result<Self> {
        let conn = Self::new(driver);
        conn.connect(options)?;
        Ok(conn)
    }

    fn lock(&self) -> MutexGuard<'_, ConnectionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    /// Allocate the environment and connection handles.
    pub fn allocate(&self) -> Result<()> {
        let mut state = self.lock();
        self.allocate_locked(&mut state).map(|_| ())
    }

    fn allocate_locked(&self, state: &mut ConnectionState) -> Result<Arc<HandleGuard>> {
        if let Some(dbc) = &state.dbc {
            return Ok(Arc::clone(dbc));
        }
        let env = match &state.env {
            Some(env) => Arc::clone(env),
            None => {
                let env = allocate_environment(&self.driver)?;
                state.env = Some(Arc::clone(&env));
                env
            }
        };
        let dbc = HandleGuard::acquire(&self.driver, HandleKind::Connection, Some(&env))?;
        state.dbc = Some(Arc::clone(&dbc));
        Ok(dbc)
    }

    /// Disconnect if needed, allocate, and apply the pre-connect attributes.
    fn prepare_connect(
        &self,
        state: &mut ConnectionState,
        options: &ConnectOptions,
    ) -> Result<Arc<HandleGuard>> {
        state.gate.ensure_idle()?;
        if let Some(dbc) = state.dbc.as_ref().filter(|d| d.is_connected()) {
            dbc.ok(self.driver.disconnect(dbc.handle()), "SQLDisconnect")?;
            dbc.set_connected(false);
        }
        let dbc = self.allocate_locked(state)?;
        let handle = dbc.handle();
        if !options.login_timeout.is_zero() {
            let timeout = Attribute::unsigned(
                SQL_ATTR_LOGIN_TIMEOUT,
                options.login_timeout.as_secs() as usize,
            );
            dbc.ok(
                self.driver.set_attribute(handle, &timeout),
                "SQLSetConnectAttr(SQL_ATTR_LOGIN_TIMEOUT)",
            )?;
        }
        for attribute in &options.attributes {
            dbc.ok(self.driver.set_attribute(handle, attribute), "SQLSetConnectAttr")?;
        }
        Ok(dbc)
    }

    fn issue_connect(&self, dbc: &HandleGuard, options: &ConnectOptions) -> SqlResult<()> {
        match &options.target {
            Target::Dsn {
                dsn,
                user,
                password,
            } => self.driver.connect(dbc.handle(), dsn, user, password),
            Target::ConnectionString(s) => self.driver.driver_connect(dbc.handle(), s),
        }
    }

    fn context(options: &ConnectOptions) -> &'static str {
        match options.target {
            Target::Dsn { .. } => "SQLConnect",
            Target::ConnectionString(_) => "SQLDriverConnect",
        }
    }

    /// Connect, disconnecting first if already connected.
    ///
    /// Resets the transaction count.
    pub fn connect(&self, options: &ConnectOptions) -> Result<()> {
        let mut state = self.lock();
        let dbc = self.prepare_connect(&mut state, options)?;
        dbc.ok(self.issue_connect(&dbc, options), Self::context(options))?;
        dbc.set_connected(true);
        state.transactions = 0;
        state.rollback = false;
        state.epoch += 1;
        debug!(options = ?options, "connected");
        Ok(())
    }

    /// Start connecting asynchronously; `event` is signaled on completion.
    ///
    /// Returns `true` when the caller must wait on `event` before calling
    /// [`async_complete`](Self::async_complete), `false` when the connect
    /// already finished. Either way `async_complete` must be called.
    pub fn async_connect(&self, options: &ConnectOptions, event: &EventHandle) -> Result<bool> {
        if !self.driver.supports_async() {
            return Err(Error::not_supported("asynchronous connect"));
        }
        let mut state = self.lock();
        let dbc = self.prepare_connect(&mut state, options)?;
        state.gate.begin(AsyncOp::Connect)?;
        let registered = self.driver.set_async_event(dbc.handle(), Some(event.clone()));
        if let Err(e) = dbc.ok(registered, "SQLSetConnectAttr(SQL_ATTR_ASYNC_DBC_EVENT)") {
            state.gate.abandon();
            return Err(e);
        }
        match self.issue_connect(&dbc, options) {
            SqlResult::StillExecuting => Ok(true),
            other => {
                state.early = Some(dbc.ok(other, Self::context(options)));
                Ok(false)
            }
        }
    }

    /// Finish an asynchronous connect.
    pub fn async_complete(&self) -> Result<()> {
        let mut state = self.lock();
        state.gate.finish(AsyncOp::Connect)?;
        let dbc = state
            .dbc
            .clone()
            .ok_or_else(|| Error::programming("connection is not allocated"))?;
        let outcome = match state.early.take() {
            Some(outcome) => outcome,
            None => dbc
                .ok(self.driver.complete_async(dbc.handle()), "SQLCompleteAsync")
                .map(|_| ()),
        };
        if !self.driver.set_async_event(dbc.handle(), None).is_success() {
            warn!(raw = dbc.handle().raw(), "failed to clear asynchronous event");
        }
        outcome?;
        dbc.set_connected(true);
        state.transactions = 0;
        state.rollback = false;
        state.epoch += 1;
        debug!("connected asynchronously");
        Ok(())
    }

    /// Whether the connection is open.
    pub fn connected(&self) -> bool {
        self.lock().dbc.as_ref().is_some_and(|d| d.is_connected())
    }

    /// Close the connection; a no-op when not connected.
    pub fn disconnect(&self) -> Result<()> {
        let state = self.lock();
        state.gate.ensure_idle()?;
        if let Some(dbc) = state.dbc.as_ref().filter(|d| d.is_connected()) {
            dbc.ok(self.driver.disconnect(dbc.handle()), "SQLDisconnect")?;
            dbc.set_connected(false);
            debug!("disconnected");
        }
        Ok(())
    }

    /// Disconnect and release the native handles held by this connection.
    pub fn deallocate(&self) -> Result<()> {
        self.disconnect()?;
        let mut state = self.lock();
        state.dbc = None;
        state.env = None;
        Ok(())
    }

    /// Number of open transaction scopes.
    pub fn transactions(&self) -> usize {
        self.lock().transactions
    }

    pub fn native_dbc_handle(&self) -> Option<NativeHandle> {
        self.lock().dbc.as_ref().map(|d| d.handle())
    }

    pub fn native_env_handle(&self) -> Option<NativeHandle> {
        self.lock().env.as_ref().map(|e| e.handle())
    }

    pub(crate) fn dbc_guard(&self) -> Result<Arc<HandleGuard>> {
        let state = self.lock();
        state.gate.ensure_idle()?;
        state.connected_dbc()
    }

    /// Read a driver information value.
    ///
    /// ```
    /// # use std::sync::Arc;
    /// # use odbc_bind::native::memory::MemoryDriver;
    /// # use odbc_bind::{ConnectOptions, Connection};
    /// use odbc_bind::native::constants::{SQL_DRIVER_NAME, SQL_TXN_CAPABLE};
    /// # let conn = Connection::open(Arc::new(MemoryDriver::new()), &ConnectOptions::dsn("d", "", "")).unwrap();
    /// let name: String = conn.get_info(SQL_DRIVER_NAME).unwrap();
    /// let txn: u16 = conn.get_info(SQL_TXN_CAPABLE).unwrap();
    /// assert_eq!(name, "MemoryDriver");
    /// assert!(txn > 0);
    /// ```
    pub fn get_info<T: InfoValue>(&self, info_type: u16) -> Result<T> {
        let dbc = self.dbc_guard()?;
        T::read(&mut |buf| {
            dbc.ok(self.driver.get_info(dbc.handle(), info_type, buf), "SQLGetInfo")
        })
    }

    pub fn dbms_name(&self) -> Result<String> {
        self.get_info(SQL_DBMS_NAME)
    }

    pub fn dbms_version(&self) -> Result<String> {
        self.get_info(SQL_DBMS_VER)
    }

    pub fn driver_name(&self) -> Result<String> {
        self.get_info(SQL_DRIVER_NAME)
    }

    pub fn driver_version(&self) -> Result<String> {
        self.get_info(SQL_DRIVER_VER)
    }

    pub fn database_name(&self) -> Result<String> {
        self.get_info(SQL_DATABASE_NAME)
    }

    /// The current catalog (connection attribute).
    pub fn catalog_name(&self) -> Result<String> {
        let dbc = self.dbc_guard()?;
        read_text(&mut |buf| {
            dbc.ok(
                self.driver
                    .get_connect_attr(dbc.handle(), SQL_ATTR_CURRENT_CATALOG, buf),
                "SQLGetConnectAttr(SQL_ATTR_CURRENT_CATALOG)",
            )
        })
    }

    /// Enter a transaction scope; the outermost one turns autocommit off.
    ///
    /// Returns the connection epoch the scope belongs to.
    pub(crate) fn ref_transaction(&self) -> Result<u64> {
        let mut state = self.lock();
        state.gate.ensure_idle()?;
        let dbc = state.connected_dbc()?;
        if state.transactions == 0 {
            let off = Attribute::unsigned(SQL_ATTR_AUTOCOMMIT, SQL_AUTOCOMMIT_OFF);
            dbc.ok(
                self.driver.set_attribute(dbc.handle(), &off),
                "SQLSetConnectAttr(SQL_ATTR_AUTOCOMMIT)",
            )?;
            state.rollback = false;
        }
        state.transactions += 1;
        Ok(state.epoch)
    }

    /// Leave a transaction scope.
    ///
    /// Only the outermost scope ends the native transaction. It rolls back
    /// if any scope ended without committing; a commit request that turns
    /// into a rollback this way is reported as a programming error.
    ///
    /// A scope opened before the last connect no longer counts: its work
    /// was discarded with the old session, so ending it touches nothing.
    pub(crate) fn unref_transaction(&self, epoch: u64, commit: bool) -> Result<()> {
        let mut state = self.lock();
        if epoch != state.epoch {
            debug!(epoch, current = state.epoch, "ignoring transaction from a previous connection");
            if commit {
                return Err(Error::programming(
                    "transaction was opened before the connection was re-established",
                ));
            }
            return Ok(());
        }
        state.transactions = state.transactions.saturating_sub(1);
        if !commit {
            state.rollback = true;
        }
        if state.transactions > 0 {
            return Ok(());
        }
        let rollback = std::mem::take(&mut state.rollback);
        let dbc = state.connected_dbc()?;
        let completion = if rollback {
            Completion::Rollback
        } else {
            Completion::Commit
        };
        let ended = dbc.ok(
            self.driver.end_transaction(dbc.handle(), completion),
            "SQLEndTran",
        );
        let on = Attribute::unsigned(SQL_ATTR_AUTOCOMMIT, SQL_AUTOCOMMIT_ON);
        let restored = dbc.ok(
            self.driver.set_attribute(dbc.handle(), &on),
            "SQLSetConnectAttr(SQL_ATTR_AUTOCOMMIT)",
        );
        debug!(?completion, "transaction ended");
        ended?;
        restored?;
        if rollback && commit {
            return Err(Error::programming(
                "transaction rolled back: a nested transaction ended without commit",
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Connection")
            .field("dbc", &state.dbc)
            .field("transactions", &state.transactions)
            .finish()
    }
}

fn allocate_environment(driver: &Arc<dyn Driver>) -> Result<Arc<HandleGuard>> {
    let env = HandleGuard::acquire(driver, HandleKind::Environment, None)?;
    let version = Attribute::unsigned(SQL_ATTR_ODBC_VERSION, SQL_OV_ODBC3_80);
    env.ok(
        driver.set_attribute(env.handle(), &version),
        "SQLSetEnvAttr(SQL_ATTR_ODBC_VERSION)",
    )?;
    Ok(env)
}

/// Installed drivers, as a snapshot taken now.
pub fn list_drivers(driver: &Arc<dyn Driver>) -> Result<Vec<DriverInfo>> {
    let env = allocate_environment(driver)?;
    env.ok(driver.drivers(env.handle()), "SQLDrivers")
}

/// Configured data sources, as a snapshot taken now.
pub fn list_datasources(driver: &Arc<dyn Driver>) -> Result<Vec<DataSourceInfo>> {
    let env = allocate_environment(driver)?;
    env.ok(driver.data_sources(env.handle()), "SQLDataSources")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::memory::MemoryDriver;

    fn driver() -> Arc<dyn Driver> {
        Arc::new(MemoryDriver::new())
    }

    #[test]
    fn test_connect_and_info() {
        let conn = Connection::open(driver(), &ConnectOptions::connection_string("DSN=info")).unwrap();
        assert!(conn.connected());
        assert_eq!(conn.database_name().unwrap(), "info");
        assert_eq!(conn.catalog_name().unwrap(), "info");
        assert_eq!(conn.driver_version().unwrap(), "01.00.0000");
        assert_eq!(conn.get_info::<u32>(SQL_ASYNC_DBC_FUNCTIONS).unwrap(), 1);
        assert!(conn.native_dbc_handle().is_some());
    }

    #[test]
    fn test_not_connected_is_programming_error() {
        let conn = Connection::new(driver());
        conn.allocate().unwrap();
        assert!(!conn.connected());
        assert!(matches!(conn.dbms_name(), Err(Error::Programming { .. })));
        conn.disconnect().unwrap();
    }

    #[test]
    fn test_connect_failure_carries_diagnostics() {
        let driver: Arc<dyn Driver> = Arc::new(MemoryDriver::new().with_offline_source("down"));
        let err = Connection::open(driver, &ConnectOptions::dsn("down", "u", "p")).unwrap_err();
        assert_eq!(err.state(), Some("08001"));
        assert!(err.to_string().contains("SQLConnect"));
    }

    #[test]
    fn test_rejected_attribute_aborts_connect() {
        let options = ConnectOptions::dsn("attrs", "", "").with_attribute(Attribute::unsigned(9999, 1));
        let err = Connection::open(driver(), &options).unwrap_err();
        assert_eq!(err.state(), Some("HY092"));
    }

    #[test]
    fn test_reconnect_and_deallocate() {
        let conn = Connection::open(driver(), &ConnectOptions::dsn("a", "", "")).unwrap();
        conn.connect(&ConnectOptions::dsn("b", "", "")).unwrap();
        assert_eq!(conn.database_name().unwrap(), "b");
        conn.deallocate().unwrap();
        assert!(!conn.connected());
        assert_eq!(conn.native_env_handle(), None);
    }

    #[test]
    fn test_debug_redacts_password() {
        let text = format!("{:?}", ConnectOptions::dsn("d", "u", "secret"));
        assert!(!text.contains("secret"));
    }

    #[test]
    fn test_enumeration() {
        let driver = driver();
        let drivers = list_drivers(&driver).unwrap();
        assert_eq!(drivers[0].name, "MemoryDriver");
        let _conn = Connection::open(Arc::clone(&driver), &ConnectOptions::dsn("listed", "", "")).unwrap();
        let sources = list_datasources(&driver).unwrap();
        assert!(sources.iter().any(|s| s.name == "listed"));
    }
}
