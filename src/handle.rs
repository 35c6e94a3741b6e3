//! Ownership of native handles.
//!
//! A `HandleGuard` owns exactly one handle allocated from the driver and
//! frees it when the last `Arc` to it goes away. Child guards keep their
//! parent alive, so handles are always released children first.

use std::panic::Location;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::native::{Driver, HandleKind, NativeHandle, SqlResult};

pub(crate) struct HandleGuard {
    driver: Arc<dyn Driver>,
    handle: NativeHandle,
    /// Connection handles only: disconnect before freeing.
    connected: AtomicBool,
    parent: Option<Arc<HandleGuard>>,
}

impl HandleGuard {
    /// Allocate a handle of `kind` under `parent`.
    #[track_caller]
    pub fn acquire(
        driver: &Arc<dyn Driver>,
        kind: HandleKind,
        parent: Option<&Arc<HandleGuard>>,
    ) -> Result<Arc<HandleGuard>> {
        let location = Location::caller();
        let parent_handle = parent.map(|p| p.handle);
        match driver.alloc_handle(kind, parent_handle) {
            SqlResult::Success(handle) | SqlResult::SuccessWithInfo(handle) => {
                debug!(?kind, raw = handle.raw(), "allocated handle");
                Ok(Arc::new(HandleGuard {
                    driver: Arc::clone(driver),
                    handle,
                    connected: AtomicBool::new(false),
                    parent: parent.cloned(),
                }))
            }
            _ => {
                let records = parent_handle
                    .map(|h| driver.diagnostics(h))
                    .unwrap_or_default();
                Err(Error::from_diagnostics(&records, "SQLAllocHandle", location))
            }
        }
    }

    pub fn handle(&self) -> NativeHandle {
        self.handle
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Turn a native status into a value.
    ///
    /// `NoData` becomes `Ok(None)`; an error is composed from the handle's
    /// diagnostic records, tagged with `context` and the caller's location.
    #[track_caller]
    pub fn check<T>(&self, result: SqlResult<T>, context: &str) -> Result<Option<T>> {
        let location = Location::caller();
        match result {
            SqlResult::Success(v) => Ok(Some(v)),
            SqlResult::SuccessWithInfo(v) => {
                for record in self.driver.diagnostics(self.handle) {
                    debug!(state = %record.state, message = %record.message, "{}", context);
                }
                Ok(Some(v))
            }
            SqlResult::NoData => Ok(None),
            SqlResult::StillExecuting => Err(Error::programming(format!(
                "{}: asynchronous execution still in progress",
                context
            ))),
            SqlResult::NeedData => Err(Error::not_supported("data-at-execution parameters")),
            SqlResult::Error => Err(Error::from_diagnostics(
                &self.driver.diagnostics(self.handle),
                context,
                location,
            )),
        }
    }

    /// Like [`check`](Self::check), treating `NoData` as a failure.
    #[track_caller]
    pub fn ok<T>(&self, result: SqlResult<T>, context: &str) -> Result<T> {
        self.check(result, context)?
            .ok_or_else(|| Error::database("02000", format!("{}: no data", context)))
    }
}

impl Drop for HandleGuard {
    fn drop(&mut self) {
        if self.handle.kind() == HandleKind::Connection && self.is_connected() {
            if !self.driver.disconnect(self.handle).is_success() {
                warn!(raw = self.handle.raw(), "disconnect failed while releasing connection");
            }
        }
        if !self.driver.free_handle(self.handle).is_success() {
            let records = self.driver.diagnostics(self.handle);
            warn!(
                kind = ?self.handle.kind(),
                raw = self.handle.raw(),
                ?records,
                "failed to free handle"
            );
        } else {
            debug!(kind = ?self.handle.kind(), raw = self.handle.raw(), "freed handle");
        }
    }
}

impl std::fmt::Debug for HandleGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleGuard")
            .field("handle", &self.handle)
            .field("parent", &self.parent.as_ref().map(|p| p.handle))
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::memory::MemoryDriver;

    #[test]
    fn test_children_keep_parents_alive() {
        let driver: Arc<dyn Driver> = Arc::new(MemoryDriver::new());
        let env = HandleGuard::acquire(&driver, HandleKind::Environment, None).unwrap();
        let dbc = HandleGuard::acquire(&driver, HandleKind::Connection, Some(&env)).unwrap();
        let env_raw = env.handle();
        drop(env);
        assert_eq!(dbc.parent.as_ref().map(|p| p.handle()), Some(env_raw));
        assert!(driver.connect(dbc.handle(), "alive", "", "").is_success());
        dbc.set_connected(true);
        drop(dbc);
    }

    #[test]
    fn test_statement_needs_connection() {
        let driver: Arc<dyn Driver> = Arc::new(MemoryDriver::new());
        let env = HandleGuard::acquire(&driver, HandleKind::Environment, None).unwrap();
        let dbc = HandleGuard::acquire(&driver, HandleKind::Connection, Some(&env)).unwrap();
        let err = HandleGuard::acquire(&driver, HandleKind::Statement, Some(&dbc)).unwrap_err();
        assert_eq!(err.state(), Some("08003"));
        assert!(err.to_string().contains("SQLAllocHandle"));
    }

    #[test]
    fn test_connected_guard_disconnects_on_drop() {
        let driver: Arc<dyn Driver> = Arc::new(MemoryDriver::new());
        let env = HandleGuard::acquire(&driver, HandleKind::Environment, None).unwrap();
        let dbc = HandleGuard::acquire(&driver, HandleKind::Connection, Some(&env)).unwrap();
        assert!(driver.connect(dbc.handle(), "guard", "", "").is_success());
        dbc.set_connected(true);
        let raw_env = env.handle();
        drop(dbc);
        drop(env);
        // Environment was freed, so it no longer exists.
        assert!(!driver.free_handle(raw_env).is_success());
    }

    #[test]
    fn test_check_maps_status() {
        let driver: Arc<dyn Driver> = Arc::new(MemoryDriver::new());
        let env = HandleGuard::acquire(&driver, HandleKind::Environment, None).unwrap();
        assert_eq!(env.check(SqlResult::Success(3), "x").unwrap(), Some(3));
        assert_eq!(env.check::<i32>(SqlResult::NoData, "x").unwrap(), None);
        assert!(matches!(
            env.check::<()>(SqlResult::StillExecuting, "x"),
            Err(Error::Programming { .. })
        ));
        assert_eq!(env.ok::<()>(SqlResult::NoData, "x").unwrap_err().state(), Some("02000"));
    }
}
