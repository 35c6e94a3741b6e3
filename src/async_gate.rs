//! Two-phase asynchronous completion.
//!
//! An `async_*` call registers an [`EventHandle`] with the driver and starts
//! the operation. The caller waits on the event, then calls the matching
//! `complete_*` function, which is the only legal way out of the pending
//! state. The [`AsyncGate`] tracks that state per connection or statement.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct EventInner {
    signaled: AtomicBool,
    notify: Notify,
}

/// Completion event shared between the caller and the driver.
///
/// Clones refer to the same event.
#[derive(Debug, Clone, Default)]
pub struct EventHandle {
    inner: Arc<EventInner>,
}

impl EventHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the event signaled and wake every waiter.
    pub fn signal(&self) {
        self.inner.signaled.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    pub fn is_signaled(&self) -> bool {
        self.inner.signaled.load(Ordering::Acquire)
    }

    /// Return the event to the unsignaled state.
    pub fn reset(&self) {
        self.inner.signaled.store(false, Ordering::Release);
    }

    /// Wait until the event is signaled.
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_signaled() {
                return;
            }
            notified.await;
        }
    }

    /// Block the current thread until the event is signaled.
    pub fn wait_blocking(&self) {
        futures::executor::block_on(self.wait());
    }

    /// Whether two handles refer to the same event.
    pub fn same_event(&self, other: &EventHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Operation a gate can be pending on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncOp {
    Connect,
    Prepare,
    Execute,
    Fetch,
}

/// Pending/idle state of one object's asynchronous operation.
#[derive(Debug, Default)]
pub struct AsyncGate {
    pending: Option<AsyncOp>,
}

impl AsyncGate {
    /// Enter the pending state for `op`.
    pub fn begin(&mut self, op: AsyncOp) -> Result<()> {
        if let Some(current) = self.pending {
            return Err(Error::programming(format!(
                "cannot start {:?}: asynchronous {:?} still pending",
                op, current
            )));
        }
        self.pending = Some(op);
        Ok(())
    }

    /// Leave the pending state; `op` must be the operation that was started.
    pub fn finish(&mut self, op: AsyncOp) -> Result<()> {
        match self.pending {
            Some(current) if current == op => {
                self.pending = None;
                Ok(())
            }
            Some(current) => Err(Error::programming(format!(
                "complete for {:?} called while {:?} is pending",
                op, current
            ))),
            None => Err(Error::programming(format!(
                "complete for {:?} called without a pending asynchronous operation",
                op
            ))),
        }
    }

    /// Drop a pending operation whose start failed.
    pub fn abandon(&mut self) {
        self.pending = None;
    }

    pub fn pending(&self) -> Option<AsyncOp> {
        self.pending
    }

    /// Fail when an operation is pending; no other call may run meanwhile.
    pub fn ensure_idle(&self) -> Result<()> {
        match self.pending {
            Some(op) => Err(Error::programming(format!(
                "asynchronous {:?} pending; call the matching complete first",
                op
            ))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_transitions() {
        let mut gate = AsyncGate::default();
        assert!(gate.finish(AsyncOp::Execute).is_err());
        gate.begin(AsyncOp::Execute).unwrap();
        assert!(matches!(gate.begin(AsyncOp::Fetch), Err(Error::Programming { .. })));
        assert!(gate.ensure_idle().is_err());
        assert!(gate.finish(AsyncOp::Fetch).is_err());
        gate.finish(AsyncOp::Execute).unwrap();
        assert!(matches!(gate.finish(AsyncOp::Execute), Err(Error::Programming { .. })));
        assert_eq!(gate.pending(), None);
    }

    #[tokio::test]
    async fn test_event_wakes_waiter() {
        let event = EventHandle::new();
        let waiter = event.clone();
        let task = tokio::spawn(async move { waiter.wait().await });
        event.signal();
        task.await.unwrap();
        assert!(event.is_signaled());
        event.reset();
        assert!(!event.is_signaled());
    }

    #[test]
    fn test_wait_blocking_returns_when_signaled() {
        let event = EventHandle::new();
        event.signal();
        event.wait_blocking();
        assert!(event.same_event(&event.clone()));
    }
}
