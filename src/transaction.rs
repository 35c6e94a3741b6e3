//! Scoped transactions.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use crate::connection::Connection;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Active,
    Committed,
    RolledBack,
}

struct TransactionInner {
    conn: Connection,
    epoch: u64,
    state: Mutex<State>,
}

impl TransactionInner {
    fn finish(&self, target: State) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != State::Active {
            return Err(Error::programming(format!(
                "transaction already {}",
                if *state == State::Committed {
                    "committed"
                } else {
                    "rolled back"
                }
            )));
        }
        *state = target;
        drop(state);
        self.conn.unref_transaction(self.epoch, target == State::Committed)
    }
}

impl Drop for TransactionInner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if *state != State::Active {
            return;
        }
        *state = State::RolledBack;
        match self.conn.unref_transaction(self.epoch, false) {
            Ok(()) => debug!("transaction rolled back on drop"),
            Err(e) => warn!(error = %e, "rollback on drop failed"),
        }
    }
}

/// A commit/rollback scope on a connection.
///
/// Autocommit is turned off while any scope is open. Dropping an active
/// transaction rolls it back. Scopes nest: only the outermost one ends the
/// native transaction, and it rolls back if any inner scope was dropped or
/// rolled back without committing. Clones share one scope.
///
/// # Example
///
/// ```
/// # use std::sync::Arc;
/// # use odbc_bind::native::memory::MemoryDriver;
/// # use odbc_bind::{ConnectOptions, Connection, Statement, Transaction};
/// # fn main() -> odbc_bind::Result<()> {
/// # let conn = Connection::open(Arc::new(MemoryDriver::new()), &ConnectOptions::dsn("tx", "", ""))?;
/// let stmt = Statement::new(&conn)?;
/// stmt.just_execute_direct("CREATE TABLE t (id INT)", 1)?;
/// let tx = Transaction::new(&conn)?;
/// stmt.just_execute_direct("INSERT INTO t VALUES (1)", 1)?;
/// tx.commit()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Transaction {
    inner: Arc<TransactionInner>,
}

impl Transaction {
    /// Open a transaction scope on `conn`.
    pub fn new(conn: &Connection) -> Result<Self> {
        let epoch = conn.ref_transaction()?;
        Ok(Self {
            inner: Arc::new(TransactionInner {
                conn: conn.clone(),
                epoch,
                state: Mutex::new(State::Active),
            }),
        })
    }

    /// Commit. A second commit, or a commit after rollback, is a programming error.
    pub fn commit(&self) -> Result<()> {
        self.inner.finish(State::Committed)
    }

    /// Roll back now instead of on drop.
    pub fn rollback(&self) -> Result<()> {
        self.inner.finish(State::RolledBack)
    }

    pub fn connection(&self) -> &Connection {
        &self.inner.conn
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = *self.inner.state.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("Transaction").field("state", &state).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectOptions;
    use crate::native::memory::MemoryDriver;

    fn conn() -> Connection {
        Connection::open(Arc::new(MemoryDriver::new()), &ConnectOptions::dsn("tx", "", "")).unwrap()
    }

    #[test]
    fn test_reference_count() {
        let conn = conn();
        let outer = Transaction::new(&conn).unwrap();
        let inner = Transaction::new(&conn).unwrap();
        assert_eq!(conn.transactions(), 2);
        inner.commit().unwrap();
        assert_eq!(conn.transactions(), 1);
        outer.commit().unwrap();
        assert_eq!(conn.transactions(), 0);
    }

    #[test]
    fn test_double_commit_is_programming_error() {
        let conn = conn();
        let tx = Transaction::new(&conn).unwrap();
        tx.commit().unwrap();
        assert!(matches!(tx.commit(), Err(Error::Programming { .. })));
        assert!(matches!(tx.rollback(), Err(Error::Programming { .. })));
    }

    #[test]
    fn test_drop_rolls_back_once() {
        let conn = conn();
        let tx = Transaction::new(&conn).unwrap();
        let copy = tx.clone();
        drop(tx);
        assert_eq!(conn.transactions(), 1);
        drop(copy);
        assert_eq!(conn.transactions(), 0);
    }

    #[test]
    fn test_requires_open_connection() {
        let conn = Connection::new(Arc::new(MemoryDriver::new()));
        assert!(matches!(Transaction::new(&conn), Err(Error::Programming { .. })));
    }
}
