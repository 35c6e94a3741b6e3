//! Integration tests for connection failures and use of closed objects.

use std::sync::Arc;
use std::time::Duration;

use odbc_bind::native::constants::SQL_ATTR_CURSOR_TYPE;
use odbc_bind::native::memory::MemoryDriver;
use odbc_bind::{Attribute, ConnectOptions, Connection, Driver, Error, Statement};

fn driver() -> Arc<dyn Driver> {
    Arc::new(MemoryDriver::new().with_offline_source("Reporting"))
}

#[test]
fn test_offline_source_refuses_connection() {
    let err = Connection::open(driver(), &ConnectOptions::dsn("reporting", "user", "pass")).unwrap_err();
    assert!(matches!(err, Error::Database { .. }));
    assert_eq!(err.state(), Some("08001"));
    assert_eq!(err.native(), Some(10061));

    let err = Connection::open(driver(), &ConnectOptions::connection_string("DSN=REPORTING;UID=x"))
        .unwrap_err();
    assert_eq!(err.state(), Some("08001"));
    assert!(err.to_string().contains("SQLDriverConnect"));
}

#[test]
fn test_connection_string_without_source() {
    let err = Connection::open(driver(), &ConnectOptions::connection_string("UID=x;PWD=y")).unwrap_err();
    assert_eq!(err.state(), Some("IM002"));
}

#[test]
fn test_failed_connect_leaves_connection_usable() {
    let conn = Connection::new(driver());
    assert!(conn.connect(&ConnectOptions::dsn("reporting", "", "")).is_err());
    assert!(!conn.connected());
    conn.connect(&ConnectOptions::dsn("sales", "", "")).unwrap();
    assert!(conn.connected());
}

#[test]
fn test_login_timeout_is_applied() {
    let options = ConnectOptions::dsn("sales", "", "").with_login_timeout(Duration::from_secs(3));
    let conn = Connection::open(driver(), &options).unwrap();
    assert!(conn.connected());
}

#[test]
fn test_statement_needs_connected_connection() {
    let conn = Connection::new(driver());
    assert!(matches!(Statement::new(&conn), Err(Error::Programming { .. })));

    let unopened = Statement::default();
    assert!(!unopened.connected());
    assert!(matches!(
        unopened.execute_direct("SELECT 1", 1),
        Err(Error::Programming { .. })
    ));
}

#[test]
fn test_disconnect_invalidates_statements() {
    let conn = Connection::open(driver(), &ConnectOptions::dsn("sales", "", "")).unwrap();
    let stmt = Statement::new(&conn).unwrap();
    stmt.just_execute_direct("CREATE TABLE t (id INT)", 1).unwrap();
    let result = stmt.execute_direct("SELECT id FROM t", 1).unwrap();

    conn.disconnect().unwrap();
    assert!(!stmt.connected());
    assert!(matches!(
        stmt.just_execute_direct("SELECT id FROM t", 1),
        Err(Error::Programming { .. })
    ));
    assert!(matches!(conn.dbms_name(), Err(Error::Programming { .. })));
    // disconnecting twice is harmless
    conn.disconnect().unwrap();
    drop(result);
}

#[test]
fn test_closed_statement_rejects_work() {
    let conn = Connection::open(driver(), &ConnectOptions::dsn("sales", "", "")).unwrap();
    let stmt = Statement::new(&conn).unwrap();
    stmt.just_execute_direct("CREATE TABLE t (id INT)", 1).unwrap();
    let result = stmt.execute_direct("SELECT id FROM t", 1).unwrap();
    stmt.close();
    assert!(stmt.native_statement_handle().is_none());
    assert!(matches!(result.next(), Err(Error::Programming { .. })));
    assert!(matches!(stmt.prepare("SELECT id FROM t"), Err(Error::Programming { .. })));

    stmt.open(&conn).unwrap();
    assert!(stmt.execute_direct("SELECT id FROM t", 1).is_ok());
}

#[test]
fn test_unsupported_statement_attribute() {
    let conn = Connection::open(driver(), &ConnectOptions::dsn("sales", "", "")).unwrap();
    let stmt = Statement::default();
    let err = stmt
        .open_with_attributes(&conn, &[Attribute::unsigned(SQL_ATTR_CURSOR_TYPE, 2)])
        .unwrap_err();
    assert_eq!(err.state(), Some("HYC00"));
}

#[test]
fn test_statements_keep_connection_alive() {
    let stmt = {
        let conn = Connection::open(driver(), &ConnectOptions::dsn("sales", "", "")).unwrap();
        Statement::new(&conn).unwrap()
    };
    assert!(stmt.connected());
    stmt.just_execute_direct("CREATE TABLE kept (id INT)", 1).unwrap();
}
