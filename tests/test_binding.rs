//! Integration tests for parameter binding and typed retrieval.

use std::sync::Arc;

use chrono::NaiveDate;
use odbc_bind::native::memory::MemoryDriver;
use odbc_bind::{
    BatchOps, ConnectOptions, Connection, Date, Error, Nulls, ParamDirection, SqlType, Statement,
    Timestamp,
};

fn connect(name: &str) -> Connection {
    Connection::open(Arc::new(MemoryDriver::new()), &ConnectOptions::dsn(name, "", "")).unwrap()
}

#[test]
fn test_end_to_end() {
    let conn = connect("e2e");
    let stmt = Statement::new(&conn).unwrap();
    stmt.just_execute_direct("CREATE TABLE simple (a INT, b VARCHAR(10))", 1)
        .unwrap();

    stmt.prepare("INSERT INTO simple (a, b) VALUES (?, ?)").unwrap();
    assert_eq!(stmt.parameters().unwrap(), 2);
    stmt.bind(0, &1i32).unwrap();
    stmt.bind_strings(1, &["one"], 10, Nulls::None).unwrap();
    stmt.just_execute(1).unwrap();
    assert_eq!(stmt.affected_rows().unwrap(), 1);

    let result = stmt.execute_direct("SELECT a, b FROM simple", 1).unwrap();
    assert_eq!(result.columns(), 2);
    assert_eq!(result.column_name(0).unwrap(), "a");
    assert_eq!(result.column_datatype("b").unwrap(), SqlType::VarChar { size: 10 });
    assert!(result.next().unwrap());
    assert_eq!(result.get::<i32>(0).unwrap(), 1);
    assert_eq!(result.get::<String>("b").unwrap(), "one");
    assert!(!result.next().unwrap());
    assert!(result.at_end());
}

#[test]
fn test_null_round_trip() {
    let conn = connect("nulls");
    let stmt = Statement::new(&conn).unwrap();
    stmt.just_execute_direct("CREATE TABLE t (id INT, v DOUBLE, s VARCHAR(8), d DATE)", 1)
        .unwrap();
    stmt.prepare("INSERT INTO t (id, v, s, d) VALUES (?, ?, ?, ?)").unwrap();
    stmt.bind(0, &1i32).unwrap();
    stmt.bind_null(1, 1).unwrap();
    stmt.bind_null(2, 1).unwrap();
    stmt.bind_null(3, 1).unwrap();
    stmt.just_execute(1).unwrap();

    let result = stmt.execute_direct("SELECT v, s, d FROM t", 1).unwrap();
    assert!(result.next().unwrap());
    for column in 0..3 {
        assert!(result.is_null(column).unwrap());
        assert!(matches!(
            result.get::<String>(column),
            Err(Error::NullAccess { .. })
        ));
    }
    assert_eq!(result.get_or(0, -1.5f64).unwrap(), -1.5);
}

fn batch_insert(n: usize, k: usize) {
    let conn = connect("batch");
    let stmt = Statement::new(&conn).unwrap();
    stmt.just_execute_direct("CREATE TABLE b (id INT, v BIGINT, s VARCHAR(12))", 1)
        .unwrap();

    let ids: Vec<i32> = (0..n as i32).collect();
    let values: Vec<i64> = (0..n as i64).map(|i| i * 10).collect();
    let strings: Vec<String> = (0..n).map(|i| format!("s{}", i)).collect();
    let flags: Vec<bool> = (0..n).map(|i| i % k == 0).collect();

    stmt.prepare("INSERT INTO b (id, v, s) VALUES (?, ?, ?)").unwrap();
    stmt.bind_array(0, &ids, Nulls::None).unwrap();
    stmt.bind_array(1, &values, Nulls::Flags(&flags)).unwrap();
    stmt.bind_strings(2, &strings, 12, Nulls::Flags(&flags)).unwrap();
    stmt.just_execute(n).unwrap();

    let result = stmt
        .execute_direct("SELECT id, v, s FROM b ORDER BY id", BatchOps::new(1, 64))
        .unwrap();
    let mut seen = 0;
    while result.next().unwrap() {
        let id: i32 = result.get(0).unwrap();
        let i = id as usize;
        assert_eq!(i, seen);
        if i % k == 0 {
            assert!(result.is_null(1).unwrap());
            assert_eq!(result.get_opt::<String>(2).unwrap(), None);
        } else {
            assert_eq!(result.get::<i64>(1).unwrap(), i as i64 * 10);
            assert_eq!(result.get::<String>(2).unwrap(), format!("s{}", i));
        }
        seen += 1;
    }
    assert_eq!(seen, n);
}

#[test]
fn test_batch_single() {
    batch_insert(1, 2);
}

#[test]
fn test_batch_pair() {
    batch_insert(2, 2);
}

#[test]
fn test_batch_thousand() {
    batch_insert(1000, 7);
}

#[test]
fn test_unbind_equivalence() {
    let conn = connect("unbind");
    let stmt = Statement::new(&conn).unwrap();
    stmt.just_execute_direct("CREATE TABLE u (i INT, f DOUBLE, s VARCHAR(20), d DATE)", 1)
        .unwrap();
    stmt.just_execute_direct(
        "INSERT INTO u VALUES (7, 2.5, 'seven', '2024-02-29'); INSERT INTO u VALUES (8, NULL, 'eight', NULL)",
        1,
    )
    .unwrap();

    let read = |unbind: bool| {
        let result = stmt.execute_direct("SELECT i, f, s, d FROM u ORDER BY i", 1).unwrap();
        if unbind {
            result.unbind_all().unwrap();
        }
        let mut rows = Vec::new();
        while result.next().unwrap() {
            rows.push((
                result.get::<i32>(0).unwrap(),
                result.get_opt::<f64>(1).unwrap(),
                result.get::<String>(2).unwrap(),
                result.get_opt::<Date>(3).unwrap(),
            ));
        }
        rows
    };
    let bound = read(false);
    let unbound = read(true);
    assert_eq!(bound.len(), 2);
    assert_eq!(bound, unbound);
    assert_eq!(
        bound[0].3.unwrap().to_naive().unwrap(),
        NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
    );
}

#[test]
fn test_chrono_parameters() {
    let conn = connect("chrono");
    let stmt = Statement::new(&conn).unwrap();
    stmt.just_execute_direct("CREATE TABLE c (at TIMESTAMP)", 1).unwrap();
    let at = NaiveDate::from_ymd_opt(2023, 7, 1)
        .unwrap()
        .and_hms_opt(12, 30, 5)
        .unwrap();
    stmt.prepare("INSERT INTO c (at) VALUES (?)").unwrap();
    stmt.bind(0, &at).unwrap();
    stmt.just_execute(1).unwrap();

    let result = stmt.execute_direct("SELECT at FROM c", 1).unwrap();
    assert!(result.next().unwrap());
    assert_eq!(result.get::<chrono::NaiveDateTime>(0).unwrap(), at);
    let ts: Timestamp = result.get(0).unwrap();
    assert_eq!((ts.hour, ts.minute, ts.second), (12, 30, 5));
}

#[test]
fn test_inout_parameter() {
    let conn = connect("proc");
    let stmt = Statement::new(&conn).unwrap();
    stmt.prepare("CALL increment(?)").unwrap();
    stmt.bind_param(0, &[1i64, 9], Nulls::None, ParamDirection::InOut)
        .unwrap();
    stmt.just_execute(2).unwrap();
    assert_eq!(stmt.parameter_value::<i64>(0, 0).unwrap(), 2);
    assert_eq!(stmt.parameter_value::<i64>(0, 1).unwrap(), 10);
}

#[test]
fn test_errors() {
    let conn = connect("errors");
    let stmt = Statement::new(&conn).unwrap();

    let err = stmt.just_execute_direct("SELEKT 1", 1).unwrap_err();
    assert!(matches!(err, Error::Database { .. }));
    assert_eq!(err.state(), Some("42000"));
    assert!(err.to_string().contains("SQLExecDirect"));

    let err = stmt.just_execute_direct("SELECT x FROM missing", 1).unwrap_err();
    assert_eq!(err.state(), Some("42S02"));

    stmt.just_execute_direct("CREATE TABLE e (i INT, s VARCHAR(3))", 1).unwrap();
    stmt.just_execute_direct("INSERT INTO e VALUES (1, 'abc')", 1).unwrap();
    let result = stmt.execute_direct("SELECT i, s FROM e", 1).unwrap();
    assert!(result.next().unwrap());
    assert!(matches!(result.get::<i32>("nope"), Err(Error::IndexRange { .. })));
    assert!(matches!(result.get::<i32>(1), Err(Error::TypeIncompatible { .. })));
    assert!(matches!(result.get::<Vec<u8>>(0), Err(Error::TypeIncompatible { .. })));

    assert!(matches!(stmt.just_execute(1), Err(Error::Programming { .. })));
}
