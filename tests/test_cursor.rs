//! Integration tests for cursor navigation over rowset windows.

use std::sync::Arc;

use odbc_bind::native::constants::{SQL_ATTR_CURSOR_TYPE, SQL_ATTR_MAX_ROWS, SQL_CURSOR_STATIC};
use odbc_bind::native::memory::MemoryDriver;
use odbc_bind::{Attribute, BatchOps, ConnectOptions, Connection, Error, Nulls, Statement};

fn populated(rows: usize) -> (Connection, Statement) {
    let conn =
        Connection::open(Arc::new(MemoryDriver::new()), &ConnectOptions::dsn("cursor", "", ""))
            .unwrap();
    let stmt = Statement::new(&conn).unwrap();
    stmt.just_execute_direct("CREATE TABLE r (n INT, label VARCHAR(16))", 1)
        .unwrap();
    if rows > 0 {
        let numbers: Vec<i32> = (1..=rows as i32).collect();
        let labels: Vec<String> = numbers.iter().map(|n| format!("row {}", n)).collect();
        stmt.prepare("INSERT INTO r (n, label) VALUES (?, ?)").unwrap();
        stmt.bind_array(0, &numbers, Nulls::None).unwrap();
        stmt.bind_strings(1, &labels, 16, Nulls::None).unwrap();
        stmt.just_execute(rows).unwrap();
    }
    (conn, stmt)
}

fn scrollable(conn: &Connection) -> Statement {
    let stmt = Statement::default();
    stmt.open_with_attributes(
        conn,
        &[Attribute::unsigned(SQL_ATTR_CURSOR_TYPE, SQL_CURSOR_STATIC)],
    )
    .unwrap();
    stmt
}

#[test]
fn test_next_is_monotonic_for_any_rowset() {
    let (_conn, stmt) = populated(10);
    for rowset in [1, 2, 3, 4, 10, 11, 64] {
        let result = stmt
            .execute_direct("SELECT n FROM r ORDER BY n", BatchOps::new(1, rowset))
            .unwrap();
        let mut last = 0;
        while result.next().unwrap() {
            let position = result.position();
            assert_eq!(position, last + 1, "rowset {}", rowset);
            assert_eq!(result.get::<i32>(0).unwrap() as usize, position);
            last = position;
        }
        assert_eq!(last, 10);
        // stays at the end
        assert!(!result.next().unwrap());
        assert!(result.at_end());
        assert_eq!(result.position(), 0);
    }
}

#[test]
fn test_last_window_holds_remainder() {
    let (_conn, stmt) = populated(10);
    let result = stmt.execute_direct("SELECT n FROM r ORDER BY n", BatchOps::new(1, 4)).unwrap();
    let mut windows = Vec::new();
    while result.next().unwrap() {
        if result.position() % 4 == 1 {
            windows.push(result.rows());
        }
    }
    assert_eq!(windows, vec![4, 4, 2]);
}

#[test]
fn test_empty_result() {
    let (_conn, stmt) = populated(0);
    let result = stmt.execute_direct("SELECT n, label FROM r", 5).unwrap();
    assert_eq!(result.columns(), 2);
    assert!(!result.next().unwrap());
    assert!(result.at_end());
    assert!(matches!(result.get::<i32>(0), Err(Error::Programming { .. })));
}

#[test]
fn test_forward_only_cannot_scroll_back_across_windows() {
    let (_conn, stmt) = populated(6);
    let result = stmt.execute_direct("SELECT n FROM r ORDER BY n", BatchOps::new(1, 3)).unwrap();
    assert!(result.skip(2).unwrap());
    assert_eq!(result.position(), 2);
    // inside the window no fetch is needed
    assert!(result.prior().unwrap());
    assert_eq!(result.get::<i32>(0).unwrap(), 1);
    assert!(result.skip(3).unwrap());
    assert_eq!(result.position(), 4);
    let err = result.prior().unwrap_err();
    assert_eq!(err.state(), Some("HY106"));
}

#[test]
fn test_static_cursor_scrolls_across_windows() {
    let (conn, _stmt) = populated(7);
    let stmt = scrollable(&conn);
    let result = stmt.execute_direct("SELECT n, label FROM r ORDER BY n", BatchOps::new(1, 3)).unwrap();

    assert!(result.move_to(5).unwrap());
    assert_eq!(result.get::<String>("label").unwrap(), "row 5");
    assert!(result.prior().unwrap());
    assert!(result.prior().unwrap());
    assert_eq!(result.position(), 3);
    assert_eq!(result.get::<i32>(0).unwrap(), 3);

    assert!(result.last().unwrap());
    assert_eq!(result.position(), 7);
    assert!(!result.next().unwrap());
    // from the end, prior lands on the last row
    assert!(result.prior().unwrap());
    assert_eq!(result.get::<i32>(0).unwrap(), 7);

    assert!(result.first().unwrap());
    assert_eq!(result.position(), 1);
    assert!(!result.skip(-3).unwrap());
    assert_eq!(result.position(), 0);
    assert!(!result.at_end());
    assert!(result.next().unwrap());
    assert_eq!(result.get::<i32>(0).unwrap(), 1);
}

#[test]
fn test_skip_stops_at_bounds() {
    let (conn, _stmt) = populated(5);
    let stmt = scrollable(&conn);
    let result = stmt.execute_direct("SELECT n FROM r ORDER BY n", 2).unwrap();
    assert!(result.skip(3).unwrap());
    assert_eq!(result.get::<i32>(0).unwrap(), 3);
    assert!(result.skip(-2).unwrap());
    assert_eq!(result.position(), 1);
    assert!(!result.skip(100).unwrap());
    assert!(result.at_end());
    assert_eq!(result.position(), 0);
}

#[test]
fn test_max_rows_attribute_limits_result() {
    let (conn, _stmt) = populated(9);
    let stmt = Statement::default();
    stmt.open_with_attributes(&conn, &[Attribute::unsigned(SQL_ATTR_MAX_ROWS, 4)])
        .unwrap();
    let result = stmt.execute_direct("SELECT n FROM r", 3).unwrap();
    assert_eq!(result.rows_iter().count(), 4);
}

#[test]
fn test_rows_iter_and_current_row() {
    let (_conn, stmt) = populated(3);
    let result = stmt.execute_direct("SELECT n, label FROM r ORDER BY n", 2).unwrap();
    assert!(result.next().unwrap());
    let row = result.current_row().unwrap();
    assert_eq!(row.column_names(), vec!["n", "label"]);
    assert_eq!(row.get::<String>(1).unwrap(), "row 1");
    let rest: Vec<i32> = result
        .rows_iter()
        .map(|row| row.get::<i32>("n").unwrap())
        .collect();
    assert_eq!(rest, vec![2, 3]);
}

#[test]
fn test_batch_without_markers_runs_once() {
    let (_conn, stmt) = populated(7);
    let result = stmt.execute_direct("SELECT n FROM r ORDER BY n", 3).unwrap();
    let mut seen = Vec::new();
    while result.next().unwrap() {
        seen.push((result.position(), result.get::<i32>(0).unwrap()));
    }
    let expected: Vec<(usize, i32)> = (1..=7).map(|n| (n as usize, n)).collect();
    assert_eq!(seen, expected);

    stmt.just_execute_direct("INSERT INTO r (n, label) VALUES (8, 'row 8')", 4)
        .unwrap();
    assert_eq!(stmt.affected_rows().unwrap(), 1);
    let count = stmt.execute_direct("SELECT COUNT(*) FROM r", 4).unwrap();
    assert!(count.next().unwrap());
    assert_eq!(count.get::<i64>(0).unwrap(), 8);
    assert!(!count.next().unwrap());
}
