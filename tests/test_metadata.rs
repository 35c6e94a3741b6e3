//! Integration tests for catalog functions, descriptors and driver information.

use std::sync::Arc;

use odbc_bind::native::constants::{
    SQL_DBMS_NAME, SQL_MAX_COLUMN_NAME_LEN, SQL_NULLABLE, SQL_PARAM_INPUT_OUTPUT,
};
use odbc_bind::native::memory::MemoryDriver;
use odbc_bind::{
    list_datasources, list_drivers, Catalog, ConnectOptions, Connection, Driver, Error,
    Nullability, SqlType, Statement,
};

fn warehouse(driver: &Arc<dyn Driver>) -> Connection {
    let conn = Connection::open(Arc::clone(driver), &ConnectOptions::dsn("warehouse", "", "")).unwrap();
    let stmt = Statement::new(&conn).unwrap();
    stmt.just_execute_direct(
        "CREATE TABLE stock (sku VARCHAR(12) PRIMARY KEY, qty INT NOT NULL, cost DECIMAL(10, 2), seen TIMESTAMP)",
        1,
    )
    .unwrap();
    stmt.just_execute_direct("CREATE TABLE suppliers (id INT PRIMARY KEY, name VARCHAR(40))", 1)
        .unwrap();
    conn
}

#[test]
fn test_table_and_column_search() {
    let driver: Arc<dyn Driver> = Arc::new(MemoryDriver::new());
    let catalog = Catalog::new(&warehouse(&driver));

    let tables = catalog.find_tables("", "", "s%", "TABLE").unwrap();
    let mut names = Vec::new();
    while tables.next().unwrap() {
        assert_eq!(tables.catalog().unwrap(), "warehouse");
        names.push(tables.name().unwrap());
    }
    names.sort();
    assert_eq!(names, vec!["stock", "suppliers"]);

    let columns = catalog.find_columns("", "", "stock", "").unwrap();
    let mut described = Vec::new();
    while columns.next().unwrap() {
        described.push((
            columns.column_name().unwrap(),
            columns.data_type().unwrap(),
            columns.nullable().unwrap(),
        ));
    }
    assert_eq!(described.len(), 4);
    assert_eq!(described[1], ("qty".to_string(), SqlType::Integer.code(), 0));
    assert_eq!(
        described[2].1,
        SqlType::Decimal {
            precision: 10,
            scale: 2
        }
        .code()
    );
    assert_eq!(described[3].2, SQL_NULLABLE);

    let one = catalog.find_columns("", "", "stock", "co%").unwrap();
    assert!(one.next().unwrap());
    assert_eq!(one.column_name().unwrap(), "cost");
    assert_eq!(one.decimal_digits().unwrap(), 2);
    assert_eq!(one.numeric_precision_radix().unwrap(), 10);
    assert!(!one.next().unwrap());
}

#[test]
fn test_keys_privileges_and_procedures() {
    let driver: Arc<dyn Driver> = Arc::new(MemoryDriver::new());
    let conn = warehouse(&driver);
    let catalog = Catalog::new(&conn);

    let keys = catalog.find_primary_keys("", "", "suppliers").unwrap();
    assert!(keys.next().unwrap());
    assert_eq!(keys.column_name().unwrap(), "id");
    assert_eq!(keys.primary_key_name().unwrap(), "pk_suppliers");
    assert!(!keys.next().unwrap());

    let privileges = catalog.find_table_privileges("", "", "stock").unwrap();
    let mut granted = Vec::new();
    while privileges.next().unwrap() {
        assert_eq!(privileges.grantee().unwrap(), "PUBLIC");
        granted.push(privileges.privilege().unwrap());
    }
    assert!(granted.contains(&"SELECT".to_string()));

    let params = catalog.find_procedure_columns("", "", "incr%", "").unwrap();
    assert!(params.next().unwrap());
    assert_eq!(params.procedure_name().unwrap(), "increment");
    assert_eq!(params.column_type().unwrap(), SQL_PARAM_INPUT_OUTPUT);
    assert_eq!(params.data_type().unwrap(), SqlType::BigInt.code());

    let nothing = catalog.find_procedures("", "", "missing").unwrap();
    assert!(!nothing.next().unwrap());

    // the statement-level call reads the same result
    let stmt = Statement::new(&conn).unwrap();
    let result = stmt.procedure_columns("", "", "increment", "value").unwrap();
    assert!(result.next().unwrap());
    assert_eq!(result.get::<String>("COLUMN_NAME").unwrap(), "value");
}

#[test]
fn test_result_descriptor_matches_columns() {
    let driver: Arc<dyn Driver> = Arc::new(MemoryDriver::new());
    let conn = warehouse(&driver);
    let stmt = Statement::new(&conn).unwrap();
    let result = stmt.execute_direct("SELECT sku, qty, cost FROM stock", 1).unwrap();

    assert_eq!(result.column_datatype("cost").unwrap(), SqlType::Decimal { precision: 10, scale: 2 });
    assert_eq!(result.column_decimal_digits(2).unwrap(), 2);
    assert_eq!(result.column_size("sku").unwrap(), 12);
    assert_eq!(result.column_descriptor(1).unwrap().nullable, Nullability::NoNulls);

    let ird = result.implementation_row_descriptor().unwrap();
    assert_eq!(ird.count().unwrap(), result.columns());
    for column in 0..result.columns() {
        assert_eq!(ird.name(column).unwrap(), result.column_name(column).unwrap());
        assert_eq!(ird.table_name(column).unwrap(), "stock");
    }
    assert_eq!(ird.scale(2).unwrap(), 2);
    assert_eq!(ird.precision(2).unwrap(), 10);
    assert!(matches!(ird.label(3), Err(Error::IndexRange { .. })));
}

#[test]
fn test_driver_information() {
    let driver: Arc<dyn Driver> = Arc::new(MemoryDriver::new());
    let conn = warehouse(&driver);

    assert_eq!(conn.dbms_name().unwrap(), "MemoryDB");
    assert_eq!(conn.get_info::<String>(SQL_DBMS_NAME).unwrap(), conn.dbms_name().unwrap());
    assert_eq!(conn.get_info::<u16>(SQL_MAX_COLUMN_NAME_LEN).unwrap(), 128);
    assert_eq!(conn.dbms_version().unwrap(), "01.00.0000");
    assert_eq!(conn.driver_name().unwrap(), "MemoryDriver");

    let err = conn.get_info::<u32>(64000).unwrap_err();
    assert_eq!(err.state(), Some("HY096"));
    assert!(err.to_string().contains("SQLGetInfo"));
}

#[test]
fn test_driver_and_source_enumeration() {
    let driver: Arc<dyn Driver> = Arc::new(MemoryDriver::new());
    assert!(list_datasources(&driver).unwrap().is_empty());

    let drivers = list_drivers(&driver).unwrap();
    assert_eq!(drivers.len(), 1);
    assert!(drivers[0]
        .attributes
        .iter()
        .any(|(key, value)| key == "APILevel" && value == "1"));

    let _conn = warehouse(&driver);
    let _other = Connection::open(Arc::clone(&driver), &ConnectOptions::dsn("archive", "", "")).unwrap();
    let sources = list_datasources(&driver).unwrap();
    let names: Vec<&str> = sources.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["archive", "warehouse"]);
    assert!(sources.iter().all(|s| s.driver == "MemoryDriver"));
}

#[test]
fn test_parameter_description() {
    let driver: Arc<dyn Driver> = Arc::new(MemoryDriver::new());
    let conn = warehouse(&driver);
    let stmt = Statement::new(&conn).unwrap();
    stmt.prepare("INSERT INTO stock (sku, qty, cost) VALUES (?, ?, ?)").unwrap();
    assert_eq!(stmt.parameters().unwrap(), 3);
    assert_eq!(stmt.parameter_type(0).unwrap(), SqlType::VarChar { size: 12 });
    assert_eq!(stmt.parameter_size(0).unwrap(), 12);
    assert_eq!(stmt.parameter_scale(2).unwrap(), 2);
    assert!(matches!(stmt.parameter_type(3), Err(Error::IndexRange { .. })));

    stmt.describe_parameters(&[(1, SqlType::BigInt)]);
    assert_eq!(stmt.parameter_type(1).unwrap(), SqlType::BigInt);
}
