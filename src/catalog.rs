//! Database metadata through the driver's catalog functions.
//!
//! Every `find_*` call runs one catalog function on a fresh statement and
//! returns a typed view over its result. Empty pattern arguments match
//! everything.

use crate::connection::Connection;
use crate::cursor::ResultSet;
use crate::error::Result;
use crate::native::constants::{SQL_ALL_CATALOGS, SQL_ALL_SCHEMAS, SQL_ALL_TABLE_TYPES};
use crate::native::CatalogQuery;
use crate::statement::Statement;

fn pattern(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

/// Accessors for nullable columns of a catalog result, with the default
/// used when the driver reports NULL.
macro_rules! catalog_columns {
    ($($(#[$doc:meta])* $name:ident: $ty:ty = $col:literal or $default:expr;)*) => {
        $(
            $(#[$doc])*
            pub fn $name(&self) -> Result<$ty> {
                self.result.get_or($col, $default)
            }
        )*
    };
}

macro_rules! catalog_view {
    ($(#[$doc:meta])* $view:ident) => {
        $(#[$doc])*
        #[derive(Debug)]
        pub struct $view {
            result: ResultSet,
        }

        impl $view {
            /// Advance to the next row; `false` when done.
            pub fn next(&self) -> Result<bool> {
                self.result.next()
            }

            /// The underlying result set.
            pub fn result(&self) -> &ResultSet {
                &self.result
            }
        }
    };
}

catalog_view!(
    /// Rows of a table search.
    Tables
);

impl Tables {
    catalog_columns! {
        catalog: String = 0 or String::new();
        schema: String = 1 or String::new();
        name: String = 2 or String::new();
        /// `TABLE`, `VIEW`, `SYSTEM TABLE`, ...
        table_type: String = 3 or String::new();
        remarks: String = 4 or String::new();
    }
}

catalog_view!(
    /// Rows of a table privilege search.
    TablePrivileges
);

impl TablePrivileges {
    catalog_columns! {
        catalog: String = 0 or String::new();
        schema: String = 1 or String::new();
        table_name: String = 2 or String::new();
        grantor: String = 3 or String::new();
        grantee: String = 4 or String::new();
        privilege: String = 5 or String::new();
        is_grantable: String = 6 or String::new();
    }
}

catalog_view!(
    /// Rows of a column search.
    Columns
);

impl Columns {
    catalog_columns! {
        catalog: String = 0 or String::new();
        schema: String = 1 or String::new();
        table_name: String = 2 or String::new();
        column_name: String = 3 or String::new();
        data_type: i16 = 4 or 0;
        type_name: String = 5 or String::new();
        column_size: i32 = 6 or 0;
        buffer_length: i32 = 7 or 0;
        decimal_digits: i16 = 8 or 0;
        numeric_precision_radix: i16 = 9 or 0;
        nullable: i16 = 10 or 0;
        remarks: String = 11 or String::new();
        column_default: String = 12 or String::new();
        sql_data_type: i16 = 13 or 0;
        sql_datetime_subtype: i16 = 14 or 0;
        char_octet_length: i32 = 15 or 0;
        /// 1-based position of the column in its table.
        ordinal_position: i32 = 16 or 0;
        /// `YES`, `NO`, or empty when unknown.
        is_nullable: String = 17 or String::new();
    }
}

catalog_view!(
    /// Rows of a primary key search.
    PrimaryKeys
);

impl PrimaryKeys {
    catalog_columns! {
        catalog: String = 0 or String::new();
        schema: String = 1 or String::new();
        table_name: String = 2 or String::new();
        column_name: String = 3 or String::new();
        /// 1-based position of the column in the key.
        column_number: i16 = 4 or 0;
        primary_key_name: String = 5 or String::new();
    }
}

catalog_view!(
    /// Rows of a procedure search.
    Procedures
);

impl Procedures {
    catalog_columns! {
        catalog: String = 0 or String::new();
        schema: String = 1 or String::new();
        name: String = 2 or String::new();
        remarks: String = 6 or String::new();
        procedure_type: i16 = 7 or 0;
    }
}

catalog_view!(
    /// Rows of a procedure column search.
    ProcedureColumns
);

impl ProcedureColumns {
    catalog_columns! {
        catalog: String = 0 or String::new();
        schema: String = 1 or String::new();
        procedure_name: String = 2 or String::new();
        column_name: String = 3 or String::new();
        column_type: i16 = 4 or 0;
        data_type: i16 = 5 or 0;
        type_name: String = 6 or String::new();
        column_size: i32 = 7 or 0;
        buffer_length: i32 = 8 or 0;
        decimal_digits: i16 = 9 or 0;
        numeric_precision_radix: i16 = 10 or 0;
        nullable: i16 = 11 or 0;
        remarks: String = 12 or String::new();
        column_default: String = 13 or String::new();
        sql_data_type: i16 = 14 or 0;
        sql_datetime_subtype: i16 = 15 or 0;
        char_octet_length: i32 = 16 or 0;
        ordinal_position: i32 = 17 or 0;
        is_nullable: String = 18 or String::new();
    }
}

/// Catalog access on a connection.
#[derive(Clone)]
pub struct Catalog {
    conn: Connection,
}

impl Catalog {
    pub fn new(conn: &Connection) -> Self {
        Self { conn: conn.clone() }
    }

    fn run(&self, query: CatalogQuery<'_>) -> Result<ResultSet> {
        Statement::new(&self.conn)?.catalog(&query)
    }

    pub fn find_tables(
        &self,
        catalog: &str,
        schema: &str,
        table: &str,
        table_type: &str,
    ) -> Result<Tables> {
        let result = self.run(CatalogQuery::Tables {
            catalog: pattern(catalog),
            schema: pattern(schema),
            table: pattern(table),
            table_type: pattern(table_type),
        })?;
        Ok(Tables { result })
    }

    pub fn find_table_privileges(
        &self,
        catalog: &str,
        schema: &str,
        table: &str,
    ) -> Result<TablePrivileges> {
        let result = self.run(CatalogQuery::TablePrivileges {
            catalog: pattern(catalog),
            schema: pattern(schema),
            table: pattern(table),
        })?;
        Ok(TablePrivileges { result })
    }

    pub fn find_columns(
        &self,
        catalog: &str,
        schema: &str,
        table: &str,
        column: &str,
    ) -> Result<Columns> {
        let result = self.run(CatalogQuery::Columns {
            catalog: pattern(catalog),
            schema: pattern(schema),
            table: pattern(table),
            column: pattern(column),
        })?;
        Ok(Columns { result })
    }

    pub fn find_primary_keys(&self, catalog: &str, schema: &str, table: &str) -> Result<PrimaryKeys> {
        let result = self.run(CatalogQuery::PrimaryKeys {
            catalog: pattern(catalog),
            schema: pattern(schema),
            table: pattern(table),
        })?;
        Ok(PrimaryKeys { result })
    }

    pub fn find_procedures(&self, catalog: &str, schema: &str, procedure: &str) -> Result<Procedures> {
        let result = self.run(CatalogQuery::Procedures {
            catalog: pattern(catalog),
            schema: pattern(schema),
            procedure: pattern(procedure),
        })?;
        Ok(Procedures { result })
    }

    pub fn find_procedure_columns(
        &self,
        catalog: &str,
        schema: &str,
        procedure: &str,
        column: &str,
    ) -> Result<ProcedureColumns> {
        let result = self.run(CatalogQuery::ProcedureColumns {
            catalog: pattern(catalog),
            schema: pattern(schema),
            procedure: pattern(procedure),
            column: pattern(column),
        })?;
        Ok(ProcedureColumns { result })
    }

    /// Names found in column `column` of a special-form table search.
    fn enumerate(&self, query: CatalogQuery<'_>, column: usize) -> Result<Vec<String>> {
        let result = self.run(query)?;
        let mut names = Vec::new();
        while result.next()? {
            if let Some(name) = result.get_opt::<String>(column)? {
                names.push(name);
            }
        }
        Ok(names)
    }

    pub fn list_catalogs(&self) -> Result<Vec<String>> {
        self.enumerate(
            CatalogQuery::Tables {
                catalog: Some(SQL_ALL_CATALOGS),
                schema: Some(""),
                table: Some(""),
                table_type: None,
            },
            0,
        )
    }

    pub fn list_schemas(&self) -> Result<Vec<String>> {
        self.enumerate(
            CatalogQuery::Tables {
                catalog: Some(""),
                schema: Some(SQL_ALL_SCHEMAS),
                table: Some(""),
                table_type: None,
            },
            1,
        )
    }

    pub fn list_table_types(&self) -> Result<Vec<String>> {
        self.enumerate(
            CatalogQuery::Tables {
                catalog: Some(""),
                schema: Some(""),
                table: Some(""),
                table_type: Some(SQL_ALL_TABLE_TYPES),
            },
            3,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectOptions;
    use crate::native::memory::MemoryDriver;
    use std::sync::Arc;

    fn catalog() -> Catalog {
        let conn =
            Connection::open(Arc::new(MemoryDriver::new()), &ConnectOptions::dsn("shop", "", ""))
                .unwrap();
        let stmt = Statement::new(&conn).unwrap();
        stmt.just_execute_direct(
            "CREATE TABLE orders (id INT PRIMARY KEY, item VARCHAR(40) NOT NULL, price DOUBLE)",
            1,
        )
        .unwrap();
        stmt.just_execute_direct("CREATE TABLE customers (id INT)", 1).unwrap();
        Catalog::new(&conn)
    }

    #[test]
    fn test_find_tables_pattern() {
        let catalog = catalog();
        let tables = catalog.find_tables("", "", "ord%", "").unwrap();
        assert!(tables.next().unwrap());
        assert_eq!(tables.name().unwrap(), "orders");
        assert_eq!(tables.table_type().unwrap(), "TABLE");
        assert_eq!(tables.remarks().unwrap(), "");
        assert!(!tables.next().unwrap());

        let all = catalog.find_tables("", "", "", "").unwrap();
        let mut count = 0;
        while all.next().unwrap() {
            count += 1;
        }
        assert_eq!(count, 2);
    }

    #[test]
    fn test_find_columns() {
        let catalog = catalog();
        let columns = catalog.find_columns("", "", "orders", "").unwrap();
        let mut seen = Vec::new();
        while columns.next().unwrap() {
            seen.push((
                columns.column_name().unwrap(),
                columns.ordinal_position().unwrap(),
                columns.is_nullable().unwrap(),
            ));
        }
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[1], ("item".to_string(), 2, "NO".to_string()));
    }

    #[test]
    fn test_primary_keys_and_procedures() {
        let catalog = catalog();
        let keys = catalog.find_primary_keys("", "", "orders").unwrap();
        assert!(keys.next().unwrap());
        assert_eq!(keys.column_name().unwrap(), "id");
        assert_eq!(keys.column_number().unwrap(), 1);

        let procedures = catalog.find_procedures("", "", "").unwrap();
        assert!(procedures.next().unwrap());
        assert_eq!(procedures.name().unwrap(), "increment");

        let params = catalog.find_procedure_columns("", "", "increment", "").unwrap();
        assert!(params.next().unwrap());
        assert_eq!(params.column_name().unwrap(), "value");
    }

    #[test]
    fn test_special_enumerations() {
        let catalog = catalog();
        assert_eq!(catalog.list_catalogs().unwrap(), vec!["shop".to_string()]);
        assert_eq!(catalog.list_schemas().unwrap(), vec!["main".to_string()]);
        assert_eq!(catalog.list_table_types().unwrap(), vec!["TABLE".to_string()]);
    }
}
