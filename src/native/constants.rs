//! Native driver manager constants.
//!
//! Numeric codes follow the call-level interface headers so that values
//! handed across the driver boundary keep their usual meaning.

// Indicator sentinels
pub const SQL_NULL_DATA: i64 = -1;
pub const SQL_NO_TOTAL: i64 = -4;
pub const SQL_NTS: i64 = -3;

// SQL data types
pub const SQL_UNKNOWN_TYPE: i16 = 0;
pub const SQL_CHAR: i16 = 1;
pub const SQL_NUMERIC: i16 = 2;
pub const SQL_DECIMAL: i16 = 3;
pub const SQL_INTEGER: i16 = 4;
pub const SQL_SMALLINT: i16 = 5;
pub const SQL_FLOAT: i16 = 6;
pub const SQL_REAL: i16 = 7;
pub const SQL_DOUBLE: i16 = 8;
pub const SQL_VARCHAR: i16 = 12;
pub const SQL_TYPE_DATE: i16 = 91;
pub const SQL_TYPE_TIME: i16 = 92;
pub const SQL_TYPE_TIMESTAMP: i16 = 93;
pub const SQL_LONGVARCHAR: i16 = -1;
pub const SQL_BINARY: i16 = -2;
pub const SQL_VARBINARY: i16 = -3;
pub const SQL_LONGVARBINARY: i16 = -4;
pub const SQL_BIGINT: i16 = -5;
pub const SQL_TINYINT: i16 = -6;
pub const SQL_BIT: i16 = -7;
pub const SQL_WCHAR: i16 = -8;
pub const SQL_WVARCHAR: i16 = -9;
pub const SQL_WLONGVARCHAR: i16 = -10;
pub const SQL_SS_TABLE: i16 = -153;

// C data types
pub const SQL_C_CHAR: i16 = SQL_CHAR;
pub const SQL_C_SSHORT: i16 = -15;
pub const SQL_C_USHORT: i16 = -17;
pub const SQL_C_SLONG: i16 = -16;
pub const SQL_C_ULONG: i16 = -18;
pub const SQL_C_SBIGINT: i16 = -25;
pub const SQL_C_UBIGINT: i16 = -27;
pub const SQL_C_STINYINT: i16 = -26;
pub const SQL_C_UTINYINT: i16 = -28;
pub const SQL_C_FLOAT: i16 = SQL_REAL;
pub const SQL_C_DOUBLE: i16 = SQL_DOUBLE;
pub const SQL_C_BIT: i16 = SQL_BIT;
pub const SQL_C_BINARY: i16 = SQL_BINARY;
pub const SQL_C_TYPE_DATE: i16 = SQL_TYPE_DATE;
pub const SQL_C_TYPE_TIME: i16 = SQL_TYPE_TIME;
pub const SQL_C_TYPE_TIMESTAMP: i16 = SQL_TYPE_TIMESTAMP;
pub const SQL_C_DEFAULT: i16 = 99;

// Nullability
pub const SQL_NO_NULLS: i16 = 0;
pub const SQL_NULLABLE: i16 = 1;
pub const SQL_NULLABLE_UNKNOWN: i16 = 2;

// Parameter directions
pub const SQL_PARAM_INPUT: i16 = 1;
pub const SQL_PARAM_INPUT_OUTPUT: i16 = 2;
pub const SQL_PARAM_OUTPUT: i16 = 4;
pub const SQL_RETURN_VALUE: i16 = 5;

// Connection attributes
pub const SQL_ATTR_ACCESS_MODE: i32 = 101;
pub const SQL_ATTR_AUTOCOMMIT: i32 = 102;
pub const SQL_ATTR_LOGIN_TIMEOUT: i32 = 103;
pub const SQL_ATTR_CURRENT_CATALOG: i32 = 109;
pub const SQL_ATTR_CONNECTION_TIMEOUT: i32 = 113;
pub const SQL_AUTOCOMMIT_OFF: usize = 0;
pub const SQL_AUTOCOMMIT_ON: usize = 1;

// Environment attributes
pub const SQL_ATTR_ODBC_VERSION: i32 = 200;
pub const SQL_OV_ODBC3_80: usize = 380;

// Statement attributes
pub const SQL_ATTR_QUERY_TIMEOUT: i32 = 0;
pub const SQL_ATTR_MAX_ROWS: i32 = 1;
pub const SQL_ATTR_ASYNC_ENABLE: i32 = 4;
pub const SQL_ATTR_CURSOR_TYPE: i32 = 6;
pub const SQL_ATTR_ROW_ARRAY_SIZE: i32 = 27;
pub const SQL_ATTR_PARAMSET_SIZE: i32 = 22;
pub const SQL_CURSOR_FORWARD_ONLY: usize = 0;
pub const SQL_CURSOR_KEYSET_DRIVEN: usize = 1;
pub const SQL_CURSOR_DYNAMIC: usize = 2;
pub const SQL_CURSOR_STATIC: usize = 3;

// Info types
pub const SQL_DRIVER_NAME: u16 = 6;
pub const SQL_DRIVER_VER: u16 = 7;
pub const SQL_DATABASE_NAME: u16 = 16;
pub const SQL_DBMS_NAME: u16 = 17;
pub const SQL_DBMS_VER: u16 = 18;
pub const SQL_MAX_CONCURRENT_ACTIVITIES: u16 = 1;
pub const SQL_TXN_CAPABLE: u16 = 46;
pub const SQL_MAX_COLUMN_NAME_LEN: u16 = 30;
pub const SQL_ASYNC_DBC_FUNCTIONS: u16 = 10023;

// Catalog search patterns
pub const SQL_ALL_CATALOGS: &str = "%";
pub const SQL_ALL_SCHEMAS: &str = "%";
pub const SQL_ALL_TABLE_TYPES: &str = "%";

// Searchability
pub const SQL_PRED_NONE: i16 = 0;
pub const SQL_PRED_SEARCHABLE: i16 = 3;

// Updatability
pub const SQL_ATTR_READONLY: i16 = 0;
pub const SQL_ATTR_WRITE: i16 = 1;
pub const SQL_ATTR_READWRITE_UNKNOWN: i16 = 2;

// Descriptor allocation
pub const SQL_DESC_ALLOC_AUTO: i16 = 1;
pub const SQL_DESC_ALLOC_USER: i16 = 2;

// Procedure column types
pub const SQL_PARAM_TYPE_UNKNOWN: i16 = 0;
pub const SQL_RESULT_COL: i16 = 3;

// Verbose datetime type code and datetime subcodes
pub const SQL_DATETIME: i16 = 9;

// Descriptor name state
pub const SQL_NAMED: i16 = 0;
pub const SQL_UNNAMED: i16 = 1;

// Additional searchability
pub const SQL_PRED_CHAR: i16 = 1;
pub const SQL_PRED_BASIC: i16 = 2;

// Transaction capability
pub const SQL_TC_ALL: u16 = 2;

// Procedure types
pub const SQL_PT_PROCEDURE: i16 = 1;

// Attribute value lengths
pub const SQL_IS_POINTER: i32 = -4;
pub const SQL_IS_UINTEGER: i32 = -5;
pub const SQL_IS_INTEGER: i32 = -6;
