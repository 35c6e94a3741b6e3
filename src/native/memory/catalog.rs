//! Catalog function result sets of the memory driver.

use crate::native::constants::*;
use crate::native::CatalogQuery;
use crate::types::{SqlType, Value};

use super::storage::{
    display_size, octet_length, type_name, Database, ResultColumn, ResultData, PROCEDURES, SCHEMA,
};

fn text(name: &str, size: usize) -> ResultColumn {
    ResultColumn::computed(name, SqlType::VarChar { size }, true)
}

fn small(name: &str) -> ResultColumn {
    ResultColumn::computed(name, SqlType::SmallInt, true)
}

fn int(name: &str) -> ResultColumn {
    ResultColumn::computed(name, SqlType::Integer, true)
}

fn opt_text(s: &str) -> Value {
    if s.is_empty() {
        Value::Null
    } else {
        Value::Text(s.to_string())
    }
}

/// Case-insensitive search pattern with `%` and `_` wildcards.
///
/// An absent or empty pattern matches everything.
pub fn matches_pattern(pattern: Option<&str>, value: &str) -> bool {
    let Some(pattern) = pattern.filter(|p| !p.is_empty()) else {
        return true;
    };
    let p: Vec<char> = pattern.to_lowercase().chars().collect();
    let v: Vec<char> = value.to_lowercase().chars().collect();
    // dp[j]: pattern prefix of length i matches value prefix of length j
    let mut dp = vec![false; v.len() + 1];
    dp[0] = true;
    for pc in &p {
        let mut next = vec![false; v.len() + 1];
        if *pc == '%' {
            let mut seen = false;
            for j in 0..=v.len() {
                seen |= dp[j];
                next[j] = seen;
            }
        } else {
            for j in 1..=v.len() {
                next[j] = dp[j - 1] && (*pc == '_' || *pc == v[j - 1]);
            }
        }
        dp = next;
    }
    dp[v.len()]
}

fn table_columns() -> Vec<ResultColumn> {
    vec![
        text("TABLE_CAT", 128),
        text("TABLE_SCHEM", 128),
        text("TABLE_NAME", 128),
        text("TABLE_TYPE", 32),
        text("REMARKS", 254),
    ]
}

fn column_columns() -> Vec<ResultColumn> {
    vec![
        text("TABLE_CAT", 128),
        text("TABLE_SCHEM", 128),
        text("TABLE_NAME", 128),
        text("COLUMN_NAME", 128),
        small("DATA_TYPE"),
        text("TYPE_NAME", 128),
        int("COLUMN_SIZE"),
        int("BUFFER_LENGTH"),
        small("DECIMAL_DIGITS"),
        small("NUM_PREC_RADIX"),
        small("NULLABLE"),
        text("REMARKS", 254),
        text("COLUMN_DEF", 254),
        small("SQL_DATA_TYPE"),
        small("SQL_DATETIME_SUB"),
        int("CHAR_OCTET_LENGTH"),
        int("ORDINAL_POSITION"),
        text("IS_NULLABLE", 3),
    ]
}

fn radix(sql_type: &SqlType) -> Value {
    match sql_type {
        SqlType::Real | SqlType::Float | SqlType::Double => Value::SmallInt(2),
        SqlType::TinyInt
        | SqlType::SmallInt
        | SqlType::Integer
        | SqlType::BigInt
        | SqlType::Decimal { .. }
        | SqlType::Numeric { .. } => Value::SmallInt(10),
        _ => Value::Null,
    }
}

/// Column of the verbose type code and datetime subcode.
fn verbose_type(sql_type: &SqlType) -> (i16, Value) {
    match sql_type {
        SqlType::Date => (SQL_DATETIME, Value::SmallInt(1)),
        SqlType::Time => (SQL_DATETIME, Value::SmallInt(2)),
        SqlType::Timestamp { .. } => (SQL_DATETIME, Value::SmallInt(3)),
        other => (other.code(), Value::Null),
    }
}

fn char_octets(sql_type: &SqlType) -> Value {
    match sql_type {
        SqlType::Char { size }
        | SqlType::VarChar { size }
        | SqlType::Binary { size }
        | SqlType::VarBinary { size } => Value::Integer(*size as i32),
        _ => Value::Null,
    }
}

/// Run a catalog function against `db`, named `catalog`.
pub fn run(db: &Database, catalog: &str, query: &CatalogQuery<'_>) -> ResultData {
    match *query {
        CatalogQuery::Tables {
            catalog: cat,
            schema,
            table,
            table_type,
        } => {
            let empty = |s: Option<&str>| s == Some("");
            let mut rows = Vec::new();
            if cat == Some(SQL_ALL_CATALOGS) && empty(schema) && empty(table) {
                rows.push(vec![
                    opt_text(catalog),
                    Value::Null,
                    Value::Null,
                    Value::Null,
                    Value::Null,
                ]);
            } else if schema == Some(SQL_ALL_SCHEMAS) && empty(cat) && empty(table) {
                rows.push(vec![
                    Value::Null,
                    Value::Text(SCHEMA.into()),
                    Value::Null,
                    Value::Null,
                    Value::Null,
                ]);
            } else if table_type == Some(SQL_ALL_TABLE_TYPES)
                && empty(cat)
                && empty(schema)
                && empty(table)
            {
                rows.push(vec![
                    Value::Null,
                    Value::Null,
                    Value::Null,
                    Value::Text("TABLE".into()),
                    Value::Null,
                ]);
            } else if matches_pattern(cat, catalog) && matches_pattern(schema, SCHEMA) {
                let wants_tables = match table_type.filter(|t| !t.is_empty() && *t != "%") {
                    None => true,
                    Some(types) => types
                        .split(',')
                        .any(|t| t.trim().trim_matches('\'').eq_ignore_ascii_case("TABLE")),
                };
                if wants_tables {
                    for t in db.tables().filter(|t| matches_pattern(table, &t.name)) {
                        rows.push(vec![
                            opt_text(catalog),
                            Value::Text(SCHEMA.into()),
                            Value::Text(t.name.clone()),
                            Value::Text("TABLE".into()),
                            Value::Null,
                        ]);
                    }
                }
            }
            ResultData {
                columns: table_columns(),
                rows,
                row_count: -1,
            }
        }
        CatalogQuery::TablePrivileges {
            catalog: cat,
            schema,
            table,
        } => {
            let mut rows = Vec::new();
            if matches_pattern(cat, catalog) && matches_pattern(schema, SCHEMA) {
                for t in db.tables().filter(|t| matches_pattern(table, &t.name)) {
                    for privilege in ["DELETE", "INSERT", "SELECT", "UPDATE"] {
                        rows.push(vec![
                            opt_text(catalog),
                            Value::Text(SCHEMA.into()),
                            Value::Text(t.name.clone()),
                            Value::Text("_SYSTEM".into()),
                            Value::Text("PUBLIC".into()),
                            Value::Text(privilege.into()),
                            Value::Text("NO".into()),
                        ]);
                    }
                }
            }
            ResultData {
                columns: vec![
                    text("TABLE_CAT", 128),
                    text("TABLE_SCHEM", 128),
                    text("TABLE_NAME", 128),
                    text("GRANTOR", 128),
                    text("GRANTEE", 128),
                    text("PRIVILEGE", 128),
                    text("IS_GRANTABLE", 3),
                ],
                rows,
                row_count: -1,
            }
        }
        CatalogQuery::Columns {
            catalog: cat,
            schema,
            table,
            column,
        } => {
            let mut rows = Vec::new();
            if matches_pattern(cat, catalog) && matches_pattern(schema, SCHEMA) {
                for t in db.tables().filter(|t| matches_pattern(table, &t.name)) {
                    for (i, c) in t.columns.iter().enumerate() {
                        if !matches_pattern(column, &c.name) {
                            continue;
                        }
                        let (verbose, sub) = verbose_type(&c.sql_type);
                        rows.push(vec![
                            opt_text(catalog),
                            Value::Text(SCHEMA.into()),
                            Value::Text(t.name.clone()),
                            Value::Text(c.name.clone()),
                            Value::SmallInt(c.sql_type.code()),
                            Value::Text(type_name(&c.sql_type).into()),
                            Value::Integer(c.sql_type.column_size() as i32),
                            Value::Integer(octet_length(&c.sql_type) as i32),
                            Value::SmallInt(c.sql_type.decimal_digits()),
                            radix(&c.sql_type),
                            Value::SmallInt(if c.nullable { SQL_NULLABLE } else { SQL_NO_NULLS }),
                            Value::Null,
                            Value::Null,
                            Value::SmallInt(verbose),
                            sub,
                            char_octets(&c.sql_type),
                            Value::Integer(i as i32 + 1),
                            Value::Text(if c.nullable { "YES" } else { "NO" }.into()),
                        ]);
                    }
                }
            }
            ResultData {
                columns: column_columns(),
                rows,
                row_count: -1,
            }
        }
        CatalogQuery::PrimaryKeys {
            catalog: cat,
            schema,
            table,
        } => {
            let mut rows = Vec::new();
            if matches_pattern(cat, catalog) && matches_pattern(schema, SCHEMA) {
                if let Some(t) = table.and_then(|name| db.table(name).ok()) {
                    let key = t.columns.iter().filter(|c| c.primary_key);
                    for (seq, c) in key.enumerate() {
                        rows.push(vec![
                            opt_text(catalog),
                            Value::Text(SCHEMA.into()),
                            Value::Text(t.name.clone()),
                            Value::Text(c.name.clone()),
                            Value::SmallInt(seq as i16 + 1),
                            Value::Text(format!("pk_{}", t.name)),
                        ]);
                    }
                }
            }
            ResultData {
                columns: vec![
                    text("TABLE_CAT", 128),
                    text("TABLE_SCHEM", 128),
                    text("TABLE_NAME", 128),
                    text("COLUMN_NAME", 128),
                    small("KEY_SEQ"),
                    text("PK_NAME", 128),
                ],
                rows,
                row_count: -1,
            }
        }
        CatalogQuery::Procedures {
            catalog: cat,
            schema,
            procedure,
        } => {
            let mut rows = Vec::new();
            if matches_pattern(cat, catalog) && matches_pattern(schema, SCHEMA) {
                for (name, _) in PROCEDURES.iter().filter(|(n, _)| matches_pattern(procedure, n)) {
                    rows.push(vec![
                        opt_text(catalog),
                        Value::Text(SCHEMA.into()),
                        Value::Text((*name).into()),
                        Value::Null,
                        Value::Null,
                        Value::Null,
                        Value::Null,
                        Value::SmallInt(SQL_PT_PROCEDURE),
                    ]);
                }
            }
            ResultData {
                columns: vec![
                    text("PROCEDURE_CAT", 128),
                    text("PROCEDURE_SCHEM", 128),
                    text("PROCEDURE_NAME", 128),
                    int("NUM_INPUT_PARAMS"),
                    int("NUM_OUTPUT_PARAMS"),
                    int("NUM_RESULT_SETS"),
                    text("REMARKS", 254),
                    small("PROCEDURE_TYPE"),
                ],
                rows,
                row_count: -1,
            }
        }
        CatalogQuery::ProcedureColumns {
            catalog: cat,
            schema,
            procedure,
            column,
        } => {
            let mut rows = Vec::new();
            if matches_pattern(cat, catalog) && matches_pattern(schema, SCHEMA) {
                let procedures = PROCEDURES
                    .iter()
                    .filter(|(n, p)| matches_pattern(procedure, n) && matches_pattern(column, p));
                for (name, param) in procedures {
                    let sql_type = SqlType::BigInt;
                    rows.push(vec![
                        opt_text(catalog),
                        Value::Text(SCHEMA.into()),
                        Value::Text((*name).into()),
                        Value::Text((*param).into()),
                        Value::SmallInt(SQL_PARAM_INPUT_OUTPUT),
                        Value::SmallInt(sql_type.code()),
                        Value::Text(type_name(&sql_type).into()),
                        Value::Integer(sql_type.column_size() as i32),
                        Value::Integer(display_size(&sql_type) as i32),
                        Value::SmallInt(0),
                        radix(&sql_type),
                        Value::SmallInt(SQL_NULLABLE),
                        Value::Null,
                        Value::Null,
                        Value::SmallInt(sql_type.code()),
                        Value::Null,
                        Value::Null,
                        Value::Integer(1),
                        Value::Text("YES".into()),
                    ]);
                }
            }
            let mut columns = column_columns();
            columns[0] = text("PROCEDURE_CAT", 128);
            columns[1] = text("PROCEDURE_SCHEM", 128);
            columns[2] = text("PROCEDURE_NAME", 128);
            columns.insert(4, small("COLUMN_TYPE"));
            ResultData {
                columns,
                rows,
                row_count: -1,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_matching() {
        assert!(matches_pattern(None, "anything"));
        assert!(matches_pattern(Some(""), "anything"));
        assert!(matches_pattern(Some("%"), ""));
        assert!(matches_pattern(Some("T%"), "table_one"));
        assert!(matches_pattern(Some("t_b"), "tab"));
        assert!(!matches_pattern(Some("t_b"), "tabs"));
        assert!(!matches_pattern(Some("x%"), "table"));
    }

    #[test]
    fn test_procedure_columns_layout() {
        let db = Database::default();
        let result = run(
            &db,
            "db",
            &CatalogQuery::ProcedureColumns {
                catalog: None,
                schema: None,
                procedure: Some("increment"),
                column: None,
            },
        );
        assert_eq!(result.columns.len(), 19);
        assert_eq!(result.columns[4].name, "COLUMN_TYPE");
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].len(), 19);
    }
}
