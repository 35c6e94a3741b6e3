//! Tables, rows and statement execution for the memory driver.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::native::{DiagRecord, ParamDirection, ParameterSet};
use crate::types::{Date, FromValue, SqlType, Time, Timestamp, Value};

use super::sql::{CmpOp, Expr, InsertSource, OrderKey, Predicate, SelectItem, Statement};

/// Schema name every memory table lives in.
pub const SCHEMA: &str = "main";

/// Stored procedures known to the driver: (name, parameter name).
pub const PROCEDURES: &[(&str, &str)] = &[("increment", "value")];

fn diag(state: &str, native: i32, message: impl Into<String>) -> DiagRecord {
    DiagRecord::new(state, native, message)
}

/// Declared column of a table.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub sql_type: SqlType,
    pub nullable: bool,
    pub primary_key: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            nullable: true,
            primary_key: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    fn column_index(&self, name: &str) -> Result<usize, DiagRecord> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| diag("42S22", 1054, format!("unknown column '{}' in '{}'", name, self.name)))
    }
}

/// One named database. Cloned wholesale to snapshot a transaction.
#[derive(Debug, Clone, Default)]
pub struct Database {
    tables: BTreeMap<String, Table>,
}

/// Column of a produced result set.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultColumn {
    pub name: String,
    pub sql_type: SqlType,
    pub nullable: bool,
    /// Base table, empty for computed columns.
    pub table: String,
    /// Base column, empty for computed columns.
    pub base_column: String,
}

impl ResultColumn {
    pub fn computed(name: impl Into<String>, sql_type: SqlType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            sql_type,
            nullable,
            table: String::new(),
            base_column: String::new(),
        }
    }
}

/// Outcome of one statement: a result set, or only a row count.
#[derive(Debug, Clone, Default)]
pub struct ResultData {
    pub columns: Vec<ResultColumn>,
    pub rows: Vec<Vec<Value>>,
    /// Affected rows, -1 for queries.
    pub row_count: i64,
}

impl ResultData {
    pub fn count(n: usize) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            row_count: n as i64,
        }
    }

    /// Append the rows and counts of another execution of the same statement.
    pub fn absorb(&mut self, other: ResultData) {
        if self.columns.is_empty() {
            self.columns = other.columns;
        }
        self.rows.extend(other.rows);
        if self.row_count >= 0 && other.row_count >= 0 {
            self.row_count += other.row_count;
        } else {
            self.row_count = -1;
        }
    }
}

/// Parameter values for one element of a parameter array.
pub struct Bindings<'a> {
    pub params: &'a mut ParameterSet,
    pub element: usize,
}

impl Bindings<'_> {
    fn value(&self, index: usize) -> Result<Value, DiagRecord> {
        let buffer = self.params.buffers.get(index).ok_or_else(|| {
            diag("07002", 0, format!("parameter {} is not bound", index + 1))
        })?;
        if buffer.count() <= self.element {
            return Err(diag(
                "HY090",
                0,
                format!("parameter {} has no element {}", index + 1, self.element),
            ));
        }
        buffer
            .value(self.element)
            .map_err(|e| diag("HY000", 0, e.to_string()))
    }

    fn param_type(&self, index: usize) -> Option<SqlType> {
        self.params.buffers.get(index).map(|b| b.sql_type())
    }
}

impl Database {
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    pub fn table(&self, name: &str) -> Result<&Table, DiagRecord> {
        self.tables
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| diag("42S02", 1146, format!("table '{}' does not exist", name)))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Table, DiagRecord> {
        self.tables
            .get_mut(&name.to_ascii_lowercase())
            .ok_or_else(|| diag("42S02", 1146, format!("table '{}' does not exist", name)))
    }

    /// Type of a column, for describing parameters.
    pub fn column_type(&self, table: &str, column: &str) -> Result<&ColumnDef, DiagRecord> {
        let t = self.table(table)?;
        Ok(&t.columns[t.column_index(column)?])
    }

    /// Result shape of a query without running it.
    pub fn shape(&self, statement: &Statement) -> Result<Vec<ResultColumn>, DiagRecord> {
        match statement {
            Statement::Select { items, from, .. } => {
                let table = from.as_deref().map(|f| self.table(f)).transpose()?;
                select_columns(items, table, None)
            }
            _ => Ok(Vec::new()),
        }
    }

    /// Execute one statement for one parameter element.
    pub fn execute(
        &mut self,
        statement: &Statement,
        bindings: &mut Bindings<'_>,
    ) -> Result<ResultData, DiagRecord> {
        match statement {
            Statement::CreateTable { name, columns } => {
                let key = name.to_ascii_lowercase();
                if self.tables.contains_key(&key) {
                    return Err(diag("42S01", 1050, format!("table '{}' already exists", name)));
                }
                self.tables.insert(
                    key,
                    Table {
                        name: name.clone(),
                        columns: columns.clone(),
                        rows: Vec::new(),
                    },
                );
                Ok(ResultData::count(0))
            }
            Statement::DropTable { name, if_exists } => {
                if self.tables.remove(&name.to_ascii_lowercase()).is_none() && !if_exists {
                    return Err(diag("42S02", 1051, format!("unknown table '{}'", name)));
                }
                Ok(ResultData::count(0))
            }
            Statement::Insert {
                table,
                columns,
                source,
            } => self.insert(table, columns.as_deref(), source, bindings),
            Statement::Select {
                items,
                from,
                filter,
                order_by,
            } => self.select(items, from.as_deref(), filter, order_by, bindings),
            Statement::Update {
                table,
                assignments,
                filter,
            } => {
                let mut resolved = Vec::with_capacity(assignments.len());
                {
                    let t = self.table(table)?;
                    for (column, expr) in assignments {
                        let index = t.column_index(column)?;
                        let value = eval(expr, None, bindings)?;
                        resolved.push((index, coerce(value, &t.columns[index])?));
                    }
                }
                let t = self.table(table)?;
                let matcher = Matcher::new(t, filter, bindings)?;
                let t = self.table_mut(table)?;
                let mut count = 0;
                for row in t.rows.iter_mut().filter(|r| matcher.matches(r)) {
                    for (index, value) in &resolved {
                        row[*index] = value.clone();
                    }
                    count += 1;
                }
                Ok(ResultData::count(count))
            }
            Statement::Delete { table, filter } => {
                let t = self.table(table)?;
                let matcher = Matcher::new(t, filter, bindings)?;
                let t = self.table_mut(table)?;
                let before = t.rows.len();
                t.rows.retain(|r| !matcher.matches(r));
                Ok(ResultData::count(before - t.rows.len()))
            }
            Statement::Call { procedure, args } => call(procedure, args, bindings),
        }
    }

    fn insert(
        &mut self,
        table: &str,
        columns: Option<&[String]>,
        source: &InsertSource,
        bindings: &mut Bindings<'_>,
    ) -> Result<ResultData, DiagRecord> {
        let t = self.table(table)?;
        let targets: Vec<usize> = match columns {
            Some(names) => names
                .iter()
                .map(|n| t.column_index(n))
                .collect::<Result<_, _>>()?,
            None => (0..t.columns.len()).collect(),
        };
        let incoming: Vec<Vec<Value>> = match source {
            InsertSource::Values(exprs) => {
                let values = exprs
                    .iter()
                    .map(|e| eval(e, None, bindings))
                    .collect::<Result<Vec<_>, _>>()?;
                vec![values]
            }
            InsertSource::TableParam(index) => table_rows(*index, bindings)?,
        };

        let mut rows = Vec::with_capacity(incoming.len());
        for values in incoming {
            if values.len() != targets.len() {
                return Err(diag(
                    "21S01",
                    1136,
                    format!(
                        "insert value list has {} values for {} columns",
                        values.len(),
                        targets.len()
                    ),
                ));
            }
            let mut row = vec![Value::Null; t.columns.len()];
            for (target, value) in targets.iter().zip(values) {
                row[*target] = coerce(value, &t.columns[*target])?;
            }
            for (def, value) in t.columns.iter().zip(&row) {
                if !def.nullable && value.is_null() {
                    return Err(diag(
                        "23000",
                        1048,
                        format!("column '{}' cannot be null", def.name),
                    ));
                }
            }
            let key: Vec<usize> = t
                .columns
                .iter()
                .enumerate()
                .filter(|(_, c)| c.primary_key)
                .map(|(i, _)| i)
                .collect();
            if !key.is_empty() {
                let duplicate = t
                    .rows
                    .iter()
                    .chain(rows.iter())
                    .any(|existing: &Vec<Value>| key.iter().all(|k| existing[*k] == row[*k]));
                if duplicate {
                    return Err(diag("23000", 1062, "duplicate primary key"));
                }
            }
            rows.push(row);
        }
        let count = rows.len();
        self.table_mut(table)?.rows.extend(rows);
        Ok(ResultData::count(count))
    }

    fn select(
        &self,
        items: &[SelectItem],
        from: Option<&str>,
        filter: &[Predicate],
        order_by: &[OrderKey],
        bindings: &mut Bindings<'_>,
    ) -> Result<ResultData, DiagRecord> {
        let Some(from) = from else {
            let columns = select_columns(items, None, Some(&*bindings))?;
            let row = items
                .iter()
                .map(|item| match item {
                    SelectItem::Expr { expr, .. } => eval(expr, None, bindings),
                    SelectItem::CountStar { .. } => Ok(Value::BigInt(1)),
                    SelectItem::Star => Err(diag("42000", 1064, "SELECT * requires FROM")),
                })
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(ResultData {
                columns,
                rows: vec![row],
                row_count: -1,
            });
        };

        let t = self.table(from)?;
        let columns = select_columns(items, Some(t), Some(&*bindings))?;
        let matcher = Matcher::new(t, filter, bindings)?;
        let mut rows: Vec<&Vec<Value>> = t.rows.iter().filter(|r| matcher.matches(r)).collect();

        if items.iter().any(|i| matches!(i, SelectItem::CountStar { .. })) {
            if items.len() != 1 {
                return Err(diag("42000", 1140, "COUNT(*) cannot be mixed with other columns"));
            }
            return Ok(ResultData {
                columns,
                rows: vec![vec![Value::BigInt(rows.len() as i64)]],
                row_count: -1,
            });
        }

        let mut keys = Vec::with_capacity(order_by.len());
        for key in order_by {
            let index = match key.column.parse::<usize>() {
                Ok(n) if n >= 1 => {
                    let column = columns.get(n - 1).ok_or_else(|| {
                        diag("42S22", 1054, format!("ORDER BY position {} out of range", n))
                    })?;
                    t.column_index(&column.base_column)?
                }
                _ => t.column_index(&key.column)?,
            };
            keys.push((index, key.descending));
        }
        rows.sort_by(|a, b| {
            for (index, descending) in &keys {
                let ord = sort_order(&a[*index], &b[*index]);
                let ord = if *descending { ord.reverse() } else { ord };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });

        let mut projected = Vec::with_capacity(rows.len());
        for row in rows {
            let mut out = Vec::with_capacity(columns.len());
            for item in items {
                match item {
                    SelectItem::Star => out.extend(row.iter().cloned()),
                    SelectItem::Expr { expr, .. } => out.push(eval(expr, Some((t, row)), bindings)?),
                    SelectItem::CountStar { .. } => {}
                }
            }
            projected.push(out);
        }
        Ok(ResultData {
            columns,
            rows: projected,
            row_count: -1,
        })
    }
}

fn select_columns(
    items: &[SelectItem],
    table: Option<&Table>,
    bindings: Option<&Bindings<'_>>,
) -> Result<Vec<ResultColumn>, DiagRecord> {
    let mut columns = Vec::new();
    for item in items {
        match item {
            SelectItem::Star => {
                let t = table.ok_or_else(|| diag("42000", 1064, "SELECT * requires FROM"))?;
                columns.extend(t.columns.iter().map(|c| base_column(t, c, &c.name)));
            }
            SelectItem::CountStar { alias } => columns.push(ResultColumn::computed(
                alias.clone().unwrap_or_default(),
                SqlType::BigInt,
                false,
            )),
            SelectItem::Expr { expr, alias } => match expr {
                Expr::Column(name) => {
                    let t = table.ok_or_else(|| {
                        diag("42S22", 1054, format!("unknown column '{}'", name))
                    })?;
                    let def = &t.columns[t.column_index(name)?];
                    columns.push(base_column(t, def, alias.as_deref().unwrap_or(&def.name)));
                }
                Expr::Literal(value) => columns.push(ResultColumn::computed(
                    alias.clone().unwrap_or_default(),
                    literal_type(value),
                    value.is_null(),
                )),
                Expr::Param(index) => {
                    let sql_type = bindings
                        .and_then(|b| b.param_type(*index))
                        .unwrap_or(SqlType::VarChar { size: 255 });
                    columns.push(ResultColumn::computed(
                        alias.clone().unwrap_or_default(),
                        sql_type,
                        true,
                    ));
                }
            },
        }
    }
    Ok(columns)
}

fn base_column(table: &Table, def: &ColumnDef, label: &str) -> ResultColumn {
    ResultColumn {
        name: label.to_string(),
        sql_type: def.sql_type,
        nullable: def.nullable,
        table: table.name.clone(),
        base_column: def.name.clone(),
    }
}

fn literal_type(value: &Value) -> SqlType {
    match value {
        Value::Bit(_) => SqlType::Bit,
        Value::TinyInt(_) => SqlType::TinyInt,
        Value::SmallInt(_) => SqlType::SmallInt,
        Value::Integer(_) => SqlType::Integer,
        Value::BigInt(_) | Value::UBigInt(_) => SqlType::BigInt,
        Value::Real(_) => SqlType::Real,
        Value::Double(_) => SqlType::Double,
        Value::Text(s) => SqlType::VarChar { size: s.len().max(1) },
        Value::Binary(b) => SqlType::VarBinary { size: b.len().max(1) },
        Value::Date(_) => SqlType::Date,
        Value::Time(_) => SqlType::Time,
        Value::Timestamp(_) => SqlType::Timestamp { precision: 6 },
        Value::Null => SqlType::VarChar { size: 1 },
    }
}

fn eval(
    expr: &Expr,
    row: Option<(&Table, &Vec<Value>)>,
    bindings: &Bindings<'_>,
) -> Result<Value, DiagRecord> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Param(index) => bindings.value(*index),
        Expr::Column(name) => match row {
            Some((t, values)) => Ok(values[t.column_index(name)?].clone()),
            None => Err(diag("42S22", 1054, format!("unknown column '{}'", name))),
        },
    }
}

/// Rows of the table-valued parameter at `index`, in column order.
fn table_rows(index: usize, bindings: &Bindings<'_>) -> Result<Vec<Vec<Value>>, DiagRecord> {
    let tvp = bindings.params.tables.get(&index).ok_or_else(|| {
        diag("07002", 0, format!("table parameter {} is not bound", index + 1))
    })?;
    let mut rows = Vec::with_capacity(tvp.row_count);
    for r in 0..tvp.row_count {
        let row = tvp
            .columns
            .iter()
            .map(|c| {
                if c.count() <= r {
                    return Ok(Value::Null);
                }
                c.value(r).map_err(|e| diag("HY000", 0, e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(row);
    }
    Ok(rows)
}

fn call(
    procedure: &str,
    args: &[Expr],
    bindings: &mut Bindings<'_>,
) -> Result<ResultData, DiagRecord> {
    if !procedure.eq_ignore_ascii_case("increment") {
        return Err(diag("42000", 1305, format!("procedure '{}' does not exist", procedure)));
    }
    let [Expr::Param(index)] = args else {
        return Err(diag("07001", 0, "increment takes exactly one parameter marker"));
    };
    let element = bindings.element;
    let buffer = bindings.params.buffers.get_mut(*index).ok_or_else(|| {
        diag("07002", 0, format!("parameter {} is not bound", index + 1))
    })?;
    if buffer.direction() != ParamDirection::InOut {
        return Err(diag("HY105", 0, "increment requires an INPUT_OUTPUT parameter"));
    }
    let current = buffer
        .value(element)
        .map_err(|e| diag("HY000", 0, e.to_string()))?;
    let next = if current.is_null() {
        Value::Null
    } else {
        let n = i64::from_value(&current).map_err(|e| diag("22018", 0, e.to_string()))?;
        Value::BigInt(n + 1)
    };
    buffer
        .write_value(element, &next)
        .map_err(|e| diag("22003", 0, e.to_string()))?;
    Ok(ResultData::count(0))
}

/// WHERE clause compiled against one table.
struct Matcher {
    tests: Vec<(usize, CmpOp, Value)>,
}

impl Matcher {
    fn new(table: &Table, filter: &[Predicate], bindings: &Bindings<'_>) -> Result<Self, DiagRecord> {
        let mut tests = Vec::with_capacity(filter.len());
        for p in filter {
            let index = table.column_index(&p.column)?;
            let value = match &p.value {
                Some(expr) => {
                    let v = eval(expr, None, bindings)?;
                    coerce(v, &table.columns[index])?
                }
                None => Value::Null,
            };
            tests.push((index, p.op, value));
        }
        Ok(Self { tests })
    }

    fn matches(&self, row: &[Value]) -> bool {
        self.tests.iter().all(|(index, op, value)| {
            let cell = &row[*index];
            match op {
                CmpOp::IsNull => cell.is_null(),
                CmpOp::IsNotNull => !cell.is_null(),
                _ => match compare(cell, value) {
                    None => false,
                    Some(ord) => match op {
                        CmpOp::Eq => ord == Ordering::Equal,
                        CmpOp::Ne => ord != Ordering::Equal,
                        CmpOp::Lt => ord == Ordering::Less,
                        CmpOp::Le => ord != Ordering::Greater,
                        CmpOp::Gt => ord == Ordering::Greater,
                        CmpOp::Ge => ord != Ordering::Less,
                        CmpOp::IsNull | CmpOp::IsNotNull => false,
                    },
                },
            }
        })
    }
}

/// Sort order for ORDER BY: NULL first, then by value.
fn sort_order(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => compare(a, b).unwrap_or(Ordering::Equal),
    }
}

/// Compare two stored values; any comparison with NULL is unknown.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Text(x), Value::Text(y)) => {
            match (x.trim().parse::<f64>(), y.trim().parse::<f64>()) {
                (Ok(fx), Ok(fy)) => fx.partial_cmp(&fy),
                _ => Some(x.cmp(y)),
            }
        }
        (Value::Binary(x), Value::Binary(y)) => Some(x.cmp(y)),
        (Value::Date(_) | Value::Time(_) | Value::Timestamp(_), _) => {
            Some(a.to_string().cmp(&b.to_string()))
        }
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => Some(a.to_string().cmp(&b.to_string())),
        },
    }
}

/// Convert `value` to the storage representation of `column`.
pub fn coerce(value: Value, column: &ColumnDef) -> Result<Value, DiagRecord> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let cast = |e: crate::error::Error| diag("22018", 0, format!("column '{}': {}", column.name, e));
    let too_long = |len: usize, size: usize| {
        diag(
            "22001",
            1406,
            format!(
                "String data, right truncated: {} bytes for column '{}' of size {}",
                len, column.name, size
            ),
        )
    };
    Ok(match column.sql_type {
        SqlType::Bit => Value::Bit(bool::from_value(&value).map_err(cast)?),
        SqlType::TinyInt => Value::TinyInt(i8::from_value(&value).map_err(cast)?),
        SqlType::SmallInt => Value::SmallInt(i16::from_value(&value).map_err(cast)?),
        SqlType::Integer => Value::Integer(i32::from_value(&value).map_err(cast)?),
        SqlType::BigInt => Value::BigInt(i64::from_value(&value).map_err(cast)?),
        SqlType::Real => Value::Real(f32::from_value(&value).map_err(cast)?),
        SqlType::Float | SqlType::Double => Value::Double(f64::from_value(&value).map_err(cast)?),
        SqlType::Decimal { scale, .. } | SqlType::Numeric { scale, .. } => match value {
            Value::Text(s) => {
                let trimmed = s.trim();
                trimmed.parse::<f64>().map_err(|_| {
                    diag("22018", 0, format!("'{}' is not a number", trimmed))
                })?;
                Value::Text(trimmed.to_string())
            }
            other => {
                let f = f64::from_value(&other).map_err(cast)?;
                Value::Text(format!("{:.*}", scale.max(0) as usize, f))
            }
        },
        SqlType::Char { size }
        | SqlType::VarChar { size }
        | SqlType::WChar { size }
        | SqlType::WVarChar { size } => {
            let s = String::from_value(&value).map_err(cast)?;
            if s.chars().count() > size {
                return Err(too_long(s.len(), size));
            }
            Value::Text(s)
        }
        SqlType::LongVarChar | SqlType::WLongVarChar => {
            Value::Text(String::from_value(&value).map_err(cast)?)
        }
        SqlType::Binary { size } | SqlType::VarBinary { size } => {
            let b = Vec::<u8>::from_value(&value).map_err(cast)?;
            if b.len() > size {
                return Err(too_long(b.len(), size));
            }
            Value::Binary(b)
        }
        SqlType::LongVarBinary => Value::Binary(Vec::<u8>::from_value(&value).map_err(cast)?),
        SqlType::Date => Value::Date(Date::from_value(&value).map_err(cast)?),
        SqlType::Time => Value::Time(Time::from_value(&value).map_err(cast)?),
        SqlType::Timestamp { .. } => Value::Timestamp(Timestamp::from_value(&value).map_err(cast)?),
        SqlType::Table | SqlType::Other { .. } => value,
    })
}

/// Bare type name as reported by catalog functions and descriptors.
pub fn type_name(sql_type: &SqlType) -> &'static str {
    match sql_type {
        SqlType::Char { .. } => "CHAR",
        SqlType::VarChar { .. } => "VARCHAR",
        SqlType::LongVarChar => "TEXT",
        SqlType::WChar { .. } => "NCHAR",
        SqlType::WVarChar { .. } => "NVARCHAR",
        SqlType::WLongVarChar => "NTEXT",
        SqlType::Binary { .. } => "BINARY",
        SqlType::VarBinary { .. } => "VARBINARY",
        SqlType::LongVarBinary => "BLOB",
        SqlType::Bit => "BIT",
        SqlType::TinyInt => "TINYINT",
        SqlType::SmallInt => "SMALLINT",
        SqlType::Integer => "INTEGER",
        SqlType::BigInt => "BIGINT",
        SqlType::Real => "REAL",
        SqlType::Float => "FLOAT",
        SqlType::Double => "DOUBLE",
        SqlType::Decimal { .. } => "DECIMAL",
        SqlType::Numeric { .. } => "NUMERIC",
        SqlType::Date => "DATE",
        SqlType::Time => "TIME",
        SqlType::Timestamp { .. } => "TIMESTAMP",
        SqlType::Table => "TABLE",
        SqlType::Other { .. } => "OTHER",
    }
}

/// Maximum length of a value rendered as text.
pub fn display_size(sql_type: &SqlType) -> i64 {
    match sql_type {
        SqlType::Char { size }
        | SqlType::VarChar { size }
        | SqlType::WChar { size }
        | SqlType::WVarChar { size } => *size as i64,
        SqlType::Binary { size } | SqlType::VarBinary { size } => (*size * 2) as i64,
        SqlType::Bit => 1,
        SqlType::TinyInt => 4,
        SqlType::SmallInt => 6,
        SqlType::Integer => 11,
        SqlType::BigInt => 20,
        SqlType::Real => 14,
        SqlType::Float | SqlType::Double => 24,
        SqlType::Decimal { precision, .. } | SqlType::Numeric { precision, .. } => {
            (*precision + 2) as i64
        }
        SqlType::Date => 10,
        SqlType::Time => 8,
        SqlType::Timestamp { precision } => 20 + *precision as i64,
        _ => crate::native::constants::SQL_NO_TOTAL,
    }
}

/// Byte length of a value in its default client layout.
pub fn octet_length(sql_type: &SqlType) -> i64 {
    match sql_type.default_c_type().fixed_width() {
        Some(width) if !matches!(sql_type, SqlType::Decimal { .. } | SqlType::Numeric { .. }) => {
            width as i64
        }
        _ if sql_type.is_long() => crate::native::constants::SQL_NO_TOTAL,
        _ => sql_type.column_size() as i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::memory::sql::parse_batch;
    use crate::native::BoundBuffer;
    use crate::types::CType;

    fn run(db: &mut Database, text: &str) -> Result<ResultData, DiagRecord> {
        let batch = parse_batch(text)?;
        let mut params = ParameterSet::default();
        let mut last = ResultData::default();
        for statement in &batch.statements {
            let mut bindings = Bindings {
                params: &mut params,
                element: 0,
            };
            last = db.execute(statement, &mut bindings)?;
        }
        Ok(last)
    }

    #[test]
    fn test_insert_select_order() {
        let mut db = Database::default();
        run(&mut db, "CREATE TABLE t (id INT, name VARCHAR(10))").unwrap();
        run(&mut db, "INSERT INTO t VALUES (2, 'bb'); INSERT INTO t VALUES (1, 'a')").unwrap();
        let result = run(&mut db, "SELECT id, name FROM t ORDER BY id").unwrap();
        assert_eq!(result.columns.len(), 2);
        assert_eq!(result.columns[1].sql_type, SqlType::VarChar { size: 10 });
        assert_eq!(
            result.rows,
            vec![
                vec![Value::Integer(1), Value::Text("a".into())],
                vec![Value::Integer(2), Value::Text("bb".into())],
            ]
        );
    }

    #[test]
    fn test_string_too_long_is_rejected() {
        let mut db = Database::default();
        run(&mut db, "CREATE TABLE t (name VARCHAR(2))").unwrap();
        let err = run(&mut db, "INSERT INTO t VALUES ('abc')").unwrap_err();
        assert_eq!(err.state, "22001");
    }

    #[test]
    fn test_constraints() {
        let mut db = Database::default();
        run(&mut db, "CREATE TABLE t (id INT PRIMARY KEY, v INT NOT NULL)").unwrap();
        run(&mut db, "INSERT INTO t VALUES (1, 1)").unwrap();
        assert_eq!(run(&mut db, "INSERT INTO t VALUES (1, 2)").unwrap_err().state, "23000");
        assert_eq!(run(&mut db, "INSERT INTO t VALUES (2, NULL)").unwrap_err().state, "23000");
        assert_eq!(run(&mut db, "CREATE TABLE T (x INT)").unwrap_err().state, "42S01");
    }

    #[test]
    fn test_update_delete_counts() {
        let mut db = Database::default();
        run(&mut db, "CREATE TABLE t (id INT, v VARCHAR(5))").unwrap();
        for i in 0..5 {
            run(&mut db, &format!("INSERT INTO t VALUES ({}, NULL)", i)).unwrap();
        }
        assert_eq!(run(&mut db, "UPDATE t SET v = 'x' WHERE id >= 3").unwrap().row_count, 2);
        assert_eq!(run(&mut db, "DELETE FROM t WHERE v IS NULL").unwrap().row_count, 3);
        let count = run(&mut db, "SELECT COUNT(*) FROM t").unwrap();
        assert_eq!(count.rows, vec![vec![Value::BigInt(2)]]);
    }

    #[test]
    fn test_decimal_stored_as_text() {
        let mut db = Database::default();
        run(&mut db, "CREATE TABLE t (d DECIMAL(9,2))").unwrap();
        run(&mut db, "INSERT INTO t VALUES (12.5)").unwrap();
        let result = run(&mut db, "SELECT d FROM t").unwrap();
        assert_eq!(result.rows[0][0], Value::Text("12.50".into()));
    }

    #[test]
    fn test_increment_procedure() {
        let mut db = Database::default();
        let batch = parse_batch("CALL increment(?)").unwrap();
        let mut params = ParameterSet::default();
        let mut buffer = BoundBuffer::new(0, CType::SLong, SqlType::Integer, 4, 1)
            .with_direction(ParamDirection::InOut);
        buffer.write_value(0, &Value::Integer(41)).unwrap();
        params.buffers.insert(buffer);
        let mut bindings = Bindings {
            params: &mut params,
            element: 0,
        };
        db.execute(&batch.statements[0], &mut bindings).unwrap();
        assert_eq!(params.buffers.get(0).unwrap().value(0).unwrap(), Value::Integer(42));
    }

    #[test]
    fn test_compare_nulls_are_unknown() {
        assert_eq!(compare(&Value::Null, &Value::Integer(1)), None);
        assert_eq!(
            compare(&Value::Integer(1), &Value::Double(2.0)),
            Some(Ordering::Less)
        );
    }
}
