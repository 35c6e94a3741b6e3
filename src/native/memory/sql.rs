//! Lexer and parser for the SQL subset understood by the memory driver.
//!
//! Parameter markers are numbered in order of appearance across the whole
//! text, so a `;`-separated batch shares one parameter numbering.

use crate::native::DiagRecord;
use crate::types::{SqlType, Value};

use super::storage::ColumnDef;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Number(String),
    Param(usize),
    Symbol(&'static str),
}

fn syntax_error(message: impl Into<String>) -> DiagRecord {
    DiagRecord::new("42000", 1064, message)
}

struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    params: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            params: 0,
        }
    }

    fn peek_byte(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn tokenize_all(&mut self) -> Result<Vec<Token>, DiagRecord> {
        let mut tokens = Vec::new();
        while let Some(b) = self.peek_byte() {
            let start = self.pos;
            self.pos += 1;
            let token = match b {
                b' ' | b'\t' | b'\r' | b'\n' => continue,
                b'-' if self.peek_byte() == Some(b'-') => {
                    while let Some(c) = self.peek_byte() {
                        if c == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                    continue;
                }
                b'?' => {
                    self.params += 1;
                    Token::Param(self.params - 1)
                }
                b'\'' => Token::Str(self.string_literal()?),
                b'"' => Token::Ident(self.quoted_identifier()?),
                b'(' => Token::Symbol("("),
                b')' => Token::Symbol(")"),
                b',' => Token::Symbol(","),
                b';' => Token::Symbol(";"),
                b'*' => Token::Symbol("*"),
                b'.' => Token::Symbol("."),
                b'-' => Token::Symbol("-"),
                b'=' => Token::Symbol("="),
                b'<' => match self.peek_byte() {
                    Some(b'=') => {
                        self.pos += 1;
                        Token::Symbol("<=")
                    }
                    Some(b'>') => {
                        self.pos += 1;
                        Token::Symbol("<>")
                    }
                    _ => Token::Symbol("<"),
                },
                b'>' if self.peek_byte() == Some(b'=') => {
                    self.pos += 1;
                    Token::Symbol(">=")
                }
                b'>' => Token::Symbol(">"),
                b'!' if self.peek_byte() == Some(b'=') => {
                    self.pos += 1;
                    Token::Symbol("<>")
                }
                b'0'..=b'9' => {
                    while matches!(self.peek_byte(), Some(b'0'..=b'9' | b'.')) {
                        self.pos += 1;
                    }
                    Token::Number(self.source[start..self.pos].to_string())
                }
                b if b.is_ascii_alphabetic() || b == b'_' => {
                    while matches!(self.peek_byte(), Some(c) if c.is_ascii_alphanumeric() || c == b'_')
                    {
                        self.pos += 1;
                    }
                    Token::Ident(self.source[start..self.pos].to_string())
                }
                other => {
                    return Err(syntax_error(format!(
                        "unexpected character '{}' at offset {}",
                        other as char, start
                    )))
                }
            };
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn string_literal(&mut self) -> Result<String, DiagRecord> {
        let mut out = String::new();
        loop {
            let rest = &self.source[self.pos..];
            let Some(end) = rest.find('\'') else {
                return Err(syntax_error("unterminated string literal"));
            };
            out.push_str(&rest[..end]);
            self.pos += end + 1;
            if self.peek_byte() == Some(b'\'') {
                out.push('\'');
                self.pos += 1;
            } else {
                return Ok(out);
            }
        }
    }

    fn quoted_identifier(&mut self) -> Result<String, DiagRecord> {
        let rest = &self.source[self.pos..];
        let end = rest
            .find('"')
            .ok_or_else(|| syntax_error("unterminated quoted identifier"))?;
        self.pos += end + 1;
        Ok(rest[..end].to_string())
    }
}

/// Comparison operator of a WHERE predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    IsNull,
    IsNotNull,
}

/// Scalar expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// 0-based parameter marker.
    Param(usize),
    Column(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub column: String,
    pub op: CmpOp,
    pub value: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    Star,
    CountStar { alias: Option<String> },
    Expr { expr: Expr, alias: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderKey {
    pub column: String,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InsertSource {
    Values(Vec<Expr>),
    /// `SELECT * FROM ?`: rows of a table-valued parameter.
    TableParam(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateTable {
        name: String,
        columns: Vec<ColumnDef>,
    },
    DropTable {
        name: String,
        if_exists: bool,
    },
    Insert {
        table: String,
        columns: Option<Vec<String>>,
        source: InsertSource,
    },
    Select {
        items: Vec<SelectItem>,
        from: Option<String>,
        filter: Vec<Predicate>,
        order_by: Vec<OrderKey>,
    },
    Update {
        table: String,
        assignments: Vec<(String, Expr)>,
        filter: Vec<Predicate>,
    },
    Delete {
        table: String,
        filter: Vec<Predicate>,
    },
    Call {
        procedure: String,
        args: Vec<Expr>,
    },
}

impl Statement {
    /// Whether executing the statement changes the database.
    pub fn is_change(&self) -> bool {
        !matches!(self, Statement::Select { .. } | Statement::Call { .. })
    }
}

/// What a parameter marker stands for, used to describe parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamTarget {
    Column { table: String, column: String },
    /// Positional value of `INSERT INTO table VALUES (...)` without a column list.
    Position { table: String, position: usize },
    Table,
    Procedure,
    Unknown,
}

/// A parsed `;`-separated batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub statements: Vec<Statement>,
    pub param_count: usize,
}

impl Batch {
    /// Describe every parameter marker of the batch by ordinal.
    pub fn param_targets(&self) -> Vec<ParamTarget> {
        let mut targets = vec![ParamTarget::Unknown; self.param_count];
        let mut set = |expr: &Expr, target: ParamTarget| {
            if let Expr::Param(i) = expr {
                if let Some(slot) = targets.get_mut(*i) {
                    *slot = target;
                }
            }
        };
        for statement in &self.statements {
            match statement {
                Statement::Insert {
                    table,
                    columns,
                    source,
                } => match source {
                    InsertSource::Values(values) => {
                        for (position, expr) in values.iter().enumerate() {
                            let target = match columns.as_ref().and_then(|c| c.get(position)) {
                                Some(column) => ParamTarget::Column {
                                    table: table.clone(),
                                    column: column.clone(),
                                },
                                None => ParamTarget::Position {
                                    table: table.clone(),
                                    position,
                                },
                            };
                            set(expr, target);
                        }
                    }
                    InsertSource::TableParam(i) => set(&Expr::Param(*i), ParamTarget::Table),
                },
                Statement::Select { from, filter, .. } => {
                    if let Some(table) = from {
                        for p in filter {
                            if let Some(expr) = &p.value {
                                set(
                                    expr,
                                    ParamTarget::Column {
                                        table: table.clone(),
                                        column: p.column.clone(),
                                    },
                                );
                            }
                        }
                    }
                }
                Statement::Update {
                    table,
                    assignments,
                    filter,
                } => {
                    for (column, expr) in assignments {
                        set(
                            expr,
                            ParamTarget::Column {
                                table: table.clone(),
                                column: column.clone(),
                            },
                        );
                    }
                    for p in filter {
                        if let Some(expr) = &p.value {
                            set(
                                expr,
                                ParamTarget::Column {
                                    table: table.clone(),
                                    column: p.column.clone(),
                                },
                            );
                        }
                    }
                }
                Statement::Delete { table, filter } => {
                    for p in filter {
                        if let Some(expr) = &p.value {
                            set(
                                expr,
                                ParamTarget::Column {
                                    table: table.clone(),
                                    column: p.column.clone(),
                                },
                            );
                        }
                    }
                }
                Statement::Call { args, .. } => {
                    for expr in args {
                        set(expr, ParamTarget::Procedure);
                    }
                }
                Statement::CreateTable { .. } | Statement::DropTable { .. } => {}
            }
        }
        targets
    }
}

/// Parse a statement batch.
pub fn parse_batch(text: &str) -> Result<Batch, DiagRecord> {
    let mut lexer = Lexer::new(text);
    let tokens = lexer.tokenize_all()?;
    let mut parser = Parser { tokens, pos: 0 };
    let mut statements = Vec::new();
    while !parser.at_end() {
        if parser.eat_symbol(";") {
            continue;
        }
        statements.push(parser.statement()?);
        if !parser.at_end() {
            parser.expect_symbol(";")?;
        }
    }
    if statements.is_empty() {
        return Err(syntax_error("empty statement"));
    }
    Ok(Batch {
        statements,
        param_count: lexer.params,
    })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(s)) if s.eq_ignore_ascii_case(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), DiagRecord> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.unexpected(keyword))
        }
    }

    fn eat_symbol(&mut self, symbol: &str) -> bool {
        if matches!(self.peek(), Some(Token::Symbol(s)) if *s == symbol) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_symbol(&mut self, symbol: &str) -> Result<(), DiagRecord> {
        if self.eat_symbol(symbol) {
            Ok(())
        } else {
            Err(self.unexpected(symbol))
        }
    }

    fn unexpected(&self, wanted: &str) -> DiagRecord {
        match self.peek() {
            Some(token) => syntax_error(format!("expected {} near {:?}", wanted, token)),
            None => syntax_error(format!("expected {} at end of statement", wanted)),
        }
    }

    fn identifier(&mut self) -> Result<String, DiagRecord> {
        match self.next() {
            Some(Token::Ident(s)) => Ok(s),
            _ => {
                self.pos = self.pos.saturating_sub(1);
                Err(self.unexpected("identifier"))
            }
        }
    }

    fn number(&mut self) -> Result<usize, DiagRecord> {
        match self.next() {
            Some(Token::Number(n)) => n
                .parse()
                .map_err(|_| syntax_error(format!("invalid length '{}'", n))),
            _ => Err(syntax_error("expected a number")),
        }
    }

    fn statement(&mut self) -> Result<Statement, DiagRecord> {
        let Some(Token::Ident(keyword)) = self.peek().cloned() else {
            return Err(self.unexpected("a statement"));
        };
        self.pos += 1;
        match keyword.to_ascii_uppercase().as_str() {
            "CREATE" => self.create_table(),
            "DROP" => self.drop_table(),
            "INSERT" => self.insert(),
            "SELECT" => self.select(),
            "UPDATE" => self.update(),
            "DELETE" => self.delete(),
            "CALL" | "EXEC" | "EXECUTE" => self.call(),
            other => Err(syntax_error(format!("unsupported statement '{}'", other))),
        }
    }

    fn create_table(&mut self) -> Result<Statement, DiagRecord> {
        self.expect_keyword("TABLE")?;
        let name = self.identifier()?;
        self.expect_symbol("(")?;
        let mut columns = Vec::new();
        loop {
            columns.push(self.column_def()?);
            if !self.eat_symbol(",") {
                break;
            }
        }
        self.expect_symbol(")")?;
        Ok(Statement::CreateTable { name, columns })
    }

    fn column_def(&mut self) -> Result<ColumnDef, DiagRecord> {
        let name = self.identifier()?;
        let type_name = self.identifier()?.to_ascii_uppercase();
        if type_name == "DOUBLE" {
            self.eat_keyword("PRECISION");
        }
        let mut args = Vec::new();
        if self.eat_symbol("(") {
            loop {
                args.push(self.number()?);
                if !self.eat_symbol(",") {
                    break;
                }
            }
            self.expect_symbol(")")?;
        }
        let sql_type = column_type(&type_name, &args)?;
        let mut def = ColumnDef::new(name, sql_type);
        loop {
            if self.eat_keyword("NOT") {
                self.expect_keyword("NULL")?;
                def.nullable = false;
            } else if self.eat_keyword("NULL") {
                def.nullable = true;
            } else if self.eat_keyword("PRIMARY") {
                self.expect_keyword("KEY")?;
                def.primary_key = true;
                def.nullable = false;
            } else {
                break;
            }
        }
        Ok(def)
    }

    fn drop_table(&mut self) -> Result<Statement, DiagRecord> {
        self.expect_keyword("TABLE")?;
        let if_exists = if self.eat_keyword("IF") {
            self.expect_keyword("EXISTS")?;
            true
        } else {
            false
        };
        let name = self.identifier()?;
        Ok(Statement::DropTable { name, if_exists })
    }

    fn insert(&mut self) -> Result<Statement, DiagRecord> {
        self.expect_keyword("INTO")?;
        let table = self.identifier()?;
        let columns = if self.eat_symbol("(") {
            let mut names = Vec::new();
            loop {
                names.push(self.identifier()?);
                if !self.eat_symbol(",") {
                    break;
                }
            }
            self.expect_symbol(")")?;
            Some(names)
        } else {
            None
        };
        let source = if self.eat_keyword("VALUES") {
            self.expect_symbol("(")?;
            let mut values = Vec::new();
            loop {
                values.push(self.expr()?);
                if !self.eat_symbol(",") {
                    break;
                }
            }
            self.expect_symbol(")")?;
            InsertSource::Values(values)
        } else if self.eat_keyword("SELECT") {
            self.expect_symbol("*")?;
            self.expect_keyword("FROM")?;
            match self.next() {
                Some(Token::Param(i)) => InsertSource::TableParam(i),
                _ => return Err(syntax_error("INSERT ... SELECT only reads a table parameter")),
            }
        } else {
            return Err(self.unexpected("VALUES or SELECT"));
        };
        Ok(Statement::Insert {
            table,
            columns,
            source,
        })
    }

    fn select(&mut self) -> Result<Statement, DiagRecord> {
        let mut items = Vec::new();
        loop {
            items.push(self.select_item()?);
            if !self.eat_symbol(",") {
                break;
            }
        }
        let from = if self.eat_keyword("FROM") {
            Some(self.identifier()?)
        } else {
            None
        };
        let filter = self.where_clause()?;
        let mut order_by = Vec::new();
        if self.eat_keyword("ORDER") {
            self.expect_keyword("BY")?;
            loop {
                let column = match self.next() {
                    Some(Token::Ident(s)) => s,
                    Some(Token::Number(n)) => n,
                    _ => return Err(syntax_error("expected ORDER BY column")),
                };
                let descending = if self.eat_keyword("DESC") {
                    true
                } else {
                    self.eat_keyword("ASC");
                    false
                };
                order_by.push(OrderKey { column, descending });
                if !self.eat_symbol(",") {
                    break;
                }
            }
        }
        Ok(Statement::Select {
            items,
            from,
            filter,
            order_by,
        })
    }

    fn select_item(&mut self) -> Result<SelectItem, DiagRecord> {
        if self.eat_symbol("*") {
            return Ok(SelectItem::Star);
        }
        if self.peek_keyword("COUNT") {
            self.pos += 1;
            self.expect_symbol("(")?;
            self.expect_symbol("*")?;
            self.expect_symbol(")")?;
            let alias = self.alias()?;
            return Ok(SelectItem::CountStar { alias });
        }
        let expr = self.expr()?;
        let alias = self.alias()?;
        Ok(SelectItem::Expr { expr, alias })
    }

    fn alias(&mut self) -> Result<Option<String>, DiagRecord> {
        if self.eat_keyword("AS") {
            return self.identifier().map(Some);
        }
        match self.peek() {
            Some(Token::Ident(s)) if !is_reserved(s) => {
                let alias = s.clone();
                self.pos += 1;
                Ok(Some(alias))
            }
            _ => Ok(None),
        }
    }

    fn where_clause(&mut self) -> Result<Vec<Predicate>, DiagRecord> {
        let mut filter = Vec::new();
        if !self.eat_keyword("WHERE") {
            return Ok(filter);
        }
        loop {
            let column = self.identifier()?;
            let (op, value) = if self.eat_keyword("IS") {
                if self.eat_keyword("NOT") {
                    self.expect_keyword("NULL")?;
                    (CmpOp::IsNotNull, None)
                } else {
                    self.expect_keyword("NULL")?;
                    (CmpOp::IsNull, None)
                }
            } else {
                let op = match self.next() {
                    Some(Token::Symbol("=")) => CmpOp::Eq,
                    Some(Token::Symbol("<>")) => CmpOp::Ne,
                    Some(Token::Symbol("<")) => CmpOp::Lt,
                    Some(Token::Symbol("<=")) => CmpOp::Le,
                    Some(Token::Symbol(">")) => CmpOp::Gt,
                    Some(Token::Symbol(">=")) => CmpOp::Ge,
                    _ => return Err(syntax_error("expected a comparison operator")),
                };
                (op, Some(self.expr()?))
            };
            filter.push(Predicate { column, op, value });
            if !self.eat_keyword("AND") {
                break;
            }
        }
        Ok(filter)
    }

    fn update(&mut self) -> Result<Statement, DiagRecord> {
        let table = self.identifier()?;
        self.expect_keyword("SET")?;
        let mut assignments = Vec::new();
        loop {
            let column = self.identifier()?;
            self.expect_symbol("=")?;
            assignments.push((column, self.expr()?));
            if !self.eat_symbol(",") {
                break;
            }
        }
        let filter = self.where_clause()?;
        Ok(Statement::Update {
            table,
            assignments,
            filter,
        })
    }

    fn delete(&mut self) -> Result<Statement, DiagRecord> {
        self.expect_keyword("FROM")?;
        let table = self.identifier()?;
        let filter = self.where_clause()?;
        Ok(Statement::Delete { table, filter })
    }

    fn call(&mut self) -> Result<Statement, DiagRecord> {
        let procedure = self.identifier()?;
        let mut args = Vec::new();
        if self.eat_symbol("(") {
            if !self.eat_symbol(")") {
                loop {
                    args.push(self.expr()?);
                    if !self.eat_symbol(",") {
                        break;
                    }
                }
                self.expect_symbol(")")?;
            }
        }
        Ok(Statement::Call { procedure, args })
    }

    fn expr(&mut self) -> Result<Expr, DiagRecord> {
        match self.next() {
            Some(Token::Param(i)) => Ok(Expr::Param(i)),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::Text(s))),
            Some(Token::Number(n)) => number_literal(&n, false),
            Some(Token::Symbol("-")) => match self.next() {
                Some(Token::Number(n)) => number_literal(&n, true),
                _ => Err(syntax_error("expected a number after '-'")),
            },
            Some(Token::Ident(s)) if s.eq_ignore_ascii_case("NULL") => {
                Ok(Expr::Literal(Value::Null))
            }
            Some(Token::Ident(s)) if s.eq_ignore_ascii_case("TRUE") => {
                Ok(Expr::Literal(Value::Bit(true)))
            }
            Some(Token::Ident(s)) if s.eq_ignore_ascii_case("FALSE") => {
                Ok(Expr::Literal(Value::Bit(false)))
            }
            Some(Token::Ident(s)) => Ok(Expr::Column(s)),
            _ => {
                self.pos = self.pos.saturating_sub(1);
                Err(self.unexpected("an expression"))
            }
        }
    }
}

fn is_reserved(word: &str) -> bool {
    const RESERVED: &[&str] = &["FROM", "WHERE", "ORDER", "AND", "AS", "BY", "ASC", "DESC"];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(word))
}

fn number_literal(text: &str, negative: bool) -> Result<Expr, DiagRecord> {
    let signed = if negative {
        format!("-{}", text)
    } else {
        text.to_string()
    };
    if text.contains('.') {
        return signed
            .parse::<f64>()
            .map(|f| Expr::Literal(Value::Double(f)))
            .map_err(|_| syntax_error(format!("invalid number '{}'", signed)));
    }
    let wide = signed
        .parse::<i64>()
        .map_err(|_| syntax_error(format!("invalid number '{}'", signed)))?;
    Ok(Expr::Literal(match i32::try_from(wide) {
        Ok(v) => Value::Integer(v),
        Err(_) => Value::BigInt(wide),
    }))
}

fn column_type(name: &str, args: &[usize]) -> Result<SqlType, DiagRecord> {
    let size = |default: usize| args.first().copied().unwrap_or(default);
    Ok(match name {
        "BIT" | "BOOLEAN" => SqlType::Bit,
        "TINYINT" => SqlType::TinyInt,
        "SMALLINT" => SqlType::SmallInt,
        "INT" | "INTEGER" => SqlType::Integer,
        "BIGINT" => SqlType::BigInt,
        "REAL" => SqlType::Real,
        "FLOAT" | "DOUBLE" => SqlType::Double,
        "DECIMAL" | "NUMERIC" => {
            let precision = size(18);
            let scale = args.get(1).copied().unwrap_or(0) as i16;
            if name == "DECIMAL" {
                SqlType::Decimal { precision, scale }
            } else {
                SqlType::Numeric { precision, scale }
            }
        }
        "CHAR" => SqlType::Char { size: size(1) },
        "VARCHAR" => SqlType::VarChar { size: size(255) },
        "TEXT" | "CLOB" => SqlType::LongVarChar,
        "BINARY" => SqlType::Binary { size: size(1) },
        "VARBINARY" => SqlType::VarBinary { size: size(255) },
        "BLOB" => SqlType::LongVarBinary,
        "DATE" => SqlType::Date,
        "TIME" => SqlType::Time,
        "TIMESTAMP" | "DATETIME" => SqlType::Timestamp { precision: 6 },
        other => return Err(syntax_error(format!("unknown data type '{}'", other))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_create_table() {
        let batch =
            parse_batch("CREATE TABLE t (id INT PRIMARY KEY, name VARCHAR(10) NOT NULL, d DECIMAL(9,2))")
                .unwrap();
        let Statement::CreateTable { name, columns } = &batch.statements[0] else {
            panic!("expected CREATE TABLE");
        };
        assert_eq!(name, "t");
        assert_eq!(columns.len(), 3);
        assert!(columns[0].primary_key);
        assert!(!columns[1].nullable);
        assert_eq!(columns[1].sql_type, SqlType::VarChar { size: 10 });
        assert_eq!(
            columns[2].sql_type,
            SqlType::Decimal {
                precision: 9,
                scale: 2
            }
        );
    }

    #[test]
    fn test_params_numbered_across_batch() {
        let batch = parse_batch("INSERT INTO t VALUES (?, ?); SELECT * FROM t WHERE id > ?").unwrap();
        assert_eq!(batch.statements.len(), 2);
        assert_eq!(batch.param_count, 3);
        let targets = batch.param_targets();
        assert_eq!(
            targets[1],
            ParamTarget::Position {
                table: "t".into(),
                position: 1
            }
        );
        assert_eq!(
            targets[2],
            ParamTarget::Column {
                table: "t".into(),
                column: "id".into()
            }
        );
    }

    #[test]
    fn test_parse_select_clauses() {
        let batch = parse_batch(
            "select id, name as n, 'x' from t where id >= -3 and name is not null order by id desc",
        )
        .unwrap();
        let Statement::Select {
            items,
            from,
            filter,
            order_by,
        } = &batch.statements[0]
        else {
            panic!("expected SELECT");
        };
        assert_eq!(items.len(), 3);
        assert_eq!(from.as_deref(), Some("t"));
        assert_eq!(filter[0].value, Some(Expr::Literal(Value::Integer(-3))));
        assert_eq!(filter[1].op, CmpOp::IsNotNull);
        assert!(order_by[0].descending);
    }

    #[test]
    fn test_string_literal_escape() {
        let batch = parse_batch("SELECT 'it''s'").unwrap();
        let Statement::Select { items, .. } = &batch.statements[0] else {
            panic!("expected SELECT");
        };
        assert_eq!(
            items[0],
            SelectItem::Expr {
                expr: Expr::Literal(Value::Text("it's".into())),
                alias: None
            }
        );
    }

    #[test]
    fn test_table_parameter_insert() {
        let batch = parse_batch("INSERT INTO t SELECT * FROM ?").unwrap();
        assert_eq!(batch.param_targets(), vec![ParamTarget::Table]);
    }

    #[test]
    fn test_syntax_errors() {
        assert_eq!(parse_batch("SELEC 1").unwrap_err().state, "42000");
        assert!(parse_batch("CREATE TABLE t (id WIDGET)").is_err());
        assert!(parse_batch("SELECT 'open").is_err());
        assert!(parse_batch("   ").is_err());
    }
}
