//! Native SQL expressions and their rendering.
//!
//! Everything a predicate is lowered into lives here: columns, constants,
//! bind parameters, function calls, binary operators and the case-insensitive
//! pattern match. A [`SelectExpression`] collects the lowered filter steps of
//! one query and renders them, together with ordering and limit, into a
//! [`Statement`] for a given [`Dialect`].

use std::fmt::Write;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::datatype::Value;
use crate::error::{Result, WherewithError};

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Sqlite,
    Postgres,
    /// Plain ANSI SQL, which has no case-insensitive pattern operator.
    Ansi,
}

impl Dialect {
    fn placeholder(&self, position: usize) -> String {
        match self {
            Dialect::Sqlite => format!("?{}", position),
            Dialect::Postgres | Dialect::Ansi => format!("${}", position),
        }
    }
    /// The operator that matches a pattern ignoring case, if the dialect has one.
    pub fn case_insensitive_like(&self) -> Option<&'static str> {
        match self {
            Dialect::Postgres => Some("ILIKE"),
            // LIKE in SQLite folds ASCII case unless case_sensitive_like is set
            Dialect::Sqlite => Some("LIKE"),
            Dialect::Ansi => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SqlOperator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    And,
    Or,
    Concat,
}

impl SqlOperator {
    fn token(&self) -> &'static str {
        match self {
            SqlOperator::Equal => "=",
            SqlOperator::NotEqual => "<>",
            SqlOperator::LessThan => "<",
            SqlOperator::LessThanOrEqual => "<=",
            SqlOperator::GreaterThan => ">",
            SqlOperator::GreaterThanOrEqual => ">=",
            SqlOperator::And => "AND",
            SqlOperator::Or => "OR",
            SqlOperator::Concat => "||",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SqlExpr {
    Column { table: Arc<str>, name: Arc<str> },
    Constant(Value),
    Parameter { name: Arc<str>, value: Value },
    Function { name: Arc<str>, arguments: Vec<SqlExpr> },
    Binary { op: SqlOperator, left: Box<SqlExpr>, right: Box<SqlExpr> },
    /// `AND` or `OR` over any number of operands.
    Junction { op: SqlOperator, operands: Vec<SqlExpr> },
    Not(Box<SqlExpr>),
    IsNull(Box<SqlExpr>),
    ILike { match_expr: Box<SqlExpr>, pattern: Box<SqlExpr>, escape: Option<Box<SqlExpr>> },
}

impl SqlExpr {
    pub fn is_constant(&self) -> bool {
        matches!(self, SqlExpr::Constant(_))
    }
    pub fn is_parameter(&self) -> bool {
        matches!(self, SqlExpr::Parameter { .. })
    }
}

// ------------- Factory -------------
/// Builds native expressions for one dialect. Pattern translators are tied to
/// the factory they were created with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SqlExpressionFactory {
    dialect: Dialect,
}

impl SqlExpressionFactory {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }
    pub fn column(&self, table: &str, name: &str) -> SqlExpr {
        SqlExpr::Column { table: Arc::from(table), name: Arc::from(name) }
    }
    pub fn constant(&self, value: impl Into<Value>) -> SqlExpr {
        SqlExpr::Constant(value.into())
    }
    pub fn parameter(&self, name: &str, value: Value) -> SqlExpr {
        SqlExpr::Parameter { name: Arc::from(name), value }
    }
    pub fn function(&self, name: &str, arguments: Vec<SqlExpr>) -> SqlExpr {
        SqlExpr::Function { name: Arc::from(name), arguments }
    }
    pub fn binary(&self, op: SqlOperator, left: SqlExpr, right: SqlExpr) -> SqlExpr {
        match op {
            SqlOperator::And | SqlOperator::Or => self.junction(op, vec![left, right]),
            _ => SqlExpr::Binary { op, left: Box::new(left), right: Box::new(right) },
        }
    }
    /// `op` over all `operands`. Operands that are runs of the same operator
    /// are merged into this one.
    pub fn junction(&self, op: SqlOperator, operands: Vec<SqlExpr>) -> SqlExpr {
        let mut merged = Vec::with_capacity(operands.len());
        for operand in operands {
            match operand {
                SqlExpr::Junction { op: inner, operands } if inner == op => merged.extend(operands),
                other => merged.push(other),
            }
        }
        SqlExpr::Junction { op, operands: merged }
    }
    pub fn equal(&self, left: SqlExpr, right: SqlExpr) -> SqlExpr {
        self.binary(SqlOperator::Equal, left, right)
    }
    /// String concatenation.
    pub fn add(&self, left: SqlExpr, right: SqlExpr) -> SqlExpr {
        self.binary(SqlOperator::Concat, left, right)
    }
    pub fn not(&self, operand: SqlExpr) -> SqlExpr {
        SqlExpr::Not(Box::new(operand))
    }
    pub fn is_null(&self, operand: SqlExpr) -> SqlExpr {
        SqlExpr::IsNull(Box::new(operand))
    }
    pub fn ilike(&self, match_expr: SqlExpr, pattern: SqlExpr, escape: Option<SqlExpr>) -> SqlExpr {
        SqlExpr::ILike {
            match_expr: Box::new(match_expr),
            pattern: Box::new(pattern),
            escape: escape.map(Box::new),
        }
    }
}

// ------------- Statements -------------
#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub parameters: Vec<Value>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrderingExpression {
    pub expression: SqlExpr,
    pub descending: bool,
}

/// A single-table `SELECT` assembled from a query chain.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectExpression {
    pub table: &'static str,
    pub alias: &'static str,
    pub columns: &'static [&'static str],
    pub predicates: Vec<SqlExpr>,
    pub orderings: Vec<OrderingExpression>,
    pub limit: Option<usize>,
}

impl SelectExpression {
    pub fn render(&self, dialect: Dialect) -> Result<Statement> {
        let mut writer = SqlWriter::new(dialect);
        writer.push("SELECT ");
        if self.columns.is_empty() {
            writer.push("*");
        }
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                writer.push(", ");
            }
            writer.column(self.alias, column)?;
        }
        writer.push(" FROM ");
        writer.identifier(self.table)?;
        writer.push(" AS ");
        writer.alias(self.alias)?;
        for (i, predicate) in self.predicates.iter().enumerate() {
            writer.push(if i == 0 { " WHERE " } else { " AND " });
            writer.expr(predicate)?;
        }
        for (i, ordering) in self.orderings.iter().enumerate() {
            writer.push(if i == 0 { " ORDER BY " } else { ", " });
            writer.expr(&ordering.expression)?;
            if ordering.descending {
                writer.push(" DESC");
            }
        }
        if let Some(limit) = self.limit {
            writer.push(&format!(" LIMIT {}", limit));
        }
        Ok(writer.finish())
    }
}

// ------------- Rendering -------------
struct SqlWriter {
    dialect: Dialect,
    sql: String,
    parameters: Vec<Value>,
}

impl SqlWriter {
    fn new(dialect: Dialect) -> Self {
        Self { dialect, sql: String::new(), parameters: Vec::new() }
    }
    fn finish(self) -> Statement {
        Statement { sql: self.sql, parameters: self.parameters }
    }
    fn push(&mut self, s: &str) {
        self.sql.push_str(s);
    }
    fn identifier(&mut self, name: &str) -> Result<()> {
        if !IDENTIFIER.is_match(name) {
            return Err(WherewithError::Translation(format!("Invalid identifier '{}'", name)));
        }
        self.sql.push('"');
        self.sql.push_str(name);
        self.sql.push('"');
        Ok(())
    }
    fn alias(&mut self, alias: &str) -> Result<()> {
        if !IDENTIFIER.is_match(alias) {
            return Err(WherewithError::Translation(format!("Invalid table alias '{}'", alias)));
        }
        self.push(alias);
        Ok(())
    }
    fn column(&mut self, table: &str, name: &str) -> Result<()> {
        self.alias(table)?;
        self.push(".");
        self.identifier(name)
    }
    fn literal(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.push("NULL"),
            Value::Bool(true) => self.push("TRUE"),
            Value::Bool(false) => self.push("FALSE"),
            Value::Integer(i) => {
                let _ = write!(self.sql, "{}", i);
            }
            Value::Real(r) if r.is_finite() => {
                let _ = write!(self.sql, "{:?}", r);
            }
            Value::Real(r) => {
                return Err(WherewithError::Translation(format!("Non-finite constant {}", r)));
            }
            Value::Text(s) => {
                self.sql.push('\'');
                self.sql.push_str(&s.replace('\'', "''"));
                self.sql.push('\'');
            }
            Value::Uuid(u) => {
                let _ = write!(self.sql, "'{}'", u.hyphenated());
            }
        }
        Ok(())
    }
    // Operands that are themselves predicates get parentheses so that the
    // rendered text keeps the tree's grouping.
    fn operand(&mut self, expr: &SqlExpr) -> Result<()> {
        let wrap = matches!(
            expr,
            SqlExpr::Binary { op, .. } if *op != SqlOperator::Concat
        ) || matches!(expr, SqlExpr::ILike { .. } | SqlExpr::IsNull(_) | SqlExpr::Not(_));
        if wrap {
            self.push("(");
        }
        self.expr(expr)?;
        if wrap {
            self.push(")");
        }
        Ok(())
    }
    // comparisons bind tighter than AND/OR, so only the run itself needs
    // parentheses
    fn junction<'e>(&mut self, op: SqlOperator, operands: impl IntoIterator<Item = &'e SqlExpr>) -> Result<()> {
        self.push("(");
        let mut empty = true;
        for operand in operands {
            if !empty {
                let _ = write!(self.sql, " {} ", op.token());
            }
            self.expr(operand)?;
            empty = false;
        }
        if empty {
            return Err(WherewithError::Translation(format!("{} without operands", op.token())));
        }
        self.push(")");
        Ok(())
    }
    fn expr(&mut self, expr: &SqlExpr) -> Result<()> {
        match expr {
            SqlExpr::Column { table, name } => self.column(table, name)?,
            SqlExpr::Constant(value) => self.literal(value)?,
            SqlExpr::Parameter { value, .. } => {
                self.parameters.push(value.clone());
                let placeholder = self.dialect.placeholder(self.parameters.len());
                self.push(&placeholder);
            }
            SqlExpr::Function { name, arguments } => {
                if !IDENTIFIER.is_match(name) {
                    return Err(WherewithError::Translation(format!("Invalid function name '{}'", name)));
                }
                self.push(name);
                self.push("(");
                for (i, argument) in arguments.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.expr(argument)?;
                }
                self.push(")");
            }
            SqlExpr::Binary { op: op @ (SqlOperator::And | SqlOperator::Or), left, right } => {
                self.junction(*op, [&**left, &**right])?;
            }
            SqlExpr::Junction { op, operands } => self.junction(*op, operands)?,
            SqlExpr::Binary { op: SqlOperator::Concat, left, right } => {
                self.push("(");
                self.operand(left)?;
                self.push(" || ");
                self.operand(right)?;
                self.push(")");
            }
            SqlExpr::Binary { op, left, right } => {
                // x = NULL is never true in SQL
                match (op, right.as_ref()) {
                    (SqlOperator::Equal, SqlExpr::Constant(Value::Null)) => {
                        self.operand(left)?;
                        self.push(" IS NULL");
                    }
                    (SqlOperator::NotEqual, SqlExpr::Constant(Value::Null)) => {
                        self.operand(left)?;
                        self.push(" IS NOT NULL");
                    }
                    _ => {
                        self.operand(left)?;
                        let _ = write!(self.sql, " {} ", op.token());
                        self.operand(right)?;
                    }
                }
            }
            SqlExpr::Not(operand) => {
                self.push("NOT (");
                self.expr(operand)?;
                self.push(")");
            }
            SqlExpr::IsNull(operand) => {
                self.operand(operand)?;
                self.push(" IS NULL");
            }
            SqlExpr::ILike { match_expr, pattern, escape } => {
                let operator = self.dialect.case_insensitive_like().ok_or_else(|| {
                    WherewithError::Translation(format!(
                        "{:?} has no case-insensitive pattern operator",
                        self.dialect
                    ))
                })?;
                self.operand(match_expr)?;
                let _ = write!(self.sql, " {} ", operator);
                self.operand(pattern)?;
                if let Some(escape) = escape {
                    self.push(" ESCAPE ");
                    self.operand(escape)?;
                }
            }
        }
        Ok(())
    }
}
