//! SELECT statement construction.
//!
//! Identifiers come from the table schema and are backtick-quoted; every
//! caller-supplied value is rendered as a `?` placeholder and returned
//! separately for binding.

use common::errors::{AppError, AppResult};
use common::utils::SqlValidator;

/// A value bound to a `?` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

/// Columns of one table, in ordinal order.
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<String>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Resolves a caller-supplied column name to the schema's spelling.
    ///
    /// MySQL column names are case-insensitive.
    pub fn resolve_column(&self, name: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }

    /// Like [`resolve_column`](Self::resolve_column) but fails with `UnknownColumn`.
    pub fn require_column(&self, name: &str) -> AppResult<&str> {
        self.resolve_column(name)
            .ok_or_else(|| AppError::UnknownColumn {
                table: self.name.clone(),
                column: name.to_string(),
            })
    }
}

/// Which columns a query returns.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    All,
    Columns(Vec<String>),
}

impl Projection {
    /// Builds a projection from a requested column list, checked against `schema`.
    pub fn from_request(requested: Option<Vec<&str>>, schema: &TableSchema) -> AppResult<Self> {
        let Some(requested) = requested else {
            return Ok(Projection::All);
        };
        let columns = requested
            .into_iter()
            .map(|name| schema.require_column(name).map(String::from))
            .collect::<AppResult<Vec<_>>>()?;
        Ok(Projection::Columns(columns))
    }
}

/// Comparison operators accepted in filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// A WHERE clause. Column names are already resolved against the schema.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        column: String,
        op: CompareOp,
        value: SqlValue,
    },
    Like {
        column: String,
        pattern: String,
        negated: bool,
    },
    In {
        column: String,
        values: Vec<SqlValue>,
        negated: bool,
    },
    Between {
        column: String,
        low: SqlValue,
        high: SqlValue,
        negated: bool,
    },
    IsNull {
        column: String,
        negated: bool,
    },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    /// `column = value`.
    pub fn equals(column: impl Into<String>, value: SqlValue) -> Self {
        Predicate::Compare {
            column: column.into(),
            op: CompareOp::Eq,
            value,
        }
    }

    fn render(&self, sql: &mut String, params: &mut Vec<SqlValue>) {
        let not = |negated: &bool| if *negated { "NOT " } else { "" };
        match self {
            Predicate::Compare { column, op, value } => {
                sql.push_str(&format!("{} {} ?", SqlValidator::quote_identifier(column), op.as_sql()));
                params.push(value.clone());
            }
            Predicate::Like {
                column,
                pattern,
                negated,
            } => {
                sql.push_str(&format!(
                    "{} {}LIKE ?",
                    SqlValidator::quote_identifier(column),
                    not(negated)
                ));
                params.push(SqlValue::Text(pattern.clone()));
            }
            Predicate::In {
                column,
                values,
                negated,
            } => {
                let placeholders = vec!["?"; values.len()].join(", ");
                sql.push_str(&format!(
                    "{} {}IN ({placeholders})",
                    SqlValidator::quote_identifier(column),
                    not(negated)
                ));
                params.extend(values.iter().cloned());
            }
            Predicate::Between {
                column,
                low,
                high,
                negated,
            } => {
                sql.push_str(&format!(
                    "{} {}BETWEEN ? AND ?",
                    SqlValidator::quote_identifier(column),
                    not(negated)
                ));
                params.push(low.clone());
                params.push(high.clone());
            }
            Predicate::IsNull { column, negated } => {
                sql.push_str(&format!(
                    "{} IS {}NULL",
                    SqlValidator::quote_identifier(column),
                    not(negated)
                ));
            }
            Predicate::And(left, right) | Predicate::Or(left, right) => {
                let joiner = if matches!(self, Predicate::And(..)) { " AND " } else { " OR " };
                sql.push('(');
                left.render(sql, params);
                sql.push_str(joiner);
                right.render(sql, params);
                sql.push(')');
            }
            Predicate::Not(inner) => {
                sql.push_str("NOT (");
                inner.render(sql, params);
                sql.push(')');
            }
        }
    }
}

/// A single-table SELECT.
#[derive(Debug, Clone)]
pub struct SelectQuery {
    pub table: String,
    pub projection: Projection,
    pub predicate: Option<Predicate>,
    pub limit: Option<u32>,
}

impl SelectQuery {
    /// Every column of `table`, no predicate, no limit.
    pub fn all_from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            projection: Projection::All,
            predicate: None,
            limit: None,
        }
    }

    /// Renders the statement text and the values to bind, in placeholder order.
    pub fn to_sql(&self) -> (String, Vec<SqlValue>) {
        let mut params = Vec::new();
        let columns = match &self.projection {
            Projection::All => "*".to_string(),
            Projection::Columns(cols) => cols
                .iter()
                .map(|c| SqlValidator::quote_identifier(c))
                .collect::<Vec<_>>()
                .join(", "),
        };

        let mut sql = format!(
            "SELECT {columns} FROM {}",
            SqlValidator::quote_identifier(&self.table)
        );
        if let Some(predicate) = &self.predicate {
            sql.push_str(" WHERE ");
            predicate.render(&mut sql, &mut params);
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        (sql, params)
    }
}
