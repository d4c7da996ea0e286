//! In-memory connector for tests.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use common::config::AppConfig;
use common::errors::{AppError, AppResult};
use common::models::Row;

use crate::connector::{Connector, TableReader};
use crate::query::{CompareOp, Predicate, Projection, SelectQuery, SqlValue};

pub const API_KEY: &str = "K";

pub fn config() -> AppConfig {
    AppConfig::from_lookup("data-service", |key| match key {
        "API_KEY" => Some(API_KEY.to_string()),
        _ => None,
    })
    .expect("test config")
}

#[derive(Default)]
struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

/// Databases held in memory, with counters for opened and closed connections.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    databases: Arc<HashMap<String, HashMap<String, Table>>>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    last_sql: Arc<Mutex<Option<String>>>,
}

impl MemoryConnector {
    pub fn opened(&self) -> usize {
        self.opened.load(AtomicOrdering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(AtomicOrdering::SeqCst)
    }

    /// Statement text of the most recent SELECT.
    pub fn last_sql(&self) -> Option<String> {
        self.last_sql.lock().unwrap().clone()
    }
}

/// Database `shop` with `customers` (keyed by `id_unique`) and 15 `orders`.
pub fn sample_connector() -> MemoryConnector {
    let customers = Table {
        columns: vec!["id_unique".into(), "name".into(), "city".into()],
        rows: vec![
            row(json!({"id_unique": "x1", "name": "Alice", "city": "Paris"})),
            row(json!({"id_unique": "x2", "name": "Bob", "city": null})),
        ],
    };
    let orders = Table {
        columns: vec!["id".into(), "amount".into(), "customer".into()],
        rows: (0..15)
            .map(|i| row(json!({"id": i + 1, "amount": i, "customer": "x1"})))
            .collect(),
    };

    let shop = HashMap::from([("customers".to_string(), customers), ("orders".to_string(), orders)]);
    MemoryConnector {
        databases: Arc::new(HashMap::from([("shop".to_string(), shop)])),
        ..Default::default()
    }
}

fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, db_name: &str) -> AppResult<Box<dyn TableReader>> {
        if !self.databases.contains_key(db_name) {
            return Err(AppError::DatabaseConnection(format!(
                "Unknown database '{db_name}'"
            )));
        }
        self.opened.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(Box::new(MemoryReader {
            connector: self.clone(),
            db_name: db_name.to_string(),
        }))
    }
}

struct MemoryReader {
    connector: MemoryConnector,
    db_name: String,
}

impl MemoryReader {
    fn table(&self, name: &str) -> AppResult<&Table> {
        self.connector
            .databases
            .get(&self.db_name)
            .and_then(|tables| tables.get(name))
            .ok_or_else(|| AppError::DatabaseQuery(format!("Table '{name}' doesn't exist")))
    }

    fn select(&self, query: &SelectQuery) -> AppResult<Vec<Row>> {
        *self.connector.last_sql.lock().unwrap() = Some(query.to_sql().0);
        let table = self.table(&query.table)?;
        let limit = query.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        Ok(table
            .rows
            .iter()
            .filter(|r| query.predicate.as_ref().map_or(true, |p| matches(p, r)))
            .take(limit)
            .map(|r| project(&query.projection, r))
            .collect())
    }
}

#[async_trait]
impl TableReader for MemoryReader {
    async fn table_columns(&mut self, table: &str) -> AppResult<Vec<String>> {
        Ok(self.table(table).map(|t| t.columns.clone()).unwrap_or_default())
    }

    async fn fetch_all(&mut self, query: &SelectQuery) -> AppResult<Vec<Row>> {
        self.select(query)
    }

    async fn fetch_optional(&mut self, query: &SelectQuery) -> AppResult<Option<Row>> {
        Ok(self.select(query)?.into_iter().next())
    }

    async fn close(self: Box<Self>) -> AppResult<()> {
        self.connector.closed.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(())
    }
}

fn project(projection: &Projection, row: &Row) -> Row {
    match projection {
        Projection::All => row.clone(),
        Projection::Columns(columns) => columns
            .iter()
            .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null)))
            .collect(),
    }
}

fn to_json(value: &SqlValue) -> Value {
    match value {
        SqlValue::Text(s) => json!(s),
        SqlValue::Int(i) => json!(i),
        SqlValue::Float(f) => json!(f),
        SqlValue::Bool(b) => json!(b),
    }
}

fn compare(left: &Value, right: &SqlValue) -> Option<Ordering> {
    match (left, to_json(right)) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.as_str().cmp(b.as_str())),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(&b)),
        _ => None,
    }
}

fn matches(predicate: &Predicate, row: &Row) -> bool {
    let cell = |column: &str| row.get(column).cloned().unwrap_or(Value::Null);
    match predicate {
        Predicate::Compare { column, op, value } => {
            let Some(ordering) = compare(&cell(column), value) else {
                return false;
            };
            match op {
                CompareOp::Eq => ordering == Ordering::Equal,
                CompareOp::Ne => ordering != Ordering::Equal,
                CompareOp::Lt => ordering == Ordering::Less,
                CompareOp::Le => ordering != Ordering::Greater,
                CompareOp::Gt => ordering == Ordering::Greater,
                CompareOp::Ge => ordering != Ordering::Less,
            }
        }
        Predicate::Like {
            column,
            pattern,
            negated,
        } => {
            let text = cell(column).as_str().unwrap_or_default().to_string();
            let hit = match (pattern.strip_prefix('%'), pattern.strip_suffix('%')) {
                (Some(rest), _) if rest.ends_with('%') => text.contains(&rest[..rest.len() - 1]),
                (Some(suffix), _) => text.ends_with(suffix),
                (None, Some(prefix)) => text.starts_with(prefix),
                (None, None) => text == *pattern,
            };
            hit != *negated
        }
        Predicate::In {
            column,
            values,
            negated,
        } => {
            let value = cell(column);
            let hit = values
                .iter()
                .any(|v| compare(&value, v) == Some(Ordering::Equal));
            hit != *negated
        }
        Predicate::Between {
            column,
            low,
            high,
            negated,
        } => {
            let value = cell(column);
            let hit = compare(&value, low).is_some_and(|o| o != Ordering::Less)
                && compare(&value, high).is_some_and(|o| o != Ordering::Greater);
            hit != *negated
        }
        Predicate::IsNull { column, negated } => cell(column).is_null() != *negated,
        Predicate::And(a, b) => matches(a, row) && matches(b, row),
        Predicate::Or(a, b) => matches(a, row) || matches(b, row),
        Predicate::Not(inner) => !matches(inner, row),
    }
}
