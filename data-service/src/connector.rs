//! Per-request database connections.
//!
//! A [`Connector`] opens one connection to a caller-chosen database; the
//! returned [`TableReader`] answers schema lookups and SELECTs on it and is
//! closed by the caller when the request is done.

use async_trait::async_trait;
use base64::Engine;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::{json, Value};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{Column, Connection, Row as _, TypeInfo};

use common::config::DatabaseConfig;
use common::errors::{AppError, AppResult};
use common::models::Row;

use crate::query::{SelectQuery, SqlValue, TableSchema};

/// Opens connections to a named database.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connects to `db_name`.
    async fn connect(&self, db_name: &str) -> AppResult<Box<dyn TableReader>>;
}

/// Read operations over one open connection.
#[async_trait]
pub trait TableReader: Send {
    /// Column names of `table` in ordinal order; empty when the table is absent.
    async fn table_columns(&mut self, table: &str) -> AppResult<Vec<String>>;

    /// Runs `query` and returns every row.
    async fn fetch_all(&mut self, query: &SelectQuery) -> AppResult<Vec<Row>>;

    /// Runs `query` and returns the first row, if any.
    async fn fetch_optional(&mut self, query: &SelectQuery) -> AppResult<Option<Row>>;

    /// Closes the connection.
    async fn close(self: Box<Self>) -> AppResult<()>;
}

/// Reads the schema of `table`, or `None` if it does not exist.
pub async fn load_schema(
    reader: &mut dyn TableReader,
    table: &str,
) -> AppResult<Option<TableSchema>> {
    let columns = reader.table_columns(table).await?;
    Ok((!columns.is_empty()).then(|| TableSchema::new(table, columns)))
}

/// Connector for a MySQL server.
pub struct MySqlConnector {
    options: MySqlConnectOptions,
}

impl MySqlConnector {
    /// Creates a connector from the configured server coordinates.
    pub fn new(config: &DatabaseConfig) -> Self {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password);
        Self { options }
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    async fn connect(&self, db_name: &str) -> AppResult<Box<dyn TableReader>> {
        let options = self.options.clone().database(db_name);
        let conn = MySqlConnection::connect_with(&options)
            .await
            .map_err(|e| AppError::DatabaseConnection(e.to_string()))?;
        tracing::debug!(db = %db_name, "database connection opened");
        Ok(Box::new(MySqlTableReader { conn }))
    }
}

/// [`TableReader`] backed by a single MySQL connection.
pub struct MySqlTableReader {
    conn: MySqlConnection,
}

impl MySqlTableReader {
    async fn run(&mut self, query: &SelectQuery) -> AppResult<Vec<MySqlRow>> {
        let (sql, params) = query.to_sql();
        tracing::debug!(sql = %sql, params = params.len(), "executing query");

        let mut statement = sqlx::query(&sql);
        for param in params {
            statement = match param {
                SqlValue::Text(s) => statement.bind(s),
                SqlValue::Int(i) => statement.bind(i),
                SqlValue::Float(f) => statement.bind(f),
                SqlValue::Bool(b) => statement.bind(b),
            };
        }
        statement
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| AppError::DatabaseQuery(e.to_string()))
    }
}

#[async_trait]
impl TableReader for MySqlTableReader {
    async fn table_columns(&mut self, table: &str) -> AppResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT CAST(`COLUMN_NAME` AS CHAR) AS column_name
             FROM information_schema.COLUMNS
             WHERE `TABLE_SCHEMA` = DATABASE() AND `TABLE_NAME` = ?
             ORDER BY `ORDINAL_POSITION`",
        )
        .bind(table)
        .fetch_all(&mut self.conn)
        .await
        .map_err(|e| AppError::DatabaseQuery(e.to_string()))?;

        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    async fn fetch_all(&mut self, query: &SelectQuery) -> AppResult<Vec<Row>> {
        self.run(query).await?.iter().map(row_to_json).collect()
    }

    async fn fetch_optional(&mut self, query: &SelectQuery) -> AppResult<Option<Row>> {
        self.run(query).await?.first().map(row_to_json).transpose()
    }

    async fn close(self: Box<Self>) -> AppResult<()> {
        self.conn
            .close()
            .await
            .map_err(|e| AppError::DatabaseConnection(e.to_string()))
    }
}

/// Converts a MySQL row into a JSON object keyed by column name.
fn row_to_json(row: &MySqlRow) -> AppResult<Row> {
    let mut json_row = Row::new();
    for column in row.columns() {
        let value = column_value(row, column.ordinal(), column.type_info().name())
            .map_err(|e| {
                AppError::DatabaseQuery(format!("failed to decode column {}: {}", column.name(), e))
            })?;
        json_row.insert(column.name().to_string(), value);
    }
    Ok(json_row)
}

/// How a MySQL column type is turned into JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Bool,
    Signed,
    Unsigned,
    Float,
    DateTime,
    Date,
    Time,
    Year,
    Json,
    Bytes,
    Text,
}

impl ColumnKind {
    fn of(type_name: &str) -> Self {
        match type_name {
            "BOOLEAN" => ColumnKind::Bool,
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => ColumnKind::Signed,
            "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
            | "BIGINT UNSIGNED" => ColumnKind::Unsigned,
            "FLOAT" | "DOUBLE" => ColumnKind::Float,
            "DATETIME" | "TIMESTAMP" => ColumnKind::DateTime,
            "DATE" => ColumnKind::Date,
            "TIME" => ColumnKind::Time,
            "YEAR" => ColumnKind::Year,
            "JSON" => ColumnKind::Json,
            "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT"
            | "GEOMETRY" => ColumnKind::Bytes,
            // DECIMAL, ENUM, SET and textual types arrive as text on the wire.
            _ => ColumnKind::Text,
        }
    }
}

fn column_value(row: &MySqlRow, index: usize, type_name: &str) -> Result<Value, sqlx::Error> {
    fn or_null<T>(value: Option<T>, f: impl FnOnce(T) -> Value) -> Value {
        value.map(f).unwrap_or(Value::Null)
    }

    let kind = ColumnKind::of(type_name);
    let value = match kind {
        ColumnKind::Bool => or_null(row.try_get::<Option<bool>, _>(index)?, Value::Bool),
        ColumnKind::Signed => or_null(row.try_get::<Option<i64>, _>(index)?, |v| json!(v)),
        ColumnKind::Unsigned => or_null(row.try_get::<Option<u64>, _>(index)?, |v| json!(v)),
        ColumnKind::Float => or_null(row.try_get::<Option<f64>, _>(index)?, |v| json!(v)),
        ColumnKind::DateTime => match row.try_get::<Option<NaiveDateTime>, _>(index) {
            Ok(v) => or_null(v, |v| Value::String(v.to_string())),
            Err(e) => raw_temporal(row, index, kind, e)?,
        },
        ColumnKind::Date => match row.try_get::<Option<NaiveDate>, _>(index) {
            Ok(v) => or_null(v, |v| Value::String(v.to_string())),
            Err(e) => raw_temporal(row, index, kind, e)?,
        },
        ColumnKind::Time => match row.try_get::<Option<NaiveTime>, _>(index) {
            Ok(v) => or_null(v, |v| Value::String(v.to_string())),
            Err(e) => raw_temporal(row, index, kind, e)?,
        },
        ColumnKind::Year => or_null(row.try_get_unchecked::<Option<u16>, _>(index)?, |v| json!(v)),
        ColumnKind::Json => row.try_get::<Option<Value>, _>(index)?.unwrap_or(Value::Null),
        // BIT and GEOMETRY are not accepted by the checked byte decoder.
        ColumnKind::Bytes => or_null(row.try_get_unchecked::<Option<Vec<u8>>, _>(index)?, |bytes| {
            Value::String(base64::engine::general_purpose::STANDARD.encode(bytes))
        }),
        ColumnKind::Text => {
            or_null(row.try_get_unchecked::<Option<String>, _>(index)?, Value::String)
        }
    };
    Ok(value)
}

/// Renders a temporal value chrono cannot represent, such as a zero date or
/// a TIME beyond 24 hours, from its wire bytes.
fn raw_temporal(
    row: &MySqlRow,
    index: usize,
    kind: ColumnKind,
    decode_error: sqlx::Error,
) -> Result<Value, sqlx::Error> {
    let Some(bytes) = row.try_get_unchecked::<Option<Vec<u8>>, _>(index)? else {
        return Ok(Value::Null);
    };
    format_temporal(kind, &bytes)
        .map(Value::String)
        .ok_or(decode_error)
}

/// Formats a DATE, DATETIME/TIMESTAMP or TIME value.
///
/// Prepared statements return the binary encoding: a length byte followed by
/// the date and time fields. Anything else is taken as the text encoding.
fn format_temporal(kind: ColumnKind, bytes: &[u8]) -> Option<String> {
    match bytes.split_first() {
        Some((&len, body)) if usize::from(len) == body.len() => match kind {
            ColumnKind::Date | ColumnKind::DateTime => format_binary_datetime(kind, body),
            ColumnKind::Time => format_binary_time(body),
            _ => None,
        },
        _ => std::str::from_utf8(bytes).ok().map(str::to_string),
    }
}

fn format_binary_datetime(kind: ColumnKind, body: &[u8]) -> Option<String> {
    let (year, month, day) = match body.len() {
        0 => (0, 0, 0),
        4 | 7 | 11 => (u16::from_le_bytes([body[0], body[1]]), body[2], body[3]),
        _ => return None,
    };
    let date = format!("{year:04}-{month:02}-{day:02}");
    if kind == ColumnKind::Date {
        return Some(date);
    }

    let (hour, minute, second) = if body.len() >= 7 {
        (body[4], body[5], body[6])
    } else {
        (0, 0, 0)
    };
    let mut text = format!("{date} {hour:02}:{minute:02}:{second:02}");
    if body.len() == 11 {
        let micros = u32::from_le_bytes([body[7], body[8], body[9], body[10]]);
        text.push_str(&format!(".{micros:06}"));
    }
    Some(text)
}

fn format_binary_time(body: &[u8]) -> Option<String> {
    if body.is_empty() {
        return Some("00:00:00".to_string());
    }
    if body.len() != 8 && body.len() != 12 {
        return None;
    }
    let sign = if body[0] == 1 { "-" } else { "" };
    let days = u32::from_le_bytes([body[1], body[2], body[3], body[4]]);
    let hours = days * 24 + u32::from(body[5]);
    let mut text = format!("{sign}{hours:02}:{:02}:{:02}", body[6], body[7]);
    if body.len() == 12 {
        let micros = u32::from_le_bytes([body[8], body[9], body[10], body[11]]);
        text.push_str(&format!(".{micros:06}"));
    }
    Some(text)
}
