//! Table data service.
//!
//! Each operation opens its own connection, resolves the table schema,
//! builds a SELECT from allow-listed identifiers and bound values, and closes
//! the connection again whatever the outcome.

use std::sync::Arc;

use common::config::AppConfig;
use common::errors::{AppError, AppResult};
use common::models::{ItemQuery, Row, TableDataQuery};
use common::utils::SqlValidator;

use crate::connector::{load_schema, Connector, TableReader};
use crate::filter::parse_filter;
use crate::query::{Predicate, Projection, SelectQuery, SqlValue, TableSchema};

/// Read-only access to the tables of any database on the configured server.
pub struct DataService {
    connector: Arc<dyn Connector>,
    filter_row_limit: u32,
    id_column: String,
}

impl DataService {
    /// Creates a new data service.
    pub fn new(connector: Arc<dyn Connector>, config: &AppConfig) -> Self {
        Self {
            connector,
            filter_row_limit: config.filter_row_limit,
            id_column: config.id_column.clone(),
        }
    }

    /// Lists rows of `table`.
    ///
    /// Without a filter every row is returned; with one the result is capped
    /// at the configured filter row limit.
    pub async fn list_rows(&self, table: &str, params: &TableDataQuery) -> AppResult<Vec<Row>> {
        let db_name = required_db_name(params.db_name.as_deref())?;
        SqlValidator::validate_identifier("table", table)?;

        let mut reader = self.connector.connect(db_name).await?;
        let outcome = self.select_rows(&mut *reader, table, params).await;
        release(reader, db_name).await;

        let rows = outcome?;
        tracing::info!(db = %db_name, table = %table, rows = rows.len(), "listed table rows");
        Ok(rows)
    }

    /// Fetches the row of `table` whose identifier column equals `id`.
    pub async fn get_item(&self, table: &str, id: &str, params: &ItemQuery) -> AppResult<Row> {
        let db_name = required_db_name(params.db_name.as_deref())?;
        SqlValidator::validate_identifier("table", table)?;

        let mut reader = self.connector.connect(db_name).await?;
        let outcome = self.select_item(&mut *reader, table, id).await;
        release(reader, db_name).await;

        let row = outcome?.ok_or_else(|| AppError::RowNotFound(id.to_string()))?;
        tracing::info!(db = %db_name, table = %table, "fetched item");
        Ok(row)
    }

    async fn select_rows(
        &self,
        reader: &mut dyn TableReader,
        table: &str,
        params: &TableDataQuery,
    ) -> AppResult<Vec<Row>> {
        let schema = require_table(reader, table).await?;
        let projection = Projection::from_request(params.column_list(), &schema)?;
        let predicate = params
            .filter_text()
            .map(|text| parse_filter(text, &schema))
            .transpose()?;
        let limit = predicate.as_ref().map(|_| self.filter_row_limit);

        let query = SelectQuery {
            table: schema.name,
            projection,
            predicate,
            limit,
        };
        reader.fetch_all(&query).await
    }

    async fn select_item(
        &self,
        reader: &mut dyn TableReader,
        table: &str,
        id: &str,
    ) -> AppResult<Option<Row>> {
        let schema = require_table(reader, table).await?;
        let id_column = schema.require_column(&self.id_column)?.to_string();

        let query = SelectQuery {
            predicate: Some(Predicate::equals(id_column, SqlValue::Text(id.to_string()))),
            limit: Some(1),
            ..SelectQuery::all_from(schema.name)
        };
        reader.fetch_optional(&query).await
    }
}

fn required_db_name(db_name: Option<&str>) -> AppResult<&str> {
    let db_name = db_name
        .filter(|name| !name.is_empty())
        .ok_or_else(|| AppError::MissingParameter("db_name".to_string()))?;
    SqlValidator::validate_identifier("database", db_name)?;
    Ok(db_name)
}

async fn require_table(reader: &mut dyn TableReader, table: &str) -> AppResult<TableSchema> {
    load_schema(reader, table)
        .await?
        .ok_or_else(|| AppError::TableNotFound(table.to_string()))
}

async fn release(reader: Box<dyn TableReader>, db_name: &str) {
    if let Err(e) = reader.close().await {
        tracing::warn!(db = %db_name, error = %e, "failed to close database connection");
    }
}
