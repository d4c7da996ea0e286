//! HTTP handlers.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use validator::Validate;

use common::errors::AppError;
use common::models::{ItemQuery, Row, TableDataQuery};

use crate::service::DataService;
use crate::state::AppState;

/// List rows of a table
#[utoipa::path(
    get,
    path = "/data/{table}",
    tag = "data",
    params(
        ("table" = String, Path, description = "Table name"),
        ("api_key" = String, Query, description = "Shared API key"),
        TableDataQuery,
    ),
    responses(
        (status = 200, description = "Array of row objects"),
        (status = 400, description = "Missing db_name, unknown column or invalid filter"),
        (status = 401, description = "Invalid or missing API key"),
        (status = 404, description = "Table not found"),
        (status = 500, description = "Database error")
    )
)]
pub async fn get_table_data(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(params): Query<TableDataQuery>,
) -> Result<Json<Vec<Row>>, AppError> {
    params.validate()?;
    let service = DataService::new(state.connector.clone(), &state.config);
    let rows = service.list_rows(&table, &params).await?;
    Ok(Json(rows))
}

/// Fetch one row by its identifier
#[utoipa::path(
    get,
    path = "/data/{table}/{id_unique}",
    tag = "data",
    params(
        ("table" = String, Path, description = "Table name"),
        ("id_unique" = String, Path, description = "Value of the identifier column"),
        ("api_key" = String, Query, description = "Shared API key"),
        ItemQuery,
    ),
    responses(
        (status = 200, description = "Row object"),
        (status = 400, description = "Missing db_name or table without identifier column"),
        (status = 401, description = "Invalid or missing API key"),
        (status = 404, description = "Table or item not found"),
        (status = 500, description = "Database error")
    )
)]
pub async fn get_item(
    State(state): State<AppState>,
    Path((table, id_unique)): Path<(String, String)>,
    Query(params): Query<ItemQuery>,
) -> Result<Json<Row>, AppError> {
    params.validate()?;
    let service = DataService::new(state.connector.clone(), &state.config);
    let row = service.get_item(&table, &id_unique, &params).await?;
    Ok(Json(row))
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is running", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: state.config.service_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    })
}

/// Health check response
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service name
    pub service: String,
    /// Service version
    pub version: String,
    /// Current timestamp
    pub timestamp: DateTime<Utc>,
}
