//! Error taxonomy shared by all handlers.
//!
//! Every failure maps onto one HTTP status and a JSON error envelope.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use validator::ValidationErrors;

use crate::response::ErrorResponse;

/// Result alias used across the workspace.
pub type AppResult<T> = Result<T, AppError>;

/// Application errors.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or mismatching API key.
    #[error("invalid or missing API key")]
    Unauthorized,

    /// A required request parameter is absent.
    #[error("missing required parameter: {0}")]
    MissingParameter(String),

    /// Request parameters failed validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// A database, table or column name is not acceptable.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// A requested column does not exist in the table.
    #[error("unknown column `{column}` in table `{table}`")]
    UnknownColumn { table: String, column: String },

    /// The filter expression could not be parsed.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// The table does not exist in the target database.
    #[error("table not found: {0}")]
    TableNotFound(String),

    /// No row carries the requested identifier.
    #[error("item not found: {0}")]
    RowNotFound(String),

    /// Opening the database connection failed.
    #[error("database connection error: {0}")]
    DatabaseConnection(String),

    /// A statement failed while executing or decoding.
    #[error("database query error: {0}")]
    DatabaseQuery(String),

    /// Invalid or incomplete configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::MissingParameter(_)
            | AppError::Validation(_)
            | AppError::InvalidIdentifier(_)
            | AppError::UnknownColumn { .. }
            | AppError::InvalidFilter(_) => StatusCode::BAD_REQUEST,
            AppError::TableNotFound(_) | AppError::RowNotFound(_) => StatusCode::NOT_FOUND,
            AppError::DatabaseConnection(_)
            | AppError::DatabaseQuery(_)
            | AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code carried in the envelope.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::MissingParameter(_) => "MISSING_PARAMETER",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::InvalidIdentifier(_) => "INVALID_IDENTIFIER",
            AppError::UnknownColumn { .. } => "UNKNOWN_COLUMN",
            AppError::InvalidFilter(_) => "INVALID_FILTER",
            AppError::TableNotFound(_) => "TABLE_NOT_FOUND",
            AppError::RowNotFound(_) => "NOT_FOUND",
            AppError::DatabaseConnection(_) | AppError::DatabaseQuery(_) => "DATABASE_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let field_errors = errors.field_errors();
        let mut fields: Vec<_> = field_errors.iter().collect();
        fields.sort_by(|a, b| a.0.cmp(b.0));

        let message = fields
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(msg) => msg.to_string(),
                    None => format!("{field} is invalid"),
                })
            })
            .collect::<Vec<_>>()
            .join("; ");
        AppError::Validation(message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        } else {
            tracing::debug!(code = self.code(), error = %self, "request rejected");
        }
        let body = ErrorResponse::new(self.code(), self.to_string());
        (status, Json(body)).into_response()
    }
}
