//! API error envelope.
//!
//! Successful data responses are plain JSON rows; failures are wrapped in
//! [`ErrorResponse`] so clients always receive a code and a message.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Body of every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Always `false`.
    pub success: bool,

    /// Error details.
    pub error: ApiError,

    /// Response metadata.
    pub meta: ResponseMeta,
}

/// API error details.
#[derive(Debug, Serialize)]
pub struct ApiError {
    /// Error code for client handling (e.g. "UNAUTHORIZED", "TABLE_NOT_FOUND").
    pub code: String,

    /// Human-readable error message.
    pub message: String,
}

/// Response metadata.
#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    /// Response timestamp.
    pub timestamp: DateTime<Utc>,
}

impl Default for ResponseMeta {
    fn default() -> Self {
        Self {
            timestamp: Utc::now(),
        }
    }
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: ApiError {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_envelope_shape() {
        let json =
            serde_json::to_value(ErrorResponse::new("NOT_FOUND", "table not found: t")).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "NOT_FOUND");
        assert_eq!(json["error"]["message"], "table not found: t");
        assert!(json.get("data").is_none());
        assert!(json["meta"]["timestamp"].is_string());
    }
}
