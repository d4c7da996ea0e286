//! Middleware components.

pub mod auth;
pub mod request_id;

// Re-export commonly used types
pub use auth::api_key_middleware;
pub use request_id::{request_id_middleware, RequestId, REQUEST_ID_HEADER};
