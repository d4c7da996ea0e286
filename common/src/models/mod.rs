//! Shared data models.

pub mod data;

// Re-export commonly used types
pub use data::{ItemQuery, Row, TableDataQuery};
