//! Shared building blocks for the table gateway.
//!
//! Configuration, the error taxonomy, response envelopes, middleware and
//! request models used by the `data-service` binary.

pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod response;
pub mod utils;
