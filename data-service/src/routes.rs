//! Route table.

use axum::{middleware, routing::get, Router};

use common::middleware::api_key_middleware;

use crate::handlers;
use crate::state::AppState;

/// Builds the service routes. Data routes sit behind the API key guard.
pub fn router(state: &AppState) -> Router<AppState> {
    let data = Router::new()
        .route("/data/{table}", get(handlers::get_table_data))
        .route("/data/{table}/{id_unique}", get(handlers::get_item))
        .route_layer(middleware::from_fn_with_state(
            state.config.api_key.clone(),
            api_key_middleware,
        ));

    Router::new()
        .merge(data)
        .route("/api/health", get(handlers::health_check))
}
