//! Table data gateway
//!
//! Read-only HTTP access to the tables of a MySQL server:
//! - `GET /data/{table}` lists rows, with optional projection and filter
//! - `GET /data/{table}/{id_unique}` fetches one row by identifier
//!
//! Every data request carries the shared API key and names its database.

mod connector;
mod filter;
mod handlers;
mod query;
mod routes;
mod service;
mod state;
#[cfg(test)]
mod testing;

use axum::{
    body::Body,
    http::Request,
    middleware,
    routing::get,
    Json, Router,
};
use common::config::{load_dotenv, AppConfig};
use common::middleware::request_id::request_id_middleware;
use state::AppState;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;

const SERVICE_NAME: &str = "data-service";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Table data API",
        version = "0.1.0",
        description = "Read-only access to MySQL tables"
    ),
    paths(
        handlers::get_table_data,
        handlers::get_item,
        handlers::health_check,
    ),
    components(schemas(handlers::HealthResponse)),
    tags(
        (name = "data", description = "Table data endpoints"),
        (name = "health", description = "Health check endpoints")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (if present) before anything reads the environment.
    load_dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = AppConfig::load_with_service(SERVICE_NAME)?;
    let addr = config.bind_address();
    info!(
        db_host = %config.database.host,
        db_port = config.database.port,
        filter_row_limit = config.filter_row_limit,
        id_column = %config.id_column,
        "configuration loaded"
    );

    let app = create_router(AppState::new(config));

    info!(service = SERVICE_NAME, address = %addr, "starting service");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::router(&state))
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
            // The query string carries the API key and stays out of the span.
            tracing::info_span!("http", method = %req.method(), path = %req.uri().path())
        }))
        .layer(cors)
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
