//! Application state for the data service.

use std::sync::Arc;

use common::config::AppConfig;

use crate::connector::{Connector, MySqlConnector};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub connector: Arc<dyn Connector>,
}

impl AppState {
    /// Creates the application state backed by the configured MySQL server.
    pub fn new(config: AppConfig) -> Self {
        let connector = Arc::new(MySqlConnector::new(&config.database));
        Self::with_connector(config, connector)
    }

    /// Creates the application state around an existing connector.
    pub fn with_connector(config: AppConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config: Arc::new(config),
            connector,
        }
    }
}
