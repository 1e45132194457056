//! Shared application state for the Axum API server.

use std::sync::Arc;

use sqlx::PgPool;

use courier_common::config::AppConfig;
use courier_gateway::HttpProviderGateway;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub gateway: Arc<HttpProviderGateway>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(pool: PgPool, gateway: HttpProviderGateway, config: AppConfig) -> Self {
        Self {
            pool,
            gateway: Arc::new(gateway),
            config,
        }
    }
}
