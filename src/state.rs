use sqlx::PgPool;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::weclapp::WeclappClient;

/// Shared handles cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub weclapp: Arc<WeclappClient>,
}

impl AppState {
    pub fn new(pool: PgPool, config: AppConfig, weclapp: WeclappClient) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            weclapp: Arc::new(weclapp),
        }
    }
}
