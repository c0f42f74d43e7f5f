use anyhow::Context;
use tokio::net::TcpListener;

use crate::config;
use crate::database::DatabaseManager;
use crate::routes;
use crate::state::AppState;

pub async fn handle(port: Option<u16>) -> anyhow::Result<()> {
    let config = config::config().clone();
    tracing::info!("Starting WeClapp Manager in {:?} mode", config.environment);

    if config.security.jwt_secret.is_empty() {
        tracing::warn!("JWT_SECRET is not set; every protected route will fail");
    }
    if config.weclapp.webhook_secret.is_empty() {
        tracing::warn!("WECLAPP_WEBHOOK_SECRET is not set; webhooks will be rejected");
    }

    // Lazy so the server comes up (and /health reports) without the database
    let pool = DatabaseManager::connect_lazy(&config.database).context("invalid database configuration")?;
    let client = super::weclapp_client(&config)?;
    if !client.is_configured() {
        tracing::warn!("WeClapp is not configured; sync and task writes will return 503");
    }

    let port = port.unwrap_or(config.api.port);
    let state = AppState::new(pool, config, client);
    let app = routes::app(state);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("WeClapp Manager listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
