//! salon-gateway server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints.

use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use salon_gateway::api;
use salon_gateway::app_state::AppState;
use salon_gateway::config::{LogFormat, MarketConfig};
use salon_gateway::persistence::PostgresPersistence;
use salon_gateway::service::event_recorder::{spawn_cleanup, spawn_recorder};

/// How often expired idempotency keys are dropped.
const IDEMPOTENCY_PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config =
        MarketConfig::from_env().map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, persistence = config.persistence_enabled, "starting salon-gateway");

    // Connect persistence
    let persistence = if config.persistence_enabled {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await
            .context("connecting to PostgreSQL")?;
        let persistence = PostgresPersistence::new(pool);
        persistence
            .migrate()
            .await
            .context("running migrations")?;
        Some(persistence)
    } else {
        None
    };

    // Build application state
    let app_state = AppState::new(&config, persistence.clone());
    app_state
        .hydrate()
        .await
        .context("loading stored documents")?;

    // Background tasks
    let _purger = app_state
        .idempotency
        .spawn_purger(IDEMPOTENCY_PURGE_INTERVAL);
    if let Some(persistence) = persistence {
        if config.event_log_enabled {
            let _recorder = spawn_recorder(&app_state.event_bus, persistence.clone());
        }
        if config.cleanup_after_days > 0 {
            let _cleanup = spawn_cleanup(persistence, config.cleanup_after_days);
        }
    }

    // Build router
    let app = api::build_app(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
