use std::net::SocketAddr;

use fulfillment::{
    AppState, build_router,
    config::Config,
    error::Result,
    infrastructure::{cache::Cache, db::Database},
    services::scheduler,
    utils::server::{init_tracing, shutdown_signal},
};
use tokio::{net::TcpListener, sync::watch};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    let config = Config::from_env()?;
    config.validate()?;
    tracing::info!("Configuration loaded");

    let db = Database::init_db(&config.database).await?;
    tracing::info!("Database initialized");

    db.run_migrations().await?;
    tracing::info!("Migrations completed");

    let cache = Cache::init(&config).await?;
    tracing::info!(shared = cache.redis.is_some(), "Cache initialized");

    let state = AppState::assemble(config.clone(), db, cache)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_handle = if config.scheduler.enabled {
        Some(scheduler::spawn(state.clone(), shutdown_rx))
    } else {
        tracing::info!("Scheduler disabled");
        None
    };

    let app = build_router(state);

    let server_addr = format!("{}:{}", config.server.host, config.server.port);

    let listener = TcpListener::bind(server_addr).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown_tx))
    .await?;

    if let Some(handle) = scheduler_handle
        && let Err(err) = handle.await
    {
        tracing::error!(error = %err, "Scheduler task ended abnormally");
    }
    tracing::info!("Server shutdown complete");

    Ok(())
}
