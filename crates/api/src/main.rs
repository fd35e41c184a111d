use std::sync::Arc;

use anyhow::Context;

use medstock_api::app::{self, services::AppServices};
use medstock_infra::LedgerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    medstock_observability::init();

    let config = LedgerConfig::from_env().context("invalid configuration")?;
    let services = Arc::new(
        AppServices::build(&config)
            .await
            .context("failed to initialize ledger storage")?,
    );

    let app = app::build_app(services.clone());

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        persistent = config.is_persistent(),
        branches = config.branches.len(),
        "listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    services.shutdown().await;
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c; shutting down");
        return;
    }
    tracing::info!("shutdown signal received; draining connections");
}
