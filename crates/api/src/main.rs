use std::time::Duration;

use anyhow::Context;

use pvz_api::app::routes::system::MetricsHandle;
use pvz_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pvz_observability::init();

    let config = AppConfig::from_env().context("failed to load configuration")?;
    tracing::info!(?config, "configuration loaded");

    let metrics = match pvz_observability::metrics::install() {
        Ok(handle) => {
            let upkeep = handle.clone();
            tokio::spawn(async move {
                let mut tick = tokio::time::interval(Duration::from_secs(5));
                loop {
                    tick.tick().await;
                    upkeep.run_upkeep();
                }
            });
            MetricsHandle(Some(handle))
        }
        Err(e) => {
            tracing::warn!(error = %e, "metrics disabled");
            MetricsHandle(None)
        }
    };

    let app = pvz_api::app::build_app(&config, metrics)
        .await
        .context("failed to initialise storage")?;

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("failed to bind 0.0.0.0:{}", config.port))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "unable to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
