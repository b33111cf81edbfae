use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use sortie_agent::{Config, Supervisor};
use sortie_control::state::AppState;
use sortie_control::{logging, routes, watchdog};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = Config::default_path();
    let config = Config::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    let _log_guard = logging::init(std::path::Path::new("logs"), config.app.debug)?;
    tracing::info!(config = %config_path.display(), "configuration loaded");
    if config.users.is_empty() {
        tracing::warn!("no users configured; every API request will be rejected");
    }

    let supervisor = Arc::new(Supervisor::from_config(&config).context("resolving DCS paths")?);
    let _watchdog = watchdog::spawn(supervisor.clone(), watchdog::WATCHDOG_TICK);

    let app = routes::router(AppState::new(supervisor, config.users.clone()));

    let addr: SocketAddr = format!("{}:{}", config.app.host, config.app.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.app.host, config.app.port))?;
    tracing::info!(%addr, "sortie-control HTTP listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await?;

    Ok(())
}
