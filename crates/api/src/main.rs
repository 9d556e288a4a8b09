use anyhow::Context;
use tracing::{debug, info};

use profilehub_api::app::{AppConfig, build_app};
use profilehub_infra::{Settings, config::load_dotenv, prepare_store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = load_dotenv();
    profilehub_observability::init();
    if let Some(path) = dotenv {
        debug!(path = %path.display(), "loaded .env");
    }

    let settings = Settings::from_env().context("invalid configuration")?;
    info!(environment = ?settings.environment, "starting profilehub-api");

    let store = prepare_store(&settings)
        .await
        .context("failed to prepare the store")?;

    let app = build_app(AppConfig::from_settings(&settings), store);

    let listener = tokio::net::TcpListener::bind(settings.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_addr))?;

    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
