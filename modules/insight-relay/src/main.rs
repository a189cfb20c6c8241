use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use insight_common::RelayConfig;
use insight_relay::{build_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::from_default_env().add_directive("insight=info".parse()?);
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = RelayConfig::from_env()?;
    let addr = config.bind_addr();
    let state = AppState::new(config).context("Failed to build HTTP client")?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Relay listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down relay");
        })
        .await?;

    Ok(())
}
