use anyhow::Context;

use stockledger_api::app;
use stockledger_api::config::AppConfig;
use stockledger_observability::LogFormat;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logging first so configuration fallbacks are visible.
    let format = std::env::var("LOG_FORMAT")
        .map(|v| LogFormat::parse_lossy(&v))
        .unwrap_or_default();
    stockledger_observability::init_with(format);

    let config = AppConfig::from_env().context("invalid configuration")?;
    let services = app::services::build_services(&config).await?;
    let router = app::build_app(services);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        shortfall_policy = ?config.shortfall_policy,
        "listening"
    );

    axum::serve(listener, router).await?;
    Ok(())
}
