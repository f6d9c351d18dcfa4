use std::sync::Arc;

use anyhow::Context;

use addressbook_infra::AppConfig;
use addressbook_observability::LogFormat;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    addressbook_observability::init(LogFormat::from_env());

    let config = AppConfig::from_env().context("invalid configuration")?;
    if config.tokens.secret.is_none() {
        tracing::warn!("JWT_SECRET not set; login and token validation will fail");
    }

    let services = addressbook_api::app::services::build_services(&config)
        .await
        .context("failed to initialize stores")?;
    let app = addressbook_api::app::build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
