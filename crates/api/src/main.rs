//! Contendo calendar core - service entry point

use std::net::SocketAddr;

use contendo_api::{build_router, AppContext};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging FIRST so .env loading is visible.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match dotenvy::dotenv() {
        Ok(path) => tracing::info!(path = %path.display(), "loaded .env"),
        Err(_) => tracing::debug!("no .env file found"),
    }

    let config = contendo_infra::config::load()?;
    let bind_addr: SocketAddr = config.server.bind_addr.parse()?;

    let ctx = AppContext::new(config)?;
    let app = build_router(ctx);

    tracing::info!(%bind_addr, "starting contendo api");
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
