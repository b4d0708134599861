//! Airtable proxy entry point

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use airtable_proxy::config::Config;
use airtable_proxy::services::AirtableClient;
use airtable_proxy::{AppState, build_app};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "airtable_proxy=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    tracing::info!("Starting Airtable proxy");

    let config = Arc::new(Config::from_env()?);
    tracing::info!(base_id = %config.airtable_base_id, "Configuration loaded");

    let client = AirtableClient::new(&config).context("Failed to initialize Airtable client")?;
    tracing::info!(api_url = %config.airtable_api_url, "Airtable client initialized");

    let state = AppState::new(config.clone(), Arc::new(client));
    let app = build_app(state);

    let ip = config.host.parse().context("Invalid HOST")?;
    let addr = SocketAddr::new(ip, config.port);
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
