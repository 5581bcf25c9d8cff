//! # device-access-approval
//!
//! Entry point for the device access approval server.

#![forbid(unsafe_code)]

use da_core::AppConfig;
use da_server::Server;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return Err(e.into());
        }
    };

    tracing::info!(
        issuer = %config.issuer_entity_id,
        login_url = %config.login_url,
        "device access approval starting"
    );

    Server::new(config)?.run().await
}
