//! Standalone engine process.
//!
//! Configuration comes from `BINGO_*` environment variables (see
//! [`ServerConfig::from_env`]) and log filtering from `RUST_LOG`. The store
//! and the command bus are the in-process implementations, so this binary
//! suits local development and single-node deployments.

use std::sync::Arc;

use bingo::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;
    tracing::info!(
        bind = %config.bind_addr,
        service = %config.service_name,
        grace = ?config.session.disconnect_grace,
        "starting bingo engine"
    );

    let server = BingoServerBuilder::new()
        .config(config)
        .build(
            Arc::new(MemoryStore::new()),
            Arc::new(LocalBus::new()),
            TrustClaims,
        )
        .await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }
    Ok(())
}
