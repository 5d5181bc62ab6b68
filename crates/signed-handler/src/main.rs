//! Signed handler binary.
//!
//! 1. Load configuration from the environment
//! 2. Install the log subscriber
//! 3. Start the signing manager and serve until Ctrl+C

use std::sync::Arc;

use anyhow::{Context, Result};
use signed_handler::{telemetry, EchoGateway, HandlerConfig, HandlerService};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = HandlerConfig::from_env().context("failed to load handler configuration")?;
    telemetry::init_logging(&config.log_filter, config.json_logs)?;

    let service = HandlerService::new(config, Arc::new(EchoGateway::default()))?;
    service.run(shutdown_signal()).await?;

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => {
            warn!(error = %e, "Cannot listen for Ctrl+C; serving until killed");
            std::future::pending::<()>().await;
        }
    }
}
