//! Standalone authoritative server.
//!
//! Usage: `world-session-server [config.toml]`. Without a path the defaults
//! are used, overridden by `WORLD_SESSION_*` environment variables.

use std::error::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use world_session::config::NetworkConfig;
use world_session::server::Server;
use world_session::utils::logging::init_logging;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => NetworkConfig::from_file(path)?,
        None => NetworkConfig::from_env()?,
    };
    init_logging(&config.logging)?;
    config.validate_strict()?;

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Ctrl-C received");
                    shutdown.cancel();
                }
                Err(e) => error!(error = %e, "Could not listen for Ctrl-C"),
            }
        });
    }

    Server::new(config).run(shutdown).await?;
    info!("Server stopped");
    Ok(())
}
