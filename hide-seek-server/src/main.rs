//! Hide & Seek Game Server
//!
//! Serves one game over WebSocket until Ctrl-C.

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hide_seek::{GameServer, ServerConfig, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env().context("loading configuration")?;
    info!("Hide & Seek Server v{}", VERSION);
    info!(
        "Ready check every {:?}, eviction after {:?}, {} players to start",
        config.ready_check_interval, config.idle_timeout, config.min_players,
    );

    let server = GameServer::new(config);

    tokio::select! {
        result = server.run() => {
            result.context("server stopped")?;
        }
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!("Failed to listen for Ctrl-C: {}", e);
            }
            info!("Shutting down");
            server.shutdown();
        }
    }

    Ok(())
}
