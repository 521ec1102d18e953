//! Quote server binary.
//!
//! Configuration comes from the TOML file named by the first argument (if
//! any), then environment overrides. Runs until Ctrl+C or SIGTERM, then drains.

use pow_gateway::config::NetworkConfig;
use pow_gateway::service::QuoteServer;
use pow_gateway::utils::logging::init_logging;
use tracing::info;

fn load_config() -> pow_gateway::Result<NetworkConfig> {
    let mut config = match std::env::args().nth(1) {
        Some(path) => NetworkConfig::from_file(path)?,
        None => NetworkConfig::default(),
    };
    config.apply_env(|key| std::env::var(key).ok())?;
    config.server.validate_strict()?;
    Ok(config)
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> pow_gateway::Result<()> {
    let config = load_config()?;
    init_logging(&config.logging)?;

    let server = QuoteServer::from_config(config.server)?.bind().await?;
    info!(address = %server.local_addr(), "Server started");

    shutdown_signal().await;
    info!("Received shutdown signal, initiating graceful shutdown");

    server.shutdown().await;
    info!("Server switched off");
    Ok(())
}
