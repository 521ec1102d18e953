//! Quote client binary.
//!
//! Prints the granted quote on stdout and exits 0, or exits non-zero with the
//! handshake error.

use pow_gateway::config::NetworkConfig;
use pow_gateway::service::QuoteClient;
use pow_gateway::utils::logging::init_logging;
use tracing::error;

fn load_config() -> pow_gateway::Result<NetworkConfig> {
    let mut config = match std::env::args().nth(1) {
        Some(path) => NetworkConfig::from_file(path)?,
        None => NetworkConfig::default(),
    };
    config.apply_env(|key| std::env::var(key).ok())?;
    config.client.validate_strict()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> pow_gateway::Result<()> {
    let config = load_config()?;
    init_logging(&config.logging)?;

    match QuoteClient::new(config.client).request_quote().await {
        Ok(quote) => {
            println!("{quote}");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Handshake failed");
            Err(e)
        }
    }
}
