//! Run command - publish the onion service
//!
//! Registration happens once at startup. The control session stays open
//! for as long as the service should be reachable.

use crate::config::Config;
use crate::service::ServiceRegistrar;
use anyhow::{Context, Result};
use tracing::info;

/// Register the service and hold it until Ctrl-C
pub async fn run_service(config: &Config) -> Result<()> {
    info!("onionpub v{} starting", crate::VERSION);

    if !config.tor.enable {
        info!("Tor publishing is disabled (tor.enable = false); nothing to do");
        return Ok(());
    }

    let backing_addr = config.server.backing_addr();
    info!("Local server: http://{}", backing_addr);

    let registrar = ServiceRegistrar::new(config.tor.clone(), backing_addr);
    let service = registrar
        .start()
        .await
        .context("Unable to start Tor onion service")?;

    info!("Onion service: http://{}", service.onion_address());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutting down onion service");

    service
        .shutdown()
        .await
        .context("Failed to close Tor control session")?;
    Ok(())
}
