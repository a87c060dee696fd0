//! Debug and diagnostic commands

use super::{DebugAction, DebugArgs, DebugSignalArgs};
use crate::config::Config;
use crate::tor::ControlSession;
use anyhow::{Context, Result};
use tracing::{info, warn};

/// Run debug commands
pub async fn run_debug(config: &Config, args: &DebugArgs) -> Result<()> {
    match &args.action {
        DebugAction::Tor => run_tor_test(config).await,
        DebugAction::Signal(signal_args) => run_signal(config, signal_args).await,
    }
}

async fn open_session(config: &Config) -> Result<ControlSession> {
    let mut session = ControlSession::connect(&config.tor)
        .await
        .context("Unable to connect to Tor controller")?;
    session
        .authenticate(config.tor.control_password.as_deref())
        .await
        .context("Unable to authenticate to Tor controller")?;
    Ok(session)
}

/// Connect, authenticate and print what the daemon reports
async fn run_tor_test(config: &Config) -> Result<()> {
    info!("Connecting to Tor control port {}", config.tor.control_addr());
    let mut session = open_session(config).await?;

    let methods: Vec<String> = session
        .protocol_info()
        .auth_methods
        .iter()
        .map(|m| m.to_string())
        .collect();
    info!("  Auth methods: {}", methods.join(","));
    if let Some(cookie) = &session.protocol_info().cookie_file {
        info!("  Cookie file: {:?}", cookie);
    }

    info!("  Version: {}", session.version().await?);
    info!("  PID: {}", session.pid().await?);
    info!(
        "  Traffic: {} bytes read, {} bytes written",
        session.bytes_read().await?,
        session.bytes_written().await?
    );

    match session.config_file().await {
        Ok(path) => info!("  Config file: {}", path),
        Err(e) => warn!("  Config file unavailable: {}", e),
    }
    // Tor answers 551 until it has guessed an address
    match session.external_address().await {
        Ok(addr) => info!("  External address: {}", addr),
        Err(e) => warn!("  External address unavailable: {}", e),
    }

    session.close().await?;
    Ok(())
}

async fn run_signal(config: &Config, args: &DebugSignalArgs) -> Result<()> {
    let mut session = open_session(config).await?;
    session
        .signal(args.name)
        .await
        .with_context(|| format!("SIGNAL {} failed", args.name.as_str()))?;
    session.close().await?;
    Ok(())
}
