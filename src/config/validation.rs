//! Configuration validation
//!
//! Fail-fast validation of configuration invariants.

use super::Config;
use anyhow::{bail, Result};

/// Validate configuration invariants
pub fn validate(config: &Config) -> Result<()> {
    validate_server(config)?;
    validate_tor(config)?;
    Ok(())
}

fn validate_server(config: &Config) -> Result<()> {
    let host = &config.server.host;
    if host.is_empty() {
        bail!("server.host cannot be empty");
    }
    if host.contains(|c: char| c.is_whitespace() || c == ',') {
        bail!("server.host contains invalid characters: {:?}", host);
    }

    // The onion target needs a concrete port
    if config.tor.enable && config.server.port == 0 {
        bail!("server.port cannot be 0 when tor.enable is set");
    }
    Ok(())
}

fn validate_tor(config: &Config) -> Result<()> {
    let tor = &config.tor;

    if tor.control_host.is_empty() {
        bail!("tor.control_host cannot be empty");
    }
    if tor.control_port == 0 {
        bail!("tor.control_port cannot be 0");
    }
    if tor.virtual_port == 0 {
        bail!("tor.virtual_port cannot be 0");
    }
    if tor.key_file.as_os_str().is_empty() {
        bail!("tor.key_file cannot be empty");
    }
    if tor.connect_timeout_secs == 0 || tor.command_timeout_secs == 0 {
        bail!(
            "tor timeouts must be positive (connect_timeout_secs={}, command_timeout_secs={})",
            tor.connect_timeout_secs,
            tor.command_timeout_secs
        );
    }
    if let Some(password) = &tor.control_password {
        if password.contains(['\r', '\n']) {
            bail!("tor.control_password cannot contain line breaks");
        }
    }
    Ok(())
}
