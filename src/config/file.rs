//! Configuration file loading

use super::Config;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

/// Config file read when none is given
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Load configuration
///
/// With no explicit path, a missing `config.toml` means all defaults.
/// An explicit path must exist.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => load_from_path(path),
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                load_from_path(default_path)
            } else {
                debug!("No {} found, using defaults", DEFAULT_CONFIG_PATH);
                let config = Config::default();
                super::validate(&config)?;
                Ok(config)
            }
        },
    }
}

/// Load and parse config from path
pub fn load_from_path(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config = parse(&contents).with_context(|| format!("Invalid config file: {:?}", path))?;
    debug!("Loaded config from {:?}", path);
    Ok(config)
}

/// Parse and validate TOML text
pub fn parse(contents: &str) -> Result<Config> {
    let config: Config = toml::from_str(contents).context("Failed to parse TOML")?;
    super::validate(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_empty_file_is_defaults() {
        let config = parse("").unwrap();
        assert!(!config.tor.enable);
        assert_eq!(config.server.backing_addr(), "127.0.0.1:8080");
        assert_eq!(config.tor.control_addr(), "127.0.0.1:9051");
        assert_eq!(config.tor.key_file, PathBuf::from("onion.key"));
        assert_eq!(config.tor.virtual_port, 80);
    }

    #[test]
    fn test_full_file() {
        let config = parse(
            r#"
            [server]
            host = "0.0.0.0"
            port = 9000

            [tor]
            enable = true
            control_host = "10.0.0.2"
            control_port = 9151
            control_password = "hunter2"
            key_file = "/var/lib/onionpub/onion.key"
            virtual_port = 8080
            connect_timeout_secs = 3
            command_timeout_secs = 7
            detach = true
            "#,
        )
        .unwrap();

        assert!(config.tor.enable);
        assert_eq!(config.server.backing_addr(), "0.0.0.0:9000");
        assert_eq!(config.tor.control_addr(), "10.0.0.2:9151");
        assert_eq!(config.tor.control_password.as_deref(), Some("hunter2"));
        assert_eq!(config.tor.connect_timeout().as_secs(), 3);
        assert_eq!(config.tor.command_timeout().as_secs(), 7);
        assert!(config.tor.detach);
        assert!(!format!("{:?}", config.tor).contains("hunter2"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(parse("[tor]\nenabled = true\n").is_err());
    }

    #[test]
    fn test_load_missing_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(load_config(Some(&missing)).is_err());
    }

    #[test]
    fn test_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = 8181\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.server.port, 8181);
    }
}
