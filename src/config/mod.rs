//! Configuration loading and validation
//!
//! Handles TOML configuration parsing with strict validation.
//! No runtime mutation - configuration is immutable after load.

pub mod file;
mod validation;

pub use file::{load_config, load_from_path, DEFAULT_CONFIG_PATH};
pub use validation::validate;

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub tor: TorConfig,
}

/// Local HTTP server the onion service points at
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
}

impl ServerConfig {
    /// `host:port` published as the onion service target
    pub fn backing_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}
fn default_server_port() -> u16 {
    8080
}

/// Tor daemon connection and onion service settings
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TorConfig {
    /// Publish the server as an onion service
    #[serde(default)]
    pub enable: bool,
    #[serde(default = "default_control_host")]
    pub control_host: String,
    #[serde(default = "default_control_port")]
    pub control_port: u16,
    pub control_password: Option<String>,
    /// Where the onion identity key is kept
    #[serde(default = "default_key_file")]
    pub key_file: PathBuf,
    /// Port clients use on the onion address
    #[serde(default = "default_virtual_port")]
    pub virtual_port: u16,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    /// Keep the service registered after we disconnect
    #[serde(default)]
    pub detach: bool,
}

impl TorConfig {
    pub fn control_addr(&self) -> String {
        format!("{}:{}", self.control_host, self.control_port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

impl Default for TorConfig {
    fn default() -> Self {
        Self {
            enable: false,
            control_host: default_control_host(),
            control_port: default_control_port(),
            control_password: None,
            key_file: default_key_file(),
            virtual_port: default_virtual_port(),
            connect_timeout_secs: default_connect_timeout(),
            command_timeout_secs: default_command_timeout(),
            detach: false,
        }
    }
}

// Hand-written so the password never lands in logs
impl std::fmt::Debug for TorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TorConfig")
            .field("enable", &self.enable)
            .field("control_host", &self.control_host)
            .field("control_port", &self.control_port)
            .field(
                "control_password",
                &self.control_password.as_ref().map(|_| "<redacted>"),
            )
            .field("key_file", &self.key_file)
            .field("virtual_port", &self.virtual_port)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("command_timeout_secs", &self.command_timeout_secs)
            .field("detach", &self.detach)
            .finish()
    }
}

fn default_control_host() -> String {
    "127.0.0.1".to_string()
}
fn default_control_port() -> u16 {
    9051
}
fn default_key_file() -> PathBuf {
    PathBuf::from("onion.key")
}
fn default_virtual_port() -> u16 {
    80
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_command_timeout() -> u64 {
    30
}
