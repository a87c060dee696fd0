//! Command-line interface for onionpub
//!
//! Provides main commands:
//! - `run` - Publish the configured server as an onion service
//! - `keygen` - Create the onion identity key
//! - `show-onion` - Print the address for a key file
//! - `debug` - Control port diagnostics

mod debug;
mod key;
mod run;

pub use debug::run_debug;
pub use key::{run_keygen, run_show_onion};
pub use run::run_service;

use crate::tor::Signal;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// onionpub - Publish a local web server as a Tor v3 onion service
#[derive(Parser, Debug)]
#[command(name = "onionpub")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file (defaults to ./config.toml if present)
    #[arg(short, long, env = "ONIONPUB_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, default_value_t = false, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Register the onion service and keep it up until interrupted
    Run,

    /// Generate a new onion identity key
    Keygen(KeygenArgs),

    /// Show the onion address for a key file
    ShowOnion(ShowOnionArgs),

    /// Debug and diagnostic commands
    Debug(DebugArgs),
}

/// Arguments for keygen
#[derive(Parser, Debug)]
pub struct KeygenArgs {
    /// Key file to write (defaults to tor.key_file from config)
    #[arg(long)]
    pub key: Option<PathBuf>,

    /// Replace an existing key file
    #[arg(long, default_value_t = false)]
    pub force: bool,
}

/// Arguments for show-onion
#[derive(Parser, Debug)]
pub struct ShowOnionArgs {
    /// Key file to read (defaults to tor.key_file from config)
    #[arg(long)]
    pub key: Option<PathBuf>,
}

/// Arguments for debug command
#[derive(Parser, Debug)]
pub struct DebugArgs {
    #[command(subcommand)]
    pub action: DebugAction,
}

/// Debug subcommands
#[derive(Subcommand, Debug)]
pub enum DebugAction {
    /// Connect, authenticate and print daemon information
    Tor,

    /// Send a signal to the Tor daemon (e.g. NEWNYM, RELOAD)
    Signal(DebugSignalArgs),
}

/// Arguments for debug signal
#[derive(Parser, Debug)]
pub struct DebugSignalArgs {
    /// Signal name
    pub name: Signal,
}
