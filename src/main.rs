//! onionpub - publish a local web server as a Tor v3 onion service
//!
//! Keeps a stable onion identity in a key file, derives the address from
//! it, and registers the service with a local Tor daemon over the control
//! port on every start.
//!
//! # Usage
//!
//! ```bash
//! # Create the identity (optional, `run` creates one if missing)
//! onionpub keygen
//!
//! # Print the address for the current key
//! onionpub show-onion
//!
//! # Publish until Ctrl-C
//! onionpub --config config.toml run
//! ```

use anyhow::Result;
use clap::Parser;
use onionpub::cli::{self, Cli, Commands};
use onionpub::{config, logging};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(cli.verbose);

    let config = config::load_config(cli.config.as_deref())?;

    match &cli.command {
        Commands::Run => {
            cli::run_service(&config).await?;
        },
        Commands::Keygen(args) => {
            cli::run_keygen(&config, args)?;
        },
        Commands::ShowOnion(args) => {
            cli::run_show_onion(&config, args)?;
        },
        Commands::Debug(args) => {
            cli::run_debug(&config, args).await?;
        },
    }

    Ok(())
}
