//! Key commands - generate and inspect the onion identity

use super::{KeygenArgs, ShowOnionArgs};
use crate::config::Config;
use crate::crypto::KeyStore;
use anyhow::{bail, Context, Result};
use tracing::{debug, info};

/// Generate and save a new key
pub fn run_keygen(config: &Config, args: &KeygenArgs) -> Result<()> {
    let path = args.key.as_ref().unwrap_or(&config.tor.key_file);
    let store = KeyStore::new(path);

    if store.path().exists() && !args.force {
        bail!(
            "Key file {:?} already exists (use --force to replace it)",
            store.path()
        );
    }

    let key = KeyStore::generate();
    store
        .persist(&key)
        .with_context(|| format!("Failed to save key to {:?}", store.path()))?;

    info!("New onion address: {}", key.onion_address());
    println!("{}", key.onion_address());
    Ok(())
}

/// Print the onion address derived from a key file
pub fn run_show_onion(config: &Config, args: &ShowOnionArgs) -> Result<()> {
    let path = args.key.as_ref().unwrap_or(&config.tor.key_file);
    let key = KeyStore::new(path)
        .load()
        .with_context(|| format!("Failed to load key from {:?}", path))?;

    debug!("Public key: {}", hex::encode(key.public_key_bytes()));
    println!("{}", key.onion_address());
    Ok(())
}
