//! Logging setup
//!
//! tracing with an `EnvFilter`. Secrets (key material, passwords, cookies)
//! are never passed to a log macro; types holding them redact `Debug`.

use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

/// Initialize logging; `RUST_LOG` overrides the default level
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("onionpub={}", default_level)));

    fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_file(verbose)
        .with_line_number(verbose)
        .init();
}
