//! onionpub library crate
//!
//! Onion identity and Tor control-port plumbing for publishing a local
//! service under a stable v3 onion address.
//!
//! # Modules
//!
//! - [`crypto`] - v3 address derivation, key expansion, key file storage
//! - [`tor`] - Tor control port session, auth negotiation, ADD_ONION
//! - [`service`] - Startup registration sequence
//! - [`config`] - Configuration loading and validation
//! - [`cli`] - Command-line interface
//! - [`logging`] - tracing subscriber setup

#![allow(clippy::doc_markdown)] // Doc formatting is secondary
#![allow(clippy::uninlined_format_args)] // Format string style preference
#![allow(clippy::module_name_repetitions)] // Names read better qualified

pub mod cli;
pub mod config;
pub mod crypto;
pub mod error;
pub mod logging;
pub mod service;
pub mod tor;

pub use error::{Error, Result};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
