//! Onion service publishing
//!
//! Ties the onion identity to a live control-port registration.

pub mod registrar;

pub use registrar::{RegisteredService, ServiceRegistrar};
