//! Cryptographic primitives for the v3 onion identity
//!
//! Address derivation and key expansion live in [`address`] and are pure.
//! [`keys`] owns the long-term secret and its on-disk form.

pub mod address;
pub mod keys;

pub use address::{expand_private_key, expanded_key_base64, service_id};
pub use keys::{KeyStore, V3Key};
