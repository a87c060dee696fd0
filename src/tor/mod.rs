//! Tor daemon interaction
//!
//! Handles Tor ControlPort communication: reply framing, authentication,
//! and onion service registration. Tor is treated as a black box.

pub mod auth;
pub mod control;
pub mod onion;
pub mod reply;

pub use auth::{AuthMethod, ProtocolInfo};
pub use control::{ControlSession, SessionState, Signal};
pub use onion::{KeyMaterial, KeyType, OnionFlag, ServiceDescriptor};
pub use reply::Reply;
