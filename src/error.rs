//! Error types for onion identity and control-port operations

use crate::tor::SessionState;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for onionpub operations
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while loading keys, talking to the control port,
/// or registering the onion service
#[derive(Debug, Error)]
pub enum Error {
    /// Key file does not exist (caller may generate a new key instead)
    #[error("key file not found: {0:?}")]
    NotFound(PathBuf),

    /// Key file exists but its contents are not a valid key
    #[error("invalid key file {path:?}: {reason}")]
    Format { path: PathBuf, reason: String },

    /// Key file could not be read or written
    #[error("key file I/O error on {path:?}: {source}")]
    KeyIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Control port unreachable
    #[error("cannot reach Tor control port at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// A command did not complete within the configured deadline
    #[error("timed out waiting for reply to {0}")]
    Timeout(String),

    /// Reply did not have the expected shape
    #[error("control protocol error: {0}")]
    Protocol(String),

    /// Transport failure in the middle of a session
    #[error("control connection I/O error: {0}")]
    Io(#[from] io::Error),

    /// No advertised authentication method succeeded
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Descriptor rejected locally before anything was sent
    #[error("invalid onion service: {0}")]
    Validation(String),

    /// ADD_ONION returned a non-250 status
    #[error("ADD_ONION rejected ({code}): {message}")]
    Registration { code: u16, message: String },

    /// Any other command returned a non-250 status
    #[error("{command} rejected ({code}): {message}")]
    Rejected {
        command: String,
        code: u16,
        message: String,
    },

    /// Tor reported a service ID that does not match the local key
    #[error("service ID mismatch: key derives {derived}, Tor reported {reported}")]
    AddressMismatch { derived: String, reported: String },

    /// Command issued in a session state that does not allow it
    #[error("control session is {state}, cannot {action}")]
    InvalidState {
        state: SessionState,
        action: &'static str,
    },
}

impl Error {
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub(crate) fn format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Format {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True when the error means "no key yet" rather than a broken key
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
