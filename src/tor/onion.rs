//! Onion service registration record for ADD_ONION

use super::reply::Reply;
use crate::crypto::V3Key;
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Key types understood by ADD_ONION
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    Ed25519V3,
    Rsa1024,
}

impl KeyType {
    pub fn as_str(self) -> &'static str {
        match self {
            KeyType::Ed25519V3 => "ED25519-V3",
            KeyType::Rsa1024 => "RSA1024",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ED25519-V3" => Ok(KeyType::Ed25519V3),
            "RSA1024" => Ok(KeyType::Rsa1024),
            other => Err(Error::protocol(format!("unknown onion key type {:?}", other))),
        }
    }
}

/// Key argument of ADD_ONION
#[derive(Clone, PartialEq, Eq)]
pub enum KeyMaterial {
    /// Ask Tor to generate a key (`None` means `BEST`)
    New(Option<KeyType>),
    /// Existing key blob, base64 in the key type's wire format
    Provided { key_type: KeyType, blob: String },
}

impl KeyMaterial {
    fn to_arg(&self) -> String {
        match self {
            KeyMaterial::New(None) => "NEW:BEST".to_string(),
            KeyMaterial::New(Some(key_type)) => format!("NEW:{}", key_type),
            KeyMaterial::Provided { key_type, blob } => format!("{}:{}", key_type, blob),
        }
    }

    pub fn key_type(&self) -> Option<KeyType> {
        match self {
            KeyMaterial::New(key_type) => *key_type,
            KeyMaterial::Provided { key_type, .. } => Some(*key_type),
        }
    }
}

impl From<&V3Key> for KeyMaterial {
    fn from(key: &V3Key) -> Self {
        KeyMaterial::Provided {
            key_type: KeyType::Ed25519V3,
            blob: key.expanded_key_base64(),
        }
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMaterial::New(key_type) => f.debug_tuple("New").field(key_type).finish(),
            KeyMaterial::Provided { key_type, .. } => f
                .debug_struct("Provided")
                .field("key_type", key_type)
                .finish_non_exhaustive(),
        }
    }
}

/// ADD_ONION flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnionFlag {
    /// Do not return the generated private key
    DiscardPk,
    /// Keep the service after the control connection closes
    Detach,
}

impl OnionFlag {
    pub fn as_str(self) -> &'static str {
        match self {
            OnionFlag::DiscardPk => "DiscardPK",
            OnionFlag::Detach => "Detach",
        }
    }
}

/// Onion service to register
///
/// Built by the caller, filled in by `add_onion`: the service ID is set
/// from the reply, and a server-generated key replaces [`KeyMaterial::New`].
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    ports: BTreeMap<u16, String>,
    key: KeyMaterial,
    flags: Vec<OnionFlag>,
    service_id: Option<String>,
}

impl ServiceDescriptor {
    /// Empty descriptor asking Tor for a `NEW:BEST` key
    pub fn new() -> Self {
        Self {
            ports: BTreeMap::new(),
            key: KeyMaterial::New(None),
            flags: Vec::new(),
            service_id: None,
        }
    }

    /// Map a virtual onion port to a local `host:port`
    pub fn with_port(mut self, virtual_port: u16, target: impl Into<String>) -> Self {
        self.ports.insert(virtual_port, target.into());
        self
    }

    pub fn with_key(mut self, key: KeyMaterial) -> Self {
        self.key = key;
        self
    }

    pub fn with_flag(mut self, flag: OnionFlag) -> Self {
        if !self.flags.contains(&flag) {
            self.flags.push(flag);
        }
        self
    }

    pub fn ports(&self) -> &BTreeMap<u16, String> {
        &self.ports
    }

    pub fn key(&self) -> &KeyMaterial {
        &self.key
    }

    pub fn flags(&self) -> &[OnionFlag] {
        &self.flags
    }

    /// Service ID reported by Tor; `None` until registered
    pub fn service_id(&self) -> Option<&str> {
        self.service_id.as_deref()
    }

    /// Local checks done before anything is sent
    pub fn validate(&self) -> Result<()> {
        if self.ports.is_empty() {
            return Err(Error::validation("at least one port mapping is required"));
        }
        for (virtual_port, target) in &self.ports {
            if *virtual_port == 0 {
                return Err(Error::validation("virtual port 0 is not allowed"));
            }
            if target.is_empty() || target.contains(|c: char| c.is_whitespace() || c == ',') {
                return Err(Error::validation(format!(
                    "invalid target {:?} for port {}",
                    target, virtual_port
                )));
            }
        }
        if let KeyMaterial::Provided { blob, .. } = &self.key {
            if blob.is_empty() || blob.contains(char::is_whitespace) {
                return Err(Error::validation("key blob must be non-empty base64"));
            }
        }
        Ok(())
    }

    /// ADD_ONION command line (without terminator)
    pub(crate) fn to_command(&self) -> String {
        let mut cmd = format!("ADD_ONION {}", self.key.to_arg());
        if !self.flags.is_empty() {
            let flags: Vec<&str> = self.flags.iter().map(|f| f.as_str()).collect();
            cmd.push_str(" Flags=");
            cmd.push_str(&flags.join(","));
        }
        for (virtual_port, target) in &self.ports {
            cmd.push_str(&format!(" Port={},{}", virtual_port, target));
        }
        cmd
    }

    /// Record the result of a successful ADD_ONION
    pub(crate) fn apply_reply(&mut self, reply: &Reply) -> Result<()> {
        let service_id = reply
            .value("ServiceID")
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::protocol("ADD_ONION reply missing ServiceID"))?;

        if let Some(private_key) = reply.value("PrivateKey") {
            let (key_type, blob) = private_key
                .split_once(':')
                .ok_or_else(|| Error::protocol("malformed PrivateKey in ADD_ONION reply"))?;
            self.key = KeyMaterial::Provided {
                key_type: key_type.parse()?,
                blob: blob.to_string(),
            };
        }

        self.service_id = Some(service_id.to_string());
        Ok(())
    }
}

impl Default for ServiceDescriptor {
    fn default() -> Self {
        Self::new()
    }
}
