//! Onion service startup sequence
//!
//! Load or create the identity, open and authenticate a control session,
//! register the service, and check that Tor agrees on the address.
//! Registration is ephemeral on Tor's side and is redone on every start.

use crate::config::TorConfig;
use crate::crypto::KeyStore;
use crate::error::{Error, Result};
use crate::tor::{ControlSession, KeyMaterial, OnionFlag, ServiceDescriptor};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// Drives registration of one onion service
#[derive(Debug, Clone)]
pub struct ServiceRegistrar {
    config: TorConfig,
    backing_addr: String,
}

impl ServiceRegistrar {
    /// `backing_addr` is the local `host:port` the onion service forwards to
    pub fn new(config: TorConfig, backing_addr: impl Into<String>) -> Self {
        Self {
            config,
            backing_addr: backing_addr.into(),
        }
    }

    /// Run the full startup sequence using the configured key file
    pub async fn start(&self) -> Result<RegisteredService> {
        let key = KeyStore::new(&self.config.key_file).load_or_generate()?;
        let derived = key.service_id();
        debug!("Onion key loaded, expecting {}.onion", derived);

        let descriptor = self.descriptor().with_key(KeyMaterial::from(&key));
        self.publish(descriptor, Some(derived)).await
    }

    /// Port map and flags from configuration, with a `NEW:BEST` key
    pub fn descriptor(&self) -> ServiceDescriptor {
        let descriptor =
            ServiceDescriptor::new().with_port(self.config.virtual_port, self.backing_addr.clone());
        if self.config.detach {
            descriptor.with_flag(OnionFlag::Detach)
        } else {
            descriptor
        }
    }

    /// Connect, authenticate and register `descriptor`
    ///
    /// When `expected_id` is given, Tor's ServiceID must equal it. Any
    /// failure drops the session, which closes the connection and takes a
    /// non-detached registration down with it.
    pub async fn publish(
        &self,
        mut descriptor: ServiceDescriptor,
        expected_id: Option<String>,
    ) -> Result<RegisteredService> {
        descriptor.validate()?;

        let mut session = ControlSession::connect(&self.config).await?;
        session
            .authenticate(self.config.control_password.as_deref())
            .await?;
        session.add_onion(&mut descriptor).await?;

        let reported = descriptor
            .service_id()
            .ok_or_else(|| Error::protocol("ADD_ONION succeeded without a ServiceID"))?
            .to_string();

        if let Some(derived) = expected_id {
            if derived != reported {
                return Err(Error::AddressMismatch { derived, reported });
            }
        }

        Ok(RegisteredService {
            session,
            descriptor,
            service_id: reported,
        })
    }
}

/// A live registration and the session that keeps it alive
pub struct RegisteredService {
    session: ControlSession<TcpStream>,
    descriptor: ServiceDescriptor,
    service_id: String,
}

impl RegisteredService {
    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    /// `<service id>.onion`, for display and URLs
    pub fn onion_address(&self) -> String {
        format!("{}.onion", self.service_id)
    }

    pub fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    pub fn session_mut(&mut self) -> &mut ControlSession<TcpStream> {
        &mut self.session
    }

    /// Remove the service and close the control session
    ///
    /// Detached services are left running.
    pub async fn shutdown(mut self) -> Result<()> {
        if self.descriptor.flags().contains(&OnionFlag::Detach) {
            info!("Leaving detached service {} registered", self.onion_address());
        } else if let Err(e) = self.session.del_onion(&self.service_id).await {
            warn!("DEL_ONION {} failed: {}", self.service_id, e);
        }
        self.session.close().await
    }
}
