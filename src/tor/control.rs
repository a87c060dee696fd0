//! Tor Control Port client
//!
//! One [`ControlSession`] owns one connection. Commands take `&mut self`,
//! so at most one request is ever in flight; the protocol has no request
//! IDs to multiplex on.

use super::auth::{choose_credential, ProtocolInfo};
use super::onion::ServiceDescriptor;
use super::reply::{read_reply_timeout, Reply};
use crate::config::TorConfig;
use crate::error::{Error, Result};
use std::fmt;
use std::io;
use std::str::FromStr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// Session lifecycle; transitions only move forward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// PROTOCOLINFO done, not yet authenticated
    Connected,
    Authenticated,
    /// Closed explicitly or after a fatal I/O error
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Connected => "connected",
            SessionState::Authenticated => "authenticated",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Signals accepted by the SIGNAL command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Reload,
    Shutdown,
    Dump,
    Debug,
    Halt,
    ClearDnsCache,
    Newnym,
    Heartbeat,
    Dormant,
    Active,
}

impl Signal {
    pub fn as_str(self) -> &'static str {
        match self {
            Signal::Reload => "RELOAD",
            Signal::Shutdown => "SHUTDOWN",
            Signal::Dump => "DUMP",
            Signal::Debug => "DEBUG",
            Signal::Halt => "HALT",
            Signal::ClearDnsCache => "CLEARDNSCACHE",
            Signal::Newnym => "NEWNYM",
            Signal::Heartbeat => "HEARTBEAT",
            Signal::Dormant => "DORMANT",
            Signal::Active => "ACTIVE",
        }
    }
}

impl FromStr for Signal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let signal = match s.to_ascii_uppercase().as_str() {
            "RELOAD" | "HUP" => Signal::Reload,
            "SHUTDOWN" | "INT" => Signal::Shutdown,
            "DUMP" | "USR1" => Signal::Dump,
            "DEBUG" | "USR2" => Signal::Debug,
            "HALT" | "TERM" => Signal::Halt,
            "CLEARDNSCACHE" => Signal::ClearDnsCache,
            "NEWNYM" => Signal::Newnym,
            "HEARTBEAT" => Signal::Heartbeat,
            "DORMANT" => Signal::Dormant,
            "ACTIVE" => Signal::Active,
            other => return Err(format!("unknown signal: {}", other)),
        };
        Ok(signal)
    }
}

/// Connection to Tor control port
pub struct ControlSession<S = TcpStream> {
    stream: BufReader<S>,
    state: SessionState,
    protocol_info: ProtocolInfo,
    command_timeout: Duration,
}

impl ControlSession<TcpStream> {
    /// Connect to the control port and read PROTOCOLINFO
    pub async fn connect(config: &TorConfig) -> Result<Self> {
        let addr = config.control_addr();
        debug!("Connecting to Tor control port: {}", addr);

        let stream = match tokio::time::timeout(config.connect_timeout(), TcpStream::connect(&addr))
            .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(Error::Connect { addr, source }),
            Err(_) => {
                return Err(Error::Connect {
                    addr,
                    source: io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
                });
            },
        };

        Self::handshake(stream, config.command_timeout()).await
    }
}

impl<S> ControlSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Start a session on an open stream by sending `PROTOCOLINFO 1`
    pub async fn handshake(stream: S, command_timeout: Duration) -> Result<Self> {
        let mut session = Self {
            stream: BufReader::new(stream),
            state: SessionState::Connected,
            protocol_info: ProtocolInfo::default(),
            command_timeout,
        };

        let reply = session.send_command("PROTOCOLINFO 1").await?;
        session.protocol_info = ProtocolInfo::from_reply(&reply)?;

        debug!(
            "Tor {} offers auth methods: {:?}",
            session.protocol_info.tor_version.as_deref().unwrap_or("(unknown)"),
            session.protocol_info.auth_methods
        );
        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn protocol_info(&self) -> &ProtocolInfo {
        &self.protocol_info
    }

    /// Authenticate with the first usable advertised method
    ///
    /// Order is password, cookie file, then no authentication. Only one
    /// AUTHENTICATE is ever sent.
    pub async fn authenticate(&mut self, password: Option<&str>) -> Result<()> {
        self.require(SessionState::Connected, "authenticate")?;

        let credential = choose_credential(&self.protocol_info, password).await?;
        debug!("Authenticating with {}", credential.method());

        let reply = self.send_command(&credential.command()).await?;
        if !reply.is_ok() {
            // Tor hangs up after a failed attempt
            self.state = SessionState::Closed;
            return Err(Error::Auth(format!(
                "{} rejected ({}): {}",
                credential.method(),
                reply.code,
                reply.message()
            )));
        }

        self.state = SessionState::Authenticated;
        info!("Authenticated to Tor control port ({})", credential.method());
        Ok(())
    }

    /// Get information about the Tor daemon
    pub async fn get_info(&mut self, key: &str) -> Result<String> {
        self.require(SessionState::Authenticated, "send GETINFO")?;

        let reply = self.send_command(&format!("GETINFO {}", key)).await?;
        expect_ok("GETINFO", &reply)?;

        reply
            .value(key)
            .map(str::to_string)
            .ok_or_else(|| Error::protocol(format!("GETINFO reply missing {}", key)))
    }

    async fn get_info_number<T: FromStr>(&mut self, key: &str) -> Result<T> {
        let value = self.get_info(key).await?;
        value
            .trim()
            .parse()
            .map_err(|_| Error::protocol(format!("GETINFO {} is not a number: {:?}", key, value)))
    }

    pub async fn version(&mut self) -> Result<String> {
        self.get_info("version").await
    }

    /// Best guess at our external IP address
    pub async fn external_address(&mut self) -> Result<String> {
        self.get_info("address").await
    }

    pub async fn config_file(&mut self) -> Result<String> {
        self.get_info("config-file").await
    }

    pub async fn pid(&mut self) -> Result<u32> {
        self.get_info_number("process/pid").await
    }

    /// Total bytes downloaded
    pub async fn bytes_read(&mut self) -> Result<u64> {
        self.get_info_number("traffic/read").await
    }

    /// Total bytes uploaded
    pub async fn bytes_written(&mut self) -> Result<u64> {
        self.get_info_number("traffic/written").await
    }

    /// Register an onion service
    ///
    /// The descriptor is validated before anything is written. On success
    /// its service ID is set, and a key generated by Tor is stored back in
    /// it.
    pub async fn add_onion(&mut self, descriptor: &mut ServiceDescriptor) -> Result<()> {
        descriptor.validate()?;
        self.require(SessionState::Authenticated, "send ADD_ONION")?;

        info!(
            "Sending ADD_ONION for ports {:?}",
            descriptor.ports().keys().collect::<Vec<_>>()
        );
        let reply = self.send_command(&descriptor.to_command()).await?;
        if !reply.is_ok() {
            return Err(Error::Registration {
                code: reply.code,
                message: reply.message().to_string(),
            });
        }

        descriptor.apply_reply(&reply)?;
        info!(
            "Created hidden service: {}.onion",
            descriptor.service_id().unwrap_or_default()
        );
        Ok(())
    }

    /// Remove a previously created onion service
    pub async fn del_onion(&mut self, service_id: &str) -> Result<()> {
        self.require(SessionState::Authenticated, "send DEL_ONION")?;

        let service_id = service_id.strip_suffix(".onion").unwrap_or(service_id);
        let reply = self.send_command(&format!("DEL_ONION {}", service_id)).await?;
        expect_ok("DEL_ONION", &reply)?;

        info!("Removed hidden service: {}", service_id);
        Ok(())
    }

    pub async fn signal(&mut self, signal: Signal) -> Result<()> {
        self.require(SessionState::Authenticated, "send SIGNAL")?;

        let reply = self
            .send_command(&format!("SIGNAL {}", signal.as_str()))
            .await?;
        expect_ok("SIGNAL", &reply)?;

        info!("Sent signal {}", signal.as_str());
        Ok(())
    }

    /// Send QUIT and close the connection
    ///
    /// Non-detached onion services registered on this session go away
    /// with it.
    pub async fn close(mut self) -> Result<()> {
        if self.state == SessionState::Closed {
            return Ok(());
        }

        let result = match self.send_command("QUIT").await {
            Ok(reply) => expect_ok("QUIT", &reply),
            Err(e) => Err(e),
        };
        self.state = SessionState::Closed;

        if let Err(e) = self.stream.get_mut().shutdown().await {
            debug!("Control socket shutdown: {}", e);
        }
        result
    }

    fn require(&self, wanted: SessionState, action: &'static str) -> Result<()> {
        if self.state == wanted {
            Ok(())
        } else {
            Err(Error::InvalidState {
                state: self.state,
                action,
            })
        }
    }

    /// Send a command and read its reply
    ///
    /// I/O failures and timeouts close the session: the stream position is
    /// unknown after either.
    async fn send_command(&mut self, cmd: &str) -> Result<Reply> {
        if self.state == SessionState::Closed {
            return Err(Error::InvalidState {
                state: self.state,
                action: "send commands",
            });
        }

        let result = self.exchange(cmd).await;
        if let Err(e) = &result {
            if matches!(e, Error::Io(_) | Error::Timeout(_) | Error::Protocol(_)) {
                warn!("Closing control session after error: {}", e);
                self.state = SessionState::Closed;
            }
        }
        result
    }

    async fn exchange(&mut self, cmd: &str) -> Result<Reply> {
        let verb = command_verb(cmd);
        debug!("-> {}", redact(cmd));

        let write = async {
            self.stream.write_all(cmd.as_bytes()).await?;
            self.stream.write_all(b"\r\n").await?;
            self.stream.flush().await?;
            Ok::<_, io::Error>(())
        };
        tokio::time::timeout(self.command_timeout, write)
            .await
            .map_err(|_| Error::Timeout(verb.to_string()))??;

        read_reply_timeout(&mut self.stream, self.command_timeout, verb).await
    }
}

fn expect_ok(command: &str, reply: &Reply) -> Result<()> {
    if reply.is_ok() {
        Ok(())
    } else {
        Err(Error::Rejected {
            command: command.to_string(),
            code: reply.code,
            message: reply.message().to_string(),
        })
    }
}

fn command_verb(cmd: &str) -> &str {
    cmd.split_whitespace().next().unwrap_or(cmd)
}

/// Command text safe for logs
fn redact(cmd: &str) -> String {
    match command_verb(cmd) {
        "AUTHENTICATE" if cmd.len() > "AUTHENTICATE".len() => "AUTHENTICATE <redacted>".to_string(),
        "ADD_ONION" => cmd
            .split(' ')
            .enumerate()
            .map(|(i, part)| match part.split_once(':') {
                Some((key_type, _)) if i == 1 && key_type != "NEW" => {
                    format!("{}:<redacted>", key_type)
                },
                _ => part.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" "),
        _ => cmd.to_string(),
    }
}
