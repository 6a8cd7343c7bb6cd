//! Session lifecycle shared by agent and host.
//!
//! `Disconnected -> Handshaking -> Active -> Closed`. A transport failure moves
//! any state straight to `Closed`, which is terminal.

use crate::error::{ProtocolError, ProtocolResult};
use crate::protocol::types::{
    ClientCapabilities, LATEST_PROTOCOL_VERSION, SUPPORTED_PROTOCOL_VERSIONS, methods,
};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

/// Session state enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Transport open, no handshake yet.
    Disconnected,
    /// Capability declarations exchanged, awaiting acknowledgement.
    Handshaking,
    /// Discovery and invocation allowed.
    Active,
    /// Terminal. Nothing further is accepted.
    Closed,
}

/// Tracks lifecycle and what the remote side declared.
#[derive(Debug)]
pub struct Session {
    state: RwLock<SessionState>,
    protocol_version: RwLock<Option<String>>,
    client_capabilities: RwLock<Option<ClientCapabilities>>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(SessionState::Disconnected),
            protocol_version: RwLock::new(None),
            client_capabilities: RwLock::new(None),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    pub fn is_closed(&self) -> bool {
        self.state() == SessionState::Closed
    }

    /// Enter `Handshaking`. Only valid from `Disconnected`.
    pub fn begin_handshake(&self) -> ProtocolResult<()> {
        let mut state = self.state.write();
        match *state {
            SessionState::Disconnected => {
                *state = SessionState::Handshaking;
                debug!("Session handshaking");
                Ok(())
            }
            SessionState::Closed => Err(ProtocolError::ConnectionClosed),
            SessionState::Handshaking | SessionState::Active => {
                Err(ProtocolError::AlreadyInitialized)
            }
        }
    }

    /// Record the outcome of the capability exchange.
    pub fn record_handshake(&self, version: &str, client: Option<ClientCapabilities>) {
        *self.protocol_version.write() = Some(version.to_string());
        *self.client_capabilities.write() = client;
    }

    /// Handshake failed before acknowledgement; allow another attempt.
    pub fn abort_handshake(&self) {
        let mut state = self.state.write();
        if *state == SessionState::Handshaking {
            *state = SessionState::Disconnected;
            warn!("Handshake aborted");
        }
    }

    /// Both sides acknowledged: `Handshaking -> Active`.
    pub fn activate(&self) -> ProtocolResult<()> {
        let mut state = self.state.write();
        match *state {
            SessionState::Handshaking => {
                *state = SessionState::Active;
                info!("Session active");
                Ok(())
            }
            SessionState::Active => Ok(()),
            SessionState::Closed => Err(ProtocolError::ConnectionClosed),
            SessionState::Disconnected => Err(ProtocolError::NotInitialized),
        }
    }

    pub fn close(&self) {
        let mut state = self.state.write();
        if *state != SessionState::Closed {
            info!("Session closed (was {:?})", *state);
            *state = SessionState::Closed;
        }
    }

    /// Decide whether an inbound request may be processed in the current state.
    pub fn admit(&self, method: &str) -> ProtocolResult<()> {
        match (self.state(), method) {
            (SessionState::Closed, _) => Err(ProtocolError::ConnectionClosed),
            (_, methods::PING) => Ok(()),
            (SessionState::Disconnected, methods::INITIALIZE) => Ok(()),
            (_, methods::INITIALIZE) => Err(ProtocolError::AlreadyInitialized),
            (SessionState::Active, _) => Ok(()),
            (SessionState::Disconnected | SessionState::Handshaking, _) => {
                Err(ProtocolError::NotInitialized)
            }
        }
    }

    pub fn protocol_version(&self) -> Option<String> {
        self.protocol_version.read().clone()
    }

    pub fn client_supports_sampling(&self) -> bool {
        self.client_capabilities
            .read()
            .as_ref()
            .is_some_and(|caps| caps.sampling.is_some())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Pick the version the agent answers with.
pub fn negotiate_version(requested: &str) -> &'static str {
    SUPPORTED_PROTOCOL_VERSIONS
        .iter()
        .copied()
        .find(|v| *v == requested)
        .unwrap_or_else(|| {
            info!(
                "Unsupported protocol version '{}', offering {}",
                requested, LATEST_PROTOCOL_VERSION
            );
            LATEST_PROTOCOL_VERSION
        })
}

pub fn is_supported_version(version: &str) -> bool {
    SUPPORTED_PROTOCOL_VERSIONS.contains(&version)
}
