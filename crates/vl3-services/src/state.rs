//! Per-peer connection state machine.
//!
//! ```text
//!   NotConnected ──drive──▶ ConnectionInProgress ──dataplane ok──▶ Connected
//!                                   │
//!                                   └──connect/dataplane failed, cancelled──▶ ConnectionError
//!
//!   any ──incoming peer request──▶ ConnectedViaIncoming
//! ```
//!
//! `drive` in any state other than NotConnected leaves the state alone.
//! ConnectionError is terminal for outbound attempts: there is no retry.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerState {
    #[default]
    NotConnected,
    ConnectionInProgress,
    Connected,
    ConnectionError,
    /// The peer connected to us first. Never dialed afterwards.
    ConnectedViaIncoming,
}

impl PeerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeerState::NotConnected => "not_connected",
            PeerState::ConnectionInProgress => "connection_in_progress",
            PeerState::Connected => "connected",
            PeerState::ConnectionError => "connection_error",
            PeerState::ConnectedViaIncoming => "connected_via_incoming",
        }
    }
}

impl fmt::Display for PeerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerEvent {
    /// Outbound formation wants this peer connected.
    Drive,
    /// Remote connect request returned a connection.
    ConnectSucceeded,
    ConnectFailed,
    DataplaneApplied,
    DataplaneFailed,
    /// Shutdown interrupted the connect or dataplane step.
    Cancelled,
    /// The peer sent us a connection request of its own.
    IncomingRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal peer transition: {event:?} in state {from}")]
pub struct TransitionError {
    pub from: PeerState,
    pub event: PeerEvent,
}

/// Why a peer ended up in ConnectionError.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeerError {
    #[error("peer connect failed: {0}")]
    Connect(String),
    /// Connected at the network level, but programming the dataplane failed.
    #[error("dataplane apply failed: {0}")]
    Dataplane(String),
    #[error("peer connection cancelled")]
    Cancelled,
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Next state for `event` in state `from`.
pub fn transition(from: PeerState, event: PeerEvent) -> Result<PeerState, TransitionError> {
    use PeerEvent::*;
    use PeerState::*;

    match (from, event) {
        (_, IncomingRequest) => Ok(ConnectedViaIncoming),
        (NotConnected, Drive) => Ok(ConnectionInProgress),
        (state, Drive) => Ok(state),
        (ConnectionInProgress, ConnectSucceeded) => Ok(ConnectionInProgress),
        (ConnectionInProgress, DataplaneApplied) => Ok(Connected),
        (ConnectionInProgress, ConnectFailed | DataplaneFailed | Cancelled) => Ok(ConnectionError),
        (from, event) => Err(TransitionError { from, event }),
    }
}
