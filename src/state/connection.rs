//! VPN connection state types.

use std::time::Instant;

use super::{Location, Protocol};

/// Connection status reported by the SDK.
///
/// The SDK is the source of truth; this layer never invents a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// No active VPN connection.
    #[default]
    Disconnected,
    /// Connection attempt in progress.
    Connecting,
    /// Tunnel established.
    Connected,
    /// Teardown in progress.
    Disconnecting,
    /// The SDK gave up on the tunnel.
    Failed,
}

impl ConnectionStatus {
    /// Statuses during which a connect/disconnect is in flight.
    #[must_use]
    pub const fn is_transitional(self) -> bool {
        matches!(self, Self::Connecting | Self::Disconnecting)
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Disconnecting => write!(f, "Disconnecting"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// One `(previous, current)` notification from the SDK.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusChange {
    pub previous: ConnectionStatus,
    pub current: ConnectionStatus,
}

impl StatusChange {
    #[must_use]
    pub const fn new(previous: ConnectionStatus, current: ConnectionStatus) -> Self {
        Self { previous, current }
    }

    /// Whether this change is `from -> to`.
    #[must_use]
    pub fn is(self, from: ConnectionStatus, to: ConnectionStatus) -> bool {
        self.previous == from && self.current == to
    }
}

impl std::fmt::Display for StatusChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.previous, self.current)
    }
}

/// The connection the SDK currently reports as established.
#[derive(Clone, Debug, PartialEq)]
pub struct ActiveConnection {
    /// Resolved server location.
    pub location: Location,
    /// Protocol the SDK settled on.
    pub protocol: Protocol,
    /// When the connection was established.
    pub since: Instant,
}
