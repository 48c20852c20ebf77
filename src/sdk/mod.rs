//! Seam to the external VPN SDK.
//!
//! The SDK owns tunnel establishment, adapters and network enforcement. This
//! crate only drives it through [`VpnSdk`]. Calls on the trait may block and
//! are issued from worker threads, never from the event loop.

pub mod scripted;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::state::{
    ActiveConnection, ConnectionConfiguration, Location, LocationCatalog, NetworkGuard, Protocol,
    StatusChange,
};

/// Conditions the SDK raises from connect, disconnect and driver install.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SdkError {
    #[error("operation cancelled")]
    Cancelled,
    #[error("TAP adapter is not installed")]
    TapAdapterMissing,
    #[error("double hop entry or destination location is not set")]
    InvalidDoubleHopConfiguration,
    #[error("protocol is not supported on this system")]
    UnsupportedProtocol,
    #[error("{0}")]
    Failed(String),
}

/// Outcome of a TAP driver install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverInstallResult {
    Success,
    RebootRequired,
    Failed,
}

/// Where a connect call should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectTarget {
    /// One location (a region or the best-available marker).
    Single(Location),
    /// Same-country locations; the SDK tries each until one succeeds.
    AnyOf(Vec<Location>),
}

impl std::fmt::Display for ConnectTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single(location) => write!(f, "{location}"),
            Self::AnyOf(locations) => match locations.first() {
                Some(Location::Region(region)) => {
                    write!(f, "{} ({} locations)", region.country, locations.len())
                }
                _ => write!(f, "{} locations", locations.len()),
            },
        }
    }
}

/// Cooperative cancellation flag shared with an in-flight SDK call.
///
/// Cancelling is idempotent; cancelling a token nobody polls anymore is a no-op.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Receiver of the SDK's ordered status-change notifications.
pub type StatusSink = Box<dyn Fn(StatusChange) + Send + Sync>;

/// The external VPN SDK.
///
/// Implementations must deliver status changes through the subscribed sink in
/// the order they happen, and synchronously with respect to the call that
/// causes them: every change a `connect` produces is delivered before it returns.
pub trait VpnSdk: Send + Sync {
    /// Registers the single status-change subscriber, replacing any previous one.
    fn subscribe(&self, sink: StatusSink);

    /// Ordered location catalog; index 0 is the best-available entry.
    fn locations(&self) -> LocationCatalog;

    /// Protocols usable on this machine.
    fn available_protocols(&self) -> Vec<Protocol>;

    /// Establishes a tunnel, blocking until it is up or has failed.
    ///
    /// # Errors
    ///
    /// Returns the condition that stopped the attempt.
    fn connect(
        &self,
        target: &ConnectTarget,
        configurations: &[ConnectionConfiguration],
        cancel: &CancelToken,
    ) -> Result<(), SdkError>;

    /// Tears the tunnel down, blocking until it is gone.
    ///
    /// # Errors
    ///
    /// Returns the condition that stopped the teardown.
    fn disconnect(&self) -> Result<(), SdkError>;

    /// Aborts the connect that is currently in progress, if any.
    fn cancel_connection_process(&self);

    /// Installs or repairs the `OpenVPN` TAP adapter.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::UnsupportedProtocol`] when `OpenVPN` is unavailable.
    fn install_tap_driver(&self) -> Result<DriverInstallResult, SdkError>;

    /// The established connection, if any.
    fn active_connection(&self) -> Option<ActiveConnection>;

    /// Pushes network enforcement toggles.
    fn apply_network_guard(&self, guard: NetworkGuard);
}
