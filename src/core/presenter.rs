//! Maps SDK status changes to what the user sees.

use crate::constants;
use crate::state::{ActiveConnection, ConnectionStatus, StatusChange};
use crate::ui::Presenter;

/// Facts about the session the status mapping depends on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusContext {
    /// Attempts spent in the current reconnect episode.
    pub reconnect_attempts: u32,
    /// The in-flight connect was cancelled.
    pub attempt_cancelled: bool,
    /// A user disconnect is in progress.
    pub user_disconnect: bool,
}

/// Kinds of unexpected disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnexpectedDisconnect {
    /// Connecting -> Disconnected without a cancel.
    AttemptFailed,
    /// Connected -> Disconnected without a user disconnect.
    ConnectionLost,
}

/// Observes status changes, drives the busy indicator and announcements,
/// and reports unexpected disconnects.
#[derive(Debug, Default)]
pub struct ConnectionStatusPresenter {
    status: ConnectionStatus,
    /// Display name of the location while connected.
    connected_to: Option<String>,
    /// Captured location kept until the tunnel is fully down.
    leaving: Option<String>,
}

impl ConnectionStatusPresenter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last observed status.
    #[must_use]
    pub const fn status(&self) -> ConnectionStatus {
        self.status
    }

    #[must_use]
    pub fn connected_to(&self) -> Option<&str> {
        self.connected_to.as_deref()
    }

    /// Applies one status change.
    ///
    /// `active` is asked for the resolved location only on entering
    /// `Connected`.
    pub fn observe(
        &mut self,
        change: StatusChange,
        ctx: StatusContext,
        ui: &mut dyn Presenter,
        active: impl FnOnce() -> Option<ActiveConnection>,
    ) -> Option<UnexpectedDisconnect> {
        tracing::debug!("STATUS: {change}");
        self.status = change.current;

        if change.previous == ConnectionStatus::Connected
            && change.current != ConnectionStatus::Connected
        {
            self.leaving = self.connected_to.take();
        }

        match change.current {
            ConnectionStatus::Connecting => {
                let text = if ctx.reconnect_attempts > 0 {
                    constants::MSG_RECONNECTING
                } else {
                    constants::MSG_CONNECTING
                };
                ui.activate_busy(text, true);
                ui.announce(text);
            }
            ConnectionStatus::Disconnecting => {
                ui.activate_busy(constants::MSG_DISCONNECTING, false);
                ui.announce(constants::MSG_DISCONNECTING);
            }
            ConnectionStatus::Connected => {
                ui.dismiss_busy();
                self.leaving = None;
                self.connected_to = active().map(|connection| connection.location.to_string());
                if let Some(location) = &self.connected_to {
                    ui.announce(&constants::fill(constants::MSG_CONNECTED_TO, location));
                }
            }
            ConnectionStatus::Disconnected | ConnectionStatus::Failed => {
                ui.dismiss_busy();
                if let Some(location) = self.leaving.take() {
                    ui.announce(&constants::fill(constants::MSG_DISCONNECTED_FROM, location));
                }
            }
        }

        if change.is(ConnectionStatus::Connecting, ConnectionStatus::Disconnected)
            && !ctx.attempt_cancelled
        {
            return Some(UnexpectedDisconnect::AttemptFailed);
        }
        if change.is(ConnectionStatus::Connected, ConnectionStatus::Disconnected)
            && !ctx.user_disconnect
        {
            return Some(UnexpectedDisconnect::ConnectionLost);
        }
        None
    }
}
