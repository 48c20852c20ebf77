//! The connection session.
//!
//! Owns the selector, driver, reconnect policy and status presenter and applies
//! every [`Event`] in arrival order through [`Session::handle`]. This is the
//! only place connection state changes.

use std::sync::mpsc::Sender;
use std::sync::Arc;

use color_eyre::Result;

use super::driver::{
    AttemptId, ConnectOrigin, ConnectionDriver, ConnectionFailure, FailureResponse,
    LocationRequest,
};
use super::presenter::{ConnectionStatusPresenter, StatusContext, UnexpectedDisconnect};
use super::reconnect::ReconnectPolicy;
use super::selector::ConnectionConfigurationSelector;
use super::worker::Worker;
use crate::constants;
use crate::event::{Command, Event, EventHandler};
use crate::sdk::{DriverInstallResult, SdkError, VpnSdk};
use crate::settings::SettingsStore;
use crate::state::ConnectionStatus;
use crate::ui::Presenter;

/// Connection session state, generic over where settings live and how
/// things are shown.
pub struct Session<S, P> {
    sdk: Arc<dyn VpnSdk>,
    store: S,
    ui: P,
    driver: ConnectionDriver,
    policy: ReconnectPolicy,
    status: ConnectionStatusPresenter,
    /// Attempt whose `Connecting -> Disconnected` was seen; its completion
    /// decides whether that counts as an unexpected disconnect. Best effort:
    /// status changes carry no attempt id, so a late change from a superseded
    /// attempt is charged to the current one.
    failed_attempt: Option<AttemptId>,
    /// Location to connect to once the current tunnel is down.
    pending_switch: Option<LocationRequest>,
    installing: bool,
}

impl<S: SettingsStore, P: Presenter> Session<S, P> {
    /// Wires a session and subscribes it to the SDK's status changes.
    pub fn new(
        sdk: Arc<dyn VpnSdk>,
        worker: Arc<dyn Worker>,
        events: Sender<Event>,
        store: S,
        ui: P,
    ) -> Self {
        let sink = events.clone();
        sdk.subscribe(Box::new(move |change| {
            let _ = sink.send(Event::Status(change));
        }));

        Self {
            driver: ConnectionDriver::new(Arc::clone(&sdk), worker, events),
            sdk,
            store,
            ui,
            policy: ReconnectPolicy::new(),
            status: ConnectionStatusPresenter::new(),
            failed_attempt: None,
            pending_switch: None,
            installing: false,
        }
    }

    /// Start-up work: push the network guard, then connect if configured to.
    pub fn start(&mut self) {
        let settings = self.store.snapshot().normalized();
        self.sdk.apply_network_guard(settings.network_guard);
        if settings.connect_on_startup {
            tracing::info!("CONNECT: connecting on startup");
            self.start_connect(None, ConnectOrigin::Startup);
        }
    }

    /// Runs the event loop until [`Command::Quit`] or the channel closes.
    ///
    /// # Errors
    ///
    /// Returns an error if the event channel is disconnected.
    pub fn run(&mut self, events: &EventHandler) -> Result<()> {
        self.start();
        loop {
            let event = events.next()?;
            if !self.handle(event) {
                return Ok(());
            }
        }
    }

    /// Applies one event. Returns `false` once the session should stop.
    pub fn handle(&mut self, event: Event) -> bool {
        match event {
            Event::Status(change) => {
                let ctx = StatusContext {
                    reconnect_attempts: self.policy.attempts(),
                    attempt_cancelled: self.driver.is_cancelled(),
                    user_disconnect: self.driver.user_disconnect_requested(),
                };
                let sdk = Arc::clone(&self.sdk);
                let signal = self
                    .status
                    .observe(change, ctx, &mut self.ui, || sdk.active_connection());

                if change.current == ConnectionStatus::Connected {
                    self.policy.on_connected();
                    self.failed_attempt = None;
                }
                match signal {
                    Some(UnexpectedDisconnect::AttemptFailed) => {
                        self.failed_attempt = self.driver.current_attempt();
                    }
                    Some(UnexpectedDisconnect::ConnectionLost) => {
                        tracing::warn!("STATUS: connection lost");
                        self.schedule_reconnect();
                    }
                    None => {}
                }
            }
            Event::Tick => {
                let ui = &mut self.ui;
                let due = self.policy.tick(|left| {
                    ui.change_busy_text(&constants::fill(
                        constants::MSG_RECONNECT_AFTER,
                        left.as_secs(),
                    ));
                });
                if let Some(attempt) = due {
                    self.start_connect(None, ConnectOrigin::Reconnect(attempt));
                }
            }
            Event::ConnectFinished { attempt, result } => {
                let signalled = self.failed_attempt == Some(attempt);
                if signalled {
                    self.failed_attempt = None;
                }
                if let Some(finished) = self.driver.finish(attempt, result) {
                    if let Err(failure) = finished.result {
                        self.resolve_failure(finished.origin, &failure, signalled);
                    }
                }
            }
            Event::DisconnectFinished(result) => {
                self.driver.disconnect_finished();
                match result {
                    Ok(()) => {
                        if let Some(request) = self.pending_switch.take() {
                            tracing::info!("CONNECT: switching to {request}");
                            self.start_connect(Some(&request), ConnectOrigin::User);
                        }
                    }
                    Err(err) => {
                        self.pending_switch = None;
                        tracing::error!("CONNECT: disconnect failed: {err}");
                        self.ui.show_message(constants::TITLE_WARNING, &err.to_string());
                    }
                }
            }
            Event::TapInstallFinished(result) => self.tap_install_finished(result),
            Event::Command(command) => return self.command(command),
        }
        true
    }

    fn command(&mut self, command: Command) -> bool {
        match command {
            Command::Connect(request) => self.request_connect(request),
            Command::Disconnect => {
                self.pending_switch = None;
                self.policy.begin_fresh_episode();
                self.driver.disconnect();
            }
            Command::CancelBusy => self.cancel_busy(),
            Command::ApplyNetworkGuard => {
                let guard = self.store.snapshot().network_guard.normalized();
                tracing::info!("CONNECT: applying network guard (kill switch: {})", guard.kill_switch);
                self.sdk.apply_network_guard(guard);
            }
            Command::Quit => {
                self.driver.cancel();
                return false;
            }
        }
        true
    }

    fn request_connect(&mut self, request: Option<LocationRequest>) {
        let status = self.status.status();
        match request {
            Some(request) if ConnectionDriver::requires_confirmation(ConnectOrigin::User, status) => {
                let current = self.status.connected_to().unwrap_or_default().to_string();
                let message =
                    constants::fill_all(constants::MSG_LOCATION_CHANGE, &[&current, &request]);
                if !self.ui.confirm(constants::TITLE_WARNING, &message) {
                    tracing::info!("CONNECT: location change to {request} declined");
                    return;
                }
                // the new connect is issued once the disconnect completes
                self.policy.begin_fresh_episode();
                self.pending_switch = Some(request);
                self.driver.disconnect();
            }
            None if status == ConnectionStatus::Connected => {
                tracing::info!("CONNECT: already connected");
            }
            request => {
                self.policy.begin_fresh_episode();
                self.start_connect(request.as_ref(), ConnectOrigin::User);
            }
        }
    }

    fn start_connect(&mut self, request: Option<&LocationRequest>, origin: ConnectOrigin) {
        let available = self.sdk.available_protocols();
        let (settings, candidates) =
            match ConnectionConfigurationSelector::apply(&mut self.store, &available) {
                Ok(applied) => applied,
                Err(err) => {
                    tracing::error!("CONNECT: failed to save settings: {err}");
                    let settings = self.store.snapshot().normalized();
                    let candidates = ConnectionConfigurationSelector::build_candidates(&settings);
                    (settings, candidates)
                }
            };

        if let Err(failure) =
            self.driver
                .connect(request, origin, &settings, &candidates, &mut self.store)
        {
            // nothing reached the SDK, so retrying would fail the same way
            self.report(&failure);
            if origin.is_reconnect() {
                self.policy.cancel();
            }
        }
    }

    fn resolve_failure(
        &mut self,
        origin: ConnectOrigin,
        failure: &ConnectionFailure,
        signalled: bool,
    ) {
        let response = failure.response(origin);
        match response {
            FailureResponse::Ignore => tracing::info!("CONNECT: {origin} attempt cancelled"),
            FailureResponse::Swallow => {
                tracing::warn!("RECONNECT: {origin} failed: {failure}");
            }
            FailureResponse::Report => self.report(failure),
            FailureResponse::OfferTapInstall => self.offer_tap_install(),
        }

        // a reconnect attempt stays in its episode even when the SDK never
        // reported `Connecting -> Disconnected` for it
        if failure.is_retryable() && (signalled || origin.is_reconnect()) {
            if !self.schedule_reconnect() && response == FailureResponse::Swallow {
                self.report(failure);
            }
        } else if origin.is_reconnect() {
            self.policy.cancel();
        }
    }

    fn report(&mut self, failure: &ConnectionFailure) {
        let message = match failure {
            ConnectionFailure::InvalidDoubleHopConfiguration => {
                constants::MSG_INVALID_DOUBLE_HOP.to_string()
            }
            other => other.to_string(),
        };
        tracing::error!("CONNECT: {message}");
        self.ui.show_message(constants::TITLE_CONNECTION_FAILED, &message);
    }

    fn offer_tap_install(&mut self) {
        if self
            .ui
            .confirm(constants::TITLE_TAP_NOT_INSTALLED, constants::MSG_TAP_NOT_INSTALLED)
        {
            self.installing = true;
            self.ui.activate_busy(constants::MSG_INSTALLING, false);
            self.driver.install_tap_driver();
        } else {
            tracing::info!("CONNECT: TAP install declined");
        }
    }

    fn tap_install_finished(&mut self, result: std::result::Result<DriverInstallResult, SdkError>) {
        self.installing = false;
        self.ui.dismiss_busy();
        let message = match result {
            Ok(DriverInstallResult::Success) => constants::MSG_TAP_SUCCESS,
            Ok(DriverInstallResult::RebootRequired) => constants::MSG_TAP_REBOOT,
            Ok(DriverInstallResult::Failed) => constants::MSG_TAP_FAILED,
            Err(SdkError::UnsupportedProtocol) => constants::MSG_OPENVPN_UNSUPPORTED,
            Err(err) => {
                tracing::error!("CONNECT: TAP install error: {err}");
                constants::MSG_TAP_FAILED
            }
        };
        tracing::info!("CONNECT: TAP install finished: {message}");
        self.ui.show_message(constants::TITLE_TAP_INSTALLER, message);
    }

    fn cancel_busy(&mut self) {
        if self.policy.is_counting_down() {
            self.policy.cancel();
            self.ui.dismiss_busy();
            return;
        }
        self.driver.cancel();
        self.policy.cancel();
    }

    /// Returns whether a countdown is now running.
    fn schedule_reconnect(&mut self) -> bool {
        let settings = self.store.snapshot().normalized();
        match self
            .policy
            .on_unexpected_disconnect(settings.auto_reconnect, settings.reconnect_tries)
        {
            Some(delay) => {
                self.ui.activate_busy(
                    &constants::fill(constants::MSG_RECONNECT_AFTER, delay.as_secs()),
                    true,
                );
                true
            }
            None => self.policy.is_counting_down(),
        }
    }

    // === Accessors ===

    #[must_use]
    pub const fn status(&self) -> ConnectionStatus {
        self.status.status()
    }

    #[must_use]
    pub const fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    #[must_use]
    pub const fn presenter(&self) -> &P {
        &self.ui
    }

    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.ui
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Nothing in flight, nothing scheduled and the tunnel is at rest.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.driver.current_attempt().is_none()
            && !self.driver.user_disconnect_requested()
            && !self.policy.is_counting_down()
            && self.pending_switch.is_none()
            && !self.installing
            && !self.status.status().is_transitional()
    }
}
