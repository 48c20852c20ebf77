//! Drives connect and disconnect through the SDK.
//!
//! The driver owns the in-flight attempt and its cancellation handle. SDK
//! calls run on a [`Worker`]; their results come back as events and are
//! matched against the current attempt so completions of superseded
//! attempts never touch current state.

use std::sync::mpsc::Sender;
use std::sync::Arc;

use thiserror::Error;

use super::reconnect::ReconnectAttempt;
use super::worker::Worker;
use crate::event::Event;
use crate::sdk::{CancelToken, ConnectTarget, SdkError, VpnSdk};
use crate::settings::{Settings, SettingsStore};
use crate::state::{ConnectionConfiguration, ConnectionStatus, Location, LocationCatalog, Protocol};

/// Identity of one connect attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttemptId(u64);

impl std::fmt::Display for AttemptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An explicit location choice. No request means "the remembered selection".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationRequest {
    Specific(Location),
    /// Every location of a country code; the SDK tries each in turn.
    Country(String),
}

impl std::fmt::Display for LocationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Specific(location) => write!(f, "{location}"),
            Self::Country(code) => write!(f, "{code}"),
        }
    }
}

/// Who asked for a connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOrigin {
    User,
    Startup,
    Reconnect(ReconnectAttempt),
}

impl ConnectOrigin {
    #[must_use]
    pub const fn is_reconnect(self) -> bool {
        matches!(self, Self::Reconnect(_))
    }
}

impl std::fmt::Display for ConnectOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Startup => write!(f, "startup"),
            Self::Reconnect(attempt) => write!(f, "reconnect {attempt}"),
        }
    }
}

/// Classified outcome of a failed connect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionFailure {
    #[error("connection cancelled")]
    Cancelled,
    #[error("TAP adapter is not installed")]
    TapAdapterMissing,
    #[error("invalid double hop configuration")]
    InvalidDoubleHopConfiguration,
    #[error("{0}")]
    Generic(String),
}

impl From<SdkError> for ConnectionFailure {
    fn from(err: SdkError) -> Self {
        match err {
            SdkError::Cancelled => Self::Cancelled,
            SdkError::TapAdapterMissing => Self::TapAdapterMissing,
            SdkError::InvalidDoubleHopConfiguration => Self::InvalidDoubleHopConfiguration,
            SdkError::UnsupportedProtocol | SdkError::Failed(_) => Self::Generic(err.to_string()),
        }
    }
}

/// What the session does with a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureResponse {
    /// Silent no-op.
    Ignore,
    /// Logged only; the reconnect episode carries on.
    Swallow,
    /// One dialog.
    Report,
    /// Offer to install the TAP adapter.
    OfferTapInstall,
}

impl ConnectionFailure {
    #[must_use]
    pub const fn response(&self, origin: ConnectOrigin) -> FailureResponse {
        match (self, origin) {
            (Self::Cancelled, _) => FailureResponse::Ignore,
            (Self::TapAdapterMissing, _) => FailureResponse::OfferTapInstall,
            (Self::InvalidDoubleHopConfiguration, _) => FailureResponse::Report,
            (Self::Generic(_), ConnectOrigin::Reconnect(attempt)) if !attempt.is_last_try() => {
                FailureResponse::Swallow
            }
            (Self::Generic(_), _) => FailureResponse::Report,
        }
    }

    /// Only transport-level failures feed the reconnect policy.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Generic(_))
    }
}

/// A resolved connect attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finished {
    pub attempt: AttemptId,
    pub origin: ConnectOrigin,
    pub result: Result<(), ConnectionFailure>,
}

struct InFlight {
    id: AttemptId,
    origin: ConnectOrigin,
    cancel: CancelToken,
}

/// Issues connect/disconnect requests and tracks the one in-flight attempt.
pub struct ConnectionDriver {
    sdk: Arc<dyn VpnSdk>,
    worker: Arc<dyn Worker>,
    events: Sender<Event>,
    generation: u64,
    in_flight: Option<InFlight>,
    user_disconnect: bool,
}

impl ConnectionDriver {
    pub fn new(sdk: Arc<dyn VpnSdk>, worker: Arc<dyn Worker>, events: Sender<Event>) -> Self {
        Self {
            sdk,
            worker,
            events,
            generation: 0,
            in_flight: None,
            user_disconnect: false,
        }
    }

    /// Starts a connect attempt, superseding any attempt still in flight.
    ///
    /// The SDK call runs on the worker and reports back through
    /// [`Event::ConnectFinished`]. An explicit `request` is remembered in
    /// settings before the attempt starts.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionFailure::Generic`] when no target or no matching
    /// configuration can be resolved; the SDK is not called in that case.
    pub fn connect(
        &mut self,
        request: Option<&LocationRequest>,
        origin: ConnectOrigin,
        settings: &Settings,
        candidates: &[ConnectionConfiguration],
        store: &mut dyn SettingsStore,
    ) -> Result<AttemptId, ConnectionFailure> {
        let catalog = self.sdk.locations();
        let target = resolve_target(&catalog, request, settings)?;
        let configurations = pick_configurations(settings.protocol, candidates)?;

        if let Some(request) = request {
            remember_location(store, request);
        }

        self.supersede();
        self.generation += 1;
        let id = AttemptId(self.generation);
        let cancel = CancelToken::new();
        self.in_flight = Some(InFlight {
            id,
            origin,
            cancel: cancel.clone(),
        });
        self.user_disconnect = false;

        let protocols: Vec<String> = configurations.iter().map(ToString::to_string).collect();
        tracing::info!(
            "CONNECT: {id} ({origin}) to {target} via [{}]",
            protocols.join(", ")
        );

        let sdk = Arc::clone(&self.sdk);
        let events = self.events.clone();
        self.worker.execute(Box::new(move || {
            let result = sdk.connect(&target, &configurations, &cancel);
            let _ = events.send(Event::ConnectFinished {
                attempt: id,
                result,
            });
        }));

        Ok(id)
    }

    /// Matches a connect completion against the current attempt.
    ///
    /// Returns `None` for completions of superseded attempts. A failure of an
    /// attempt that was cancelled is always reported as cancelled.
    pub fn finish(&mut self, attempt: AttemptId, result: Result<(), SdkError>) -> Option<Finished> {
        if self.current_attempt() != Some(attempt) {
            tracing::debug!("CONNECT: ignoring stale completion of {attempt}");
            return None;
        }
        let in_flight = self.in_flight.take()?;

        let result = result.map_err(|err| {
            if in_flight.cancel.is_cancelled() {
                ConnectionFailure::Cancelled
            } else {
                ConnectionFailure::from(err)
            }
        });

        Some(Finished {
            attempt,
            origin: in_flight.origin,
            result,
        })
    }

    /// Requests cancellation of the in-flight attempt. Repeated calls are no-ops.
    pub fn cancel(&mut self) {
        if let Some(in_flight) = &self.in_flight {
            if !in_flight.cancel.is_cancelled() {
                tracing::info!("CONNECT: cancelling {}", in_flight.id);
                in_flight.cancel.cancel();
                self.sdk.cancel_connection_process();
            }
        }
    }

    /// User-initiated disconnect. Cancels an attempt still in flight.
    ///
    /// Completion arrives as [`Event::DisconnectFinished`].
    pub fn disconnect(&mut self) {
        self.cancel();
        self.user_disconnect = true;
        tracing::info!("CONNECT: disconnect requested");

        let sdk = Arc::clone(&self.sdk);
        let events = self.events.clone();
        self.worker.execute(Box::new(move || {
            let result = sdk.disconnect();
            let _ = events.send(Event::DisconnectFinished(result));
        }));
    }

    pub fn disconnect_finished(&mut self) {
        self.user_disconnect = false;
    }

    /// Runs the TAP adapter install off the event thread.
    pub fn install_tap_driver(&self) {
        tracing::info!("CONNECT: installing TAP adapter");
        let sdk = Arc::clone(&self.sdk);
        let events = self.events.clone();
        self.worker.execute(Box::new(move || {
            let result = sdk.install_tap_driver();
            let _ = events.send(Event::TapInstallFinished(result));
        }));
    }

    /// A user switching location while connected must confirm first.
    #[must_use]
    pub fn requires_confirmation(origin: ConnectOrigin, status: ConnectionStatus) -> bool {
        origin == ConnectOrigin::User && status == ConnectionStatus::Connected
    }

    #[must_use]
    pub fn current_attempt(&self) -> Option<AttemptId> {
        self.in_flight.as_ref().map(|in_flight| in_flight.id)
    }

    /// Whether cancellation was requested for the in-flight attempt.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|in_flight| in_flight.cancel.is_cancelled())
    }

    /// Whether a user disconnect is in progress.
    #[must_use]
    pub const fn user_disconnect_requested(&self) -> bool {
        self.user_disconnect
    }

    fn supersede(&mut self) {
        if let Some(previous) = self.in_flight.take() {
            if !previous.cancel.is_cancelled() {
                tracing::info!("CONNECT: {} superseded", previous.id);
                previous.cancel.cancel();
                self.sdk.cancel_connection_process();
            }
        }
    }
}

/// Resolves where a connect goes.
///
/// Explicit requests win. Otherwise the remembered location id, then city,
/// then country is looked up; the catalog's first entry is the fallback.
///
/// # Errors
///
/// Returns [`ConnectionFailure::Generic`] for an unknown country or an empty
/// catalog.
pub fn resolve_target(
    catalog: &LocationCatalog,
    request: Option<&LocationRequest>,
    settings: &Settings,
) -> Result<ConnectTarget, ConnectionFailure> {
    match request {
        Some(LocationRequest::Specific(location)) => Ok(ConnectTarget::Single(location.clone())),
        Some(LocationRequest::Country(code)) => country_target(catalog, code)
            .ok_or_else(|| ConnectionFailure::Generic(format!("no locations in {code}"))),
        None => {
            let remembered = settings
                .selected_location
                .as_deref()
                .and_then(|id| catalog.by_id(id))
                .or_else(|| {
                    settings
                        .selected_city
                        .as_deref()
                        .and_then(|city| catalog.by_city_code(city))
                })
                .map(|location| ConnectTarget::Single(location.clone()));

            remembered
                .or_else(|| {
                    settings
                        .selected_country
                        .as_deref()
                        .and_then(|code| country_target(catalog, code))
                })
                .or_else(|| catalog.first().cloned().map(ConnectTarget::Single))
                .ok_or_else(|| ConnectionFailure::Generic("location catalog is empty".to_string()))
        }
    }
}

fn country_target(catalog: &LocationCatalog, code: &str) -> Option<ConnectTarget> {
    let mut locations = catalog.in_country(code);
    match locations.len() {
        0 => None,
        1 => locations.pop().map(ConnectTarget::Single),
        _ => Some(ConnectTarget::AnyOf(locations)),
    }
}

/// Automatic passes every candidate; a pinned protocol passes its one match.
///
/// # Errors
///
/// Returns [`ConnectionFailure::Generic`] when no candidate matches.
pub fn pick_configurations(
    protocol: Protocol,
    candidates: &[ConnectionConfiguration],
) -> Result<Vec<ConnectionConfiguration>, ConnectionFailure> {
    let picked: Vec<ConnectionConfiguration> = match protocol {
        Protocol::Automatic => candidates.to_vec(),
        pinned => candidates
            .iter()
            .find(|c| c.protocol() == pinned)
            .cloned()
            .into_iter()
            .collect(),
    };
    if picked.is_empty() {
        return Err(ConnectionFailure::Generic(format!(
            "no configuration for {protocol}"
        )));
    }
    Ok(picked)
}

/// Writes an explicit location choice back to settings.
fn remember_location(store: &mut dyn SettingsStore, request: &LocationRequest) {
    let mut settings = store.snapshot();
    let before = settings.clone();

    match request {
        LocationRequest::Specific(Location::Region(region)) => {
            settings.selected_country = Some(region.country_code.clone());
            settings.selected_city = Some(region.city_code.clone());
            settings.selected_location = Some(region.id.clone());
        }
        LocationRequest::Specific(Location::BestAvailable { .. }) => {
            settings.selected_country = None;
            settings.selected_city = None;
            settings.selected_location = None;
        }
        LocationRequest::Country(code) => {
            settings.selected_country = Some(code.clone());
            settings.selected_city = None;
            settings.selected_location = None;
        }
    }

    if settings != before {
        if let Err(err) = store.save(&settings) {
            tracing::error!("CONNECT: failed to remember location: {err}");
        }
    }
}
