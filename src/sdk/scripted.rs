//! Scripted stand-in for the VPN SDK.
//!
//! Plays back queued connect outcomes and emits the status transitions a real
//! SDK would. Used by the terminal `simulate` command and by tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::{CancelToken, ConnectTarget, DriverInstallResult, SdkError, StatusSink, VpnSdk};
use crate::state::{
    ActiveConnection, ConnectionConfiguration, ConnectionStatus, Location, LocationCatalog,
    NetworkGuard, Protocol, StatusChange,
};

/// How the next connect call ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptedOutcome {
    Succeed,
    Fail(String),
    /// Fail, reporting `Failed` instead of `Disconnected`.
    Fault(String),
    /// Fail before leaving `Disconnected`.
    Reject(String),
    /// Stay in `Connecting` until cancelled.
    Hang,
}

/// JSON-loadable description of a scripted SDK.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdkScript {
    pub locations: Vec<Location>,
    #[serde(default = "all_protocols")]
    pub protocols: Vec<Protocol>,
    /// Consumed one per connect call; an empty queue succeeds.
    #[serde(default)]
    pub outcomes: Vec<ScriptedOutcome>,
    #[serde(default = "default_true")]
    pub tap_installed: bool,
    #[serde(default = "default_install_result")]
    pub tap_install_result: DriverInstallResult,
    /// Simulated handshake time.
    #[serde(default)]
    pub connect_delay_ms: u64,
}

fn all_protocols() -> Vec<Protocol> {
    Protocol::FALLBACK_ORDER.to_vec()
}

const fn default_true() -> bool {
    true
}

const fn default_install_result() -> DriverInstallResult {
    DriverInstallResult::Success
}

impl SdkScript {
    /// Parses a script from JSON text.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if the text is not a valid script.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// A call the scripted SDK received, for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SdkCall {
    Connect {
        target: ConnectTarget,
        configurations: Vec<ConnectionConfiguration>,
    },
    Disconnect,
    CancelConnectionProcess,
    InstallTapDriver,
    ApplyNetworkGuard(NetworkGuard),
}

struct Inner {
    status: ConnectionStatus,
    active: Option<ActiveConnection>,
    outcomes: VecDeque<ScriptedOutcome>,
    calls: Vec<SdkCall>,
    tap_installed: bool,
    tap_install_result: DriverInstallResult,
}

/// Scripted [`VpnSdk`] implementation.
pub struct ScriptedSdk {
    catalog: LocationCatalog,
    protocols: Vec<Protocol>,
    connect_delay: Duration,
    sink: Mutex<Option<Arc<dyn Fn(StatusChange) + Send + Sync>>>,
    inner: Mutex<Inner>,
}

impl ScriptedSdk {
    #[must_use]
    pub fn new(script: SdkScript) -> Self {
        Self {
            catalog: LocationCatalog::new(script.locations),
            protocols: script.protocols,
            connect_delay: Duration::from_millis(script.connect_delay_ms),
            sink: Mutex::new(None),
            inner: Mutex::new(Inner {
                status: ConnectionStatus::Disconnected,
                active: None,
                outcomes: script.outcomes.into(),
                calls: Vec::new(),
                tap_installed: script.tap_installed,
                tap_install_result: script.tap_install_result,
            }),
        }
    }

    /// Script with the given catalog and defaults for everything else.
    #[must_use]
    pub fn with_locations(locations: Vec<Location>) -> Self {
        Self::new(SdkScript {
            locations,
            protocols: all_protocols(),
            outcomes: Vec::new(),
            tap_installed: true,
            tap_install_result: DriverInstallResult::Success,
            connect_delay_ms: 0,
        })
    }

    /// Queues how upcoming connect calls end.
    pub fn push_outcomes(&self, outcomes: impl IntoIterator<Item = ScriptedOutcome>) {
        self.lock().outcomes.extend(outcomes);
    }

    pub fn set_tap_installed(&self, installed: bool) {
        self.lock().tap_installed = installed;
    }

    pub fn set_tap_install_result(&self, result: DriverInstallResult) {
        self.lock().tap_install_result = result;
    }

    /// Drops an established tunnel as a network failure would.
    pub fn drop_connection(&self) {
        if self.status() == ConnectionStatus::Connected {
            self.lock().active = None;
            self.transition(ConnectionStatus::Disconnected);
        }
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.lock().status
    }

    #[must_use]
    pub fn calls(&self) -> Vec<SdkCall> {
        self.lock().calls.clone()
    }

    /// Connect calls only, in order.
    #[must_use]
    pub fn connect_calls(&self) -> Vec<(ConnectTarget, Vec<ConnectionConfiguration>)> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                SdkCall::Connect {
                    target,
                    configurations,
                } => Some((target.clone(), configurations.clone())),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, current: ConnectionStatus) {
        let previous = {
            let mut inner = self.lock();
            std::mem::replace(&mut inner.status, current)
        };
        let sink = self
            .sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(sink) = sink {
            sink(StatusChange::new(previous, current));
        }
    }

    fn wait_until_cancelled(cancel: &CancelToken) {
        while !cancel.is_cancelled() {
            thread::sleep(Duration::from_millis(50));
        }
    }
}

impl VpnSdk for ScriptedSdk {
    fn subscribe(&self, sink: StatusSink) {
        *self.sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::from(sink));
    }

    fn locations(&self) -> LocationCatalog {
        self.catalog.clone()
    }

    fn available_protocols(&self) -> Vec<Protocol> {
        self.protocols.clone()
    }

    fn connect(
        &self,
        target: &ConnectTarget,
        configurations: &[ConnectionConfiguration],
        cancel: &CancelToken,
    ) -> Result<(), SdkError> {
        let outcome = {
            let mut inner = self.lock();
            inner.calls.push(SdkCall::Connect {
                target: target.clone(),
                configurations: configurations.to_vec(),
            });

            if configurations
                .iter()
                .filter_map(ConnectionConfiguration::double_hop)
                .any(|route| !route.is_complete())
            {
                return Err(SdkError::InvalidDoubleHopConfiguration);
            }

            let openvpn_only = !configurations.is_empty()
                && configurations
                    .iter()
                    .all(|c| c.protocol() == Protocol::OpenVpn);
            if openvpn_only && !inner.tap_installed {
                return Err(SdkError::TapAdapterMissing);
            }

            match inner.outcomes.pop_front() {
                Some(ScriptedOutcome::Reject(message)) => return Err(SdkError::Failed(message)),
                outcome => outcome.unwrap_or(ScriptedOutcome::Succeed),
            }
        };

        self.transition(ConnectionStatus::Connecting);
        let failed_status = if matches!(outcome, ScriptedOutcome::Fault(_)) {
            ConnectionStatus::Failed
        } else {
            ConnectionStatus::Disconnected
        };

        if !self.connect_delay.is_zero() && !cancel.is_cancelled() {
            thread::sleep(self.connect_delay);
        }

        let result = match outcome {
            _ if cancel.is_cancelled() => Err(SdkError::Cancelled),
            ScriptedOutcome::Succeed => Ok(()),
            ScriptedOutcome::Fail(message)
            | ScriptedOutcome::Fault(message)
            | ScriptedOutcome::Reject(message) => Err(SdkError::Failed(message)),
            ScriptedOutcome::Hang => {
                Self::wait_until_cancelled(cancel);
                Err(SdkError::Cancelled)
            }
        };

        match result {
            Ok(()) => {
                let location = match target {
                    ConnectTarget::Single(location) => Some(location.clone()),
                    ConnectTarget::AnyOf(locations) => locations.first().cloned(),
                };
                let protocol = configurations
                    .first()
                    .map_or(Protocol::Automatic, ConnectionConfiguration::protocol);
                self.lock().active = location.map(|location| ActiveConnection {
                    location,
                    protocol,
                    since: Instant::now(),
                });
                self.transition(ConnectionStatus::Connected);
                Ok(())
            }
            Err(err) => {
                self.transition(failed_status);
                Err(err)
            }
        }
    }

    fn disconnect(&self) -> Result<(), SdkError> {
        let status = {
            let mut inner = self.lock();
            inner.calls.push(SdkCall::Disconnect);
            inner.status
        };
        if status == ConnectionStatus::Connected {
            self.transition(ConnectionStatus::Disconnecting);
            self.lock().active = None;
            self.transition(ConnectionStatus::Disconnected);
        }
        Ok(())
    }

    fn cancel_connection_process(&self) {
        self.lock().calls.push(SdkCall::CancelConnectionProcess);
    }

    fn install_tap_driver(&self) -> Result<DriverInstallResult, SdkError> {
        let mut inner = self.lock();
        inner.calls.push(SdkCall::InstallTapDriver);
        if !self.protocols.contains(&Protocol::OpenVpn) {
            return Err(SdkError::UnsupportedProtocol);
        }
        if inner.tap_install_result != DriverInstallResult::Failed {
            inner.tap_installed = true;
        }
        Ok(inner.tap_install_result)
    }

    fn active_connection(&self) -> Option<ActiveConnection> {
        self.lock().active.clone()
    }

    fn apply_network_guard(&self, guard: NetworkGuard) {
        self.lock().calls.push(SdkCall::ApplyNetworkGuard(guard));
    }
}
