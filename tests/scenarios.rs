//! End-to-end connection scenarios against the scripted SDK.
//!
//! Background work runs on a queued worker and time advances by explicit
//! ticks, so every run is deterministic.

use std::sync::mpsc;
use std::sync::Arc;

use wlvpn::constants;
use wlvpn::core::{QueuedWorker, ReconnectAttempt, ReconnectPhase, Session};
use wlvpn::core::LocationRequest;
use wlvpn::event::{Command, Event};
use wlvpn::sdk::scripted::{ScriptedOutcome, ScriptedSdk, SdkCall};
use wlvpn::sdk::ConnectTarget;
use wlvpn::settings::{MemorySettingsStore, Settings, SettingsStore};
use wlvpn::state::{ConnectionStatus, Location, Protocol};
use wlvpn::ui::{RecordingPresenter, UiEvent};

fn stockholm() -> Location {
    Location::region("101", "Sweden", "SE", "Stockholm", "sto", Some(35))
}

fn oslo() -> Location {
    Location::region("202", "Norway", "NO", "Oslo", "osl", Some(60))
}

struct Harness {
    sdk: Arc<ScriptedSdk>,
    worker: Arc<QueuedWorker>,
    rx: mpsc::Receiver<Event>,
    session: Session<MemorySettingsStore, RecordingPresenter>,
}

impl Harness {
    fn new(settings: Settings) -> Self {
        let sdk = Arc::new(ScriptedSdk::with_locations(vec![
            Location::BestAvailable {
                search_name: "Best Available".to_string(),
            },
            stockholm(),
            oslo(),
        ]));
        let worker = Arc::new(QueuedWorker::new());
        let (tx, rx) = mpsc::channel();
        let session = Session::new(
            sdk.clone(),
            worker.clone(),
            tx,
            MemorySettingsStore::new(settings),
            RecordingPresenter::new(),
        );
        Self {
            sdk,
            worker,
            rx,
            session,
        }
    }

    /// Runs queued SDK work and applies resulting events until quiet.
    fn pump(&mut self) {
        loop {
            self.worker.run_pending();
            let events: Vec<Event> = self.rx.try_iter().collect();
            if events.is_empty() && self.worker.pending() == 0 {
                return;
            }
            for event in events {
                self.session.handle(event);
            }
        }
    }

    fn send(&mut self, command: Command) {
        self.session.handle(Event::Command(command));
        self.pump();
    }

    fn tick(&mut self) {
        self.session.handle(Event::Tick);
        self.pump();
    }

    fn connect_count(&self) -> usize {
        self.sdk.connect_calls().len()
    }

    fn countdowns(&self) -> Vec<String> {
        self.session
            .presenter()
            .events()
            .iter()
            .filter_map(|event| match event {
                UiEvent::Busy { text, .. } if text.starts_with("Reconnecting in") => {
                    Some(text.clone())
                }
                _ => None,
            })
            .collect()
    }
}

fn reconnect_settings(tries: u32) -> Settings {
    Settings {
        auto_reconnect: true,
        reconnect_tries: tries,
        ..Settings::default()
    }
}

#[test]
fn test_network_drop_backs_off_then_gives_up() {
    let mut h = Harness::new(reconnect_settings(3));
    h.send(Command::Connect(None));
    assert_eq!(h.session.status(), ConnectionStatus::Connected);

    h.sdk
        .push_outcomes(vec![ScriptedOutcome::Fail("handshake timeout".to_string()); 3]);
    h.sdk.drop_connection();
    h.pump();
    assert!(h.session.policy().is_counting_down());

    let mut ticks = 0;
    let mut dialogs_after_attempt = Vec::new();
    while h.session.policy().is_counting_down() {
        let before = h.connect_count();
        h.tick();
        ticks += 1;
        if h.connect_count() > before {
            dialogs_after_attempt.push(h.session.presenter().messages().len());
        }
        assert!(ticks < 100, "countdown never finished");
    }

    assert_eq!(ticks, 2 + 4 + 8);
    assert_eq!(
        h.countdowns(),
        vec![
            "Reconnecting in 2 seconds...",
            "Reconnecting in 4 seconds...",
            "Reconnecting in 8 seconds...",
        ]
    );
    assert_eq!(dialogs_after_attempt, vec![0, 0, 1]);
    assert_eq!(
        h.session.presenter().messages(),
        vec![(constants::TITLE_CONNECTION_FAILED, "handshake timeout")]
    );
    assert_eq!(h.session.policy().phase(), ReconnectPhase::GaveUp);
    assert_eq!(h.session.policy().attempts(), 0);

    for _ in 0..120 {
        h.tick();
    }
    assert_eq!(h.connect_count(), 4);
}

#[test]
fn test_user_disconnect_leaves_pending_countdown_alone() {
    let mut h = Harness::new(reconnect_settings(5));
    h.send(Command::Connect(None));
    h.sdk
        .push_outcomes([ScriptedOutcome::Fail("no route".to_string())]);
    h.sdk.drop_connection();
    h.pump();

    // attempt 1 fails quietly and attempt 2 is scheduled
    h.tick();
    h.tick();
    assert_eq!(h.session.policy().attempts(), 1);
    assert!(h.session.presenter().messages().is_empty());

    h.send(Command::Disconnect);
    assert_eq!(h.session.policy().attempts(), 0);
    match h.session.policy().phase() {
        ReconnectPhase::CountingDown { attempt, remaining } => {
            assert_eq!(attempt, ReconnectAttempt { attempt: 2, max: 5 });
            assert_eq!(remaining.as_secs(), 4);
        }
        other => panic!("countdown was disturbed: {other:?}"),
    }

    for _ in 0..4 {
        h.tick();
    }
    assert_eq!(h.connect_count(), 3);
    assert_eq!(h.session.status(), ConnectionStatus::Connected);
    assert!(h
        .session
        .presenter()
        .announcements()
        .contains(&constants::MSG_RECONNECTING));
    assert_eq!(h.session.policy().phase(), ReconnectPhase::Idle);
}

#[test]
fn test_incomplete_double_hop_fails_immediately() {
    let mut h = Harness::new(Settings {
        double_hop: true,
        double_hop_entry: None,
        double_hop_destination: Some("nl-ams".to_string()),
        ..reconnect_settings(5)
    });
    h.send(Command::Connect(None));

    assert_eq!(
        h.session.presenter().messages(),
        vec![(
            constants::TITLE_CONNECTION_FAILED,
            constants::MSG_INVALID_DOUBLE_HOP
        )]
    );
    assert!(!h.session.policy().is_counting_down());
    for _ in 0..120 {
        h.tick();
    }
    assert_eq!(h.connect_count(), 1);
    assert_eq!(h.session.presenter().messages().len(), 1);
}

#[test]
fn test_location_switch_disconnects_before_connecting() {
    let mut h = Harness::new(Settings::default());
    h.send(Command::Connect(Some(LocationRequest::Specific(stockholm()))));
    assert_eq!(h.session.status(), ConnectionStatus::Connected);

    h.session.presenter_mut().answer([true]);
    h.session
        .handle(Event::Command(Command::Connect(Some(LocationRequest::Specific(oslo())))));

    let ui = h.session.presenter();
    assert_eq!(ui.confirmations(), 1);
    match ui.events().last() {
        Some(UiEvent::Confirm { message, .. }) => {
            assert!(message.contains("Stockholm, Sweden"));
            assert!(message.contains("Oslo, Norway"));
        }
        other => panic!("expected a confirmation, got {other:?}"),
    }

    // the disconnect runs first; the new connect waits for its completion
    h.worker.run_pending();
    assert_eq!(h.sdk.calls().last(), Some(&SdkCall::Disconnect));
    assert_eq!(h.connect_count(), 1);

    h.pump();
    let calls = h.sdk.calls();
    let disconnect = calls.iter().position(|c| *c == SdkCall::Disconnect);
    let second_connect = calls
        .iter()
        .rposition(|c| matches!(c, SdkCall::Connect { .. }));
    assert!(disconnect < second_connect);
    assert_eq!(
        h.sdk.connect_calls()[1].0,
        ConnectTarget::Single(oslo())
    );
    assert_eq!(h.session.status(), ConnectionStatus::Connected);
    assert_eq!(
        h.session.store().snapshot().selected_location.as_deref(),
        Some("202")
    );
    assert!(h.session.is_idle());
}

#[test]
fn test_declined_location_switch_keeps_connection() {
    let mut h = Harness::new(Settings::default());
    h.send(Command::Connect(Some(LocationRequest::Specific(stockholm()))));
    h.send(Command::Connect(Some(LocationRequest::Specific(oslo()))));

    assert_eq!(h.session.presenter().confirmations(), 1);
    assert!(!h.sdk.calls().contains(&SdkCall::Disconnect));
    assert_eq!(h.connect_count(), 1);
    assert_eq!(h.session.status(), ConnectionStatus::Connected);
}

#[test]
fn test_cancel_twice_while_connecting() {
    let mut h = Harness::new(reconnect_settings(5));
    h.sdk.push_outcomes([ScriptedOutcome::Hang]);
    h.session.handle(Event::Command(Command::Connect(None)));
    h.session.handle(Event::Command(Command::CancelBusy));
    h.session.handle(Event::Command(Command::CancelBusy));
    h.pump();

    let cancels = h
        .sdk
        .calls()
        .iter()
        .filter(|c| **c == SdkCall::CancelConnectionProcess)
        .count();
    assert_eq!(cancels, 1);
    assert_eq!(h.session.status(), ConnectionStatus::Disconnected);
    assert!(h.session.presenter().messages().is_empty());
    assert!(!h.session.policy().is_counting_down());
    assert!(h.session.is_idle());
}

#[test]
fn test_cancel_during_countdown_gives_up() {
    let mut h = Harness::new(reconnect_settings(5));
    h.send(Command::Connect(None));
    h.sdk.drop_connection();
    h.pump();
    assert!(h.session.policy().is_counting_down());

    h.send(Command::CancelBusy);
    assert_eq!(h.session.policy().phase(), ReconnectPhase::GaveUp);
    assert_eq!(h.session.presenter().busy(), None);
    for _ in 0..10 {
        h.tick();
    }
    assert_eq!(h.connect_count(), 1);
}

#[test]
fn test_successful_reconnect_resets_episode() {
    let mut h = Harness::new(reconnect_settings(5));
    h.send(Command::Connect(None));
    h.sdk
        .push_outcomes([ScriptedOutcome::Fail("reset by peer".to_string())]);
    h.sdk.drop_connection();
    h.pump();
    for _ in 0..(2 + 4) {
        h.tick();
    }
    assert_eq!(h.session.status(), ConnectionStatus::Connected);
    assert_eq!(h.session.policy().attempts(), 0);
    assert_eq!(h.session.policy().phase(), ReconnectPhase::Idle);

    h.session.presenter_mut().clear();
    h.sdk.drop_connection();
    h.pump();
    assert_eq!(h.countdowns(), vec!["Reconnecting in 2 seconds..."]);
}

#[test]
fn test_auto_reconnect_disabled() {
    let mut h = Harness::new(Settings {
        auto_reconnect: false,
        ..Settings::default()
    });
    h.send(Command::Connect(None));
    h.sdk.drop_connection();
    h.pump();
    assert!(!h.session.policy().is_counting_down());
    assert_eq!(
        h.session.presenter().announcements().last(),
        Some(&"Disconnected from Best Available")
    );
}

#[test]
fn test_user_connect_failure_is_reported_and_retried() {
    let mut h = Harness::new(reconnect_settings(2));
    h.sdk
        .push_outcomes([ScriptedOutcome::Fail("auth failed".to_string())]);
    h.send(Command::Connect(None));

    assert_eq!(
        h.session.presenter().messages(),
        vec![(constants::TITLE_CONNECTION_FAILED, "auth failed")]
    );
    assert!(h.session.policy().is_counting_down());

    h.tick();
    h.tick();
    assert_eq!(h.session.status(), ConnectionStatus::Connected);
    assert_eq!(h.session.presenter().messages().len(), 1);
}

#[test]
fn test_remembered_country_reconnects_to_country_list() {
    let mut h = Harness::new(reconnect_settings(5));
    h.send(Command::Connect(Some(LocationRequest::Country("NO".to_string()))));
    h.sdk.drop_connection();
    h.pump();
    h.tick();
    h.tick();

    let calls = h.sdk.connect_calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].0, ConnectTarget::Single(oslo()));
    assert_eq!(
        h.session.store().snapshot().selected_country.as_deref(),
        Some("NO")
    );
}

#[test]
fn test_failed_status_during_reconnect_keeps_retrying() {
    let mut h = Harness::new(reconnect_settings(3));
    h.send(Command::Connect(None));
    h.sdk
        .push_outcomes(vec![ScriptedOutcome::Fault("server unreachable".to_string()); 3]);
    h.sdk.drop_connection();
    h.pump();

    h.tick();
    h.tick();
    assert_eq!(h.connect_count(), 2);
    assert_eq!(h.session.status(), ConnectionStatus::Failed);
    assert!(h.session.presenter().messages().is_empty());
    match h.session.policy().phase() {
        ReconnectPhase::CountingDown { attempt, remaining } => {
            assert_eq!(attempt, ReconnectAttempt { attempt: 2, max: 3 });
            assert_eq!(remaining.as_secs(), 4);
        }
        other => panic!("episode ended after attempt 1/3: {other:?}"),
    }

    for _ in 0..(4 + 8) {
        h.tick();
    }
    assert_eq!(h.connect_count(), 4);
    assert_eq!(
        h.session.presenter().messages(),
        vec![(constants::TITLE_CONNECTION_FAILED, "server unreachable")]
    );
    assert_eq!(h.session.policy().phase(), ReconnectPhase::GaveUp);
}

#[test]
fn test_rejected_reconnect_attempt_is_retried() {
    let mut h = Harness::new(reconnect_settings(3));
    h.send(Command::Connect(None));
    h.sdk
        .push_outcomes([ScriptedOutcome::Reject("tunnel busy".to_string())]);
    h.sdk.drop_connection();
    h.pump();

    h.tick();
    h.tick();
    assert_eq!(h.session.policy().attempts(), 1);
    assert!(h.session.policy().is_counting_down());

    for _ in 0..4 {
        h.tick();
    }
    assert_eq!(h.session.status(), ConnectionStatus::Connected);
    assert!(h.session.presenter().messages().is_empty());
    assert_eq!(h.session.policy().phase(), ReconnectPhase::Idle);
}

#[test]
fn test_failed_status_on_user_connect_does_not_reconnect() {
    let mut h = Harness::new(reconnect_settings(3));
    h.sdk
        .push_outcomes([ScriptedOutcome::Fault("server unreachable".to_string())]);
    h.send(Command::Connect(None));

    assert_eq!(h.session.status(), ConnectionStatus::Failed);
    assert_eq!(
        h.session.presenter().messages(),
        vec![(constants::TITLE_CONNECTION_FAILED, "server unreachable")]
    );
    assert!(!h.session.policy().is_counting_down());
    for _ in 0..10 {
        h.tick();
    }
    assert_eq!(h.connect_count(), 1);
}

#[test]
fn test_missing_tap_adapter_ends_reconnect_episode() {
    let mut h = Harness::new(Settings {
        protocol: Protocol::OpenVpn,
        ..reconnect_settings(5)
    });
    h.send(Command::Connect(None));
    assert_eq!(h.session.status(), ConnectionStatus::Connected);

    h.sdk.set_tap_installed(false);
    h.sdk.drop_connection();
    h.pump();
    h.session.presenter_mut().answer([true]);
    h.tick();
    h.tick();

    assert_eq!(h.connect_count(), 2);
    assert_eq!(h.session.presenter().confirmations(), 1);
    assert!(h.sdk.calls().contains(&SdkCall::InstallTapDriver));
    assert_eq!(
        h.session.presenter().messages(),
        vec![(constants::TITLE_TAP_INSTALLER, constants::MSG_TAP_SUCCESS)]
    );
    assert_eq!(h.session.policy().phase(), ReconnectPhase::GaveUp);
    assert_eq!(h.session.policy().attempts(), 0);

    for _ in 0..60 {
        h.tick();
    }
    assert_eq!(h.connect_count(), 2);
}
