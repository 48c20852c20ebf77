//! The ordered event channel that drives the connection core.
//!
//! SDK status changes, completions of background work, user commands and the
//! periodic tick all travel through one channel and are applied by a single
//! update function on the event-loop thread. Background threads only ever
//! send; they never touch session state.

use color_eyre::Result;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use crate::core::{AttemptId, LocationRequest};
use crate::sdk::{DriverInstallResult, SdkError};
use crate::state::StatusChange;

/// User intents delivered to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Connect to a location, or to the remembered selection when `None`.
    Connect(Option<LocationRequest>),
    Disconnect,
    /// The busy indicator's cancel affordance was used.
    CancelBusy,
    /// Push the stored network guard to the SDK.
    ApplyNetworkGuard,
    Quit,
}

/// Everything the session reacts to.
#[derive(Debug)]
pub enum Event {
    /// SDK status notification.
    Status(StatusChange),
    /// Periodic tick for countdowns.
    Tick,
    /// A connect call returned on its worker.
    ConnectFinished {
        attempt: AttemptId,
        result: std::result::Result<(), SdkError>,
    },
    /// A disconnect call returned on its worker.
    DisconnectFinished(std::result::Result<(), SdkError>),
    /// A TAP driver install returned on its worker.
    TapInstallFinished(std::result::Result<DriverInstallResult, SdkError>),
    Command(Command),
}

/// Owns the event channel and the ticker thread.
///
/// Other producers (SDK callbacks, workers, the console) get their own
/// sender from [`EventHandler::sender`].
pub struct EventHandler {
    sender: mpsc::Sender<Event>,
    receiver: mpsc::Receiver<Event>,
    #[allow(dead_code)]
    ticker: thread::JoinHandle<()>,
}

impl EventHandler {
    /// Opens the channel and starts ticking every `tick_rate_ms`.
    #[must_use]
    pub fn new(tick_rate_ms: u64) -> Self {
        let (sender, receiver) = mpsc::channel();
        let ticker = spawn_ticker(sender.clone(), Duration::from_millis(tick_rate_ms));
        Self {
            sender,
            receiver,
            ticker,
        }
    }

    /// A sender for producers outside the event loop.
    #[must_use]
    pub fn sender(&self) -> mpsc::Sender<Event> {
        self.sender.clone()
    }

    /// Blocks until the next event is available.
    ///
    /// # Errors
    ///
    /// Returns an error if the event channel is disconnected.
    pub fn next(&self) -> Result<Event> {
        Ok(self.receiver.recv()?)
    }
}

// Fixed-schedule ticker. Exits once the receiver is dropped.
fn spawn_ticker(sender: mpsc::Sender<Event>, period: Duration) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut next_tick = Instant::now() + period;
        loop {
            thread::sleep(next_tick.saturating_duration_since(Instant::now()));
            if sender.send(Event::Tick).is_err() {
                break;
            }
            next_tick += period;
            let now = Instant::now();
            if next_tick < now {
                next_tick = now + period;
            }
        }
    })
}
