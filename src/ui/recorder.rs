//! Presenter that records every call, for tests and headless hosts.

use std::collections::VecDeque;

use super::Presenter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Busy { text: String, cancellable: bool },
    BusyText(String),
    Dismiss,
    Message { title: String, message: String },
    Confirm { title: String, message: String },
    Announce(String),
}

/// Records presentation calls and answers confirmations from a queue.
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    events: Vec<UiEvent>,
    answers: VecDeque<bool>,
}

impl RecordingPresenter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues answers for upcoming confirmations. Unanswered ones get "no".
    pub fn answer(&mut self, answers: impl IntoIterator<Item = bool>) {
        self.answers.extend(answers);
    }

    #[must_use]
    pub fn events(&self) -> &[UiEvent] {
        &self.events
    }

    /// Message dialogs shown so far, as `(title, message)`.
    #[must_use]
    pub fn messages(&self) -> Vec<(&str, &str)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                UiEvent::Message { title, message } => Some((title.as_str(), message.as_str())),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn confirmations(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, UiEvent::Confirm { .. }))
            .count()
    }

    #[must_use]
    pub fn announcements(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                UiEvent::Announce(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Text of the busy indicator currently shown, if any.
    #[must_use]
    pub fn busy(&self) -> Option<&str> {
        let mut busy = None;
        for event in &self.events {
            match event {
                UiEvent::Busy { text, .. } | UiEvent::BusyText(text) => busy = Some(text.as_str()),
                UiEvent::Dismiss => busy = None,
                _ => {}
            }
        }
        busy
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl Presenter for RecordingPresenter {
    fn activate_busy(&mut self, text: &str, cancellable: bool) {
        self.events.push(UiEvent::Busy {
            text: text.to_string(),
            cancellable,
        });
    }

    fn change_busy_text(&mut self, text: &str) {
        self.events.push(UiEvent::BusyText(text.to_string()));
    }

    fn dismiss_busy(&mut self) {
        self.events.push(UiEvent::Dismiss);
    }

    fn show_message(&mut self, title: &str, message: &str) {
        self.events.push(UiEvent::Message {
            title: title.to_string(),
            message: message.to_string(),
        });
    }

    fn confirm(&mut self, title: &str, message: &str) -> bool {
        self.events.push(UiEvent::Confirm {
            title: title.to_string(),
            message: message.to_string(),
        });
        self.answers.pop_front().unwrap_or(false)
    }

    fn announce(&mut self, text: &str) {
        self.events.push(UiEvent::Announce(text.to_string()));
    }
}
