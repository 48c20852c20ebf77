//! Presentation seam.
//!
//! The connection core never draws anything itself. It tells a [`Presenter`]
//! what to show: a busy indicator, dialogs and short announcements.

mod console;
mod recorder;

pub use console::ConsolePresenter;
pub use recorder::{RecordingPresenter, UiEvent};

/// What the connection core needs from a user interface.
pub trait Presenter {
    /// Shows the busy indicator. `cancellable` exposes a cancel affordance
    /// that sends [`crate::event::Command::CancelBusy`].
    fn activate_busy(&mut self, text: &str, cancellable: bool);

    /// Updates the text of an active busy indicator.
    fn change_busy_text(&mut self, text: &str);

    fn dismiss_busy(&mut self);

    /// Modal message dialog.
    fn show_message(&mut self, title: &str, message: &str);

    /// Modal yes/no dialog.
    fn confirm(&mut self, title: &str, message: &str) -> bool;

    /// Voice or tray notification.
    fn announce(&mut self, text: &str);
}
