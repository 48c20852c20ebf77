//! Terminal presenter used by the `simulate` command.

use std::io::{self, BufRead, Write};

use super::Presenter;

/// Prints presentation calls to stdout and reads confirmations from stdin.
pub struct ConsolePresenter {
    /// Answer every confirmation with yes without prompting.
    assume_yes: bool,
    busy: Option<String>,
}

impl ConsolePresenter {
    #[must_use]
    pub const fn new(assume_yes: bool) -> Self {
        Self {
            assume_yes,
            busy: None,
        }
    }
}

impl Presenter for ConsolePresenter {
    fn activate_busy(&mut self, text: &str, cancellable: bool) {
        let hint = if cancellable { " \x1b[2m(cancellable)\x1b[0m" } else { "" };
        println!("  \x1b[33m…\x1b[0m {text}{hint}");
        self.busy = Some(text.to_string());
    }

    fn change_busy_text(&mut self, text: &str) {
        if self.busy.as_deref() != Some(text) {
            println!("  \x1b[33m…\x1b[0m {text}");
            self.busy = Some(text.to_string());
        }
    }

    fn dismiss_busy(&mut self) {
        self.busy = None;
    }

    fn show_message(&mut self, title: &str, message: &str) {
        println!("\n  \x1b[1m{title}\x1b[0m\n  {message}\n");
    }

    fn confirm(&mut self, title: &str, message: &str) -> bool {
        println!("\n  \x1b[1m{title}\x1b[0m\n  {message}");
        if self.assume_yes {
            println!("  > yes");
            return true;
        }

        print!("  [y/N] > ");
        let _ = io::stdout().flush();

        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }

    fn announce(&mut self, text: &str) {
        println!("  \x1b[36m»\x1b[0m {text}");
    }
}
