//! Application-wide constants and configuration values.
//!
//! This module defines the static values used throughout the connection core,
//! including timing intervals, reconnect bounds, file paths, and UI messages.

use std::time::Duration;

// === Application Metadata ===

/// Application name (from Cargo.toml).
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
/// Current application version (from Cargo.toml).
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// === Timing Configuration ===

/// Event loop tick rate in milliseconds. Also the countdown granularity.
pub const DEFAULT_TICK_RATE: u64 = 1000;
/// One countdown step.
pub const COUNTDOWN_STEP: Duration = Duration::from_secs(1);

// === Reconnect Policy ===

/// Upper bound on the reconnect delay.
pub const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);
/// Attempts beyond this use [`MAX_RECONNECT_DELAY`].
pub const MAX_BACKOFF_EXPONENT: u32 = 5;
/// Default number of reconnect attempts per episode.
pub const DEFAULT_RECONNECT_TRIES: u32 = 5;
/// Lowest accepted reconnect-tries value.
pub const MIN_RECONNECT_TRIES: u32 = 1;
/// Highest accepted reconnect-tries value.
pub const MAX_RECONNECT_TRIES: u32 = 99_999;

// === Path Configuration ===

/// Name of the application directory under the platform config dir.
pub const CONFIG_DIR_NAME: &str = "wlvpn";
/// Name of the settings file.
pub const SETTINGS_FILE_NAME: &str = "config.toml";

// === Busy Indicator ===

pub const MSG_CONNECTING: &str = "Connecting...";
pub const MSG_RECONNECTING: &str = "Reconnecting...";
pub const MSG_DISCONNECTING: &str = "Disconnecting...";
pub const MSG_INSTALLING: &str = "Installing...";
/// Countdown template, `{}` is the remaining seconds.
pub const MSG_RECONNECT_AFTER: &str = "Reconnecting in {} seconds...";

// === Announcements ===

pub const MSG_CONNECTED_TO: &str = "Connected to {}";
pub const MSG_DISCONNECTED_FROM: &str = "Disconnected from {}";

// === Dialogs ===

pub const TITLE_CONNECTION_FAILED: &str = "VPN Connection Failed";
pub const TITLE_WARNING: &str = "Warning";
pub const TITLE_TAP_NOT_INSTALLED: &str = "TAP Adapter Missing";
pub const TITLE_TAP_INSTALLER: &str = "TAP Installer";
pub const MSG_LOCATION_CHANGE: &str =
    "You are connected to {}. Disconnect and connect to {} instead?";
pub const MSG_TAP_NOT_INSTALLED: &str =
    "The OpenVPN TAP adapter is not installed. Install or repair it now?";
pub const MSG_TAP_SUCCESS: &str = "The TAP adapter was installed successfully.";
pub const MSG_TAP_REBOOT: &str = "The TAP adapter was installed. Restart Windows to finish.";
pub const MSG_TAP_FAILED: &str = "The TAP adapter could not be installed.";
pub const MSG_OPENVPN_UNSUPPORTED: &str = "OpenVPN is not supported on this system.";
pub const MSG_INVALID_DOUBLE_HOP: &str =
    "Double hop is enabled but the entry or destination location is not set.";

// === Messages: CLI Output ===

pub const CLI_MSG_SETTINGS_SAVED: &str = "Settings saved to ";
pub const CLI_MSG_SETTINGS_RESET: &str = "Settings reset to defaults.";
pub const CLI_MSG_UNKNOWN_KEY: &str = "Unknown setting: ";
pub const CLI_MSG_SIMULATION_DONE: &str = "Simulation finished.";

/// Fills the single `{}` placeholder of a message template.
#[must_use]
pub fn fill(template: &str, value: impl std::fmt::Display) -> String {
    template.replacen("{}", &value.to_string(), 1)
}

/// Fills the placeholders of a message template in order.
#[must_use]
pub fn fill_all(template: &str, values: &[&dyn std::fmt::Display]) -> String {
    values
        .iter()
        .fold(template.to_string(), |acc, v| acc.replacen("{}", &v.to_string(), 1))
}
