//! User settings and their persistence.
//!
//! [`Settings`] is a plain value. Nothing here saves implicitly: callers decide
//! when a change is worth persisting and call [`SettingsStore::save`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants;
use crate::state::{Cipher, DoubleHopRoute, NetworkGuard, Protocol, Transport};

/// Settings store failures.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to access settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("no config directory available on this platform")]
    NoConfigDir,
}

/// Persisted user preferences consumed by the connection core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub protocol: Protocol,
    pub cipher: Cipher,
    pub transport: Transport,
    /// `OpenVPN` traffic obfuscation.
    pub scramble: bool,
    pub double_hop: bool,
    pub double_hop_entry: Option<String>,
    pub double_hop_destination: Option<String>,
    pub selected_country: Option<String>,
    pub selected_city: Option<String>,
    /// Id of the last explicitly chosen location.
    pub selected_location: Option<String>,
    pub auto_reconnect: bool,
    pub reconnect_tries: u32,
    pub connect_on_startup: bool,
    pub network_guard: NetworkGuard,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            protocol: Protocol::Automatic,
            cipher: Cipher::Aes256Cbc,
            transport: Transport::Udp,
            scramble: false,
            double_hop: false,
            double_hop_entry: None,
            double_hop_destination: None,
            selected_country: None,
            selected_city: None,
            selected_location: None,
            auto_reconnect: true,
            reconnect_tries: constants::DEFAULT_RECONNECT_TRIES,
            connect_on_startup: false,
            network_guard: NetworkGuard::default(),
        }
    }
}

impl Settings {
    /// Parses reconnect-tries as typed by a user.
    ///
    /// Integers are clamped into range; anything else yields the default.
    #[must_use]
    pub fn parse_reconnect_tries(text: &str) -> u32 {
        match text.trim().parse::<i64>() {
            Ok(tries) => clamp_tries(tries),
            Err(_) => constants::DEFAULT_RECONNECT_TRIES,
        }
    }

    /// Returns the settings with every bounded value brought into range.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.reconnect_tries = clamp_tries(i64::from(self.reconnect_tries));
        self.network_guard = self.network_guard.normalized();
        self
    }

    /// The double-hop route, when double hop is enabled.
    #[must_use]
    pub fn double_hop_route(&self) -> Option<DoubleHopRoute> {
        self.double_hop.then(|| DoubleHopRoute {
            entry: self.double_hop_entry.clone(),
            destination: self.double_hop_destination.clone(),
        })
    }

    /// Applies a `key = value` pair as typed on the command line.
    ///
    /// # Errors
    ///
    /// Returns a message naming the key or value that was rejected.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        let optional = |v: &str| {
            let v = v.trim();
            (!v.is_empty() && v != "none").then(|| v.to_string())
        };
        match key {
            "protocol" => self.protocol = value.parse()?,
            "cipher" => self.cipher = value.parse()?,
            "transport" => self.transport = value.parse()?,
            "scramble" => self.scramble = parse_bool(value)?,
            "double-hop" => self.double_hop = parse_bool(value)?,
            "double-hop-entry" => self.double_hop_entry = optional(value),
            "double-hop-destination" => self.double_hop_destination = optional(value),
            "auto-reconnect" => self.auto_reconnect = parse_bool(value)?,
            "reconnect-tries" => self.reconnect_tries = Self::parse_reconnect_tries(value),
            "connect-on-startup" => self.connect_on_startup = parse_bool(value)?,
            "kill-switch" => self.network_guard.kill_switch = parse_bool(value)?,
            "block-lan" => self.network_guard.block_lan = parse_bool(value)?,
            _ => return Err(format!("{}{key}", constants::CLI_MSG_UNKNOWN_KEY)),
        }
        self.network_guard = self.network_guard.normalized();
        Ok(())
    }
}

fn clamp_tries(tries: i64) -> u32 {
    let clamped = tries.clamp(
        i64::from(constants::MIN_RECONNECT_TRIES),
        i64::from(constants::MAX_RECONNECT_TRIES),
    );
    u32::try_from(clamped).unwrap_or(constants::DEFAULT_RECONNECT_TRIES)
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        other => Err(format!("Expected on/off, got: {other}")),
    }
}

/// Read/write access to persisted settings.
pub trait SettingsStore {
    /// Current settings value.
    fn snapshot(&self) -> Settings;

    /// Replaces and persists the settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn save(&mut self, settings: &Settings) -> Result<(), SettingsError>;
}

/// Settings kept in memory only.
#[derive(Debug, Default, Clone)]
pub struct MemorySettingsStore {
    settings: Settings,
    saves: usize,
}

impl MemorySettingsStore {
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        Self { settings, saves: 0 }
    }

    /// Number of times [`SettingsStore::save`] was called.
    #[must_use]
    pub const fn saves(&self) -> usize {
        self.saves
    }
}

impl SettingsStore for MemorySettingsStore {
    fn snapshot(&self) -> Settings {
        self.settings.clone()
    }

    fn save(&mut self, settings: &Settings) -> Result<(), SettingsError> {
        self.settings = settings.clone();
        self.saves += 1;
        Ok(())
    }
}

/// Settings persisted as TOML on disk.
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
    settings: Settings,
}

impl FileSettingsStore {
    /// Default settings file location: `<config_dir>/wlvpn/config.toml`.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::NoConfigDir`] if the platform has no config dir.
    pub fn default_path() -> Result<PathBuf, SettingsError> {
        dirs::config_dir()
            .map(|dir| {
                dir.join(constants::CONFIG_DIR_NAME)
                    .join(constants::SETTINGS_FILE_NAME)
            })
            .ok_or(SettingsError::NoConfigDir)
    }

    /// Opens the store, loading the file if it exists.
    ///
    /// A missing file yields defaults; it is only created on the first save.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        let settings = if path.is_file() {
            let content = std::fs::read_to_string(&path).map_err(|source| SettingsError::Io {
                path: path.clone(),
                source,
            })?;
            toml::from_str::<Settings>(&content)
                .map_err(|source| SettingsError::Parse {
                    path: path.clone(),
                    source,
                })?
                .normalized()
        } else {
            Settings::default()
        };
        Ok(Self { path, settings })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for FileSettingsStore {
    fn snapshot(&self) -> Settings {
        self.settings.clone()
    }

    fn save(&mut self, settings: &Settings) -> Result<(), SettingsError> {
        let io_err = |source| SettingsError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = toml::to_string_pretty(settings)?;
        std::fs::write(&self.path, content).map_err(io_err)?;
        self.settings = settings.clone();
        tracing::debug!("SETTINGS: saved to {}", self.path.display());
        Ok(())
    }
}
