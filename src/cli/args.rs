//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use crate::state::SortKey;

/// WLVPN - connection lifecycle and auto-reconnect core
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true, env = "WLVPN_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Settings file (defaults to <config dir>/wlvpn/config.toml)
    #[arg(long, global = true, env = "WLVPN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show or change stored settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Print the connection configurations built from the current settings
    Candidates {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the location catalog of an SDK script
    Locations {
        /// SDK script (JSON)
        script: PathBuf,
        /// Sort order
        #[arg(long, value_enum)]
        sort: Option<SortArg>,
        /// Reverse the sort order
        #[arg(long, requires = "sort")]
        desc: bool,
        /// Only show locations whose country or city contains this text
        #[arg(long, short)]
        search: Option<String>,
    },
    /// Run a connection session against a scripted SDK
    Simulate {
        /// SDK script (JSON): catalog, protocols and queued connect outcomes
        script: PathBuf,
        /// Answer every confirmation with yes
        #[arg(long, short)]
        yes: bool,
        /// Drop the tunnel after this many connected seconds
        #[arg(long, value_name = "SECS")]
        drop_after: Option<u64>,
        /// Connect to this location id or city code
        #[arg(long, conflicts_with = "country")]
        location: Option<String>,
        /// Connect to any location in this country code
        #[arg(long)]
        country: Option<String>,
        /// Give up after this many seconds
        #[arg(long, value_name = "SECS", default_value_t = 600)]
        timeout: u64,
    },
}

/// `settings` subcommands
#[derive(Subcommand, Debug)]
pub enum SettingsAction {
    /// Print the settings file
    Show,
    /// Change one setting
    Set {
        /// protocol, cipher, transport, scramble, double-hop, double-hop-entry,
        /// double-hop-destination, auto-reconnect, reconnect-tries,
        /// connect-on-startup, kill-switch, block-lan
        key: String,
        value: String,
    },
    /// Restore defaults
    Reset,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SortArg {
    Load,
    City,
}

impl From<SortArg> for SortKey {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Load => Self::Load,
            SortArg::City => Self::City,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simulate() {
        let args = Args::try_parse_from([
            "wlvpn",
            "-vv",
            "simulate",
            "script.json",
            "--yes",
            "--drop-after",
            "5",
            "--country",
            "DE",
        ])
        .unwrap();
        assert_eq!(args.verbose, 2);
        match args.command {
            Commands::Simulate {
                yes,
                drop_after,
                country,
                timeout,
                ..
            } => {
                assert!(yes);
                assert_eq!(drop_after, Some(5));
                assert_eq!(country.as_deref(), Some("DE"));
                assert_eq!(timeout, 600);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_location_conflicts_with_country() {
        let result = Args::try_parse_from([
            "wlvpn",
            "simulate",
            "s.json",
            "--location",
            "ber",
            "--country",
            "DE",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_settings_set() {
        let args =
            Args::try_parse_from(["wlvpn", "--config", "/tmp/c.toml", "settings", "set", "scramble", "on"])
                .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("/tmp/c.toml")));
        assert!(matches!(
            args.command,
            Commands::Settings {
                action: SettingsAction::Set { .. }
            }
        ));
    }
}
