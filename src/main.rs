//! `wlvpn` terminal shell.

use clap::Parser;
use color_eyre::Result;

use wlvpn::cli::{args::Args, commands};
use wlvpn::logging;
use wlvpn::settings::FileSettingsStore;

fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    logging::init(args.verbose, args.log_file.as_deref())?;

    let config = match args.config {
        Some(path) => path,
        None => FileSettingsStore::default_path()?,
    };
    tracing::debug!("settings file: {}", config.display());

    commands::run(args.command, &config)
}
