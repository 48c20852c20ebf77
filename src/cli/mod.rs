//! `wlvpn` subcommands: argument definitions and their handlers.

pub mod args;
pub mod commands;
