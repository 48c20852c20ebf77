//! Connection lifecycle and auto-reconnect core for the WLVPN client.
//!
//! The crate picks connection configurations from user settings, drives
//! connect and disconnect through an external VPN SDK, classifies failures,
//! and recovers from unexpected disconnects with a capped exponential
//! backoff. All state changes happen in [`core::Session::handle`], fed by one
//! ordered [`event::Event`] channel.

pub mod cli;
pub mod constants;
pub mod core;
pub mod event;
pub mod logging;
pub mod sdk;
pub mod settings;
pub mod state;
pub mod ui;
