//! CLI command handlers.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;

use super::args::{Commands, SettingsAction, SortArg};
use crate::constants;
use crate::core::driver::pick_configurations;
use crate::core::{ConnectionConfigurationSelector, LocationRequest, Session, ThreadWorker};
use crate::event::{Command, Event, EventHandler};
use crate::sdk::scripted::{ScriptedSdk, SdkScript};
use crate::sdk::VpnSdk;
use crate::settings::{FileSettingsStore, Settings, SettingsStore};
use crate::state::{ConnectionStatus, Location, LocationCatalog, SortDirection};
use crate::ui::ConsolePresenter;

/// Dispatches a parsed command against the settings file at `config`.
///
/// # Errors
///
/// Returns whatever the command handler fails with.
pub fn run(command: Commands, config: &Path) -> Result<()> {
    let store = FileSettingsStore::open(config)?;
    match command {
        Commands::Settings { action } => settings(store, action),
        Commands::Candidates { json } => {
            print!("{}", candidates(&store.snapshot(), json)?);
            Ok(())
        }
        Commands::Locations {
            script,
            sort,
            desc,
            search,
        } => {
            let script = load_script(&script)?;
            let catalog = LocationCatalog::new(script.locations);
            let direction = if desc {
                SortDirection::Descending
            } else {
                SortDirection::Ascending
            };
            print!("{}", locations(&catalog, sort, direction, search.as_deref()));
            Ok(())
        }
        Commands::Simulate {
            script,
            yes,
            drop_after,
            location,
            country,
            timeout,
        } => {
            let script = load_script(&script)?;
            let request = match (location, country) {
                (Some(location), _) => Some(find_location(&script, &location)?),
                (None, Some(country)) => Some(LocationRequest::Country(country.to_uppercase())),
                (None, None) => None,
            };
            simulate(
                script,
                store,
                request,
                yes,
                drop_after,
                Duration::from_secs(timeout),
            )
        }
    }
}

// ── settings ────────────────────────────────────────────────────────────────

fn settings(mut store: FileSettingsStore, action: SettingsAction) -> Result<()> {
    match action {
        SettingsAction::Show => {
            println!("# {}", store.path().display());
            print!("{}", toml::to_string_pretty(&store.snapshot())?);
        }
        SettingsAction::Set { key, value } => {
            let mut settings = store.snapshot();
            settings.set(&key, &value).map_err(|e| eyre!(e))?;
            store.save(&settings)?;
            println!("{}{}", constants::CLI_MSG_SETTINGS_SAVED, store.path().display());
        }
        SettingsAction::Reset => {
            store.save(&Settings::default())?;
            println!("{}", constants::CLI_MSG_SETTINGS_RESET);
        }
    }
    Ok(())
}

// ── candidates ──────────────────────────────────────────────────────────────

/// Renders the candidate list; `*` marks what a connect would pass to the SDK.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn candidates(settings: &Settings, json: bool) -> Result<String> {
    let settings = settings.clone().normalized();
    let candidates = ConnectionConfigurationSelector::build_candidates(&settings);
    if json {
        return Ok(serde_json::to_string_pretty(&candidates)? + "\n");
    }

    let picked = pick_configurations(settings.protocol, &candidates).unwrap_or_default();
    let mut out = format!("Protocol: {}\n", settings.protocol);
    for (index, candidate) in candidates.iter().enumerate() {
        let marker = if picked.contains(candidate) { "*" } else { " " };
        let _ = write!(out, "{marker} {}. {candidate}", index + 1);
        if let Some(route) = candidate.double_hop() {
            let _ = write!(
                out,
                " (double hop {} -> {})",
                route.entry.as_deref().unwrap_or("?"),
                route.destination.as_deref().unwrap_or("?")
            );
        }
        out.push('\n');
    }
    Ok(out)
}

// ── locations ───────────────────────────────────────────────────────────────

/// Renders the catalog, sorted or in catalog order, optionally filtered.
#[must_use]
pub fn locations(
    catalog: &LocationCatalog,
    sort: Option<SortArg>,
    direction: SortDirection,
    search: Option<&str>,
) -> String {
    let query = search.unwrap_or_default();
    let view: Vec<&Location> = match sort {
        Some(key) => catalog
            .sorted(key.into(), direction)
            .into_iter()
            .filter(|location| location.matches(query))
            .collect(),
        None => catalog.search(query),
    };

    let mut out = String::new();
    for location in view {
        let load = match location {
            Location::Region(region) => region
                .load
                .map_or_else(|| "-".to_string(), |load| format!("{load}%")),
            Location::BestAvailable { .. } => String::new(),
        };
        let _ = writeln!(out, "{:>6}  {:<32} {load}", location.id(), location.to_string());
    }
    out
}

// ── simulate ────────────────────────────────────────────────────────────────

fn load_script(path: &Path) -> Result<SdkScript> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read {}", path.display()))?;
    SdkScript::from_json(&text).wrap_err_with(|| format!("invalid SDK script {}", path.display()))
}

fn find_location(script: &SdkScript, key: &str) -> Result<LocationRequest> {
    let catalog = LocationCatalog::new(script.locations.clone());
    catalog
        .by_id(key)
        .or_else(|| catalog.by_city_code(key))
        .cloned()
        .map(LocationRequest::Specific)
        .ok_or_else(|| eyre!("no location with id or city code {key}"))
}

fn simulate(
    script: SdkScript,
    store: FileSettingsStore,
    request: Option<LocationRequest>,
    yes: bool,
    drop_after: Option<u64>,
    timeout: Duration,
) -> Result<()> {
    let sdk = Arc::new(ScriptedSdk::new(script));
    let events = EventHandler::new(constants::DEFAULT_TICK_RATE);
    let mut session = Session::new(
        Arc::clone(&sdk) as Arc<dyn VpnSdk>,
        Arc::new(ThreadWorker),
        events.sender(),
        store,
        ConsolePresenter::new(yes),
    );

    session.start();
    session.handle(Event::Command(Command::Connect(request)));

    let deadline = Instant::now() + timeout;
    let mut connected_secs = 0;
    let mut dropped = false;

    loop {
        let event = events.next()?;
        let tick = matches!(event, Event::Tick);
        if !session.handle(event) {
            break;
        }
        if !tick {
            continue;
        }

        if session.status() == ConnectionStatus::Connected {
            connected_secs += 1;
            if drop_after.is_some_and(|after| !dropped && connected_secs >= after) {
                println!("  \x1b[31m✗\x1b[0m network drop");
                sdk.drop_connection();
                dropped = true;
                continue;
            }
        }

        let drop_pending = drop_after.is_some() && !dropped;
        let waiting_for_drop = drop_pending && session.status() == ConnectionStatus::Connected;
        if session.is_idle() && !waiting_for_drop {
            break;
        }
        if Instant::now() >= deadline {
            tracing::warn!("simulation timed out");
            break;
        }
    }

    session.handle(Event::Command(Command::Quit));
    println!("{} Final status: {}", constants::CLI_MSG_SIMULATION_DONE, session.status());
    Ok(())
}
