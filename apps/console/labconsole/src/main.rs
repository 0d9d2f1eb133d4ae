use labconsole::error::ConsoleError;
use labconsole::logger::initialize as LoggerInitialize;
use labconsole::session::Session;
use labconsole::view::ViewSummary;

use client_core::config::ClientConfig;

use common::ErrorLocation;

use std::env;
use std::fs::create_dir_all;
use std::panic::Location;
use std::path::PathBuf;

use log::{info, warn};

const APP_DIR_NAME: &str = "labconsole";
const ORIGIN_ENV_VAR: &str = "LABCONSOLE_ORIGIN";
const IDENTITY_FILE_NAME: &str = "identity.json";

#[tokio::main]
async fn main() -> Result<(), ConsoleError> {
    if let Err(e) = dotenvy::dotenv() {
        // A missing .env is the normal case
        if !e.not_found() {
            eprintln!("Ignoring unreadable .env file: {e}");
        }
    }

    let config_dir = app_dir(dirs::config_dir(), "config")?;
    let data_dir = app_dir(dirs::data_local_dir(), "data")?;
    let log_dir = data_dir.join("logs");

    create_dir_all(&log_dir).map_err(|e| ConsoleError::Console {
        message: format!("Failed to create log directory: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    // Initialize logger FIRST
    LoggerInitialize(&log_dir)?;

    info!("Lab console starting");
    info!("Config directory: {}", config_dir.display());
    info!("Log directory: {}", log_dir.display());

    let mut config = ClientConfig::load(&config_dir)?;
    if let Ok(origin) = env::var(ORIGIN_ENV_VAR) {
        info!("Server origin overridden by {ORIGIN_ENV_VAR}: {origin}");
        config.server.origin = origin;
        config.validate()?;
    }
    if config.storage.local_state_file.is_none() {
        config.storage.local_state_file = Some(data_dir.join(IDENTITY_FILE_NAME));
    }

    let session = Session::start(&config).await?;
    watch_view(&session).await;
    session.shutdown().await;

    Ok(())
}

/// Log view changes until Ctrl-C.
async fn watch_view(session: &Session) {
    let mut revisions = session.store().subscribe_revision();
    let mut network = session.subscribe_network();
    let mut shown = ViewSummary::default();

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!("Failed to listen for Ctrl-C: {e}");
                }
                info!("Shutting down");
                return;
            }
            changed = revisions.changed() => if changed.is_err() { return },
            changed = network.changed() => if changed.is_err() { return },
        }

        let summary = session.summary().await;
        for line in summary.changes(&shown) {
            info!("{line}");
        }
        shown = summary;
    }
}

#[track_caller]
fn app_dir(base: Option<PathBuf>, kind: &str) -> Result<PathBuf, ConsoleError> {
    base.map(|dir| dir.join(APP_DIR_NAME))
        .ok_or_else(|| ConsoleError::Console {
            message: format!("No {kind} directory on this platform"),
            location: ErrorLocation::from(Location::caller()),
        })
}
