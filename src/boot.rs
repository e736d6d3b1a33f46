use anyhow::{Context, Result};
use chrono::Local;
use log::LevelFilter;
use std::{io::Write, time::Duration};

use clap::ArgMatches;
use env_logger::{Builder, Target};

use crate::{
    cli::config::ClientConfig,
    core::{
        clock::ServerClock, persistence, task_manager, Bus, Kit, MemoryHistory, NativeHistory,
        PersistentState, UreqTransport,
    },
    protocol::Location,
    tui::app::App,
};

/// Common initialization used by the terminal entrypoint.
///
/// The terminal owns stdout, so logs only go somewhere when a file is set:
/// `SIMKIT_LOG_FILE`, or a timestamped file in debug builds.
pub fn init_common() {
    let log_file = std::env::var("SIMKIT_LOG_FILE").ok().or_else(|| {
        #[cfg(debug_assertions)]
        {
            Some(format!("./log_{}.log", Local::now().format("%Y%m%d%H%M%S")))
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    });

    if let Some(path) = log_file {
        if let Err(err) = init_file_logger(&path) {
            eprintln!("Failed to initialize file logger at '{path}': {err}");
            env_logger::init();
        }
    } else {
        env_logger::init();
    }
}

fn init_file_logger(path: &str) -> std::io::Result<()> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;

    let mut builder = Builder::new();
    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "{}:{} {} [{}] - {}",
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.args()
            )
        })
        .target(Target::Pipe(Box::new(file)))
        .filter_level(LevelFilter::Debug)
        .parse_default_env()
        .init();

    log::info!("File logger initialized at {path}");

    Ok(())
}

/// Ask the server for its `Date` header once, so listings and the main menu
/// show server time. Failure leaves the clock unshifted.
fn probe_server_offset(base_url: &str) -> PersistentState {
    let agent: ureq::Agent = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .timeout_global(Some(Duration::from_secs(3)))
        .build()
        .into();
    let local = chrono::Utc::now();
    let offset = match agent.head(base_url).call() {
        Ok(response) => response
            .headers()
            .get("date")
            .and_then(|value| value.to_str().ok())
            .and_then(|date| ServerClock::offset_from_date_header(date, local)),
        Err(err) => {
            log::warn!("Could not read server time from {base_url}: {err}");
            None
        }
    };
    PersistentState {
        server_time_offset_ms: offset.unwrap_or(0),
    }
}

fn restore_history(config: &ClientConfig) -> Box<dyn NativeHistory> {
    match persistence::load_session() {
        Ok(Some(history)) => {
            log::info!("Restored navigation history with {} entries", history.len());
            return Box::new(history);
        }
        Ok(None) => {}
        Err(err) => log::warn!("Ignoring saved session: {err:#}"),
    }
    Box::new(MemoryHistory::new(Location::parse(&config.location)))
}

/// Build the kit from the parsed flags, run the terminal client and save the
/// history on the way out.
pub fn start_tui(matches: &ArgMatches) -> Result<()> {
    let config = ClientConfig::from_matches(matches)?;
    persistence::set_no_cache(config.no_session_cache);
    if let Some(path) = &config.session_file {
        persistence::set_session_path(path);
    }

    let runtime = task_manager::build_worker_runtime()
        .context("Failed to start the request workers")?;

    let bus = Bus::new();
    let transport = UreqTransport::new(
        config.base_url(),
        &config.cookies,
        config.request_timeout(),
        runtime.handle().clone(),
        bus.completion_tx.clone(),
    );
    let history = restore_history(&config);

    let base_url = config.base_url().to_string();
    let mut kit = Kit::new(
        config.to_kit_config(),
        config.session(),
        Box::new(transport),
        bus,
        history,
        crate::pages::router(),
    )
    .with_default_state(move || probe_server_offset(&base_url));
    kit.start();

    let mut app = App::new(kit);
    let result = crate::tui::start(&mut app);

    if let Some(export) = app.kit.history_export() {
        if let Err(err) = persistence::save_session(&export) {
            log::warn!("Failed to save session: {err:#}");
        }
    }
    runtime.shutdown_background();
    result
}
