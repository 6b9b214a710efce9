mod app;
mod config;
mod errors;
mod jobs;
mod listing;
mod model;
mod ops;
mod paths;
mod runtime;
mod store;
mod terminal;
mod tree;
mod ui;

use std::fs::OpenOptions;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::unbounded;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::config::{Cli, Config};

fn main() -> Result<()> {
    let config = Config::from_cli(Cli::parse())?;
    init_tracing(&config)?;
    terminal::install_panic_hook();

    let store = store::store_from_spec(&config.store)?;
    info!(
        store = store.store_name(),
        bucket = config.bucket(),
        workers = config.workers,
        "bucketfm starting"
    );

    let (event_tx, event_rx) = unbounded();
    let mut app = app::App::bootstrap(
        store,
        config.download_dir.clone(),
        config.workers,
        event_tx.clone(),
    )?;
    let (mut terminal, mut session) = terminal::ScreenSession::open()?;
    let runtime_handle = runtime::spawn_event_pump(event_tx, Duration::from_millis(150));

    terminal.draw(|frame| ui::render(frame, app.state()))?;

    while app.is_running() {
        let event = event_rx.recv()?;
        if app.on_event(event) {
            terminal.draw(|frame| ui::render(frame, app.state()))?;
        }
    }

    session.close()?;
    drop(app);
    drop(event_rx);

    if runtime_handle.join().is_err() {
        debug!("runtime thread finished with panic");
    }

    info!("bucketfm shutdown complete");
    Ok(())
}

/// Logs go to a file; the terminal belongs to the UI.
fn init_tracing(config: &Config) -> Result<()> {
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)
        .with_context(|| format!("cannot open log file {}", config.log_file.display()))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(Mutex::new(log_file))
        .try_init();
    Ok(())
}
