//! Headless engine binary for Skyguild.
//!
//! Wires the session runner to a terminal: commands are read from stdin,
//! session log lines are printed as they happen, and progress is saved to
//! a JSON file on a fixed interval and on exit.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `skyguild-config.yaml`
//! 3. Open the save store and build the persistence codec
//! 4. Load the saved session, completing anything that finished offline
//! 5. Start the stdin reader and the Ctrl-C listener
//! 6. Run the session until `quit` or Ctrl-C
//! 7. Log the result

mod commands;
mod console;
mod error;
mod store;

use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;

use skyguild_core::clock::{Clock, SystemClock};
use skyguild_core::config::GameConfig;
use skyguild_core::observer::SessionObserver;
use skyguild_core::persistence::{KeyValueStore, PersistenceCodec};
use skyguild_core::runner::{RunSummary, SessionCommand, SessionRunner};
use skyguild_core::session::Session;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::commands::{HELP, Input};
use crate::console::{ConsoleObserver, render_status, render_summary};
use crate::error::EngineError;
use crate::store::FileStore;

/// Configuration file looked up in the working directory.
const CONFIG_FILE: &str = "skyguild-config.yaml";

/// Capacity of the command and input-line channels.
const CHANNEL_CAPACITY: usize = 32;

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the input thread cannot
/// be started, or the runner refuses the configured settings.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("skyguild-engine starting");

    // 2. Load configuration.
    let config = Arc::new(load_config()?);
    info!(
        raw_resources = config.resources.raw.len(),
        refined_resources = config.resources.refined.len(),
        milestones = config.milestones.len(),
        tick_resolution_ms = config.settings.tick_resolution_ms,
        autosave_interval_ms = config.settings.autosave_interval_ms,
        "Configuration loaded"
    );

    // 3. Open the save store.
    let mut store = FileStore::new(config.persistence.save_dir.clone());
    let codec = PersistenceCodec::from_config(&config);
    let clock = SystemClock;
    info!(
        save_dir = %store.dir().display(),
        save_key = codec.save_key(),
        "Save store ready"
    );

    // 4. Load the saved session.
    let mut console = ConsoleObserver::new(std::io::stdout(), config.settings.max_log_entries);
    let outcome = codec.load_or_new(Arc::clone(&config), &store, &clock, &mut console);
    info!(
        offline_ms = outcome.offline_ms,
        completed_offline = outcome.completed_offline.len(),
        dropped_timers = outcome.dropped_timers,
        "Session ready"
    );

    // 5. Start the input sources.
    let (commands_tx, commands_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let lines = spawn_stdin_reader()?;
    let input = tokio::spawn(console_loop(
        lines,
        commands_tx.clone(),
        Arc::clone(&config),
    ));
    let interrupt = tokio::spawn(forward_ctrl_c(commands_tx));
    console.print("Type 'help' for a list of commands.");

    // 6. Run the session.
    let summary = run_session(
        outcome.session,
        codec,
        &mut store,
        &clock,
        commands_rx,
        &mut console,
    )
    .await?;
    input.abort();
    interrupt.abort();

    // 7. Log the result.
    info!(
        ticks = summary.ticks,
        completed = summary.completed,
        saves = summary.saves,
        failed_saves = summary.failed_saves,
        play_time_ms = summary.session.play_time_ms(),
        "skyguild-engine stopped"
    );
    Ok(())
}

/// Load the game configuration from `skyguild-config.yaml`.
///
/// Looks for the config file relative to the current working directory.
fn load_config() -> Result<GameConfig, EngineError> {
    let config_path = Path::new(CONFIG_FILE);
    if config_path.exists() {
        let config = GameConfig::from_file(config_path)?;
        Ok(config)
    } else {
        info!("Config file not found, using defaults");
        let mut config = GameConfig::default();
        config.persistence.apply_env_overrides();
        Ok(config)
    }
}

/// Drive `session` until `quit`, Ctrl-C, or the end of every input.
async fn run_session(
    session: Session,
    codec: PersistenceCodec,
    store: &mut dyn KeyValueStore,
    clock: &dyn Clock,
    commands: mpsc::Receiver<SessionCommand>,
    observer: &mut dyn SessionObserver,
) -> Result<RunSummary, EngineError> {
    let summary = SessionRunner::new(session, codec, store, clock)
        .run(commands, observer)
        .await?;
    Ok(summary)
}

/// Read stdin lines on a dedicated thread.
///
/// A blocking read cannot be cancelled, so it stays off the runtime; the
/// thread ends at end of input or when the receiver is dropped.
fn spawn_stdin_reader() -> Result<mpsc::Receiver<String>, EngineError> {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    std::thread::Builder::new()
        .name("stdin".to_owned())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "stdin read failed");
                        break;
                    }
                }
            }
        })?;
    Ok(rx)
}

/// Turn input lines into session commands until input ends or the
/// runner stops.
async fn console_loop(
    mut lines: mpsc::Receiver<String>,
    sender: mpsc::Sender<SessionCommand>,
    config: Arc<GameConfig>,
) {
    while let Some(line) = lines.recv().await {
        let input = match commands::parse(&line) {
            Ok(Some(input)) => input,
            Ok(None) => continue,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };
        if !dispatch(input, &sender, &config).await {
            debug!("session runner gone, console input stopped");
            return;
        }
    }
    println!("Input closed. Press Ctrl-C to save and exit.");
}

/// Handle one parsed input. Returns `false` once the runner is gone.
async fn dispatch(
    input: Input,
    sender: &mpsc::Sender<SessionCommand>,
    config: &GameConfig,
) -> bool {
    match input {
        Input::Send(command) => sender.send(command).await.is_ok(),
        Input::Help => {
            println!("{HELP}");
            true
        }
        Input::Status => {
            let Some(status) = ask(sender, SessionCommand::Status).await else {
                return false;
            };
            println!("{}", render_status(&status, config));
            true
        }
        Input::Export => {
            let Some(exported) = ask(sender, SessionCommand::Export).await else {
                return false;
            };
            match exported {
                Ok(Some(json)) => println!("{json}"),
                Ok(None) => println!("No saved game."),
                Err(e) => println!("Export failed: {e}"),
            }
            true
        }
        Input::Summary => {
            let Some(summary) = ask(sender, SessionCommand::Summary).await else {
                return false;
            };
            match summary {
                Ok(Some(summary)) => println!("{}", render_summary(&summary)),
                Ok(None) => println!("No saved game."),
                Err(e) => println!("Cannot read save: {e}"),
            }
            true
        }
        Input::Import(path) => match tokio::fs::read_to_string(&path).await {
            Ok(text) => sender.send(SessionCommand::Import(text)).await.is_ok(),
            Err(e) => {
                println!("Cannot read {}: {e}", path.display());
                true
            }
        },
    }
}

/// Send a request carrying a reply channel and wait for the answer.
async fn ask<T>(
    sender: &mpsc::Sender<SessionCommand>,
    request: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
) -> Option<T> {
    let (reply, answer) = oneshot::channel();
    sender.send(request(reply)).await.ok()?;
    answer.await.ok()
}

/// Ask the runner to shut down on Ctrl-C.
async fn forward_ctrl_c(sender: mpsc::Sender<SessionCommand>) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Interrupt received, shutting down");
            let _ = sender.send(SessionCommand::Shutdown).await;
        }
        Err(e) => warn!(error = %e, "cannot listen for Ctrl-C"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use skyguild_core::clock::ManualClock;
    use skyguild_core::observer::NoOpObserver;
    use skyguild_core::persistence::MemoryStore;

    use super::*;

    #[tokio::test]
    async fn runner_refusal_becomes_engine_error() {
        let mut config = GameConfig::default();
        config.settings.tick_resolution_ms = 0;
        let config = Arc::new(config);
        let codec = PersistenceCodec::from_config(&config);
        let mut store = MemoryStore::new();
        let (_tx, rx) = mpsc::channel(1);

        let err = run_session(
            Session::new(config),
            codec,
            &mut store,
            &ManualClock::new(0),
            rx,
            &mut NoOpObserver,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EngineError::Runner { .. }));
        assert!(err.to_string().starts_with("runner error: "));
    }
}
