//! Async tick driver for a live session.
//!
//! [`SessionRunner`] owns the [`Session`] for as long as the game runs and
//! is its only writer. It multiplexes three sources with `tokio::select!`:
//!
//! - **Tick interval**: one session tick per `tick_resolution_ms`
//! - **Autosave interval**: a save every `autosave_interval_ms` (0 disables)
//! - **Commands**: player input arriving on an mpsc channel
//!
//! A failed autosave is logged and retried at the next interval. On
//! shutdown (command or closed channel) the session is saved one last time.

use std::collections::BTreeSet;

use skyguild_ledger::LedgerState;
use skyguild_types::{Action, ComponentId, Feature, SaveSummary, UpgradeId};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::observer::SessionObserver;
use crate::persistence::{KeyValueStore, PersistenceCodec, PersistenceError};
use crate::registry::TimerTick;
use crate::session::{AirshipProgress, Session};

/// Log line emitted when a save fails.
pub const SAVE_FAILED_MESSAGE: &str = "Warning: Failed to save game progress";

/// Log line emitted when the stored save cannot be removed.
pub const CLEAR_FAILED_MESSAGE: &str = "Failed to clear saved progress";

/// Log line emitted when an import is rejected.
pub const IMPORT_FAILED_MESSAGE: &str = "Failed to import save data - invalid format";

/// Errors that stop the runner before it starts.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The session settings cannot drive a tick loop.
    #[error("invalid runner settings: {reason}")]
    InvalidSettings {
        /// What is wrong with the settings.
        reason: String,
    },
}

/// Player input for a running session.
#[derive(Debug)]
pub enum SessionCommand {
    /// Start a timed action.
    Request(Action),
    /// Recruit a guildmate.
    Recruit,
    /// Buy a guild upgrade.
    Upgrade(UpgradeId),
    /// Build an airship component.
    Build(ComponentId),
    /// Cancel a timed action.
    Cancel(Action),
    /// Pause every timer.
    Suspend,
    /// Resume every timer.
    Resume,
    /// Save now.
    Save,
    /// Reply with a status snapshot.
    Status(oneshot::Sender<StatusReport>),
    /// Reply with the stored save as pretty JSON.
    Export(oneshot::Sender<Result<Option<String>, PersistenceError>>),
    /// Reply with a summary of the stored save.
    Summary(oneshot::Sender<Result<Option<SaveSummary>, PersistenceError>>),
    /// Replace the stored save and reload from it.
    Import(String),
    /// Delete the stored save and start over.
    ClearSave,
    /// Save and stop.
    Shutdown,
}

/// Point-in-time view of a session for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    /// Ledger quantities.
    pub ledger: LedgerState,
    /// Enabled features.
    pub features: BTreeSet<Feature>,
    /// Description of the next pending milestone.
    pub next_objective: Option<String>,
    /// Airship construction progress.
    pub airship: AirshipProgress,
    /// Every held timer with its remaining time, including idle timers
    /// restored from a save and waiting to be requested again.
    pub timers: Vec<TimerTick>,
    /// Timed actions currently permitted.
    pub available: Vec<Action>,
    /// Accumulated play time.
    pub play_time_ms: u64,
    /// Whether the session is suspended.
    pub suspended: bool,
}

impl StatusReport {
    /// Capture the current state of `session`.
    pub fn from_session(session: &Session) -> Self {
        Self {
            ledger: session.ledger_state().clone(),
            features: session.enabled_features(),
            next_objective: session.next_objective().map(|m| m.description.clone()),
            airship: session.progress(),
            timers: session
                .timers()
                .iter()
                .map(|t| TimerTick {
                    id: t.id().clone(),
                    remaining_ms: t.remaining_ms(),
                })
                .collect(),
            available: session.available_actions(),
            play_time_ms: session.play_time_ms(),
            suspended: session.is_suspended(),
        }
    }
}

/// Counters for one run, plus the session it ended with.
#[derive(Debug)]
pub struct RunSummary {
    /// Ticks executed.
    pub ticks: u64,
    /// Timed actions completed.
    pub completed: u64,
    /// Successful saves (autosave, manual, and final).
    pub saves: u64,
    /// Failed save attempts.
    pub failed_saves: u64,
    /// The session as it was at shutdown.
    pub session: Session,
}

/// Drives a session from a tick interval, an autosave interval, and a
/// command channel.
pub struct SessionRunner<'a> {
    session: Session,
    codec: PersistenceCodec,
    store: &'a mut dyn KeyValueStore,
    clock: &'a dyn Clock,
    ticks: u64,
    completed: u64,
    saves: u64,
    failed_saves: u64,
}

impl<'a> SessionRunner<'a> {
    /// Create a runner that owns `session`.
    pub fn new(
        session: Session,
        codec: PersistenceCodec,
        store: &'a mut dyn KeyValueStore,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            session,
            codec,
            store,
            clock,
            ticks: 0,
            completed: 0,
            saves: 0,
            failed_saves: 0,
        }
    }

    /// Run until [`SessionCommand::Shutdown`] arrives or every sender is
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::InvalidSettings`] if the tick resolution is
    /// zero.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<SessionCommand>,
        observer: &mut dyn SessionObserver,
    ) -> Result<RunSummary, RunnerError> {
        let settings = self.session.config().settings.clone();
        if settings.tick_resolution_ms == 0 {
            return Err(RunnerError::InvalidSettings {
                reason: "tick resolution must be at least 1 ms".to_owned(),
            });
        }
        let autosave_enabled = settings.autosave_interval_ms > 0;

        let mut tick = tokio::time::interval(Duration::from_millis(settings.tick_resolution_ms));
        tick.set_missed_tick_behavior(MissedTickBehavior::Burst);
        let mut autosave =
            tokio::time::interval(Duration::from_millis(settings.autosave_interval_ms.max(1)));
        autosave.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Both intervals fire immediately on their first poll.
        tick.tick().await;
        autosave.tick().await;

        info!(
            tick_resolution_ms = settings.tick_resolution_ms,
            autosave_interval_ms = settings.autosave_interval_ms,
            "session runner starting"
        );

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let report = self.session.tick(observer);
                    self.ticks = self.ticks.saturating_add(report.ticks);
                    let completed = u64::try_from(report.completed.len()).unwrap_or(u64::MAX);
                    self.completed = self.completed.saturating_add(completed);
                }
                _ = autosave.tick(), if autosave_enabled => {
                    debug!("autosave");
                    self.save(observer);
                }
                command = commands.recv() => match command {
                    Some(SessionCommand::Shutdown) => {
                        info!("shutdown requested");
                        break;
                    }
                    Some(command) => self.handle(command, observer),
                    None => {
                        info!("command channel closed");
                        break;
                    }
                },
            }
        }

        self.save(observer);
        info!(
            ticks = self.ticks,
            completed = self.completed,
            saves = self.saves,
            failed_saves = self.failed_saves,
            "session runner stopped"
        );
        Ok(RunSummary {
            ticks: self.ticks,
            completed: self.completed,
            saves: self.saves,
            failed_saves: self.failed_saves,
            session: self.session,
        })
    }

    fn handle(&mut self, command: SessionCommand, observer: &mut dyn SessionObserver) {
        match command {
            SessionCommand::Request(action) => {
                // Rejections are already reported through the observer.
                let _ = self.session.request(&action, self.clock, observer);
            }
            SessionCommand::Recruit => {
                // Rejections are already reported through the observer.
                let _ = self.session.recruit(observer);
            }
            SessionCommand::Upgrade(upgrade) => {
                // Rejections are already reported through the observer.
                let _ = self.session.purchase_upgrade(upgrade.as_str(), observer);
            }
            SessionCommand::Build(component) => {
                // Rejections are already reported through the observer.
                let _ = self.session.build_component(component.as_str(), observer);
            }
            SessionCommand::Cancel(action) => {
                if self.session.cancel(&action) {
                    observer.on_log_message(&format!(
                        "Cancelled {}",
                        self.session.config().action_label(&action)
                    ));
                }
            }
            SessionCommand::Suspend => {
                self.session.suspend();
            }
            SessionCommand::Resume => {
                self.session.resume(self.clock);
            }
            SessionCommand::Save => {
                if self.save(observer) {
                    observer.on_log_message("Game saved");
                }
            }
            SessionCommand::Status(reply) => {
                let _ = reply.send(StatusReport::from_session(&self.session));
            }
            SessionCommand::Export(reply) => {
                // Persist the live state first so the export is current.
                self.save(observer);
                let _ = reply.send(self.codec.export(&*self.store));
            }
            SessionCommand::Summary(reply) => {
                let _ = reply.send(self.codec.summary(&*self.store));
            }
            SessionCommand::Import(text) => self.import(&text, observer),
            SessionCommand::ClearSave => {
                if let Err(e) = self.codec.clear(self.store) {
                    warn!(error = %e, "failed to clear save");
                    observer.on_log_message(CLEAR_FAILED_MESSAGE);
                    return;
                }
                self.session = Session::new(self.session.shared_config());
                observer.on_log_message("Save cleared, starting a new game");
            }
            SessionCommand::Shutdown => {}
        }
    }

    fn import(&mut self, text: &str, observer: &mut dyn SessionObserver) {
        let config = self.session.shared_config();
        if let Err(e) = self.codec.import(&config, text, self.store) {
            warn!(error = %e, "import rejected");
            observer.on_log_message(IMPORT_FAILED_MESSAGE);
            return;
        }
        match self.codec.load(config, &*self.store, self.clock, observer) {
            Ok(Some(outcome)) => {
                self.session = outcome.session;
                observer.on_log_message("Save imported");
            }
            Ok(None) => warn!("imported save vanished before reload"),
            Err(e) => {
                warn!(error = %e, "imported save failed to load");
                observer.on_log_message(IMPORT_FAILED_MESSAGE);
            }
        }
    }

    /// Save the session, reporting failure through the observer.
    fn save(&mut self, observer: &mut dyn SessionObserver) -> bool {
        match self.codec.save(&self.session, self.store, self.clock) {
            Ok(()) => {
                self.saves = self.saves.saturating_add(1);
                true
            }
            Err(e) => {
                warn!(error = %e, "save failed, will retry at the next autosave");
                self.failed_saves = self.failed_saves.saturating_add(1);
                observer.on_log_message(SAVE_FAILED_MESSAGE);
                false
            }
        }
    }
}
