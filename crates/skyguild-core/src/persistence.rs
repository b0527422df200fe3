//! Save and load a session through a key-value store.
//!
//! The codec turns a [`Session`] into a JSON [`SaveRecord`] and back. On
//! load it rebuilds the ledger and unlock sets first, then reconciles every
//! persisted timer against the wall-clock gap since it was saved: timers
//! that ran out while the game was closed complete exactly once, however
//! long the gap.
//!
//! The byte store is an injected [`KeyValueStore`]; [`MemoryStore`] lives
//! here for tests, a file-backed store lives in the engine binary.

use std::collections::BTreeMap;
use std::sync::Arc;

use skyguild_ledger::ResourceLedger;
use skyguild_types::{Action, SaveRecord, SaveSummary};
use tracing::{debug, info, warn};

use crate::clock::{Clock, elapsed_ms};
use crate::config::GameConfig;
use crate::observer::SessionObserver;
use crate::progression::UnlockState;
use crate::registry::TimerRegistry;
use crate::session::Session;

// ---------------------------------------------------------------------------
// Store seam
// ---------------------------------------------------------------------------

/// Errors raised by a [`KeyValueStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing storage failed.
    #[error("store I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The store refused the operation.
    #[error("store unavailable: {reason}")]
    Unavailable {
        /// Why the store refused.
        reason: String,
    },
}

/// A byte store addressed by string keys.
pub trait KeyValueStore: Send {
    /// Read the bytes stored under `key`, or `None` if absent.
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Store `bytes` under `key`, replacing any previous value.
    fn write(&mut self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// Remove `key`. Removing an absent key succeeds.
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

/// An in-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, Vec<u8>>,
    fail_writes: bool,
}

impl MemoryStore {
    /// Create an empty store.
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            fail_writes: false,
        }
    }

    /// Make every subsequent write or removal fail (or succeed again).
    pub const fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Raw bytes under `key`.
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Put raw bytes under `key`, bypassing the failure switch.
    pub fn insert(&mut self, key: &str, bytes: impl Into<Vec<u8>>) {
        self.entries.insert(key.to_owned(), bytes.into());
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Unavailable {
                reason: "writes disabled".to_owned(),
            });
        }
        self.entries.insert(key.to_owned(), bytes.to_vec());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Unavailable {
                reason: "writes disabled".to_owned(),
            });
        }
        self.entries.remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Errors that can occur while saving or loading.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// The stored bytes are not a valid save.
    #[error("invalid save data: {reason}")]
    InvalidSaveData {
        /// What is wrong with the data.
        reason: String,
    },

    /// The store rejected a write.
    #[error("failed to write save: {source}")]
    PersistenceWriteFailed {
        /// The underlying store error.
        source: StoreError,
    },

    /// The store failed to read.
    #[error("failed to read save: {source}")]
    ReadFailed {
        /// The underlying store error.
        source: StoreError,
    },

    /// The session could not be encoded.
    #[error("failed to encode save: {source}")]
    Encode {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },
}

/// A session rebuilt from storage.
#[derive(Debug)]
pub struct LoadOutcome {
    /// The restored session.
    pub session: Session,
    /// Wall-clock gap since the save was written.
    pub offline_ms: u64,
    /// Actions whose timers ran out while offline, completed on load.
    pub completed_offline: Vec<Action>,
    /// Timer records dropped because their action no longer exists.
    pub dropped_timers: usize,
}

/// Saves and restores sessions under one store key.
#[derive(Debug, Clone)]
pub struct PersistenceCodec {
    save_key: String,
    welcome_back_threshold_ms: u64,
}

impl PersistenceCodec {
    /// Create a codec for `save_key`.
    pub fn new(save_key: impl Into<String>, welcome_back_threshold_ms: u64) -> Self {
        Self {
            save_key: save_key.into(),
            welcome_back_threshold_ms,
        }
    }

    /// Create a codec from the persistence and settings sections.
    pub fn from_config(config: &GameConfig) -> Self {
        Self::new(
            config.persistence.save_key.clone(),
            config.settings.welcome_back_threshold_ms,
        )
    }

    /// The store key saves are written under.
    pub fn save_key(&self) -> &str {
        &self.save_key
    }

    /// Encode a session as compact JSON.
    pub fn encode(session: &Session, now_ms: i64) -> Result<Vec<u8>, PersistenceError> {
        Ok(serde_json::to_vec(&session.to_record(now_ms))?)
    }

    /// Parse and validate save bytes.
    ///
    /// A record missing any required field is rejected as a whole.
    pub fn decode(bytes: &[u8]) -> Result<SaveRecord, PersistenceError> {
        serde_json::from_slice(bytes).map_err(|e| PersistenceError::InvalidSaveData {
            reason: e.to_string(),
        })
    }

    /// Write the session to the store.
    pub fn save(
        &self,
        session: &Session,
        store: &mut dyn KeyValueStore,
        clock: &dyn Clock,
    ) -> Result<(), PersistenceError> {
        let bytes = Self::encode(session, clock.now_ms())?;
        store
            .write(&self.save_key, &bytes)
            .map_err(|source| PersistenceError::PersistenceWriteFailed { source })?;
        debug!(key = %self.save_key, bytes = bytes.len(), "session saved");
        Ok(())
    }

    /// Load the stored session, or `None` if nothing is stored.
    ///
    /// Overdue timers are completed through `observer` before this returns.
    pub fn load(
        &self,
        config: Arc<GameConfig>,
        store: &dyn KeyValueStore,
        clock: &dyn Clock,
        observer: &mut dyn SessionObserver,
    ) -> Result<Option<LoadOutcome>, PersistenceError> {
        let Some(bytes) = self.read(store)? else {
            return Ok(None);
        };
        let record = Self::decode(&bytes)?;
        self.restore(config, &record, clock, observer).map(Some)
    }

    /// Load the stored session, falling back to a fresh one if nothing is
    /// stored or the save is unusable.
    pub fn load_or_new(
        &self,
        config: Arc<GameConfig>,
        store: &dyn KeyValueStore,
        clock: &dyn Clock,
        observer: &mut dyn SessionObserver,
    ) -> LoadOutcome {
        match self.load(Arc::clone(&config), store, clock, observer) {
            Ok(Some(outcome)) => outcome,
            Ok(None) => {
                info!("no saved session, starting fresh");
                Self::fresh(config)
            }
            Err(e) => {
                warn!(error = %e, "discarding unusable save");
                observer.on_log_message("Warning: Failed to load saved progress, starting fresh");
                Self::fresh(config)
            }
        }
    }

    fn fresh(config: Arc<GameConfig>) -> LoadOutcome {
        LoadOutcome {
            session: Session::new(config),
            offline_ms: 0,
            completed_offline: Vec::new(),
            dropped_timers: 0,
        }
    }

    /// Rebuild a session from a decoded record.
    ///
    /// Order matters: the ledger and unlock sets are restored before any
    /// overdue timer is completed, so each completion sees the saved
    /// state plus every earlier completion.
    pub fn restore(
        &self,
        config: Arc<GameConfig>,
        record: &SaveRecord,
        clock: &dyn Clock,
        observer: &mut dyn SessionObserver,
    ) -> Result<LoadOutcome, PersistenceError> {
        let now_ms = clock.now_ms();
        let ledger = ResourceLedger::from_record(
            config.resource_limits(),
            &record.ledger,
            config.guild.base_max_guildmates,
        )
        .map_err(|e| PersistenceError::InvalidSaveData {
            reason: e.to_string(),
        })?;
        let unlocks =
            UnlockState::from_record(&record.unlocks, config.settings.seed_resource.clone());

        let restored = TimerRegistry::restore(&record.timers, |id| config.resolve_timer(id), now_ms);
        let mut session = Session::from_parts(
            config,
            ledger,
            unlocks,
            restored.registry,
            record.play_time_ms,
        );

        for action in &restored.overdue {
            session.complete_action(action, observer);
        }
        // Settles milestones added to the catalog since the save.
        session.run_progression(observer);

        let offline_ms = elapsed_ms(record.saved_at, now_ms);
        if offline_ms > self.welcome_back_threshold_ms {
            observer.on_log_message(&format!(
                "Welcome back! You were offline for {}",
                format_duration(offline_ms)
            ));
        }
        info!(
            offline_ms,
            completed_offline = restored.overdue.len(),
            dropped_timers = restored.dropped,
            running = session.timers().len(),
            "session restored"
        );

        Ok(LoadOutcome {
            session,
            offline_ms,
            completed_offline: restored.overdue,
            dropped_timers: restored.dropped,
        })
    }

    // -----------------------------------------------------------------------
    // Save management
    // -----------------------------------------------------------------------

    /// The stored save as pretty-printed JSON, or `None` if nothing is
    /// stored.
    pub fn export(&self, store: &dyn KeyValueStore) -> Result<Option<String>, PersistenceError> {
        let Some(bytes) = self.read(store)? else {
            return Ok(None);
        };
        let record = Self::decode(&bytes)?;
        Ok(Some(serde_json::to_string_pretty(&record)?))
    }

    /// Validate `text` as a save for `config` and store it.
    ///
    /// Nothing is written unless the whole record is valid.
    pub fn import(
        &self,
        config: &GameConfig,
        text: &str,
        store: &mut dyn KeyValueStore,
    ) -> Result<SaveSummary, PersistenceError> {
        let record = Self::decode(text.as_bytes())?;
        ResourceLedger::from_record(
            config.resource_limits(),
            &record.ledger,
            config.guild.base_max_guildmates,
        )
        .map_err(|e| PersistenceError::InvalidSaveData {
            reason: e.to_string(),
        })?;

        let bytes = serde_json::to_vec(&record)?;
        store
            .write(&self.save_key, &bytes)
            .map_err(|source| PersistenceError::PersistenceWriteFailed { source })?;
        info!(key = %self.save_key, saved_at = record.saved_at, "save imported");
        Ok(SaveSummary::from(&record))
    }

    /// Remove the stored save.
    pub fn clear(&self, store: &mut dyn KeyValueStore) -> Result<(), PersistenceError> {
        store
            .remove(&self.save_key)
            .map_err(|source| PersistenceError::PersistenceWriteFailed { source })?;
        info!(key = %self.save_key, "save cleared");
        Ok(())
    }

    /// Summary of the stored save, or `None` if nothing is stored.
    pub fn summary(
        &self,
        store: &dyn KeyValueStore,
    ) -> Result<Option<SaveSummary>, PersistenceError> {
        let Some(bytes) = self.read(store)? else {
            return Ok(None);
        };
        Ok(Some(SaveSummary::from(&Self::decode(&bytes)?)))
    }

    fn read(&self, store: &dyn KeyValueStore) -> Result<Option<Vec<u8>>, PersistenceError> {
        store
            .read(&self.save_key)
            .map_err(|source| PersistenceError::ReadFailed { source })
    }
}

/// Render a millisecond span as `1h 5m`, `3m 20s`, or `42s`.
pub fn format_duration(ms: u64) -> String {
    let seconds = ms / 1000;
    let minutes = seconds / 60;
    let hours = minutes / 60;
    if hours > 0 {
        format!("{hours}h {}m", minutes % 60)
    } else if minutes > 0 {
        format!("{minutes}m {}s", seconds % 60)
    } else {
        format!("{seconds}s")
    }
}
