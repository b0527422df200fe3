//! Persisted save record layout.
//!
//! These structs are the on-disk (JSON) shape of a saved session. They are
//! deliberately separate from the in-memory types in `skyguild-ledger` and
//! `skyguild-core`: sets are stored as explicit sequences, and fields that
//! older saves may lack carry serde defaults.
//!
//! Required fields (`savedAt`, `ledger.raw`, `ledger.refined`,
//! `ledger.currency`, `ledger.guildmates`) have no default, so a record
//! missing any of them fails to deserialize and is discarded as a whole.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::{ComponentId, MilestoneId, ResourceId, TimerId};

/// Current save format version written by this build.
pub const SAVE_VERSION: &str = "1.0.0";

/// A complete saved session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct SaveRecord {
    /// Save format version.
    #[serde(default = "default_version")]
    pub version: String,
    /// Wall-clock time of the save, epoch milliseconds.
    pub saved_at: i64,
    /// Accumulated active play time in milliseconds.
    #[serde(default)]
    pub play_time_ms: u64,
    /// Resource quantities, currency, and guild headcount.
    pub ledger: LedgerRecord,
    /// Unlocked resources, completed milestones, built components.
    #[serde(default)]
    pub unlocks: UnlockRecord,
    /// Snapshot of every timer held at save time.
    #[serde(default)]
    pub timers: Vec<TimerRecord>,
}

/// Persisted ledger state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct LedgerRecord {
    /// Raw resource quantities.
    pub raw: BTreeMap<ResourceId, u32>,
    /// Refined resource quantities.
    pub refined: BTreeMap<ResourceId, u32>,
    /// Spendable currency.
    pub currency: u64,
    /// Lifetime currency earned (never decreases).
    #[serde(default)]
    pub total_currency_earned: u64,
    /// Current guild headcount.
    pub guildmates: u32,
    /// Guild capacity; absent in old saves, in which case the configured
    /// base capacity applies.
    #[serde(default)]
    pub max_guildmates: Option<u32>,
}

/// Persisted unlock state, as explicit sequences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct UnlockRecord {
    /// Unlocked or discovered resource types.
    #[serde(default)]
    pub resource_types: Vec<ResourceId>,
    /// Completed milestone ids.
    #[serde(default)]
    pub milestones: Vec<MilestoneId>,
    /// Built airship components.
    #[serde(default)]
    pub components: Vec<ComponentId>,
}

/// Snapshot of one timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct TimerRecord {
    /// Timer id (`gather:ironOre`).
    pub id: TimerId,
    /// Total duration in milliseconds.
    pub duration: u64,
    /// Remaining milliseconds at `start_instant`.
    pub remaining: u64,
    /// Whether the timer was counting down when saved.
    pub running: bool,
    /// Epoch milliseconds from which `remaining` counts down. Present for
    /// running timers.
    #[serde(default)]
    pub start_instant: Option<i64>,
}

/// Human-facing summary of a stored save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct SaveSummary {
    /// Save format version.
    pub version: String,
    /// Wall-clock time of the save, epoch milliseconds.
    pub saved_at: i64,
    /// Guild headcount at save time.
    pub guildmates: u32,
    /// Currency at save time.
    pub currency: u64,
    /// Accumulated active play time in milliseconds.
    pub play_time_ms: u64,
    /// Number of timers that were held at save time.
    pub timers: usize,
}

impl From<&SaveRecord> for SaveSummary {
    fn from(record: &SaveRecord) -> Self {
        Self {
            version: record.version.clone(),
            saved_at: record.saved_at,
            guildmates: record.ledger.guildmates,
            currency: record.ledger.currency,
            play_time_ms: record.play_time_ms,
            timers: record.timers.len(),
        }
    }
}

fn default_version() -> String {
    SAVE_VERSION.to_owned()
}
