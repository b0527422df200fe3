//! Notification payloads emitted by a running session.
//!
//! A presentation layer receives these through the session observer seam
//! in `skyguild-core`; they are also what the recording observer stores,
//! so tests and front ends see the same shapes.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::UnlockKey;
use crate::ids::TimerId;

/// One notification emitted by the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub enum SessionEvent {
    /// A running timer advanced by one tick.
    Tick {
        /// The timer that ticked.
        timer: TimerId,
        /// Milliseconds left after the tick.
        remaining_ms: u64,
    },
    /// A player request finished validation (timed actions) or executed
    /// (immediate actions).
    ActionResult {
        /// Action identifier, e.g. `gather:ironOre` or `recruit`.
        action: String,
        /// Failure message, or `None` on success.
        error: Option<String>,
    },
    /// Resources, features, milestones, or components became unlocked.
    UnlockChanged {
        /// Every key that changed, in the order it was applied.
        keys: Vec<UnlockKey>,
    },
    /// A human-readable log line.
    Log {
        /// Message text.
        text: String,
    },
}

impl SessionEvent {
    /// Whether this event is a tick notification.
    pub const fn is_tick(&self) -> bool {
        matches!(self, Self::Tick { .. })
    }
}
