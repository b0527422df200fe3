//! Action descriptors for timed player actions.
//!
//! Every timer carries the [`Action`] it will complete. The timer id is
//! derived from the action (`gather:ironOre`, `refine:plank`,
//! `combat:basic`), so a persisted timer record can be mapped back to its
//! action without storing callbacks.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::ActionKind;
use crate::ids::{CombatId, ResourceId, TimerId};

/// Separator between the action kind prefix and the target in a timer id.
const TIMER_ID_SEPARATOR: char = ':';

/// A timed action: what runs when its timer completes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(tag = "kind", content = "target", rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum Action {
    /// Gather one unit of a raw resource.
    Gather(ResourceId),
    /// Refine one unit of a refined resource.
    Refine(ResourceId),
    /// Complete one round of a combat activity.
    Combat(CombatId),
}

impl Action {
    /// The kind of this action.
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::Gather(_) => ActionKind::Gather,
            Self::Refine(_) => ActionKind::Refine,
            Self::Combat(_) => ActionKind::Combat,
        }
    }

    /// The catalog id this action targets.
    pub fn target(&self) -> &str {
        match self {
            Self::Gather(id) | Self::Refine(id) => id.as_str(),
            Self::Combat(id) => id.as_str(),
        }
    }

    /// The stable timer id for this action.
    pub fn timer_id(&self) -> TimerId {
        TimerId(format!(
            "{}{TIMER_ID_SEPARATOR}{}",
            self.kind().prefix(),
            self.target()
        ))
    }

    /// Parse a timer id back into an action descriptor.
    ///
    /// Returns `None` for ids with an unknown prefix or an empty target.
    /// Whether the target exists in the current catalog is checked by the
    /// caller.
    pub fn from_timer_id(id: &str) -> Option<Self> {
        let (prefix, target) = id.split_once(TIMER_ID_SEPARATOR)?;
        if target.is_empty() {
            return None;
        }
        match prefix {
            "gather" => Some(Self::Gather(ResourceId::from(target))),
            "refine" => Some(Self::Refine(ResourceId::from(target))),
            "combat" => Some(Self::Combat(CombatId::from(target))),
            _ => None,
        }
    }
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{}{TIMER_ID_SEPARATOR}{}",
            self.kind().prefix(),
            self.target()
        )
    }
}
