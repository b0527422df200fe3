//! Enumeration types for the Skyguild progression engine.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::{ComponentId, MilestoneId, ResourceId};

// ---------------------------------------------------------------------------
// Catalog classification
// ---------------------------------------------------------------------------

/// Coarse difficulty / unlock-order label on a resource or activity.
///
/// Informational only: nothing in the engine branches on the tier.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum Tier {
    /// Available early in a run.
    #[default]
    Basic,
    /// Unlocked later in a run.
    Advanced,
}

/// The family a resource type belongs to.
///
/// The two families are disjoint: a resource id is either gathered (raw)
/// or produced from a cost bundle (refined), never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum ResourceFamily {
    /// Gathered directly, no cost.
    Raw,
    /// Produced by refining raw resources.
    Refined,
}

/// A fixed feature flag granted by milestone rewards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum Feature {
    /// Refining actions are available.
    Refining,
    /// Combat activities are available.
    Combat,
    /// Guild management (recruiting, upgrades) is available.
    Guild,
}

impl Feature {
    /// Lower-case name used in logs and configuration.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Refining => "refining",
            Self::Combat => "combat",
            Self::Guild => "guild",
        }
    }
}

impl core::fmt::Display for Feature {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of a timed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum ActionKind {
    /// Gather one unit of a raw resource.
    Gather,
    /// Refine one unit of a refined resource.
    Refine,
    /// Fight a combat activity for currency.
    Combat,
}

impl ActionKind {
    /// Prefix used in timer ids (`gather:ironOre`).
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Gather => "gather",
            Self::Refine => "refine",
            Self::Combat => "combat",
        }
    }
}

// ---------------------------------------------------------------------------
// Unlock notifications
// ---------------------------------------------------------------------------

/// Something that became unlocked, reported to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub enum UnlockKey {
    /// A resource type was unlocked by a milestone or discovered by production.
    Resource(ResourceId),
    /// A feature flag became enabled.
    Feature(Feature),
    /// A milestone was completed.
    Milestone(MilestoneId),
    /// An airship component was built.
    Component(ComponentId),
}

impl core::fmt::Display for UnlockKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Resource(id) => write!(f, "resource:{id}"),
            Self::Feature(feature) => write!(f, "feature:{feature}"),
            Self::Milestone(id) => write!(f, "milestone:{id}"),
            Self::Component(id) => write!(f, "component:{id}"),
        }
    }
}
