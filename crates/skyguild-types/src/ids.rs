//! Type-safe string identifiers for catalog entries.
//!
//! Every catalog entry (resource type, milestone, combat activity, upgrade,
//! airship component) is keyed by a short camelCase string taken from the
//! configuration file, e.g. `"ironOre"`. Wrapping those strings in distinct
//! newtypes keeps a resource id from being passed where a milestone id is
//! expected.
//!
//! All identifiers serialize transparently as plain strings so the persisted
//! save record stays readable and stable across versions.

use core::borrow::Borrow;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Generates a newtype wrapper around [`String`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub String);

        impl $name {
            /// Create a new identifier from any string-like value.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Return the inner [`String`] value.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id! {
    /// Identifier of a raw or refined resource type (e.g. `ironOre`, `plank`).
    ResourceId
}

define_id! {
    /// Identifier of a milestone (e.g. `firstIron`).
    MilestoneId
}

define_id! {
    /// Identifier of a combat activity (e.g. `basic`, `advanced`).
    CombatId
}

define_id! {
    /// Identifier of a purchasable upgrade (e.g. `guildHall`).
    UpgradeId
}

define_id! {
    /// Identifier of an airship component (e.g. `hull`).
    ComponentId
}

define_id! {
    /// Stable timer key derived from an action descriptor
    /// (e.g. `gather:ironOre`).
    TimerId
}
