//! Core value structs shared across the workspace.

use std::collections::BTreeMap;
use std::collections::btree_map;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::ResourceId;

// ---------------------------------------------------------------------------
// CostBundle
// ---------------------------------------------------------------------------

/// A set of `(resource type, quantity)` pairs required by an action.
///
/// Keys are unique and ordering is irrelevant; the map is ordered only so
/// that iteration (and therefore log output) is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CostBundle(pub BTreeMap<ResourceId, u32>);

impl CostBundle {
    /// Create an empty bundle.
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert. A repeated key overwrites the earlier quantity.
    #[must_use]
    pub fn with(mut self, resource: impl Into<ResourceId>, quantity: u32) -> Self {
        self.0.insert(resource.into(), quantity);
        self
    }

    /// Quantity required for `resource`, or 0 if not part of the bundle.
    pub fn get(&self, resource: &str) -> u32 {
        self.0.get(resource).copied().unwrap_or(0)
    }

    /// Iterate over `(resource, quantity)` pairs in id order.
    pub fn iter(&self) -> btree_map::Iter<'_, ResourceId, u32> {
        self.0.iter()
    }

    /// Iterate over the resource ids in the bundle.
    pub fn resources(&self) -> btree_map::Keys<'_, ResourceId, u32> {
        self.0.keys()
    }

    /// Whether the bundle requires nothing.
    pub fn is_empty(&self) -> bool {
        self.0.values().all(|qty| *qty == 0)
    }

    /// Number of distinct resource entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl FromIterator<(ResourceId, u32)> for CostBundle {
    fn from_iter<I: IntoIterator<Item = (ResourceId, u32)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a CostBundle {
    type Item = (&'a ResourceId, &'a u32);
    type IntoIter = btree_map::Iter<'a, ResourceId, u32>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl core::fmt::Display for CostBundle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut first = true;
        for (resource, quantity) in &self.0 {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{quantity} {resource}")?;
            first = false;
        }
        Ok(())
    }
}
