//! Shared type definitions for the Skyguild progression engine.
//!
//! This crate is the single source of truth for identifiers, enums, action
//! descriptors, and the persisted save layout used across the workspace.
//! Presentation-facing types derive [`ts_rs::TS`] so a browser front end can
//! consume them as `TypeScript` bindings.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe string identifiers for catalog entries
//! - [`enums`] -- Tiers, resource families, feature flags, unlock keys
//! - [`actions`] -- Timed action descriptors and timer id mapping
//! - [`structs`] -- Cost bundles
//! - [`events`] -- Session notification payloads
//! - [`records`] -- Persisted save record layout

pub mod actions;
pub mod enums;
pub mod events;
pub mod ids;
pub mod records;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use actions::Action;
pub use enums::{ActionKind, Feature, ResourceFamily, Tier, UnlockKey};
pub use events::SessionEvent;
pub use ids::{CombatId, ComponentId, MilestoneId, ResourceId, TimerId, UpgradeId};
pub use records::{
    LedgerRecord, SAVE_VERSION, SaveRecord, SaveSummary, TimerRecord, UnlockRecord,
};
pub use structs::CostBundle;

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation for presentation-facing types.

    #[test]
    fn export_bindings() {
        // The files are written to the `bindings/` directory relative to the
        // crate root.
        use ts_rs::TS;

        // IDs
        let _ = crate::ids::ResourceId::export_all();
        let _ = crate::ids::MilestoneId::export_all();
        let _ = crate::ids::CombatId::export_all();
        let _ = crate::ids::UpgradeId::export_all();
        let _ = crate::ids::ComponentId::export_all();
        let _ = crate::ids::TimerId::export_all();

        // Enums
        let _ = crate::enums::Tier::export_all();
        let _ = crate::enums::ResourceFamily::export_all();
        let _ = crate::enums::Feature::export_all();
        let _ = crate::enums::ActionKind::export_all();
        let _ = crate::enums::UnlockKey::export_all();

        // Actions and structs
        let _ = crate::actions::Action::export_all();
        let _ = crate::structs::CostBundle::export_all();
        let _ = crate::events::SessionEvent::export_all();

        // Records
        let _ = crate::records::SaveRecord::export_all();
        let _ = crate::records::LedgerRecord::export_all();
        let _ = crate::records::UnlockRecord::export_all();
        let _ = crate::records::TimerRecord::export_all();
        let _ = crate::records::SaveSummary::export_all();
    }
}
