//! Resource ledger for the Skyguild progression engine.
//!
//! The ledger holds every quantity the player owns: raw and refined
//! resources, spendable currency, the lifetime currency counter, and the
//! guild headcount. It is the only place those numbers change.
//!
//! # Invariants
//!
//! - No quantity is ever negative (all counters are unsigned and every
//!   subtraction is checked).
//! - A raw or refined quantity never exceeds its configured storage cap.
//!   Excess production is discarded, not queued.
//! - Multi-resource debits are all-or-nothing: every entry of a
//!   [`CostBundle`] is validated before any entry is debited.
//! - `total_currency_earned` never decreases.
//!
//! The ledger never panics; it returns [`LedgerError`].
//!
//! # Usage
//!
//! ```
//! use std::collections::BTreeMap;
//!
//! use skyguild_ledger::{LedgerError, ResourceLedger, ResourceLimit};
//! use skyguild_types::{CostBundle, ResourceFamily, ResourceId};
//!
//! let mut limits = BTreeMap::new();
//! limits.insert(ResourceId::new("ironOre"), ResourceLimit::new(ResourceFamily::Raw, 50));
//! limits.insert(ResourceId::new("ironIngot"), ResourceLimit::new(ResourceFamily::Refined, 25));
//! let mut ledger = ResourceLedger::new(limits, 5);
//!
//! ledger.complete_production("ironOre").ok();
//! let cost = CostBundle::new().with("ironOre", 2);
//! assert!(matches!(
//!     ledger.begin_refine("ironIngot", &cost),
//!     Err(LedgerError::InsufficientResources { .. })
//! ));
//! assert_eq!(ledger.quantity("ironOre"), 1);
//! ```
//!
//! [`CostBundle`]: skyguild_types::CostBundle

pub mod ledger;

pub use ledger::{LedgerState, ResourceLedger, ResourceLimit};

use skyguild_types::ResourceId;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors returned by ledger operations.
///
/// The first four variants are expected business-rule failures that the
/// caller reports to the player; the rest indicate a configuration or data
/// problem.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// The resource is already at its storage cap.
    #[error("storage full: {resource} is at {quantity}/{limit}")]
    StorageFull {
        /// The resource that is full.
        resource: ResourceId,
        /// Current quantity.
        quantity: u32,
        /// Configured storage cap.
        limit: u32,
    },

    /// A cost bundle entry exceeds the held quantity.
    #[error("insufficient resources: need {required} {resource} but only have {available}")]
    InsufficientResources {
        /// The first resource (in id order) that falls short.
        resource: ResourceId,
        /// Quantity required by the bundle.
        required: u32,
        /// Quantity currently held.
        available: u32,
    },

    /// Not enough spendable currency.
    #[error("insufficient currency: need {required} but only have {available}")]
    InsufficientCurrency {
        /// Currency required.
        required: u64,
        /// Currency currently held.
        available: u64,
    },

    /// The guild is at maximum capacity.
    #[error("guild full: {guildmates}/{max_guildmates}")]
    GuildFull {
        /// Current headcount.
        guildmates: u32,
        /// Current capacity.
        max_guildmates: u32,
    },

    /// The resource id is not part of the configured catalog.
    #[error("unknown resource: {0}")]
    UnknownResource(ResourceId),

    /// A counter would overflow.
    #[error("arithmetic overflow: {context}")]
    ArithmeticOverflow {
        /// Description of what was being computed.
        context: String,
    },

    /// A persisted ledger record violates an invariant.
    #[error("invalid ledger record: {reason}")]
    InvalidRecord {
        /// What is wrong with the record.
        reason: String,
    },
}
