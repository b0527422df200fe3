//! The resource ledger: quantities, caps, currency, and guild headcount.
//!
//! [`ResourceLedger`] pairs the mutable [`LedgerState`] with the immutable
//! per-resource [`ResourceLimit`]s taken from configuration. All mutation
//! goes through its methods so the invariants documented at the crate root
//! hold after every call.

use std::collections::BTreeMap;

use skyguild_types::{CostBundle, LedgerRecord, ResourceFamily, ResourceId};
use tracing::{debug, warn};

use crate::LedgerError;

// ---------------------------------------------------------------------------
// Limits and state
// ---------------------------------------------------------------------------

/// Storage classification and cap for one resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLimit {
    /// Which pool the resource lives in.
    pub family: ResourceFamily,
    /// Maximum quantity the pool may hold for this resource.
    pub storage_limit: u32,
}

impl ResourceLimit {
    /// Create a limit entry.
    pub const fn new(family: ResourceFamily, storage_limit: u32) -> Self {
        Self {
            family,
            storage_limit,
        }
    }
}

/// Mutable economy state of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerState {
    /// Raw resource quantities, each in `[0, storage_limit]`.
    pub raw: BTreeMap<ResourceId, u32>,
    /// Refined resource quantities, each in `[0, storage_limit]`.
    pub refined: BTreeMap<ResourceId, u32>,
    /// Spendable currency.
    pub currency: u64,
    /// Lifetime currency earned; independent of spending.
    pub total_currency_earned: u64,
    /// Current guild headcount.
    pub guildmates: u32,
    /// Current guild capacity.
    pub max_guildmates: u32,
}

impl LedgerState {
    /// Quantity held of `resource` in either pool (0 if absent).
    pub fn quantity(&self, resource: &str) -> u32 {
        self.raw
            .get(resource)
            .or_else(|| self.refined.get(resource))
            .copied()
            .unwrap_or(0)
    }

    /// Convert to the persisted record layout.
    pub fn to_record(&self) -> LedgerRecord {
        LedgerRecord {
            raw: self.raw.clone(),
            refined: self.refined.clone(),
            currency: self.currency,
            total_currency_earned: self.total_currency_earned,
            guildmates: self.guildmates,
            max_guildmates: Some(self.max_guildmates),
        }
    }
}

// ---------------------------------------------------------------------------
// ResourceLedger
// ---------------------------------------------------------------------------

/// The session's resource ledger.
#[derive(Debug, Clone)]
pub struct ResourceLedger {
    state: LedgerState,
    limits: BTreeMap<ResourceId, ResourceLimit>,
}

impl ResourceLedger {
    /// Create a fresh ledger with every configured resource at zero.
    pub fn new(limits: BTreeMap<ResourceId, ResourceLimit>, max_guildmates: u32) -> Self {
        let mut state = LedgerState {
            max_guildmates,
            ..LedgerState::default()
        };
        for (id, limit) in &limits {
            match limit.family {
                ResourceFamily::Raw => state.raw.insert(id.clone(), 0),
                ResourceFamily::Refined => state.refined.insert(id.clone(), 0),
            };
        }
        Self { state, limits }
    }

    /// Rebuild a ledger from a persisted record.
    ///
    /// Entries for resources no longer in the catalog (or filed under the
    /// wrong family) are dropped, and quantities above the current cap are
    /// clamped to it. `base_max_guildmates` applies when the record predates
    /// the capacity field.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidRecord`] if the guild headcount exceeds
    /// its capacity or lifetime earnings are below the current balance.
    pub fn from_record(
        limits: BTreeMap<ResourceId, ResourceLimit>,
        record: &LedgerRecord,
        base_max_guildmates: u32,
    ) -> Result<Self, LedgerError> {
        let max_guildmates = record.max_guildmates.unwrap_or(base_max_guildmates);
        if record.guildmates > max_guildmates {
            return Err(LedgerError::InvalidRecord {
                reason: format!(
                    "guildmates {} exceeds capacity {max_guildmates}",
                    record.guildmates
                ),
            });
        }

        // Old saves carry no lifetime counter; the balance is a lower bound.
        let total_currency_earned = if record.total_currency_earned == 0 {
            record.currency
        } else if record.total_currency_earned < record.currency {
            return Err(LedgerError::InvalidRecord {
                reason: format!(
                    "total currency earned {} is below balance {}",
                    record.total_currency_earned, record.currency
                ),
            });
        } else {
            record.total_currency_earned
        };

        let mut ledger = Self::new(limits, max_guildmates);
        ledger.state.currency = record.currency;
        ledger.state.total_currency_earned = total_currency_earned;
        ledger.state.guildmates = record.guildmates;

        for (family, entries) in [
            (ResourceFamily::Raw, &record.raw),
            (ResourceFamily::Refined, &record.refined),
        ] {
            for (id, quantity) in entries {
                let Some(limit) = ledger.limits.get(id).copied() else {
                    warn!(resource = %id, "dropping saved quantity for unknown resource");
                    continue;
                };
                if limit.family != family {
                    warn!(resource = %id, ?family, "dropping saved quantity filed under wrong family");
                    continue;
                }
                let clamped = (*quantity).min(limit.storage_limit);
                if clamped != *quantity {
                    warn!(
                        resource = %id,
                        saved = quantity,
                        limit = limit.storage_limit,
                        "clamping saved quantity to storage cap"
                    );
                }
                ledger.pool_mut(family).insert(id.clone(), clamped);
            }
        }

        Ok(ledger)
    }

    /// Read-only view of the current state.
    pub const fn state(&self) -> &LedgerState {
        &self.state
    }

    /// Configured limit for a resource.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnknownResource`] if the id is not configured.
    pub fn limit(&self, resource: &str) -> Result<ResourceLimit, LedgerError> {
        self.limits
            .get(resource)
            .copied()
            .ok_or_else(|| LedgerError::UnknownResource(ResourceId::from(resource)))
    }

    /// Quantity currently held of `resource` (0 if unknown).
    pub fn quantity(&self, resource: &str) -> u32 {
        self.state.quantity(resource)
    }

    /// Spendable currency.
    pub const fn currency(&self) -> u64 {
        self.state.currency
    }

    // -----------------------------------------------------------------------
    // Production
    // -----------------------------------------------------------------------

    /// Validate that one more unit of `resource` fits in storage.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::StorageFull`] if the quantity is at or above
    /// the cap, or [`LedgerError::UnknownResource`].
    pub fn check_capacity(&self, resource: &str) -> Result<(), LedgerError> {
        let limit = self.limit(resource)?;
        let quantity = self.quantity(resource);
        if quantity >= limit.storage_limit {
            return Err(LedgerError::StorageFull {
                resource: ResourceId::from(resource),
                quantity,
                limit: limit.storage_limit,
            });
        }
        Ok(())
    }

    /// Add one unit of `resource`, clamped at its storage cap.
    ///
    /// Returns the new quantity. Production that arrives while storage is
    /// full is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UnknownResource`] if the id is not configured.
    pub fn complete_production(&mut self, resource: &str) -> Result<u32, LedgerError> {
        let limit = self.limit(resource)?;
        let pool = self.pool_mut(limit.family);
        let entry = pool.entry(ResourceId::from(resource)).or_insert(0);
        *entry = entry.saturating_add(1).min(limit.storage_limit);
        let quantity = *entry;
        debug!(resource, quantity, limit = limit.storage_limit, "production completed");
        Ok(quantity)
    }

    /// Validate capacity and debit the refining cost for `refined`.
    ///
    /// On success every cost entry has been debited; on failure nothing
    /// changed.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::StorageFull`] if the refined pool is full, or
    /// [`LedgerError::InsufficientResources`] if any cost entry is short.
    pub fn begin_refine(&mut self, refined: &str, cost: &CostBundle) -> Result<(), LedgerError> {
        self.check_capacity(refined)?;
        self.consume(cost)
    }

    // -----------------------------------------------------------------------
    // Cost bundles
    // -----------------------------------------------------------------------

    /// Whether every entry of `cost` is covered by the held quantities.
    pub fn has_affordable(&self, cost: &CostBundle) -> bool {
        self.shortfall(cost).is_none()
    }

    /// Debit every entry of `cost`, all or nothing.
    ///
    /// Every entry is validated before the first debit, so a failed call
    /// leaves the ledger untouched.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientResources`] naming the first short
    /// entry in id order.
    pub fn consume(&mut self, cost: &CostBundle) -> Result<(), LedgerError> {
        if let Some(err) = self.shortfall(cost) {
            return Err(err);
        }

        for (resource, required) in cost {
            if *required == 0 {
                continue;
            }
            let limit = self.limit(resource.as_str())?;
            let pool = self.pool_mut(limit.family);
            let held = pool.entry(resource.clone()).or_insert(0);
            *held = held.checked_sub(*required).ok_or_else(|| LedgerError::ArithmeticOverflow {
                context: format!("debit of {required} {resource} underflowed"),
            })?;
        }

        debug!(%cost, "cost bundle consumed");
        Ok(())
    }

    /// First entry of `cost` that cannot be covered, as an error value.
    fn shortfall(&self, cost: &CostBundle) -> Option<LedgerError> {
        cost.iter().find_map(|(resource, required)| {
            let available = self.quantity(resource.as_str());
            (available < *required).then(|| LedgerError::InsufficientResources {
                resource: resource.clone(),
                required: *required,
                available,
            })
        })
    }

    // -----------------------------------------------------------------------
    // Currency and guild
    // -----------------------------------------------------------------------

    /// Credit a combat reward to both the balance and the lifetime counter.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ArithmeticOverflow`] if either counter would
    /// overflow; neither is changed in that case.
    pub fn record_combat_reward(&mut self, amount: u64) -> Result<(), LedgerError> {
        let currency =
            self.state
                .currency
                .checked_add(amount)
                .ok_or_else(|| LedgerError::ArithmeticOverflow {
                    context: "currency balance".to_owned(),
                })?;
        let total = self
            .state
            .total_currency_earned
            .checked_add(amount)
            .ok_or_else(|| LedgerError::ArithmeticOverflow {
                context: "total currency earned".to_owned(),
            })?;
        self.state.currency = currency;
        self.state.total_currency_earned = total;
        debug!(amount, currency, total, "combat reward recorded");
        Ok(())
    }

    /// Whether `amount` of currency can be spent.
    pub const fn can_spend(&self, amount: u64) -> bool {
        self.state.currency >= amount
    }

    /// Debit `amount` of currency.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientCurrency`] if the balance is short.
    pub fn spend_currency(&mut self, amount: u64) -> Result<(), LedgerError> {
        self.state.currency =
            self.state
                .currency
                .checked_sub(amount)
                .ok_or(LedgerError::InsufficientCurrency {
                    required: amount,
                    available: self.state.currency,
                })?;
        Ok(())
    }

    /// Recruit one guildmate for `cost` currency.
    ///
    /// Returns the new headcount.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientCurrency`] if the balance is below
    /// `cost`, then [`LedgerError::GuildFull`] if the guild is at capacity.
    /// Nothing changes on failure.
    pub fn recruit(&mut self, cost: u64) -> Result<u32, LedgerError> {
        if self.state.currency < cost {
            return Err(LedgerError::InsufficientCurrency {
                required: cost,
                available: self.state.currency,
            });
        }
        if self.state.guildmates >= self.state.max_guildmates {
            return Err(LedgerError::GuildFull {
                guildmates: self.state.guildmates,
                max_guildmates: self.state.max_guildmates,
            });
        }
        let guildmates =
            self.state
                .guildmates
                .checked_add(1)
                .ok_or_else(|| LedgerError::ArithmeticOverflow {
                    context: "guildmate count".to_owned(),
                })?;
        self.spend_currency(cost)?;
        self.state.guildmates = guildmates;
        debug!(guildmates, max = self.state.max_guildmates, "guildmate recruited");
        Ok(guildmates)
    }

    /// Raise the guild capacity by `by`. Returns the new capacity.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ArithmeticOverflow`] if the capacity would
    /// overflow.
    pub fn expand_guild(&mut self, by: u32) -> Result<u32, LedgerError> {
        self.state.max_guildmates = self.state.max_guildmates.checked_add(by).ok_or_else(|| {
            LedgerError::ArithmeticOverflow {
                context: "guild capacity".to_owned(),
            }
        })?;
        Ok(self.state.max_guildmates)
    }

    const fn pool_mut(&mut self, family: ResourceFamily) -> &mut BTreeMap<ResourceId, u32> {
        match family {
            ResourceFamily::Raw => &mut self.state.raw,
            ResourceFamily::Refined => &mut self.state.refined,
        }
    }
}
