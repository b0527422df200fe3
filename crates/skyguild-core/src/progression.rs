//! Milestone evaluation and unlock propagation.
//!
//! A [`Milestone`] is Pending until its [`Condition`] first holds, then
//! Completed forever. Conditions are plain data evaluated as pure functions
//! of the ledger state and the [`UnlockState`], so they can be declared in
//! configuration and tested in isolation.
//!
//! # Invariants
//!
//! - Every set in [`UnlockState`] is append-only.
//! - A completed milestone is never evaluated again and its rewards are
//!   applied exactly once.
//! - Features are derived from completed milestones' rewards; they are
//!   never stored.
//! - A condition that fails to evaluate counts as not yet satisfied.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use skyguild_ledger::LedgerState;
use skyguild_types::{
    Action, ComponentId, Feature, MilestoneId, ResourceId, UnlockKey, UnlockRecord,
};
use tracing::{info, warn};

use crate::config::GameConfig;

// ---------------------------------------------------------------------------
// Unlock state
// ---------------------------------------------------------------------------

/// Append-only unlock sets of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnlockState {
    /// Resource types unlocked by milestones or discovered by production.
    pub unlocked_resources: BTreeSet<ResourceId>,
    /// Completed milestone ids.
    pub completed_milestones: BTreeSet<MilestoneId>,
    /// Built airship components.
    pub built_components: BTreeSet<ComponentId>,
}

impl UnlockState {
    /// A fresh unlock state containing only the seed resource.
    pub fn new(seed: ResourceId) -> Self {
        let mut state = Self::default();
        state.unlocked_resources.insert(seed);
        state
    }

    /// Rebuild from a persisted record. The seed resource is always
    /// included.
    pub fn from_record(record: &UnlockRecord, seed: ResourceId) -> Self {
        let mut state = Self::new(seed);
        state
            .unlocked_resources
            .extend(record.resource_types.iter().cloned());
        state
            .completed_milestones
            .extend(record.milestones.iter().cloned());
        state
            .built_components
            .extend(record.components.iter().cloned());
        state
    }

    /// Convert to the persisted record layout.
    pub fn to_record(&self) -> UnlockRecord {
        UnlockRecord {
            resource_types: self.unlocked_resources.iter().cloned().collect(),
            milestones: self.completed_milestones.iter().cloned().collect(),
            components: self.built_components.iter().cloned().collect(),
        }
    }

    /// Add a resource to the unlocked set. Returns `true` if it was new.
    pub fn unlock_resource(&mut self, resource: &ResourceId) -> bool {
        if self.unlocked_resources.contains(resource) {
            return false;
        }
        self.unlocked_resources.insert(resource.clone())
    }

    /// Record a built component. Returns `true` if it was new.
    pub fn record_component(&mut self, component: &ComponentId) -> bool {
        if self.built_components.contains(component) {
            return false;
        }
        self.built_components.insert(component.clone())
    }

    /// Whether a resource type is unlocked.
    pub fn is_resource_unlocked(&self, resource: &str) -> bool {
        self.unlocked_resources.contains(resource)
    }

    /// Whether a milestone is completed.
    pub fn is_milestone_completed(&self, milestone: &str) -> bool {
        self.completed_milestones.contains(milestone)
    }

    /// Whether a component is built.
    pub fn is_built(&self, component: &str) -> bool {
        self.built_components.contains(component)
    }
}

// ---------------------------------------------------------------------------
// Milestones and conditions
// ---------------------------------------------------------------------------

/// What a completed milestone grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum RewardToken {
    /// Unlock a resource type.
    Resource(ResourceId),
    /// Enable a feature.
    Feature(Feature),
}

/// A one-time achievement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    /// Milestone id.
    pub id: MilestoneId,
    /// Human-readable objective.
    pub description: String,
    /// When the milestone completes.
    pub condition: Condition,
    /// What completion grants.
    #[serde(default)]
    pub rewards: Vec<RewardToken>,
}

/// A predicate over ledger and unlock state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    /// Held quantity of a resource is at least `quantity`.
    ResourceAtLeast {
        /// Resource to check.
        resource: ResourceId,
        /// Threshold.
        quantity: u32,
    },
    /// Lifetime currency earned is at least `amount`.
    CurrencyEarnedAtLeast {
        /// Threshold.
        amount: u64,
    },
    /// Spendable currency is at least `amount`.
    CurrencyAtLeast {
        /// Threshold.
        amount: u64,
    },
    /// Guild headcount is at least `count`.
    GuildmatesAtLeast {
        /// Threshold.
        count: u32,
    },
    /// Another milestone is completed.
    MilestoneCompleted {
        /// Milestone to check.
        milestone: MilestoneId,
    },
    /// A resource type is unlocked.
    ResourceUnlocked {
        /// Resource to check.
        resource: ResourceId,
    },
    /// An airship component is built.
    ComponentBuilt {
        /// Component to check.
        component: ComponentId,
    },
    /// Every nested condition holds (true when empty).
    AllOf {
        /// Nested conditions.
        conditions: Vec<Condition>,
    },
    /// At least one nested condition holds (false when empty).
    AnyOf {
        /// Nested conditions.
        conditions: Vec<Condition>,
    },
}

/// A condition referenced something the catalog does not define.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConditionError {
    /// Unknown resource id.
    #[error("condition references unknown resource {0}")]
    UnknownResource(ResourceId),
    /// Unknown milestone id.
    #[error("condition references unknown milestone {0}")]
    UnknownMilestone(MilestoneId),
    /// Unknown component id.
    #[error("condition references unknown component {0}")]
    UnknownComponent(ComponentId),
}

/// Everything a condition may read.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    /// Current ledger state.
    pub ledger: &'a LedgerState,
    /// Current unlock state.
    pub unlocks: &'a UnlockState,
    /// Milestone ids defined by the catalog.
    pub known_milestones: &'a BTreeSet<MilestoneId>,
    /// Component ids defined by the catalog.
    pub known_components: &'a BTreeSet<ComponentId>,
}

impl EvalContext<'_> {
    fn has_resource(&self, resource: &str) -> bool {
        self.ledger.raw.contains_key(resource) || self.ledger.refined.contains_key(resource)
    }
}

impl Condition {
    /// Evaluate against a state snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ConditionError`] if the condition names an id that the
    /// catalog does not define.
    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<bool, ConditionError> {
        match self {
            Self::ResourceAtLeast { resource, quantity } => {
                if !ctx.has_resource(resource.as_str()) {
                    return Err(ConditionError::UnknownResource(resource.clone()));
                }
                Ok(ctx.ledger.quantity(resource.as_str()) >= *quantity)
            }
            Self::CurrencyEarnedAtLeast { amount } => {
                Ok(ctx.ledger.total_currency_earned >= *amount)
            }
            Self::CurrencyAtLeast { amount } => Ok(ctx.ledger.currency >= *amount),
            Self::GuildmatesAtLeast { count } => Ok(ctx.ledger.guildmates >= *count),
            Self::MilestoneCompleted { milestone } => {
                if !ctx.known_milestones.contains(milestone) {
                    return Err(ConditionError::UnknownMilestone(milestone.clone()));
                }
                Ok(ctx.unlocks.is_milestone_completed(milestone.as_str()))
            }
            Self::ResourceUnlocked { resource } => {
                if !ctx.has_resource(resource.as_str()) {
                    return Err(ConditionError::UnknownResource(resource.clone()));
                }
                Ok(ctx.unlocks.is_resource_unlocked(resource.as_str()))
            }
            Self::ComponentBuilt { component } => {
                if !ctx.known_components.contains(component) {
                    return Err(ConditionError::UnknownComponent(component.clone()));
                }
                Ok(ctx.unlocks.is_built(component.as_str()))
            }
            Self::AllOf { conditions } => {
                for condition in conditions {
                    if !condition.evaluate(ctx)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::AnyOf { conditions } => {
                for condition in conditions {
                    if condition.evaluate(ctx)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ProgressionEngine
// ---------------------------------------------------------------------------

/// What one evaluation changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressionReport {
    /// Milestones completed by this evaluation, in completion order.
    pub completed: Vec<Milestone>,
    /// Every unlock key that changed, in the order it was applied.
    pub unlocked: Vec<UnlockKey>,
}

impl ProgressionReport {
    /// Whether anything changed.
    pub fn is_empty(&self) -> bool {
        self.completed.is_empty() && self.unlocked.is_empty()
    }
}

/// The milestone state machine.
#[derive(Debug, Clone)]
pub struct ProgressionEngine {
    milestones: Vec<Milestone>,
    known_milestones: BTreeSet<MilestoneId>,
    known_components: BTreeSet<ComponentId>,
}

impl ProgressionEngine {
    /// Create an engine over milestones in evaluation order.
    pub fn new(milestones: Vec<Milestone>, components: BTreeSet<ComponentId>) -> Self {
        let known_milestones = milestones.iter().map(|m| m.id.clone()).collect();
        Self {
            milestones,
            known_milestones,
            known_components: components,
        }
    }

    /// Create an engine from the catalog.
    pub fn from_config(config: &GameConfig) -> Self {
        Self::new(
            config.milestones.clone(),
            config.airship.iter().map(|c| c.id.clone()).collect(),
        )
    }

    /// Milestones in evaluation order.
    pub fn milestones(&self) -> &[Milestone] {
        &self.milestones
    }

    /// Complete every pending milestone whose condition now holds.
    ///
    /// Passes repeat until one completes nothing, so a chain of milestones
    /// that enable each other settles in a single call.
    pub fn evaluate(&self, ledger: &LedgerState, unlocks: &mut UnlockState) -> ProgressionReport {
        let features_before = self.enabled_features(unlocks);
        let mut report = ProgressionReport::default();

        loop {
            let mut progressed = false;
            for milestone in &self.milestones {
                if unlocks.is_milestone_completed(milestone.id.as_str()) {
                    continue;
                }
                let ctx = EvalContext {
                    ledger,
                    unlocks,
                    known_milestones: &self.known_milestones,
                    known_components: &self.known_components,
                };
                match milestone.condition.evaluate(&ctx) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(e) => {
                        warn!(milestone = %milestone.id, error = %e, "milestone condition failed to evaluate");
                        continue;
                    }
                }

                unlocks.completed_milestones.insert(milestone.id.clone());
                report
                    .unlocked
                    .push(UnlockKey::Milestone(milestone.id.clone()));
                for reward in &milestone.rewards {
                    if let RewardToken::Resource(resource) = reward {
                        if unlocks.unlock_resource(resource) {
                            report.unlocked.push(UnlockKey::Resource(resource.clone()));
                        }
                    }
                }
                info!(milestone = %milestone.id, description = milestone.description, "milestone completed");
                report.completed.push(milestone.clone());
                progressed = true;
            }
            if !progressed {
                break;
            }
        }

        for feature in self.enabled_features(unlocks) {
            if !features_before.contains(&feature) {
                info!(%feature, "feature enabled");
                report.unlocked.push(UnlockKey::Feature(feature));
            }
        }
        report
    }

    /// Features granted by completed milestones.
    pub fn enabled_features(&self, unlocks: &UnlockState) -> BTreeSet<Feature> {
        self.milestones
            .iter()
            .filter(|m| unlocks.is_milestone_completed(m.id.as_str()))
            .flat_map(|m| &m.rewards)
            .filter_map(|reward| match reward {
                RewardToken::Feature(feature) => Some(*feature),
                RewardToken::Resource(_) => None,
            })
            .collect()
    }

    /// Whether a feature is enabled.
    pub fn is_enabled(&self, unlocks: &UnlockState, feature: Feature) -> bool {
        self.enabled_features(unlocks).contains(&feature)
    }

    /// The first pending milestone in evaluation order.
    pub fn next_objective(&self, unlocks: &UnlockState) -> Option<&Milestone> {
        self.milestones
            .iter()
            .find(|m| !unlocks.is_milestone_completed(m.id.as_str()))
    }

    /// Timed actions currently permitted by unlock state, in catalog order.
    ///
    /// Capacity and affordability are not considered; those are checked
    /// when the action is requested.
    pub fn available_actions(&self, config: &GameConfig, unlocks: &UnlockState) -> Vec<Action> {
        let features = self.enabled_features(unlocks);
        let mut actions: Vec<Action> = config
            .resources
            .raw
            .iter()
            .filter(|r| unlocks.is_resource_unlocked(r.id.as_str()))
            .map(|r| Action::Gather(r.id.clone()))
            .collect();

        if features.contains(&Feature::Refining) {
            actions.extend(
                config
                    .resources
                    .refined
                    .iter()
                    .filter(|r| unlocks.is_resource_unlocked(r.id.as_str()))
                    .map(|r| Action::Refine(r.id.clone())),
            );
        }
        if features.contains(&Feature::Combat) {
            actions.extend(
                config
                    .combat
                    .iter()
                    .filter(|c| {
                        c.requires_milestone
                            .as_ref()
                            .is_none_or(|m| unlocks.is_milestone_completed(m.as_str()))
                    })
                    .map(|c| Action::Combat(c.id.clone())),
            );
        }
        actions
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use skyguild_types::CombatId;

    use super::*;

    fn ledger_with(entries: &[(&str, u32)]) -> LedgerState {
        let mut raw = BTreeMap::new();
        for id in ["ironOre", "wood", "stone"] {
            raw.insert(ResourceId::new(id), 0);
        }
        let mut refined = BTreeMap::new();
        for id in ["ironIngot", "plank", "brick"] {
            refined.insert(ResourceId::new(id), 0);
        }
        for (id, qty) in entries {
            if let Some(slot) = raw.get_mut(*id) {
                *slot = *qty;
            } else if let Some(slot) = refined.get_mut(*id) {
                *slot = *qty;
            }
        }
        LedgerState {
            raw,
            refined,
            max_guildmates: 5,
            ..LedgerState::default()
        }
    }

    fn engine() -> ProgressionEngine {
        ProgressionEngine::from_config(&GameConfig::default())
    }

    fn seed() -> UnlockState {
        UnlockState::new(ResourceId::new("ironOre"))
    }

    #[test]
    fn nothing_completes_on_fresh_state() {
        let mut unlocks = seed();
        let report = engine().evaluate(&ledger_with(&[]), &mut unlocks);
        assert!(report.is_empty());
        assert_eq!(unlocks, seed());
    }

    #[test]
    fn first_iron_unlocks_wood_and_stone() {
        let mut unlocks = seed();
        let report = engine().evaluate(&ledger_with(&[("ironOre", 5)]), &mut unlocks);

        assert_eq!(report.completed.len(), 1);
        assert_eq!(
            report.unlocked,
            vec![
                UnlockKey::Milestone(MilestoneId::new("firstIron")),
                UnlockKey::Resource(ResourceId::new("wood")),
                UnlockKey::Resource(ResourceId::new("stone")),
            ]
        );
        assert!(unlocks.is_resource_unlocked("wood"));
        assert!(unlocks.is_resource_unlocked("stone"));
    }

    #[test]
    fn completed_milestones_do_not_fire_twice() {
        let engine = engine();
        let mut unlocks = seed();
        let ledger = ledger_with(&[("ironOre", 5)]);
        engine.evaluate(&ledger, &mut unlocks);
        let again = engine.evaluate(&ledger, &mut unlocks);
        assert!(again.is_empty());
    }

    #[test]
    fn chained_milestones_settle_in_one_call() {
        let milestones = vec![
            Milestone {
                id: MilestoneId::new("second"),
                description: "after first".to_owned(),
                condition: Condition::MilestoneCompleted {
                    milestone: MilestoneId::new("first"),
                },
                rewards: vec![RewardToken::Feature(Feature::Guild)],
            },
            Milestone {
                id: MilestoneId::new("first"),
                description: "any iron".to_owned(),
                condition: Condition::ResourceAtLeast {
                    resource: ResourceId::new("ironOre"),
                    quantity: 1,
                },
                rewards: Vec::new(),
            },
        ];
        let engine = ProgressionEngine::new(milestones, BTreeSet::new());
        let mut unlocks = seed();
        let report = engine.evaluate(&ledger_with(&[("ironOre", 1)]), &mut unlocks);

        let ids: Vec<&str> = report.completed.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second"]);
        assert!(report
            .unlocked
            .contains(&UnlockKey::Feature(Feature::Guild)));
    }

    #[test]
    fn evaluation_errors_count_as_unsatisfied() {
        let milestones = vec![
            Milestone {
                id: MilestoneId::new("broken"),
                description: "references mithril".to_owned(),
                condition: Condition::ResourceAtLeast {
                    resource: ResourceId::new("mithril"),
                    quantity: 0,
                },
                rewards: Vec::new(),
            },
            Milestone {
                id: MilestoneId::new("fine"),
                description: "any wood".to_owned(),
                condition: Condition::ResourceAtLeast {
                    resource: ResourceId::new("wood"),
                    quantity: 1,
                },
                rewards: Vec::new(),
            },
        ];
        let engine = ProgressionEngine::new(milestones, BTreeSet::new());
        let mut unlocks = seed();
        let report = engine.evaluate(&ledger_with(&[("wood", 1)]), &mut unlocks);
        assert_eq!(report.completed.len(), 1);
        assert!(!unlocks.is_milestone_completed("broken"));
        assert_eq!(engine.next_objective(&unlocks).map(|m| m.id.as_str()), Some("broken"));
    }

    #[test]
    fn condition_combinators() {
        let ledger = LedgerState {
            currency: 3,
            total_currency_earned: 30,
            guildmates: 2,
            ..ledger_with(&[("wood", 4)])
        };
        let unlocks = seed();
        let known_milestones = BTreeSet::new();
        let known_components: BTreeSet<ComponentId> = [ComponentId::new("hull")].into();
        let ctx = EvalContext {
            ledger: &ledger,
            unlocks: &unlocks,
            known_milestones: &known_milestones,
            known_components: &known_components,
        };

        let earned = Condition::CurrencyEarnedAtLeast { amount: 20 };
        let rich = Condition::CurrencyAtLeast { amount: 20 };
        assert!(earned.evaluate(&ctx).unwrap());
        assert!(!rich.evaluate(&ctx).unwrap());

        let all = Condition::AllOf {
            conditions: vec![earned.clone(), rich.clone()],
        };
        let any = Condition::AnyOf {
            conditions: vec![earned, rich],
        };
        assert!(!all.evaluate(&ctx).unwrap());
        assert!(any.evaluate(&ctx).unwrap());
        assert!(Condition::AllOf { conditions: vec![] }.evaluate(&ctx).unwrap());
        assert!(!Condition::AnyOf { conditions: vec![] }.evaluate(&ctx).unwrap());

        assert!(Condition::GuildmatesAtLeast { count: 2 }.evaluate(&ctx).unwrap());
        assert!(!Condition::ComponentBuilt {
            component: ComponentId::new("hull")
        }
        .evaluate(&ctx)
        .unwrap());
        assert_eq!(
            Condition::ComponentBuilt {
                component: ComponentId::new("mast")
            }
            .evaluate(&ctx),
            Err(ConditionError::UnknownComponent(ComponentId::new("mast")))
        );
        assert_eq!(
            Condition::MilestoneCompleted {
                milestone: MilestoneId::new("nope")
            }
            .evaluate(&ctx),
            Err(ConditionError::UnknownMilestone(MilestoneId::new("nope")))
        );
        assert!(Condition::ResourceUnlocked {
            resource: ResourceId::new("ironOre")
        }
        .evaluate(&ctx)
        .unwrap());
    }

    #[test]
    fn features_are_derived_from_completed_milestones() {
        let engine = engine();
        let mut unlocks = seed();
        assert!(engine.enabled_features(&unlocks).is_empty());

        unlocks
            .completed_milestones
            .insert(MilestoneId::new("workshop"));
        assert!(engine.is_enabled(&unlocks, Feature::Refining));
        assert!(!engine.is_enabled(&unlocks, Feature::Combat));
    }

    #[test]
    fn available_actions_follow_unlocks_and_features() {
        let config = GameConfig::default();
        let engine = engine();
        let mut unlocks = seed();
        assert_eq!(
            engine.available_actions(&config, &unlocks),
            vec![Action::Gather(ResourceId::new("ironOre"))]
        );

        engine.evaluate(
            &ledger_with(&[("ironOre", 5), ("wood", 5), ("stone", 5), ("ironIngot", 3)]),
            &mut unlocks,
        );
        let actions = engine.available_actions(&config, &unlocks);
        assert!(actions.contains(&Action::Gather(ResourceId::new("stone"))));
        assert!(actions.contains(&Action::Refine(ResourceId::new("plank"))));
        assert!(actions.contains(&Action::Combat(CombatId::new("basic"))));
        // Advanced combat still needs a full crew.
        assert!(!actions.contains(&Action::Combat(CombatId::new("advanced"))));
    }

    #[test]
    fn unlock_record_round_trip_keeps_seed() {
        let mut unlocks = seed();
        unlocks.unlock_resource(&ResourceId::new("wood"));
        unlocks.record_component(&ComponentId::new("hull"));
        let record = unlocks.to_record();
        let restored = UnlockState::from_record(&record, ResourceId::new("ironOre"));
        assert_eq!(restored, unlocks);

        let empty = UnlockState::from_record(&UnlockRecord::default(), ResourceId::new("ironOre"));
        assert!(empty.is_resource_unlocked("ironOre"));
    }
}
