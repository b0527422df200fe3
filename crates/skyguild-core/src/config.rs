//! Configuration loading and the static game catalog.
//!
//! The canonical configuration lives in `skyguild-config.yaml` at the project
//! root. Every section and field carries a default matching the shipped
//! catalog, so a partial (or empty) file is valid and only overrides what it
//! names.
//!
//! The catalog is immutable once loaded and is shared by reference
//! ([`std::sync::Arc`]). Unlock state never lives here; see
//! [`crate::progression::UnlockState`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use skyguild_ledger::ResourceLimit;
use skyguild_types::{
    Action, CombatId, ComponentId, CostBundle, Feature, MilestoneId, ResourceFamily, ResourceId,
    Tier, TimerId, UpgradeId,
};

use crate::progression::{Condition, Milestone, RewardToken};

/// Environment variable overriding [`PersistenceConfig::save_dir`].
pub const SAVE_DIR_ENV: &str = "SKYGUILD_SAVE_DIR";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The catalog is internally inconsistent.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level game configuration.
///
/// Mirrors the structure of `skyguild-config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GameConfig {
    /// Gatherable and refinable resource types.
    #[serde(default)]
    pub resources: ResourcesConfig,

    /// Combat activities, in display order.
    #[serde(default = "default_combat")]
    pub combat: Vec<CombatConfig>,

    /// Guild recruitment and upgrade parameters.
    #[serde(default)]
    pub guild: GuildConfig,

    /// Airship components, in display order.
    #[serde(default = "default_airship")]
    pub airship: Vec<ComponentConfig>,

    /// Milestones, in evaluation order.
    #[serde(default = "default_milestones")]
    pub milestones: Vec<Milestone>,

    /// Session timing and logging settings.
    #[serde(default)]
    pub settings: SettingsConfig,

    /// Save storage settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            resources: ResourcesConfig::default(),
            combat: default_combat(),
            guild: GuildConfig::default(),
            airship: default_airship(),
            milestones: default_milestones(),
            settings: SettingsConfig::default(),
            persistence: PersistenceConfig::default(),
        }
    }
}

impl GameConfig {
    /// Load and validate configuration from a YAML file.
    ///
    /// `SKYGUILD_SAVE_DIR` overrides `persistence.save_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if the catalog is inconsistent.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.persistence.apply_env_overrides();
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if the catalog is inconsistent.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes as unit, not as an empty map.
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the catalog for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| Err(ConfigError::Invalid { reason });

        if self.settings.tick_resolution_ms == 0 {
            return invalid("settings.tick_resolution_ms must be at least 1".to_owned());
        }

        let mut ids = BTreeSet::new();
        for id in self.resource_ids() {
            if !ids.insert(id) {
                return invalid(format!("resource {id} is defined more than once"));
            }
        }
        if self.raw_resource(self.settings.seed_resource.as_str()).is_none() {
            return invalid(format!(
                "seed resource {} is not a raw resource",
                self.settings.seed_resource
            ));
        }

        for raw in &self.resources.raw {
            if raw.gather_time_ms == 0 {
                return invalid(format!("raw resource {} has zero gather time", raw.id));
            }
        }
        for refined in &self.resources.refined {
            if refined.refine_time_ms == 0 {
                return invalid(format!("refined resource {} has zero refine time", refined.id));
            }
            self.check_bundle(&refined.cost, &format!("refined resource {}", refined.id))?;
        }
        for activity in &self.combat {
            if activity.duration_ms == 0 {
                return invalid(format!("combat activity {} has zero duration", activity.id));
            }
            if let Some(required) = &activity.requires_milestone {
                if self.milestone(required.as_str()).is_none() {
                    return invalid(format!(
                        "combat activity {} requires unknown milestone {required}",
                        activity.id
                    ));
                }
            }
        }
        for upgrade in &self.guild.upgrades {
            self.check_bundle(&upgrade.cost, &format!("upgrade {}", upgrade.id))?;
        }
        for component in &self.airship {
            self.check_bundle(&component.cost, &format!("component {}", component.id))?;
        }

        let mut milestone_ids = BTreeSet::new();
        for milestone in &self.milestones {
            if !milestone_ids.insert(milestone.id.as_str()) {
                return invalid(format!("milestone {} is defined more than once", milestone.id));
            }
            let unknown = milestone.rewards.iter().find_map(|reward| match reward {
                RewardToken::Resource(id) if self.resource_family(id.as_str()).is_none() => {
                    Some(id)
                }
                _ => None,
            });
            if let Some(id) = unknown {
                return invalid(format!(
                    "milestone {} rewards unknown resource {id}",
                    milestone.id
                ));
            }
        }
        Ok(())
    }

    fn check_bundle(&self, bundle: &CostBundle, owner: &str) -> Result<(), ConfigError> {
        match bundle.resources().find(|id| self.resource_family(id.as_str()).is_none()) {
            Some(unknown) => Err(ConfigError::Invalid {
                reason: format!("{owner} costs unknown resource {unknown}"),
            }),
            None => Ok(()),
        }
    }

    // -----------------------------------------------------------------------
    // Catalog lookups
    // -----------------------------------------------------------------------

    /// Every resource id, raw first, in declared order.
    pub fn resource_ids(&self) -> impl Iterator<Item = &ResourceId> {
        self.resources
            .raw
            .iter()
            .map(|r| &r.id)
            .chain(self.resources.refined.iter().map(|r| &r.id))
    }

    /// Look up a raw resource.
    pub fn raw_resource(&self, id: &str) -> Option<&RawResourceConfig> {
        self.resources.raw.iter().find(|r| r.id.as_str() == id)
    }

    /// Look up a refined resource.
    pub fn refined_resource(&self, id: &str) -> Option<&RefinedResourceConfig> {
        self.resources.refined.iter().find(|r| r.id.as_str() == id)
    }

    /// Family of a resource id, if it exists.
    pub fn resource_family(&self, id: &str) -> Option<ResourceFamily> {
        if self.raw_resource(id).is_some() {
            Some(ResourceFamily::Raw)
        } else if self.refined_resource(id).is_some() {
            Some(ResourceFamily::Refined)
        } else {
            None
        }
    }

    /// Display name of a resource, falling back to its id.
    pub fn resource_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.raw_resource(id)
            .map(|r| r.name.as_str())
            .or_else(|| self.refined_resource(id).map(|r| r.name.as_str()))
            .unwrap_or(id)
    }

    /// Look up a combat activity.
    pub fn combat(&self, id: &str) -> Option<&CombatConfig> {
        self.combat.iter().find(|c| c.id.as_str() == id)
    }

    /// Look up a guild upgrade.
    pub fn upgrade(&self, id: &str) -> Option<&UpgradeConfig> {
        self.guild.upgrades.iter().find(|u| u.id.as_str() == id)
    }

    /// Look up an airship component.
    pub fn component(&self, id: &str) -> Option<&ComponentConfig> {
        self.airship.iter().find(|c| c.id.as_str() == id)
    }

    /// Look up a milestone.
    pub fn milestone(&self, id: &str) -> Option<&Milestone> {
        self.milestones.iter().find(|m| m.id.as_str() == id)
    }

    /// Per-resource storage limits for the ledger.
    pub fn resource_limits(&self) -> BTreeMap<ResourceId, ResourceLimit> {
        let raw = self
            .resources
            .raw
            .iter()
            .map(|r| (r.id.clone(), ResourceLimit::new(ResourceFamily::Raw, r.storage_limit)));
        let refined = self.resources.refined.iter().map(|r| {
            (
                r.id.clone(),
                ResourceLimit::new(ResourceFamily::Refined, r.storage_limit),
            )
        });
        raw.chain(refined).collect()
    }

    /// Duration of a timed action, or `None` if its target is not in the
    /// catalog (or is in the wrong family for the action kind).
    pub fn action_duration(&self, action: &Action) -> Option<u64> {
        match action {
            Action::Gather(id) => self.raw_resource(id.as_str()).map(|r| r.gather_time_ms),
            Action::Refine(id) => self.refined_resource(id.as_str()).map(|r| r.refine_time_ms),
            Action::Combat(id) => self.combat(id.as_str()).map(|c| c.duration_ms),
        }
    }

    /// Map a persisted timer id back to an action whose target still
    /// exists in this catalog.
    pub fn resolve_timer(&self, id: &TimerId) -> Option<Action> {
        Action::from_timer_id(id.as_str()).filter(|action| self.action_duration(action).is_some())
    }

    /// Display name for an action's target.
    pub fn action_label(&self, action: &Action) -> String {
        match action {
            Action::Gather(id) | Action::Refine(id) => self.resource_name(id.as_str()).to_owned(),
            Action::Combat(id) => self
                .combat(id.as_str())
                .map_or_else(|| id.to_string(), |c| c.name.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

/// Resource catalog, split by family.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResourcesConfig {
    /// Raw (gathered) resources, in display order.
    #[serde(default = "default_raw_resources")]
    pub raw: Vec<RawResourceConfig>,

    /// Refined resources, in display order.
    #[serde(default = "default_refined_resources")]
    pub refined: Vec<RefinedResourceConfig>,
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            raw: default_raw_resources(),
            refined: default_refined_resources(),
        }
    }
}

/// A gatherable resource type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawResourceConfig {
    /// Resource id.
    pub id: ResourceId,
    /// Display name.
    pub name: String,
    /// Informational tier.
    #[serde(default)]
    pub tier: Tier,
    /// Milliseconds to gather one unit.
    pub gather_time_ms: u64,
    /// Storage cap.
    pub storage_limit: u32,
}

/// A refinable resource type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RefinedResourceConfig {
    /// Resource id.
    pub id: ResourceId,
    /// Display name.
    pub name: String,
    /// Informational tier.
    #[serde(default)]
    pub tier: Tier,
    /// Milliseconds to refine one unit.
    pub refine_time_ms: u64,
    /// Storage cap.
    pub storage_limit: u32,
    /// Resources debited when refining starts.
    pub cost: CostBundle,
}

// ---------------------------------------------------------------------------
// Combat, guild, airship
// ---------------------------------------------------------------------------

/// A combat activity that pays currency on completion.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CombatConfig {
    /// Activity id.
    pub id: CombatId,
    /// Display name.
    pub name: String,
    /// Informational tier.
    #[serde(default)]
    pub tier: Tier,
    /// Milliseconds per round.
    pub duration_ms: u64,
    /// Currency paid per completed round.
    pub reward: u64,
    /// Milestone that must be completed before the activity is available,
    /// in addition to the combat feature.
    #[serde(default)]
    pub requires_milestone: Option<MilestoneId>,
}

/// Guild parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GuildConfig {
    /// Currency cost of one recruit.
    #[serde(default = "default_recruit_cost")]
    pub recruit_cost: u64,

    /// Guild capacity of a fresh session.
    #[serde(default = "default_base_max_guildmates")]
    pub base_max_guildmates: u32,

    /// Purchasable capacity upgrades.
    #[serde(default = "default_upgrades")]
    pub upgrades: Vec<UpgradeConfig>,
}

impl Default for GuildConfig {
    fn default() -> Self {
        Self {
            recruit_cost: default_recruit_cost(),
            base_max_guildmates: default_base_max_guildmates(),
            upgrades: default_upgrades(),
        }
    }
}

/// A repeatable guild upgrade.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UpgradeConfig {
    /// Upgrade id.
    pub id: UpgradeId,
    /// Display name.
    pub name: String,
    /// Currency debited per purchase.
    #[serde(default)]
    pub currency_cost: u64,
    /// Resources debited per purchase.
    #[serde(default)]
    pub cost: CostBundle,
    /// Guild capacity added per purchase.
    pub capacity_increase: u32,
}

/// A one-time airship component.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ComponentConfig {
    /// Component id.
    pub id: ComponentId,
    /// Display name.
    pub name: String,
    /// Resources debited when built.
    pub cost: CostBundle,
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Session timing and logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SettingsConfig {
    /// Milliseconds per timer tick.
    #[serde(default = "default_tick_resolution_ms")]
    pub tick_resolution_ms: u64,

    /// Milliseconds between autosaves.
    #[serde(default = "default_autosave_interval_ms")]
    pub autosave_interval_ms: u64,

    /// Log lines retained by the console.
    #[serde(default = "default_max_log_entries")]
    pub max_log_entries: usize,

    /// Offline gap after which a "welcome back" message is logged.
    #[serde(default = "default_welcome_back_threshold_ms")]
    pub welcome_back_threshold_ms: u64,

    /// Raw resource unlocked in a fresh session.
    #[serde(default = "default_seed_resource")]
    pub seed_resource: ResourceId,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            tick_resolution_ms: default_tick_resolution_ms(),
            autosave_interval_ms: default_autosave_interval_ms(),
            max_log_entries: default_max_log_entries(),
            welcome_back_threshold_ms: default_welcome_back_threshold_ms(),
            seed_resource: default_seed_resource(),
        }
    }
}

/// Save storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PersistenceConfig {
    /// Key the session is stored under.
    #[serde(default = "default_save_key")]
    pub save_key: String,

    /// Directory used by file-backed stores.
    #[serde(default = "default_save_dir")]
    pub save_dir: PathBuf,
}

impl PersistenceConfig {
    /// Apply `SKYGUILD_SAVE_DIR` if set and non-empty.
    pub fn apply_env_overrides(&mut self) {
        match std::env::var(SAVE_DIR_ENV) {
            Ok(dir) if !dir.is_empty() => self.save_dir = PathBuf::from(dir),
            _ => {}
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            save_key: default_save_key(),
            save_dir: default_save_dir(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn raw(id: &str, name: &str, tier: Tier, gather_time_ms: u64) -> RawResourceConfig {
    RawResourceConfig {
        id: ResourceId::new(id),
        name: name.to_owned(),
        tier,
        gather_time_ms,
        storage_limit: 50,
    }
}

fn default_raw_resources() -> Vec<RawResourceConfig> {
    vec![
        raw("ironOre", "Iron Ore", Tier::Basic, 3000),
        raw("wood", "Wood", Tier::Basic, 2500),
        raw("stone", "Stone", Tier::Basic, 3500),
    ]
}

fn default_refined_resources() -> Vec<RefinedResourceConfig> {
    vec![
        RefinedResourceConfig {
            id: ResourceId::new("ironIngot"),
            name: "Iron Ingot".to_owned(),
            tier: Tier::Basic,
            refine_time_ms: 5000,
            storage_limit: 25,
            cost: CostBundle::new().with("ironOre", 2),
        },
        RefinedResourceConfig {
            id: ResourceId::new("plank"),
            name: "Plank".to_owned(),
            tier: Tier::Basic,
            refine_time_ms: 4000,
            storage_limit: 25,
            cost: CostBundle::new().with("wood", 2),
        },
        RefinedResourceConfig {
            id: ResourceId::new("brick"),
            name: "Brick".to_owned(),
            tier: Tier::Basic,
            refine_time_ms: 6000,
            storage_limit: 20,
            cost: CostBundle::new().with("stone", 3),
        },
    ]
}

fn default_combat() -> Vec<CombatConfig> {
    vec![
        CombatConfig {
            id: CombatId::new("basic"),
            name: "Patrol Woods".to_owned(),
            tier: Tier::Basic,
            duration_ms: 4000,
            reward: 5,
            requires_milestone: None,
        },
        CombatConfig {
            id: CombatId::new("advanced"),
            name: "Clear Bandits".to_owned(),
            tier: Tier::Advanced,
            duration_ms: 8000,
            reward: 12,
            requires_milestone: Some(MilestoneId::new("fullCrew")),
        },
    ]
}

const fn default_recruit_cost() -> u64 {
    10
}

const fn default_base_max_guildmates() -> u32 {
    5
}

fn default_upgrades() -> Vec<UpgradeConfig> {
    vec![UpgradeConfig {
        id: UpgradeId::new("guildHall"),
        name: "Guild Hall".to_owned(),
        currency_cost: 50,
        cost: CostBundle::new().with("plank", 10).with("brick", 5),
        capacity_increase: 3,
    }]
}

fn default_airship() -> Vec<ComponentConfig> {
    vec![
        ComponentConfig {
            id: ComponentId::new("hull"),
            name: "Hull".to_owned(),
            cost: CostBundle::new().with("ironIngot", 20).with("plank", 15),
        },
        ComponentConfig {
            id: ComponentId::new("engine"),
            name: "Engine".to_owned(),
            cost: CostBundle::new().with("ironIngot", 15).with("brick", 10),
        },
        ComponentConfig {
            id: ComponentId::new("balloon"),
            name: "Balloon".to_owned(),
            cost: CostBundle::new().with("plank", 25).with("ironIngot", 10),
        },
    ]
}

fn milestone(
    id: &str,
    description: &str,
    condition: Condition,
    rewards: Vec<RewardToken>,
) -> Milestone {
    Milestone {
        id: MilestoneId::new(id),
        description: description.to_owned(),
        condition,
        rewards,
    }
}

fn at_least(resource: &str, quantity: u32) -> Condition {
    Condition::ResourceAtLeast {
        resource: ResourceId::new(resource),
        quantity,
    }
}

fn unlock(resource: &str) -> RewardToken {
    RewardToken::Resource(ResourceId::new(resource))
}

fn default_milestones() -> Vec<Milestone> {
    vec![
        milestone(
            "firstIron",
            "Gather 5 Iron Ore",
            at_least("ironOre", 5),
            vec![unlock("wood"), unlock("stone")],
        ),
        milestone(
            "workshop",
            "Stockpile 5 Wood and 5 Stone",
            Condition::AllOf {
                conditions: vec![at_least("wood", 5), at_least("stone", 5)],
            },
            vec![
                RewardToken::Feature(Feature::Refining),
                unlock("ironIngot"),
                unlock("plank"),
                unlock("brick"),
            ],
        ),
        milestone(
            "armory",
            "Refine 3 Iron Ingots",
            at_least("ironIngot", 3),
            vec![RewardToken::Feature(Feature::Combat)],
        ),
        milestone(
            "bounties",
            "Earn 20 coins",
            Condition::CurrencyEarnedAtLeast { amount: 20 },
            vec![RewardToken::Feature(Feature::Guild)],
        ),
        milestone(
            "fullCrew",
            "Recruit 3 guildmates",
            Condition::GuildmatesAtLeast { count: 3 },
            Vec::new(),
        ),
    ]
}

const fn default_tick_resolution_ms() -> u64 {
    100
}

const fn default_autosave_interval_ms() -> u64 {
    30_000
}

const fn default_max_log_entries() -> usize {
    100
}

const fn default_welcome_back_threshold_ms() -> u64 {
    5_000
}

fn default_seed_resource() -> ResourceId {
    ResourceId::new("ironOre")
}

fn default_save_key() -> String {
    "skyguild_save".to_owned()
}

fn default_save_dir() -> PathBuf {
    PathBuf::from("saves")
}
