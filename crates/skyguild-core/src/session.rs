//! The session context: one player's live game.
//!
//! A [`Session`] owns the ledger, the unlock sets, and the timer registry,
//! and shares the immutable catalog. Every player request goes through it:
//!
//! 1. **Gate** -- the action must be unlocked (resource unlocked, feature
//!    enabled, required milestone completed).
//! 2. **Slot** -- the session must not be suspended, and the action's
//!    timer must not already be running or paused. An idle timer restored
//!    from a save is resumed without charging its cost again.
//! 3. **Ledger** -- capacity is checked; a refine debits its cost up front.
//! 4. **Timer** -- a fresh timer is created and started.
//!
//! On completion the timer's [`Action`] is dispatched through a single
//! `match`: the ledger is mutated first, then milestones are re-evaluated,
//! so progression never lags a tick behind the economy.

use std::collections::BTreeSet;
use std::sync::Arc;

use skyguild_ledger::{LedgerError, LedgerState, ResourceLedger};
use skyguild_types::{
    Action, ComponentId, Feature, SAVE_VERSION, SaveRecord, TimerId, UnlockKey,
};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::GameConfig;
use crate::observer::SessionObserver;
use crate::progression::{Milestone, ProgressionEngine, ProgressionReport, UnlockState};
use crate::registry::TimerRegistry;

/// Log line emitted when the last airship component is built.
pub const VICTORY_MESSAGE: &str = "The airship is complete! Your guild takes to the skies.";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a player request was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    /// The ledger refused the operation.
    #[error("{source}")]
    Ledger {
        /// The underlying ledger error.
        #[from]
        source: LedgerError,
    },

    /// The action's timer is already running or paused.
    #[error("{timer} is already in progress")]
    TimerAlreadyActive {
        /// The occupied timer id.
        timer: TimerId,
    },

    /// The action is not unlocked yet.
    #[error("{target} is locked (requires {requirement})")]
    Locked {
        /// What was requested.
        target: String,
        /// What would unlock it.
        requirement: String,
    },

    /// The target is not in the catalog.
    #[error("unknown target: {target}")]
    UnknownTarget {
        /// The unresolved id.
        target: String,
    },

    /// Timers are suspended; nothing starts until the session resumes.
    #[error("the session is paused")]
    Suspended,

    /// The component has already been built.
    #[error("{component} is already built")]
    AlreadyBuilt {
        /// The component id.
        component: ComponentId,
    },
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// What one or more session ticks did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionTick {
    /// Number of ticks executed.
    pub ticks: u64,
    /// Actions completed, in completion order.
    pub completed: Vec<Action>,
}

impl SessionTick {
    fn merge(&mut self, other: Self) {
        self.ticks = self.ticks.saturating_add(other.ticks);
        self.completed.extend(other.completed);
    }
}

/// Airship construction progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AirshipProgress {
    /// Components built.
    pub built: usize,
    /// Components in the catalog.
    pub total: usize,
}

impl AirshipProgress {
    /// Completion as a whole percentage (0 when the catalog is empty).
    pub const fn percent(&self) -> usize {
        match self.built.saturating_mul(100).checked_div(self.total) {
            Some(percent) => percent,
            None => 0,
        }
    }

    /// Whether every component is built.
    pub const fn is_complete(&self) -> bool {
        self.total > 0 && self.built >= self.total
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One player's live game state.
#[derive(Debug, Clone)]
pub struct Session {
    config: Arc<GameConfig>,
    ledger: ResourceLedger,
    unlocks: UnlockState,
    timers: TimerRegistry,
    progression: ProgressionEngine,
    play_time_ms: u64,
    suspended: bool,
}

impl Session {
    /// Start a fresh game: empty ledger, only the seed resource unlocked.
    pub fn new(config: Arc<GameConfig>) -> Self {
        let ledger = ResourceLedger::new(
            config.resource_limits(),
            config.guild.base_max_guildmates,
        );
        let unlocks = UnlockState::new(config.settings.seed_resource.clone());
        Self::from_parts(config, ledger, unlocks, TimerRegistry::new(), 0)
    }

    /// Assemble a session from restored parts.
    pub fn from_parts(
        config: Arc<GameConfig>,
        ledger: ResourceLedger,
        unlocks: UnlockState,
        timers: TimerRegistry,
        play_time_ms: u64,
    ) -> Self {
        let progression = ProgressionEngine::from_config(&config);
        Self {
            config,
            ledger,
            unlocks,
            timers,
            progression,
            play_time_ms,
            suspended: false,
        }
    }

    /// The shared catalog.
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// A new handle to the shared catalog.
    pub fn shared_config(&self) -> Arc<GameConfig> {
        Arc::clone(&self.config)
    }

    /// The resource ledger.
    pub const fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    /// Current ledger quantities.
    pub const fn ledger_state(&self) -> &LedgerState {
        self.ledger.state()
    }

    /// Current unlock sets.
    pub const fn unlocks(&self) -> &UnlockState {
        &self.unlocks
    }

    /// The timer registry.
    pub const fn timers(&self) -> &TimerRegistry {
        &self.timers
    }

    /// Accumulated active play time.
    pub const fn play_time_ms(&self) -> u64 {
        self.play_time_ms
    }

    /// Whether timers are suspended.
    pub const fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Snapshot the whole session for persistence.
    pub fn to_record(&self, now_ms: i64) -> SaveRecord {
        SaveRecord {
            version: SAVE_VERSION.to_owned(),
            saved_at: now_ms,
            play_time_ms: self.play_time_ms,
            ledger: self.ledger.state().to_record(),
            unlocks: self.unlocks.to_record(),
            timers: self.timers.snapshot(now_ms),
        }
    }

    // -----------------------------------------------------------------------
    // Timed actions
    // -----------------------------------------------------------------------

    /// Request a timed action.
    ///
    /// The outcome is reported through
    /// [`SessionObserver::on_action_result`] as well as returned.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError`] if the action is unknown or locked, the
    /// session is suspended, its timer is already active, or the ledger
    /// rejects it. Nothing changes on failure.
    pub fn request(
        &mut self,
        action: &Action,
        clock: &dyn Clock,
        observer: &mut dyn SessionObserver,
    ) -> Result<(), ActionError> {
        let result = self.try_request(action, clock.now_ms());
        let timer = action.timer_id();
        observer.on_action_result(timer.as_str(), result.as_ref().copied());
        if let Err(e) = &result {
            debug!(timer = %timer, error = %e, "action rejected");
            observer.on_log_message(&self.rejection_message(action, e));
        }
        result
    }

    fn try_request(&mut self, action: &Action, now_ms: i64) -> Result<(), ActionError> {
        let duration = self
            .config
            .action_duration(action)
            .ok_or_else(|| ActionError::UnknownTarget {
                target: action.to_string(),
            })?;
        if self.suspended {
            return Err(ActionError::Suspended);
        }
        self.check_unlocked(action)?;

        let timer = action.timer_id();
        if self.timers.is_active(timer.as_str()) {
            return Err(ActionError::TimerAlreadyActive { timer });
        }

        // An idle timer held by the registry was restored from a save and
        // its cost is already paid: continue it instead of charging again.
        if self.timers.get(timer.as_str()).is_some() {
            if let Action::Gather(resource) | Action::Refine(resource) = action {
                self.ledger.check_capacity(resource.as_str())?;
            }
            self.timers.start_timer(timer.as_str(), now_ms);
            info!(timer = %timer, "restored action resumed");
            return Ok(());
        }

        match action {
            Action::Gather(resource) => self.ledger.check_capacity(resource.as_str())?,
            Action::Refine(resource) => {
                let cost = self
                    .config
                    .refined_resource(resource.as_str())
                    .map(|r| &r.cost)
                    .ok_or_else(|| ActionError::UnknownTarget {
                        target: action.to_string(),
                    })?;
                self.ledger.begin_refine(resource.as_str(), cost)?;
            }
            Action::Combat(_) => {}
        }

        self.timers.create_or_replace(action.clone(), duration);
        self.timers.start_timer(timer.as_str(), now_ms);
        info!(timer = %timer, duration_ms = duration, "action started");
        Ok(())
    }

    fn check_unlocked(&self, action: &Action) -> Result<(), ActionError> {
        let locked = |requirement: String| ActionError::Locked {
            target: action.to_string(),
            requirement,
        };
        let features = self.progression.enabled_features(&self.unlocks);
        match action {
            Action::Gather(resource) => {
                if !self.unlocks.is_resource_unlocked(resource.as_str()) {
                    return Err(locked(format!("resource {resource}")));
                }
            }
            Action::Refine(resource) => {
                if !features.contains(&Feature::Refining) {
                    return Err(locked(format!("feature {}", Feature::Refining)));
                }
                if !self.unlocks.is_resource_unlocked(resource.as_str()) {
                    return Err(locked(format!("resource {resource}")));
                }
            }
            Action::Combat(activity) => {
                if !features.contains(&Feature::Combat) {
                    return Err(locked(format!("feature {}", Feature::Combat)));
                }
                let required = self
                    .config
                    .combat(activity.as_str())
                    .and_then(|c| c.requires_milestone.as_ref());
                if let Some(milestone) = required {
                    if !self.unlocks.is_milestone_completed(milestone.as_str()) {
                        return Err(locked(format!("milestone {milestone}")));
                    }
                }
            }
        }
        Ok(())
    }

    fn rejection_message(&self, action: &Action, error: &ActionError) -> String {
        let label = self.config.action_label(action);
        match (action, error) {
            (Action::Gather(_), ActionError::Ledger { source: LedgerError::StorageFull { .. } }) => {
                format!("Cannot gather {label} - storage full!")
            }
            (Action::Refine(_), ActionError::Ledger { source: LedgerError::StorageFull { .. } }) => {
                format!("Cannot refine {label} - storage full!")
            }
            (
                Action::Refine(_),
                ActionError::Ledger {
                    source: LedgerError::InsufficientResources { .. },
                },
            ) => format!("Not enough materials to refine {label}"),
            (_, ActionError::TimerAlreadyActive { .. }) => format!("{label} is already in progress"),
            (_, ActionError::Suspended) => format!("Cannot start {label} while the game is paused"),
            (_, e) => format!("Cannot start {label}: {e}"),
        }
    }

    /// Cancel an action's timer. Costs already paid are not refunded.
    pub fn cancel(&mut self, action: &Action) -> bool {
        let cancelled = self.timers.cancel(action.timer_id().as_str());
        if cancelled {
            info!(%action, "action cancelled");
        }
        cancelled
    }

    /// Pause every running timer. Ticks do nothing until [`Self::resume`].
    pub fn suspend(&mut self) -> usize {
        self.suspended = true;
        let paused = self.timers.pause_all();
        info!(paused, "session suspended");
        paused
    }

    /// Resume every paused timer.
    pub fn resume(&mut self, clock: &dyn Clock) -> usize {
        self.suspended = false;
        let resumed = self.timers.resume_all(clock.now_ms());
        info!(resumed, "session resumed");
        resumed
    }

    // -----------------------------------------------------------------------
    // Ticking
    // -----------------------------------------------------------------------

    /// Run one tick of the configured resolution.
    ///
    /// Every completion is fully applied (ledger, then progression) before
    /// the next one is processed.
    pub fn tick(&mut self, observer: &mut dyn SessionObserver) -> SessionTick {
        if self.suspended {
            return SessionTick::default();
        }
        let resolution = self.config.settings.tick_resolution_ms;
        self.play_time_ms = self.play_time_ms.saturating_add(resolution);

        let report = self.timers.tick(resolution);
        for tick in &report.ticks {
            observer.on_tick(&tick.id, tick.remaining_ms);
        }

        let mut completed = Vec::with_capacity(report.completed.len());
        for timer in report.completed {
            observer.on_tick(timer.id(), 0);
            self.complete_action(timer.action(), observer);
            completed.push(timer.action().clone());
        }
        SessionTick {
            ticks: 1,
            completed,
        }
    }

    /// Run as many whole ticks as fit in `elapsed_ms`.
    pub fn advance(&mut self, elapsed_ms: u64, observer: &mut dyn SessionObserver) -> SessionTick {
        let resolution = self.config.settings.tick_resolution_ms;
        let ticks = elapsed_ms.checked_div(resolution).unwrap_or(0);
        let mut total = SessionTick::default();
        for _ in 0..ticks {
            total.merge(self.tick(observer));
        }
        total
    }

    /// Apply a finished action to the ledger, then re-run progression.
    pub(crate) fn complete_action(&mut self, action: &Action, observer: &mut dyn SessionObserver) {
        let label = self.config.action_label(action);
        match action {
            Action::Gather(resource) | Action::Refine(resource) => {
                let quantity = match self.ledger.complete_production(resource.as_str()) {
                    Ok(quantity) => quantity,
                    Err(e) => {
                        warn!(%action, error = %e, "completion for unknown resource dropped");
                        return;
                    }
                };
                info!(%action, quantity, "production completed");
                let verb = if matches!(action, Action::Gather(_)) {
                    "Gathered"
                } else {
                    "Refined"
                };
                observer.on_log_message(&format!("{verb} 1 {label}"));
                if matches!(action, Action::Gather(_)) && self.unlocks.unlock_resource(resource) {
                    observer.on_unlock_changed(&[UnlockKey::Resource(resource.clone())]);
                }
            }
            Action::Combat(activity) => {
                let Some(reward) = self.config.combat(activity.as_str()).map(|c| c.reward) else {
                    warn!(%action, "completion for unknown combat activity dropped");
                    return;
                };
                if let Err(e) = self.ledger.record_combat_reward(reward) {
                    warn!(%action, error = %e, "combat reward dropped");
                    return;
                }
                info!(%action, reward, "combat completed");
                observer.on_log_message(&format!("Completed {label} - earned {reward} coins"));
            }
        }
        self.run_progression(observer);
    }

    /// Re-evaluate milestones and report any changes.
    pub(crate) fn run_progression(
        &mut self,
        observer: &mut dyn SessionObserver,
    ) -> ProgressionReport {
        let report = self
            .progression
            .evaluate(self.ledger.state(), &mut self.unlocks);
        for milestone in &report.completed {
            observer.on_log_message(&format!("Milestone reached: {}", milestone.description));
        }
        for key in &report.unlocked {
            if let UnlockKey::Feature(feature) = key {
                observer.on_log_message(&format!("New feature unlocked: {feature}"));
            }
        }
        if !report.unlocked.is_empty() {
            observer.on_unlock_changed(&report.unlocked);
        }
        report
    }

    // -----------------------------------------------------------------------
    // Immediate actions
    // -----------------------------------------------------------------------

    /// Recruit one guildmate. Returns the new headcount.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Locked`] without the guild feature, or the
    /// ledger's currency and capacity errors.
    pub fn recruit(&mut self, observer: &mut dyn SessionObserver) -> Result<u32, ActionError> {
        let result = self.require_feature(Feature::Guild, "recruit").and_then(|()| {
            self.ledger
                .recruit(self.config.guild.recruit_cost)
                .map_err(ActionError::from)
        });
        report_immediate("recruit", &result, observer);
        if let Ok(guildmates) = result {
            info!(guildmates, "guildmate recruited");
            observer.on_log_message("Recruited a new guildmate!");
            self.run_progression(observer);
        }
        result
    }

    /// Buy a guild upgrade, raising guild capacity. Returns the new
    /// capacity.
    ///
    /// Currency and materials are both validated before either is debited.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Locked`] without the guild feature,
    /// [`ActionError::UnknownTarget`] for an unknown upgrade, or the
    /// ledger's affordability errors.
    pub fn purchase_upgrade(
        &mut self,
        upgrade: &str,
        observer: &mut dyn SessionObserver,
    ) -> Result<u32, ActionError> {
        let result = self.try_purchase_upgrade(upgrade);
        report_immediate(&format!("upgrade:{upgrade}"), &result, observer);
        if let Ok(max_guildmates) = result {
            let name = self.config.upgrade(upgrade).map_or(upgrade, |u| u.name.as_str());
            info!(upgrade, max_guildmates, "guild upgraded");
            observer.on_log_message(&format!(
                "Upgraded {name} - guild capacity is now {max_guildmates}"
            ));
            self.run_progression(observer);
        }
        result
    }

    fn try_purchase_upgrade(&mut self, upgrade: &str) -> Result<u32, ActionError> {
        self.require_feature(Feature::Guild, upgrade)?;
        let config = self
            .config
            .upgrade(upgrade)
            .ok_or_else(|| ActionError::UnknownTarget {
                target: upgrade.to_owned(),
            })?;
        if !self.ledger.can_spend(config.currency_cost) {
            return Err(LedgerError::InsufficientCurrency {
                required: config.currency_cost,
                available: self.ledger.currency(),
            }
            .into());
        }
        self.ledger.consume(&config.cost)?;
        self.ledger.spend_currency(config.currency_cost)?;
        Ok(self.ledger.expand_guild(config.capacity_increase)?)
    }

    /// Build an airship component.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Locked`] without the refining feature,
    /// [`ActionError::UnknownTarget`], [`ActionError::AlreadyBuilt`], or
    /// [`LedgerError::InsufficientResources`] wrapped in
    /// [`ActionError::Ledger`].
    pub fn build_component(
        &mut self,
        component: &str,
        observer: &mut dyn SessionObserver,
    ) -> Result<(), ActionError> {
        let result = self.try_build_component(component);
        report_immediate(&format!("build:{component}"), &result, observer);
        if result.is_ok() {
            let name = self.config.component(component).map_or(component, |c| c.name.as_str());
            info!(component, "airship component built");
            observer.on_log_message(&format!("Built the airship {name}"));
            observer.on_unlock_changed(&[UnlockKey::Component(ComponentId::from(component))]);
            if self.progress().is_complete() {
                info!("airship complete");
                observer.on_log_message(VICTORY_MESSAGE);
            }
            self.run_progression(observer);
        }
        result
    }

    fn try_build_component(&mut self, component: &str) -> Result<(), ActionError> {
        self.require_feature(Feature::Refining, component)?;
        let config = self
            .config
            .component(component)
            .ok_or_else(|| ActionError::UnknownTarget {
                target: component.to_owned(),
            })?;
        if self.unlocks.is_built(component) {
            return Err(ActionError::AlreadyBuilt {
                component: config.id.clone(),
            });
        }
        self.ledger.consume(&config.cost)?;
        self.unlocks.record_component(&config.id);
        Ok(())
    }

    fn require_feature(&self, feature: Feature, target: &str) -> Result<(), ActionError> {
        if self.progression.is_enabled(&self.unlocks, feature) {
            Ok(())
        } else {
            Err(ActionError::Locked {
                target: target.to_owned(),
                requirement: format!("feature {feature}"),
            })
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Timed actions the unlock state currently permits.
    pub fn available_actions(&self) -> Vec<Action> {
        self.progression.available_actions(&self.config, &self.unlocks)
    }

    /// Airship construction progress.
    pub fn progress(&self) -> AirshipProgress {
        let built = self
            .config
            .airship
            .iter()
            .filter(|c| self.unlocks.is_built(c.id.as_str()))
            .count();
        AirshipProgress {
            built,
            total: self.config.airship.len(),
        }
    }

    /// The first pending milestone.
    pub fn next_objective(&self) -> Option<&Milestone> {
        self.progression.next_objective(&self.unlocks)
    }

    /// Features currently enabled.
    pub fn enabled_features(&self) -> BTreeSet<Feature> {
        self.progression.enabled_features(&self.unlocks)
    }
}

/// Report the outcome of an immediate (untimed) action.
fn report_immediate<T>(
    action: &str,
    result: &Result<T, ActionError>,
    observer: &mut dyn SessionObserver,
) {
    match result {
        Ok(_) => observer.on_action_result(action, Ok(())),
        Err(e) => {
            debug!(action, error = %e, "action rejected");
            observer.on_action_result(action, Err(e));
            observer.on_log_message(&format!("Cannot {action}: {e}"));
        }
    }
}
