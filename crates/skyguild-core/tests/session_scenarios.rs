//! End-to-end scenarios for a Skyguild session.
//!
//! These drive the public API the way a front end would: request actions,
//! tick, save, reload after an offline gap, and check what the player
//! would see.

#![allow(
    clippy::unwrap_used,
    clippy::too_many_lines,
    clippy::arithmetic_side_effects,
    clippy::indexing_slicing
)]

use std::sync::Arc;

use skyguild_core::clock::{Clock, ManualClock};
use skyguild_core::config::GameConfig;
use skyguild_core::observer::{EventLog, NoOpObserver};
use skyguild_core::persistence::{KeyValueStore, MemoryStore, PersistenceCodec};
use skyguild_core::registry::TimerRegistry;
use skyguild_core::runner::StatusReport;
use skyguild_core::session::{ActionError, Session, VICTORY_MESSAGE};
use skyguild_ledger::LedgerError;
use skyguild_types::{
    Action, CombatId, Feature, LedgerRecord, MilestoneId, ResourceId, SaveRecord, TimerId,
    TimerRecord, UnlockKey, UnlockRecord,
};

const NOW: i64 = 1_700_000_000_000;

struct Game {
    session: Session,
    clock: ManualClock,
    log: EventLog,
}

impl Game {
    fn new() -> Self {
        Self::with_config(GameConfig::default())
    }

    fn with_config(config: GameConfig) -> Self {
        Self {
            session: Session::new(Arc::new(config)),
            clock: ManualClock::new(NOW),
            log: EventLog::new(),
        }
    }

    /// Request `action` and tick until it completes.
    fn perform(&mut self, action: &Action) {
        self.session
            .request(action, &self.clock, &mut self.log)
            .unwrap();
        let duration = self.session.config().action_duration(action).unwrap();
        self.clock.advance(duration);
        let done = self.session.advance(duration, &mut self.log);
        assert_eq!(done.completed, vec![action.clone()]);
    }

    fn gather(&mut self, resource: &str, times: u32) {
        for _ in 0..times {
            self.perform(&Action::Gather(ResourceId::new(resource)));
        }
    }

    /// Refine `times` units, gathering whatever raw inputs are missing.
    fn refine(&mut self, refined: &str, times: u32) {
        let cost = self
            .session
            .config()
            .refined_resource(refined)
            .unwrap()
            .cost
            .clone();
        for _ in 0..times {
            for (raw, required) in &cost {
                while self.session.ledger().quantity(raw.as_str()) < *required {
                    self.gather(raw.as_str(), 1);
                }
            }
            self.perform(&Action::Refine(ResourceId::new(refined)));
        }
    }

    fn fight(&mut self, activity: &str, times: u32) {
        for _ in 0..times {
            self.perform(&Action::Combat(CombatId::new(activity)));
        }
    }

    fn quantity(&self, resource: &str) -> u32 {
        self.session.ledger().quantity(resource)
    }
}

fn save_with(ledger: LedgerRecord, unlocks: UnlockRecord, timers: Vec<TimerRecord>) -> SaveRecord {
    SaveRecord {
        version: "1.0.0".to_owned(),
        saved_at: NOW,
        play_time_ms: 0,
        ledger,
        unlocks,
        timers,
    }
}

fn workshop_unlocks() -> UnlockRecord {
    UnlockRecord {
        resource_types: ["ironOre", "wood", "stone", "ironIngot", "plank", "brick"]
            .into_iter()
            .map(ResourceId::new)
            .collect(),
        milestones: vec![MilestoneId::new("firstIron"), MilestoneId::new("workshop")],
        components: Vec::new(),
    }
}

fn codec() -> PersistenceCodec {
    PersistenceCodec::from_config(&GameConfig::default())
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn five_iron_ore_unlocks_wood_and_stone() {
    let mut game = Game::new();
    game.gather("ironOre", 4);
    assert!(!game.session.unlocks().is_resource_unlocked("wood"));

    game.gather("ironOre", 1);
    assert!(game.session.unlocks().is_milestone_completed("firstIron"));
    assert!(game.log.logged("Milestone reached: Gather 5 Iron Ore"));
    let keys = game.log.unlocked_keys();
    assert!(keys.contains(&&UnlockKey::Resource(ResourceId::new("wood"))));
    assert!(keys.contains(&&UnlockKey::Resource(ResourceId::new("stone"))));

    game.gather("wood", 1);
    assert_eq!(game.quantity("wood"), 1);
}

#[test]
fn refine_without_materials_changes_nothing() {
    let mut record = LedgerRecord::default();
    record.raw.insert(ResourceId::new("ironOre"), 1);
    let save = save_with(record, workshop_unlocks(), Vec::new());
    let clock = ManualClock::new(NOW);
    let mut session = codec()
        .restore(Arc::new(GameConfig::default()), &save, &clock, &mut NoOpObserver)
        .unwrap()
        .session;
    let mut log = EventLog::new();

    let err = session
        .request(&Action::Refine(ResourceId::new("ironIngot")), &clock, &mut log)
        .unwrap_err();

    assert_eq!(
        err,
        ActionError::Ledger {
            source: LedgerError::InsufficientResources {
                resource: ResourceId::new("ironOre"),
                required: 2,
                available: 1,
            }
        }
    );
    assert_eq!(session.ledger().quantity("ironOre"), 1);
    assert!(session.timers().is_empty());
    assert!(log.logged("Not enough materials to refine Iron Ingot"));
}

#[test]
fn overdue_refine_completes_on_load() {
    let timer = TimerRecord {
        id: TimerId::new("refine:ironIngot"),
        duration: 5_000,
        remaining: 5_000,
        running: true,
        start_instant: Some(NOW - 7_000),
    };
    let save = save_with(LedgerRecord::default(), workshop_unlocks(), vec![timer]);
    let mut log = EventLog::new();

    let outcome = codec()
        .restore(
            Arc::new(GameConfig::default()),
            &save,
            &ManualClock::new(NOW),
            &mut log,
        )
        .unwrap();

    assert_eq!(
        outcome.completed_offline,
        vec![Action::Refine(ResourceId::new("ironIngot"))]
    );
    assert_eq!(outcome.session.ledger().quantity("ironIngot"), 1);
    assert!(outcome.session.timers().is_empty());
    assert!(log.logged("Refined 1 Iron Ingot"));
}

#[test]
fn full_storage_rejects_gather() {
    let config = GameConfig::parse(
        "resources:\n  raw:\n    - { id: ironOre, name: Iron Ore, gather_time_ms: 300, storage_limit: 2 }\n  refined: []\nmilestones: []\ncombat: []\nairship: []\nguild: { upgrades: [] }\n",
    )
    .unwrap();
    let mut game = Game::with_config(config);
    game.gather("ironOre", 2);

    let err = game
        .session
        .request(
            &Action::Gather(ResourceId::new("ironOre")),
            &game.clock,
            &mut game.log,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        ActionError::Ledger {
            source: LedgerError::StorageFull { .. }
        }
    ));
    assert!(game.log.logged("Cannot gather Iron Ore - storage full!"));
    assert_eq!(game.quantity("ironOre"), 2);
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[test]
fn gather_adds_exactly_one_until_capped() {
    let mut game = Game::new();
    for expected in 1..=50 {
        game.gather("ironOre", 1);
        assert_eq!(game.quantity("ironOre"), expected);
    }
    let err = game
        .session
        .request(
            &Action::Gather(ResourceId::new("ironOre")),
            &game.clock,
            &mut game.log,
        )
        .unwrap_err();
    assert!(matches!(err, ActionError::Ledger { .. }));
    assert_eq!(game.quantity("ironOre"), 50);
}

#[test]
fn snapshot_restore_with_no_elapsed_time_is_identity() {
    let mut registry = TimerRegistry::new();
    let config = GameConfig::default();
    for action in [
        Action::Gather(ResourceId::new("ironOre")),
        Action::Gather(ResourceId::new("wood")),
        Action::Refine(ResourceId::new("plank")),
    ] {
        let duration = config.action_duration(&action).unwrap();
        registry.create_or_replace(action, duration);
    }
    registry.start_timer("gather:ironOre", NOW);
    registry.start_timer("refine:plank", NOW);
    for _ in 0..7 {
        registry.tick(100);
    }

    let snapshot = registry.snapshot(NOW + 700);
    let restored = TimerRegistry::restore(&snapshot, |id| config.resolve_timer(id), NOW + 700);

    assert!(restored.overdue.is_empty());
    assert_eq!(restored.dropped, 0);
    for timer in registry.iter() {
        let back = restored.registry.get(timer.id().as_str()).unwrap();
        assert_eq!(back.remaining_ms(), timer.remaining_ms());
        assert_eq!(back.is_running(), timer.is_running());
    }
    assert_eq!(restored.registry.len(), registry.len());
}

#[test]
fn offline_completion_matches_real_time() {
    let gather = Action::Gather(ResourceId::new("ironOre"));

    let mut live = Game::new();
    live.perform(&gather);

    let mut offline = Game::new();
    offline
        .session
        .request(&gather, &offline.clock, &mut offline.log)
        .unwrap();
    offline.session.advance(1_200, &mut offline.log);
    offline.clock.advance(1_200);
    let mut store = MemoryStore::new();
    codec()
        .save(&offline.session, &mut store, &offline.clock)
        .unwrap();

    for gap in [1_800_u64, 10_000, 86_400_000, 31_536_000_000] {
        let later = ManualClock::new(offline.clock.now_ms() + i64::try_from(gap).unwrap());
        let outcome = codec()
            .load(
                Arc::new(GameConfig::default()),
                &store,
                &later,
                &mut NoOpObserver,
            )
            .unwrap()
            .unwrap();
        assert_eq!(outcome.completed_offline, vec![gather.clone()]);
        assert_eq!(outcome.session.ledger_state(), live.session.ledger_state());
        assert!(outcome.session.timers().is_empty());
    }
}

#[test]
fn partially_elapsed_timer_resumes_with_the_rest() {
    let mut game = Game::new();
    let gather = Action::Gather(ResourceId::new("ironOre"));
    game.session
        .request(&gather, &game.clock, &mut game.log)
        .unwrap();
    let mut store = MemoryStore::new();
    codec().save(&game.session, &mut store, &game.clock).unwrap();

    let later = ManualClock::new(NOW + 1_000);
    let mut outcome = codec()
        .load(Arc::new(GameConfig::default()), &store, &later, &mut NoOpObserver)
        .unwrap()
        .unwrap();
    let timer = outcome.session.timers().get("gather:ironOre").unwrap();
    assert_eq!(timer.remaining_ms(), 2_000);
    assert!(timer.is_running());

    let done = outcome.session.advance(2_000, &mut NoOpObserver);
    assert_eq!(done.completed, vec![gather]);
    assert_eq!(outcome.session.ledger().quantity("ironOre"), 1);
}

// ---------------------------------------------------------------------------
// Suspension
// ---------------------------------------------------------------------------

#[test]
fn requests_while_suspended_are_rejected_and_nothing_completes_offline() {
    let mut game = Game::new();
    let gather = Action::Gather(ResourceId::new("ironOre"));
    game.session.suspend();

    let err = game
        .session
        .request(&gather, &game.clock, &mut game.log)
        .unwrap_err();
    assert!(matches!(err, ActionError::Suspended));
    assert!(game.log.logged("while the game is paused"));
    assert!(game.session.timers().is_empty());

    game.clock.advance(10_000);
    let mut store = MemoryStore::new();
    codec().save(&game.session, &mut store, &game.clock).unwrap();
    let outcome = codec()
        .load(
            Arc::new(GameConfig::default()),
            &store,
            &game.clock,
            &mut NoOpObserver,
        )
        .unwrap()
        .unwrap();
    assert!(outcome.completed_offline.is_empty());
    assert!(outcome.session.timers().is_empty());
    assert_eq!(outcome.session.ledger().quantity("ironOre"), 0);
}

#[test]
fn suspend_then_resume_continues_from_where_it_stopped() {
    let mut game = Game::new();
    let gather = Action::Gather(ResourceId::new("ironOre"));
    game.session
        .request(&gather, &game.clock, &mut game.log)
        .unwrap();
    game.session.advance(1_000, &mut game.log);
    game.clock.advance(1_000);

    assert_eq!(game.session.suspend(), 1);
    game.clock.advance(60_000);
    assert!(game.session.advance(60_000, &mut game.log).completed.is_empty());
    assert_eq!(game.quantity("ironOre"), 0);

    assert_eq!(game.session.resume(&game.clock), 1);
    let timer = game.session.timers().get("gather:ironOre").unwrap();
    assert!(timer.is_running());
    assert_eq!(timer.remaining_ms(), 2_000);

    let done = game.session.advance(2_000, &mut game.log);
    assert_eq!(done.completed, vec![gather]);
    assert_eq!(game.quantity("ironOre"), 1);
}

#[test]
fn paused_refine_survives_reload_without_charging_twice() {
    let config = Arc::new(GameConfig::default());
    let mut record = LedgerRecord::default();
    record.raw.insert(ResourceId::new("ironOre"), 4);
    let clock = ManualClock::new(NOW);
    let mut session = codec()
        .restore(
            Arc::clone(&config),
            &save_with(record, workshop_unlocks(), Vec::new()),
            &clock,
            &mut NoOpObserver,
        )
        .unwrap()
        .session;

    let refine = Action::Refine(ResourceId::new("ironIngot"));
    let duration = config.action_duration(&refine).unwrap();
    session.request(&refine, &clock, &mut NoOpObserver).unwrap();
    assert_eq!(session.ledger().quantity("ironOre"), 2);
    session.advance(1_000, &mut NoOpObserver);
    clock.advance(1_000);
    session.suspend();
    let mut store = MemoryStore::new();
    codec().save(&session, &mut store, &clock).unwrap();

    let later = ManualClock::new(NOW + 3_600_000);
    let mut outcome = codec()
        .load(Arc::clone(&config), &store, &later, &mut NoOpObserver)
        .unwrap()
        .unwrap();
    assert!(outcome.completed_offline.is_empty());
    let timer = outcome.session.timers().get("refine:ironIngot").unwrap();
    assert!(!timer.is_active());
    assert_eq!(timer.remaining_ms(), duration - 1_000);

    let status = StatusReport::from_session(&outcome.session);
    assert_eq!(status.timers.len(), 1);
    assert_eq!(status.timers[0].remaining_ms, duration - 1_000);

    let mut log = EventLog::new();
    outcome.session.request(&refine, &later, &mut log).unwrap();
    assert_eq!(outcome.session.ledger().quantity("ironOre"), 2);
    assert!(outcome.session.timers().get("refine:ironIngot").unwrap().is_running());

    let done = outcome.session.advance(duration - 1_000, &mut log);
    assert_eq!(done.completed, vec![refine]);
    assert_eq!(outcome.session.ledger().quantity("ironIngot"), 1);
    assert_eq!(outcome.session.ledger().quantity("ironOre"), 2);
    assert!(outcome.session.timers().is_empty());
}

#[test]
fn unlocks_never_shrink_across_reloads() {
    let mut game = Game::new();
    let mut store = MemoryStore::new();
    let mut previous = game.session.unlocks().clone();

    for round in 0..6 {
        game.gather("ironOre", 1);
        if game.session.unlocks().is_resource_unlocked("wood") {
            game.gather("wood", 1);
            game.gather("stone", 1);
        }
        codec().save(&game.session, &mut store, &game.clock).unwrap();
        game.clock.advance(60_000);
        game.session = codec()
            .load(
                Arc::new(GameConfig::default()),
                &store,
                &game.clock,
                &mut game.log,
            )
            .unwrap()
            .unwrap()
            .session;

        let current = game.session.unlocks();
        assert!(
            current.unlocked_resources.is_superset(&previous.unlocked_resources),
            "round {round}"
        );
        assert!(current
            .completed_milestones
            .is_superset(&previous.completed_milestones));
        assert!(current.built_components.is_superset(&previous.built_components));
        previous = current.clone();
    }
    assert!(previous.is_milestone_completed("firstIron"));
}

#[test]
fn corrupt_save_starts_fresh() {
    let mut store = MemoryStore::new();
    store
        .write("skyguild_save", br#"{"savedAt": 5, "ledger": {"raw": {}}}"#)
        .unwrap();
    let mut log = EventLog::new();
    let outcome = codec().load_or_new(
        Arc::new(GameConfig::default()),
        &store,
        &ManualClock::new(NOW),
        &mut log,
    );
    assert_eq!(outcome.session.unlocks().unlocked_resources.len(), 1);
    assert!(log.logged("Warning: Failed to load saved progress, starting fresh"));
}

// ---------------------------------------------------------------------------
// Full playthrough
// ---------------------------------------------------------------------------

#[test]
fn playthrough_reaches_the_skies() {
    let mut game = Game::new();

    game.gather("ironOre", 5);
    game.gather("wood", 5);
    game.gather("stone", 5);
    assert!(game.session.enabled_features().contains(&Feature::Refining));

    game.refine("ironIngot", 3);
    assert!(game.session.enabled_features().contains(&Feature::Combat));

    let advanced = Action::Combat(CombatId::new("advanced"));
    let err = game
        .session
        .request(&advanced, &game.clock, &mut game.log)
        .unwrap_err();
    assert!(matches!(err, ActionError::Locked { .. }));

    game.fight("basic", 4);
    assert_eq!(game.session.ledger().currency(), 20);
    assert!(game.session.enabled_features().contains(&Feature::Guild));

    game.session.recruit(&mut game.log).unwrap();
    game.session.recruit(&mut game.log).unwrap();
    let err = game.session.recruit(&mut game.log).unwrap_err();
    assert!(matches!(
        err,
        ActionError::Ledger {
            source: LedgerError::InsufficientCurrency { .. }
        }
    ));
    game.fight("basic", 2);
    assert_eq!(game.session.recruit(&mut game.log).unwrap(), 3);
    assert!(game.session.unlocks().is_milestone_completed("fullCrew"));
    assert!(game.session.available_actions().contains(&advanced));

    game.fight("advanced", 5);
    game.refine("plank", 10);
    game.refine("brick", 5);
    let capacity = game
        .session
        .purchase_upgrade("guildHall", &mut game.log)
        .unwrap();
    assert_eq!(capacity, 8);
    assert_eq!(game.quantity("plank"), 0);

    game.refine("ironIngot", 17);
    game.refine("plank", 15);
    game.session.build_component("hull", &mut game.log).unwrap();
    assert_eq!(game.session.progress().percent(), 33);
    assert!(matches!(
        game.session.build_component("hull", &mut game.log),
        Err(ActionError::AlreadyBuilt { .. })
    ));

    game.refine("ironIngot", 15);
    game.refine("brick", 10);
    game.session.build_component("engine", &mut game.log).unwrap();

    game.refine("ironIngot", 10);
    game.refine("plank", 25);
    assert!(!game.log.logged(VICTORY_MESSAGE));
    game.session.build_component("balloon", &mut game.log).unwrap();

    assert!(game.session.progress().is_complete());
    assert_eq!(game.session.progress().percent(), 100);
    assert!(game.log.logged(VICTORY_MESSAGE));
    assert!(game.session.next_objective().is_none());
}
