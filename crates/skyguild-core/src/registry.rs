//! Ownership of every live timer, keyed by timer id.
//!
//! The registry enforces at most one timer per id, advances all running
//! timers under a single shared tick, and converts its contents to and from
//! the persisted [`TimerRecord`] layout. Completed and cancelled timers are
//! removed immediately, so everything it holds is Idle, Running, or Paused.
//!
//! Iteration (and therefore tick reporting and completion order) follows
//! the stable ordering of [`TimerId`].

use std::collections::BTreeMap;

use skyguild_types::{Action, TimerId, TimerRecord};
use tracing::{debug, warn};

use crate::clock::elapsed_ms;
use crate::timer::{Timer, TimerState, TimerStep};

/// One tick notification: a running timer and its new remaining time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerTick {
    /// The timer that ticked.
    pub id: TimerId,
    /// Remaining milliseconds after the tick.
    pub remaining_ms: u64,
}

/// Outcome of one registry tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Timers that are still running, with their new remaining time.
    pub ticks: Vec<TimerTick>,
    /// Timers that reached zero on this tick, already removed from the
    /// registry.
    pub completed: Vec<Timer>,
}

/// Result of restoring a registry from persisted records.
#[derive(Debug, Default)]
pub struct Restored {
    /// Timers that still have time left (running or idle).
    pub registry: TimerRegistry,
    /// Actions whose timers ran out while the session was offline. Each
    /// must be completed exactly once by the caller.
    pub overdue: Vec<Action>,
    /// Records dropped because their id no longer resolves.
    pub dropped: usize,
}

/// Owner of all timers in a session.
#[derive(Debug, Clone, Default)]
pub struct TimerRegistry {
    timers: BTreeMap<TimerId, Timer>,
}

impl TimerRegistry {
    /// Create an empty registry.
    pub const fn new() -> Self {
        Self {
            timers: BTreeMap::new(),
        }
    }

    /// Install a fresh idle timer for `action`, discarding any existing
    /// timer with the same id.
    pub fn create_or_replace(&mut self, action: Action, duration_ms: u64) -> &Timer {
        let timer = Timer::new(action, duration_ms);
        let id = timer.id().clone();
        if let Some(mut previous) = self.timers.remove(&id) {
            debug!(timer = %id, state = ?previous.state(), "replacing existing timer");
            previous.reset();
        }
        self.timers.entry(id).or_insert(timer)
    }

    /// Start the timer with the given id. Returns `false` if there is no
    /// such timer or it is already running.
    pub fn start_timer(&mut self, id: &str, now_ms: i64) -> bool {
        self.timers
            .get_mut(id)
            .is_some_and(|timer| timer.start(now_ms))
    }

    /// Reset and remove a timer. Returns `false` if there was none.
    pub fn cancel(&mut self, id: &str) -> bool {
        match self.timers.remove(id) {
            Some(mut timer) => {
                timer.reset();
                debug!(timer = id, "timer cancelled");
                true
            }
            None => false,
        }
    }

    /// Pause every running timer. Returns how many were paused.
    pub fn pause_all(&mut self) -> usize {
        self.timers
            .values_mut()
            .map(Timer::pause)
            .filter(|paused| *paused)
            .count()
    }

    /// Resume every timer that has time left. Returns how many resumed.
    pub fn resume_all(&mut self, now_ms: i64) -> usize {
        self.timers
            .values_mut()
            .map(|t| t.resume(now_ms))
            .filter(|resumed| *resumed)
            .count()
    }

    /// Reset every timer and empty the registry.
    pub fn clear_all(&mut self) {
        for timer in self.timers.values_mut() {
            timer.reset();
        }
        self.timers.clear();
    }

    /// Look up a timer by id.
    pub fn get(&self, id: &str) -> Option<&Timer> {
        self.timers.get(id)
    }

    /// Whether the timer with this id is running or paused.
    pub fn is_active(&self, id: &str) -> bool {
        self.timers.get(id).is_some_and(Timer::is_active)
    }

    /// Iterate over running and paused timers in id order.
    pub fn active_timers(&self) -> impl Iterator<Item = &Timer> {
        self.timers.values().filter(|t| t.is_active())
    }

    /// Iterate over every held timer in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Timer> {
        self.timers.values()
    }

    /// Number of held timers.
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    /// Whether the registry holds no timers.
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Advance every running timer by one tick of `resolution_ms`.
    ///
    /// Timers that reach zero are removed and returned in
    /// [`TickReport::completed`]; none of them will tick again.
    pub fn tick(&mut self, resolution_ms: u64) -> TickReport {
        let mut report = TickReport::default();
        for timer in self.timers.values_mut() {
            if let Some(TimerStep::Ticked(remaining_ms)) = timer.tick(resolution_ms) {
                report.ticks.push(TimerTick {
                    id: timer.id().clone(),
                    remaining_ms,
                });
            }
        }

        let done: Vec<TimerId> = self
            .timers
            .iter()
            .filter(|(_, t)| t.state() == TimerState::Completed)
            .map(|(id, _)| id.clone())
            .collect();
        for id in done {
            if let Some(timer) = self.timers.remove(&id) {
                debug!(timer = %id, "timer completed");
                report.completed.push(timer);
            }
        }
        report
    }

    // -----------------------------------------------------------------------
    // Snapshot / restore
    // -----------------------------------------------------------------------

    /// Serialize every held timer.
    ///
    /// A running timer's `start_instant` is its countdown anchor, capped at
    /// `now_ms`, so that `now - start_instant` on load measures only time
    /// not yet reflected in `remaining`.
    pub fn snapshot(&self, now_ms: i64) -> Vec<TimerRecord> {
        self.timers
            .values()
            .map(|timer| TimerRecord {
                id: timer.id().clone(),
                duration: timer.duration_ms(),
                remaining: timer.remaining_ms(),
                running: timer.is_running(),
                start_instant: timer.countdown_anchor().map(|anchor| anchor.min(now_ms)),
            })
            .collect()
    }

    /// Rebuild a registry from persisted records, reconciling elapsed time.
    ///
    /// `resolve` maps a timer id to its action; records it rejects are
    /// dropped. A running record with a start instant has the time since
    /// that instant subtracted: if time is left it resumes running from
    /// `now_ms`, otherwise its action is returned in
    /// [`Restored::overdue`]. A running record without a start instant
    /// resumes from its stored remaining time. Other records are restored
    /// idle. When an id appears twice the later record wins.
    pub fn restore<F>(records: &[TimerRecord], resolve: F, now_ms: i64) -> Restored
    where
        F: Fn(&TimerId) -> Option<Action>,
    {
        let mut latest: BTreeMap<&TimerId, &TimerRecord> = BTreeMap::new();
        for record in records {
            if latest.insert(&record.id, record).is_some() {
                warn!(timer = %record.id, "duplicate timer record, keeping the later one");
            }
        }

        let mut restored = Restored::default();
        for (id, record) in latest {
            let Some(action) = resolve(id) else {
                debug!(timer = %id, "dropping timer record with unknown id");
                restored.dropped = restored.dropped.saturating_add(1);
                continue;
            };

            match (record.running, record.start_instant) {
                (true, Some(start_instant)) => {
                    let elapsed = elapsed_ms(start_instant, now_ms);
                    let effective = record.remaining.saturating_sub(elapsed);
                    if effective == 0 {
                        debug!(timer = %id, elapsed, remaining = record.remaining, "timer overdue");
                        restored.overdue.push(action);
                        continue;
                    }
                    let mut timer = Timer::with_remaining(action, record.duration, effective);
                    timer.start(now_ms);
                    debug!(timer = %id, elapsed, remaining = timer.remaining_ms(), "timer resumed");
                    restored.registry.timers.insert(id.clone(), timer);
                }
                (true, None) => {
                    let mut timer = Timer::with_remaining(action, record.duration, record.remaining);
                    if timer.remaining_ms() == 0 {
                        restored.overdue.push(timer.action().clone());
                        continue;
                    }
                    timer.start(now_ms);
                    restored.registry.timers.insert(id.clone(), timer);
                }
                (false, _) => {
                    let timer = Timer::with_remaining(action, record.duration, record.remaining);
                    restored.registry.timers.insert(id.clone(), timer);
                }
            }
        }
        restored
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use skyguild_types::{CombatId, ResourceId};

    use super::*;

    fn gather(id: &str) -> Action {
        Action::Gather(ResourceId::new(id))
    }

    fn resolve(id: &TimerId) -> Option<Action> {
        Action::from_timer_id(id.as_str()).filter(|a| a.target() != "mithril")
    }

    #[test]
    fn create_or_replace_discards_existing() {
        let mut registry = TimerRegistry::new();
        registry.create_or_replace(gather("wood"), 2500);
        assert!(registry.start_timer("gather:wood", 0));
        registry.tick(100);

        let timer = registry.create_or_replace(gather("wood"), 2500);
        assert_eq!(timer.state(), TimerState::Idle);
        assert_eq!(timer.remaining_ms(), 2500);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn start_unknown_timer_fails() {
        let mut registry = TimerRegistry::new();
        assert!(!registry.start_timer("gather:wood", 0));
    }

    #[test]
    fn independent_timers_tick_together() {
        let mut registry = TimerRegistry::new();
        registry.create_or_replace(gather("wood"), 200);
        registry.create_or_replace(gather("ironOre"), 300);
        registry.start_timer("gather:wood", 0);
        registry.start_timer("gather:ironOre", 0);

        let first = registry.tick(100);
        assert_eq!(first.ticks.len(), 2);
        assert!(first.completed.is_empty());

        let second = registry.tick(100);
        assert_eq!(second.ticks.len(), 1);
        assert_eq!(second.completed.len(), 1);
        assert_eq!(second.completed.first().unwrap().action(), &gather("wood"));
        assert!(registry.get("gather:wood").is_none());

        let third = registry.tick(100);
        assert_eq!(third.completed.len(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn completion_is_reported_once() {
        let mut registry = TimerRegistry::new();
        registry.create_or_replace(gather("wood"), 100);
        registry.start_timer("gather:wood", 0);
        assert_eq!(registry.tick(100).completed.len(), 1);
        for _ in 0..10 {
            assert!(registry.tick(100).completed.is_empty());
        }
    }

    #[test]
    fn pause_all_and_resume_all() {
        let mut registry = TimerRegistry::new();
        registry.create_or_replace(gather("wood"), 1000);
        registry.create_or_replace(gather("stone"), 1000);
        registry.start_timer("gather:wood", 0);
        registry.start_timer("gather:stone", 0);
        registry.tick(100);

        assert_eq!(registry.pause_all(), 2);
        assert!(registry.tick(100).ticks.is_empty());
        assert!(registry.is_active("gather:wood"));

        assert_eq!(registry.resume_all(500), 2);
        assert_eq!(registry.get("gather:wood").unwrap().remaining_ms(), 900);
        assert_eq!(registry.resume_all(600), 0);
    }

    #[test]
    fn cancel_and_clear() {
        let mut registry = TimerRegistry::new();
        registry.create_or_replace(gather("wood"), 1000);
        registry.create_or_replace(gather("stone"), 1000);
        assert!(registry.cancel("gather:wood"));
        assert!(!registry.cancel("gather:wood"));
        assert_eq!(registry.len(), 1);
        registry.clear_all();
        assert!(registry.is_empty());
    }

    #[test]
    fn active_timers_excludes_idle() {
        let mut registry = TimerRegistry::new();
        registry.create_or_replace(gather("wood"), 1000);
        registry.create_or_replace(gather("stone"), 1000);
        registry.start_timer("gather:stone", 0);
        let active: Vec<&str> = registry.active_timers().map(|t| t.id().as_str()).collect();
        assert_eq!(active, vec!["gather:stone"]);
    }

    #[test]
    fn snapshot_restore_with_zero_elapsed_is_identity() {
        let mut registry = TimerRegistry::new();
        registry.create_or_replace(gather("wood"), 2500);
        registry.create_or_replace(Action::Combat(CombatId::new("basic")), 4000);
        registry.create_or_replace(gather("stone"), 3500);
        registry.start_timer("gather:wood", 1_000);
        registry.start_timer("combat:basic", 1_000);
        for _ in 0..7 {
            registry.tick(100);
        }

        // Ticks track real time, so "now" is 700 ms after the start.
        let now = 1_700;
        let records = registry.snapshot(now);
        let restored = TimerRegistry::restore(&records, resolve, now);
        assert!(restored.overdue.is_empty());

        for original in registry.iter() {
            let copy = restored.registry.get(original.id().as_str()).unwrap();
            assert_eq!(copy.remaining_ms(), original.remaining_ms());
            assert_eq!(copy.is_running(), original.is_running());
        }
        assert_eq!(restored.registry.len(), registry.len());
    }

    #[test]
    fn restore_subtracts_offline_time() {
        let records = vec![TimerRecord {
            id: TimerId::new("gather:wood"),
            duration: 2500,
            remaining: 2000,
            running: true,
            start_instant: Some(10_000),
        }];
        let restored = TimerRegistry::restore(&records, resolve, 11_500);
        let timer = restored.registry.get("gather:wood").unwrap();
        assert_eq!(timer.remaining_ms(), 500);
        assert!(timer.is_running());
    }

    #[test]
    fn overdue_timer_is_reported_once_regardless_of_gap() {
        let records = vec![TimerRecord {
            id: TimerId::new("refine:ironIngot"),
            duration: 5000,
            remaining: 5000,
            running: true,
            start_instant: Some(0),
        }];
        let restored = TimerRegistry::restore(&records, resolve, 86_400_000);
        assert_eq!(
            restored.overdue,
            vec![Action::Refine(ResourceId::new("ironIngot"))]
        );
        assert!(restored.registry.is_empty());
    }

    #[test]
    fn clock_behind_save_loses_no_time() {
        let records = vec![TimerRecord {
            id: TimerId::new("gather:wood"),
            duration: 2500,
            remaining: 2000,
            running: true,
            start_instant: Some(50_000),
        }];
        let restored = TimerRegistry::restore(&records, resolve, 40_000);
        assert_eq!(restored.registry.get("gather:wood").unwrap().remaining_ms(), 2000);
    }

    #[test]
    fn idle_records_stay_idle() {
        let records = vec![TimerRecord {
            id: TimerId::new("gather:stone"),
            duration: 3500,
            remaining: 1200,
            running: false,
            start_instant: None,
        }];
        let restored = TimerRegistry::restore(&records, resolve, 1_000_000);
        let timer = restored.registry.get("gather:stone").unwrap();
        assert_eq!(timer.state(), TimerState::Idle);
        assert_eq!(timer.remaining_ms(), 1200);
    }

    #[test]
    fn unknown_ids_are_dropped() {
        let records = vec![
            TimerRecord {
                id: TimerId::new("gather:mithril"),
                duration: 100,
                remaining: 100,
                running: true,
                start_instant: Some(0),
            },
            TimerRecord {
                id: TimerId::new("teleport:moon"),
                duration: 100,
                remaining: 100,
                running: false,
                start_instant: None,
            },
        ];
        let restored = TimerRegistry::restore(&records, resolve, 0);
        assert!(restored.registry.is_empty());
        assert!(restored.overdue.is_empty());
        assert_eq!(restored.dropped, 2);
    }

    #[test]
    fn duplicate_ids_keep_the_later_record() {
        let make = |remaining| TimerRecord {
            id: TimerId::new("gather:wood"),
            duration: 2500,
            remaining,
            running: false,
            start_instant: None,
        };
        let records = vec![make(2000), make(700)];
        let restored = TimerRegistry::restore(&records, resolve, 0);
        assert_eq!(restored.registry.len(), 1);
        assert_eq!(restored.registry.get("gather:wood").unwrap().remaining_ms(), 700);
    }
}
