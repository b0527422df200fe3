//! A single named one-shot countdown.
//!
//! A [`Timer`] carries the [`Action`] it completes, its total duration, and
//! the time still remaining. It does not own a scheduler: the registry
//! advances it one fixed-resolution step at a time, and the caller decides
//! what happens on completion.
//!
//! # States
//!
//! ```text
//!            start              remaining hits 0
//!   Idle ────────────► Running ─────────────────► Completed
//!    ▲                 │    ▲
//!    │ reset      pause│    │resume
//!    │                 ▼    │
//!    └─────────────── Paused
//! ```
//!
//! `Completed` is terminal; `reset` from any other state returns the timer
//! to `Idle` with the full duration.

use serde::{Deserialize, Serialize};
use skyguild_types::{Action, TimerId};

/// Lifecycle state of a [`Timer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    /// Created but not counting down.
    Idle,
    /// Counting down on every tick.
    Running,
    /// Stopped with its remaining time preserved.
    Paused,
    /// Reached zero. Terminal.
    Completed,
}

/// Result of advancing a running timer by one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerStep {
    /// Still counting down; carries the new remaining time.
    Ticked(u64),
    /// Reached zero on this tick.
    Completed,
}

/// A named one-shot countdown timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timer {
    id: TimerId,
    action: Action,
    duration_ms: u64,
    remaining_ms: u64,
    state: TimerState,
    /// Instant the current run began, set by `start`/`resume`.
    started_at: Option<i64>,
    /// Value of `remaining_ms` at `started_at`.
    remaining_at_start: u64,
}

impl Timer {
    /// Create an idle timer for `action` with the full duration remaining.
    pub fn new(action: Action, duration_ms: u64) -> Self {
        Self::with_remaining(action, duration_ms, duration_ms)
    }

    /// Create an idle timer with a specific remaining time (used when
    /// restoring a snapshot). `remaining_ms` is clamped to `duration_ms`.
    pub fn with_remaining(action: Action, duration_ms: u64, remaining_ms: u64) -> Self {
        let remaining_ms = remaining_ms.min(duration_ms);
        Self {
            id: action.timer_id(),
            action,
            duration_ms,
            remaining_ms,
            state: TimerState::Idle,
            started_at: None,
            remaining_at_start: remaining_ms,
        }
    }

    /// The timer id derived from its action.
    pub const fn id(&self) -> &TimerId {
        &self.id
    }

    /// The action this timer completes.
    pub const fn action(&self) -> &Action {
        &self.action
    }

    /// Total duration in milliseconds.
    pub const fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// Remaining milliseconds.
    pub const fn remaining_ms(&self) -> u64 {
        self.remaining_ms
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> TimerState {
        self.state
    }

    /// Whether the timer is counting down.
    pub const fn is_running(&self) -> bool {
        matches!(self.state, TimerState::Running)
    }

    /// Whether the timer holds its slot: running or paused.
    pub const fn is_active(&self) -> bool {
        matches!(self.state, TimerState::Running | TimerState::Paused)
    }

    /// Start counting down from the current remaining time.
    ///
    /// Returns `false` without changing anything if the timer is already
    /// running or has completed.
    pub const fn start(&mut self, now_ms: i64) -> bool {
        match self.state {
            TimerState::Running | TimerState::Completed => false,
            TimerState::Idle | TimerState::Paused => {
                self.state = TimerState::Running;
                self.started_at = Some(now_ms);
                self.remaining_at_start = self.remaining_ms;
                true
            }
        }
    }

    /// Advance by one tick of `resolution_ms`.
    ///
    /// Returns `None` if the timer is not running. A timer that reaches
    /// zero transitions to [`TimerState::Completed`] and never ticks again.
    pub const fn tick(&mut self, resolution_ms: u64) -> Option<TimerStep> {
        if !self.is_running() {
            return None;
        }
        self.remaining_ms = self.remaining_ms.saturating_sub(resolution_ms);
        if self.remaining_ms == 0 {
            self.state = TimerState::Completed;
            self.started_at = None;
            Some(TimerStep::Completed)
        } else {
            Some(TimerStep::Ticked(self.remaining_ms))
        }
    }

    /// Stop ticking, keeping the remaining time. Returns `true` if the
    /// timer was running.
    pub const fn pause(&mut self) -> bool {
        if self.is_running() {
            self.state = TimerState::Paused;
            self.started_at = None;
            true
        } else {
            false
        }
    }

    /// Continue counting down from the preserved remaining time.
    ///
    /// No-op (returns `false`) if the timer is already running or has no
    /// time left.
    pub const fn resume(&mut self, now_ms: i64) -> bool {
        if self.is_running() || self.remaining_ms == 0 {
            return false;
        }
        self.start(now_ms)
    }

    /// Stop ticking and return to `Idle` with the full duration.
    pub const fn reset(&mut self) {
        self.state = TimerState::Idle;
        self.remaining_ms = self.duration_ms;
        self.remaining_at_start = self.duration_ms;
        self.started_at = None;
    }

    /// The instant from which the current `remaining_ms` counts down.
    ///
    /// This is the run's start instant shifted forward by the time already
    /// ticked off, so `now - anchor` is the time not yet reflected in
    /// `remaining_ms`. `None` unless running.
    pub const fn countdown_anchor(&self) -> Option<i64> {
        match self.started_at {
            Some(started_at) if self.is_running() => {
                let ticked = self.remaining_at_start.saturating_sub(self.remaining_ms);
                Some(started_at.saturating_add_unsigned(ticked))
            }
            _ => None,
        }
    }
}
