//! Presentation seam for a running session.
//!
//! The session never builds UI. Everything a front end needs to show is
//! pushed through [`SessionObserver`]; the core ships a no-op
//! implementation and [`EventLog`], which records [`SessionEvent`]s.

use skyguild_types::{SessionEvent, TimerId, UnlockKey};

use crate::session::ActionError;

/// Receives change notifications from a session.
pub trait SessionObserver: Send {
    /// A running timer advanced by one tick.
    fn on_tick(&mut self, timer: &TimerId, remaining_ms: u64);

    /// A player request was accepted or rejected.
    fn on_action_result(&mut self, action: &str, result: Result<(), &ActionError>);

    /// Unlock state changed.
    fn on_unlock_changed(&mut self, keys: &[UnlockKey]);

    /// A human-readable log line.
    fn on_log_message(&mut self, text: &str);
}

/// An observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl SessionObserver for NoOpObserver {
    fn on_tick(&mut self, _timer: &TimerId, _remaining_ms: u64) {}

    fn on_action_result(&mut self, _action: &str, _result: Result<(), &ActionError>) {}

    fn on_unlock_changed(&mut self, _keys: &[UnlockKey]) {}

    fn on_log_message(&mut self, _text: &str) {}
}

/// An observer that records every notification in order.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    /// Recorded events, oldest first.
    pub events: Vec<SessionEvent>,
}

impl EventLog {
    /// Create an empty log.
    pub const fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Recorded log lines, oldest first.
    pub fn messages(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                SessionEvent::Log { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Every unlock key reported so far, flattened.
    pub fn unlocked_keys(&self) -> Vec<&UnlockKey> {
        self.events
            .iter()
            .filter_map(|event| match event {
                SessionEvent::UnlockChanged { keys } => Some(keys),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// Recorded action failures as `(action, message)` pairs.
    pub fn failures(&self) -> Vec<(&str, &str)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                SessionEvent::ActionResult {
                    action,
                    error: Some(error),
                } => Some((action.as_str(), error.as_str())),
                _ => None,
            })
            .collect()
    }

    /// Number of tick notifications recorded.
    pub fn tick_count(&self) -> usize {
        self.events.iter().filter(|e| e.is_tick()).count()
    }

    /// Whether any log line contains `needle`.
    pub fn logged(&self, needle: &str) -> bool {
        self.messages().iter().any(|m| m.contains(needle))
    }

    /// Drop everything recorded so far.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl SessionObserver for EventLog {
    fn on_tick(&mut self, timer: &TimerId, remaining_ms: u64) {
        self.events.push(SessionEvent::Tick {
            timer: timer.clone(),
            remaining_ms,
        });
    }

    fn on_action_result(&mut self, action: &str, result: Result<(), &ActionError>) {
        self.events.push(SessionEvent::ActionResult {
            action: action.to_owned(),
            error: result.err().map(ToString::to_string),
        });
    }

    fn on_unlock_changed(&mut self, keys: &[UnlockKey]) {
        self.events.push(SessionEvent::UnlockChanged {
            keys: keys.to_vec(),
        });
    }

    fn on_log_message(&mut self, text: &str) {
        self.events.push(SessionEvent::Log {
            text: text.to_owned(),
        });
    }
}
