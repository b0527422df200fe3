//! Session observer that writes to a terminal.
//!
//! Log lines are written to the wrapped writer as they arrive, and the most
//! recent `max_log_entries` lines are kept in memory. Per-tick countdowns,
//! action results, and unlock keys only reach the `debug` tracing level;
//! the session already logs a readable line for each of them that matters.

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::io::Write;

use chrono::{DateTime, Local};
use skyguild_core::config::GameConfig;
use skyguild_core::observer::SessionObserver;
use skyguild_core::persistence::format_duration;
use skyguild_core::runner::StatusReport;
use skyguild_core::session::ActionError;
use skyguild_types::{SaveSummary, TimerId, UnlockKey};
use tracing::{debug, warn};

/// Observer that prints session output and keeps a bounded log.
pub struct ConsoleObserver<W: Write + Send> {
    out: W,
    recent: VecDeque<String>,
    max_entries: usize,
}

impl<W: Write + Send> ConsoleObserver<W> {
    /// Create an observer writing to `out`, keeping at most `max_entries`
    /// log lines.
    pub fn new(out: W, max_entries: usize) -> Self {
        Self {
            out,
            recent: VecDeque::with_capacity(max_entries.min(256)),
            max_entries,
        }
    }

    /// Write a line that is not part of the session log (status, help).
    pub fn print(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{text}") {
            warn!(error = %e, "console write failed");
        }
    }

    fn remember(&mut self, text: &str) {
        if self.max_entries == 0 {
            return;
        }
        while self.recent.len() >= self.max_entries {
            self.recent.pop_front();
        }
        self.recent.push_back(text.to_owned());
    }
}

impl<W: Write + Send> SessionObserver for ConsoleObserver<W> {
    fn on_tick(&mut self, timer: &TimerId, remaining_ms: u64) {
        debug!(timer = %timer, remaining_ms, "tick");
    }

    fn on_action_result(&mut self, action: &str, result: Result<(), &ActionError>) {
        match result {
            Ok(()) => debug!(action, "action accepted"),
            Err(e) => debug!(action, error = %e, "action rejected"),
        }
    }

    fn on_unlock_changed(&mut self, keys: &[UnlockKey]) {
        for key in keys {
            debug!(key = %key, "unlocked");
        }
    }

    fn on_log_message(&mut self, text: &str) {
        self.remember(text);
        let stamp = Local::now().format("%H:%M:%S");
        self.print(&format!("[{stamp}] {text}"));
    }
}

/// Render a status report as a multi-line block.
pub fn render_status(status: &StatusReport, config: &GameConfig) -> String {
    let mut out = String::new();
    let ledger = &status.ledger;

    let _ = writeln!(
        out,
        "coins {} (earned {})   guild {}/{}   airship {}%   played {}{}",
        ledger.currency,
        ledger.total_currency_earned,
        ledger.guildmates,
        ledger.max_guildmates,
        status.airship.percent(),
        format_duration(status.play_time_ms),
        if status.suspended { "   [paused]" } else { "" },
    );

    let _ = writeln!(out, "resources:");
    for (id, quantity) in ledger.raw.iter().chain(&ledger.refined) {
        let _ = writeln!(out, "  {:<12} {quantity}", config.resource_name(id.as_str()));
    }

    if !status.features.is_empty() {
        let features: Vec<&str> = status.features.iter().map(|f| f.as_str()).collect();
        let _ = writeln!(out, "features: {}", features.join(", "));
    }

    if !status.timers.is_empty() {
        let _ = writeln!(out, "timers:");
        for timer in &status.timers {
            let label = config
                .resolve_timer(&timer.id)
                .map_or_else(|| timer.id.to_string(), |action| config.action_label(&action));
            let _ = writeln!(
                out,
                "  {label:<20} {} left",
                format_duration(timer.remaining_ms)
            );
        }
    }

    if !status.available.is_empty() {
        let actions: Vec<String> = status.available.iter().map(ToString::to_string).collect();
        let _ = writeln!(out, "available: {}", actions.join(" "));
    }

    match &status.next_objective {
        Some(objective) => {
            let _ = write!(out, "next: {objective}");
        }
        None => {
            let _ = write!(out, "next: every milestone reached");
        }
    }
    out
}

/// Render a stored-save summary as one line.
pub fn render_summary(summary: &SaveSummary) -> String {
    let saved_at = DateTime::from_timestamp_millis(summary.saved_at).map_or_else(
        || summary.saved_at.to_string(),
        |at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
    );
    format!(
        "save v{} from {saved_at}: {} guildmates, {} coins, played {}, {} timers",
        summary.version,
        summary.guildmates,
        summary.currency,
        format_duration(summary.play_time_ms),
        summary.timers,
    )
}
