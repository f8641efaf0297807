use chrono::{DateTime, Local};
use cobalt_stomp::ServerError;
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

/// Maximum number of messages kept for the session report
pub const MAX_MESSAGES: usize = 1000;

/// One live subscription and what it has received
#[derive(Debug, Clone)]
pub struct SubStats {
    pub destination: String,
    pub message_count: u64,
}

/// A received message, as shown in the report
#[derive(Debug, Clone)]
pub struct DisplayMessage {
    pub timestamp: DateTime<Local>,
    pub destination: String,
    pub body: String,
}

/// Session bookkeeping shared between the tick loop and the client's
/// handlers. Everything runs on one thread, so `Rc<RefCell<_>>` is enough.
pub struct AppState {
    pub start_time: DateTime<Local>,
    pub connected_at: Option<DateTime<Local>>,

    pub host: String,
    pub user: String,
    pub heartbeat_interval_ms: u64,

    /// Subscription id -> stats
    pub subscriptions: BTreeMap<usize, SubStats>,
    /// Messages received on subscriptions that were later removed
    pub retired_message_count: u64,

    pub messages: VecDeque<DisplayMessage>,
    pub last_error: Option<ServerError>,
    pub receipts: u64,
}

impl AppState {
    pub fn new(host: String, user: String) -> Self {
        Self {
            start_time: Local::now(),
            connected_at: None,
            host,
            user,
            heartbeat_interval_ms: 0,
            subscriptions: BTreeMap::new(),
            retired_message_count: 0,
            messages: VecDeque::with_capacity(MAX_MESSAGES),
            last_error: None,
            receipts: 0,
        }
    }

    pub fn register_subscription(&mut self, id: usize, destination: &str) {
        self.subscriptions.insert(
            id,
            SubStats {
                destination: destination.to_string(),
                message_count: 0,
            },
        );
    }

    /// Forget subscription `id`, keeping its message count in the totals.
    pub fn remove_subscription(&mut self, id: usize) -> Option<SubStats> {
        let stats = self.subscriptions.remove(&id)?;
        self.retired_message_count += stats.message_count;
        Some(stats)
    }

    pub fn record_message(&mut self, id: usize, body: &str) {
        let destination = match self.subscriptions.get_mut(&id) {
            Some(stats) => {
                stats.message_count += 1;
                stats.destination.clone()
            }
            None => format!("sub-{}", id),
        };

        self.messages.push_back(DisplayMessage {
            timestamp: Local::now(),
            destination,
            body: body.to_string(),
        });
        while self.messages.len() > MAX_MESSAGES {
            self.messages.pop_front();
        }
    }

    pub fn total_message_count(&self) -> u64 {
        self.retired_message_count
            + self
                .subscriptions
                .values()
                .map(|s| s.message_count)
                .sum::<u64>()
    }

    pub fn clear_messages(&mut self) {
        self.messages.clear();
    }

    /// Session report, optionally followed by the message history.
    pub fn generate_summary(&self, include_messages: bool) -> String {
        let end_time = Local::now();
        let total_secs = end_time.signed_duration_since(self.start_time).num_seconds();

        let rule = "═".repeat(79);
        let mut lines = vec![
            rule.clone(),
            "  cobalt-stomp Session Report".to_string(),
            rule.clone(),
            format!("  Host:       {}", self.host),
            format!("  User:       {}", self.user),
            format!("  Started:    {}", self.start_time.format("%Y-%m-%d %H:%M:%S")),
            format!("  Ended:      {}", end_time.format("%Y-%m-%d %H:%M:%S")),
            format!("  Duration:   {}m {}s", total_secs / 60, total_secs % 60),
            format!("  Heartbeat:  {} ms", self.heartbeat_interval_ms),
            String::new(),
            "  Subscriptions:".to_string(),
        ];

        let width = self
            .subscriptions
            .values()
            .map(|s| s.destination.len())
            .max()
            .unwrap_or(20)
            .min(40);
        for (id, stats) in &self.subscriptions {
            lines.push(format!(
                "    {:>2} {:width$} {:>6}",
                id,
                truncate_str(&stats.destination, width),
                stats.message_count,
                width = width
            ));
        }
        lines.push(format!("    {:width$} {:>6}", "Total", self.total_message_count(), width = width + 3));
        lines.push(format!("  Receipts:   {}", self.receipts));
        if let Some(err) = &self.last_error {
            lines.push(format!("  Last error: {}", err));
        }

        if include_messages && !self.messages.is_empty() {
            lines.push(String::new());
            lines.push("  Message History".to_string());
            lines.push("─".repeat(79));
            for msg in &self.messages {
                let prefix = format!("  {} [{}] ", msg.timestamp.format("%H:%M:%S"), msg.destination);
                let body_width = 80usize.saturating_sub(prefix.chars().count());
                lines.push(format!("{}{}", prefix, truncate_str(&msg.body, body_width)));
            }
        }

        lines.push(rule);
        lines.join("\n")
    }
}

/// Truncate to `max_len` characters, marking the cut with "..."
fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        ".".repeat(max_len)
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}

pub type SharedState = Rc<RefCell<AppState>>;

pub fn new_shared_state(host: String, user: String) -> SharedState {
    Rc::new(RefCell::new(AppState::new(host, user)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_survive_unsubscribe() {
        let mut state = AppState::new("h:1".into(), "u".into());
        state.register_subscription(0, "/q/a");
        state.record_message(0, "one");
        state.record_message(0, "two");
        state.remove_subscription(0);
        state.register_subscription(0, "/q/b");
        state.record_message(0, "three");
        assert_eq!(state.total_message_count(), 3);
        assert_eq!(state.messages.back().map(|m| m.destination.as_str()), Some("/q/b"));
    }

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(truncate_str("héllo wörld", 8), "héllo...");
        assert_eq!(truncate_str("short", 8), "short");
        assert_eq!(truncate_str("abcdef", 2), "..");
    }

    #[test]
    fn summary_lists_subscriptions() {
        let mut state = AppState::new("broker:61613".into(), "guest".into());
        state.register_subscription(3, "/topic/t");
        state.record_message(3, "x");
        let summary = state.generate_summary(true);
        assert!(summary.contains("/topic/t"));
        assert!(summary.contains("Host:       broker:61613"));
        assert!(summary.contains("[/topic/t] x"));
    }
}
