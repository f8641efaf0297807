use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

use tracing::debug;

/// Heartbeat interval the client advertises when none is configured.
pub const DEFAULT_HEARTBEAT_MS: u64 = 10_000;

/// Millisecond time source polled by the client.
///
/// Only differences between readings matter, so any monotonic origin works.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Monotonic clock counting from the moment it was created.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Clock advanced by hand. Clones share the same reading, so a host (or a
/// test) can keep one handle and move time forward under a running client.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Rc::new(Cell::new(start_ms)),
        }
    }

    pub fn set(&self, now_ms: u64) {
        self.now.set(now_ms);
    }

    pub fn advance(&self, by_ms: u64) {
        self.now.set(self.now.get().saturating_add(by_ms));
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

/// Parse the STOMP `heart-beat` header value (format: "cx,cy").
///
/// Returns `(cx, cy)` in milliseconds. Missing or invalid fields default to
/// `0`.
pub fn parse_heartbeat_header(header: &str) -> (u64, u64) {
    let mut parts = header.split(',');
    let cx = parts
        .next()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(0);
    let cy = parts
        .next()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(0);
    (cx, cy)
}

/// Outgoing heartbeat bookkeeping, polled once per client tick.
#[derive(Debug, Clone)]
pub struct HeartbeatManager {
    preferred_ms: u64,
    negotiated_ms: u64,
    last_sent_ms: u64,
}

impl HeartbeatManager {
    /// Start with heartbeats disabled until a CONNECTED frame negotiates
    /// them.
    pub fn new(preferred_ms: u64, now_ms: u64) -> Self {
        Self {
            preferred_ms,
            negotiated_ms: 0,
            last_sent_ms: now_ms,
        }
    }

    pub fn preferred_ms(&self) -> u64 {
        self.preferred_ms
    }

    /// Negotiated send interval; `0` means heartbeats are disabled.
    pub fn interval_ms(&self) -> u64 {
        self.negotiated_ms
    }

    pub fn last_sent_ms(&self) -> u64 {
        self.last_sent_ms
    }

    /// Apply the server's `heart-beat` header from a CONNECTED frame.
    ///
    /// The client never heartbeats more often than it advertised: the
    /// interval becomes `max(server cx, preferred)`. An absent or empty
    /// header leaves the current interval untouched.
    pub fn negotiate(&mut self, server_header: Option<&str>) -> u64 {
        if let Some(header) = server_header.filter(|h| !h.is_empty()) {
            let (server_cx, _) = parse_heartbeat_header(header);
            self.negotiated_ms = server_cx.max(self.preferred_ms);
            debug!(
                server = header,
                interval_ms = self.negotiated_ms,
                "negotiated heartbeat interval"
            );
        }
        self.negotiated_ms
    }

    /// Whether a heartbeat must be sent now.
    pub fn is_due(&self, now_ms: u64) -> bool {
        self.negotiated_ms != 0 && now_ms.saturating_sub(self.last_sent_ms) > self.negotiated_ms
    }

    /// Note that a frame (any frame) went out at `now_ms`.
    pub fn record_sent(&mut self, now_ms: u64) {
        self.last_sent_ms = now_ms;
    }

    /// Forget the negotiated interval, e.g. after the session ended.
    pub fn reset(&mut self) {
        self.negotiated_ms = 0;
    }
}
