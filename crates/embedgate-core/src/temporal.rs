//! # Temporal Types
//!
//! Clock abstraction and fixed-window arithmetic for the gateway.
//!
//! All time is UTC milliseconds since the Unix epoch. Ticket timestamps are
//! supplied in milliseconds by embedders; rate-limit windows are aligned on
//! whole seconds. Components take a [`Clock`] rather than calling
//! `Utc::now()` directly so that window boundaries and ticket ages are
//! deterministic under test.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

/// Source of the current time.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;

    /// Current time as a `DateTime<Utc>`.
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.now_millis())
            .single()
            .unwrap_or_else(Utc::now)
    }
}

/// Wall clock backed by `chrono::Utc::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Manually driven clock. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    millis: Arc<AtomicI64>,
}

impl ManualClock {
    /// Start the clock at `millis`.
    pub fn new(millis: i64) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(millis)),
        }
    }

    /// Jump to an absolute instant.
    pub fn set(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    /// Move forward by `delta` milliseconds.
    pub fn advance(&self, delta: i64) {
        self.millis.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}

/// Fixed, epoch-aligned counting window.
///
/// With the default 60-second size, windows start on the minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedWindow {
    size_secs: i64,
}

/// Position of an instant within its window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSlot {
    /// Window start, seconds since the epoch.
    pub start: i64,
    /// Whole seconds until the next window begins, in `1..=size`.
    pub retry_after: u64,
}

impl FixedWindow {
    /// Default window size, in seconds.
    pub const DEFAULT_SECS: u64 = 60;

    /// Largest supported window: one day.
    pub const MAX_SECS: u64 = 86_400;

    /// A window of `size_secs` seconds, clamped to `1..=MAX_SECS`.
    pub fn new(size_secs: u64) -> Self {
        let size = size_secs.clamp(1, Self::MAX_SECS) as i64;
        Self { size_secs: size }
    }

    /// Window size in seconds.
    pub fn size_secs(&self) -> u64 {
        self.size_secs as u64
    }

    /// Locate the window containing `now_millis`.
    pub fn slot(&self, now_millis: i64) -> WindowSlot {
        let now_secs = now_millis.div_euclid(1000);
        let start = now_secs - now_secs.rem_euclid(self.size_secs);
        let next = start.saturating_add(self.size_secs);
        // Round the remaining time up so callers never retry early.
        let remaining_ms = next.saturating_mul(1000).saturating_sub(now_millis);
        let retry_after = (remaining_ms.saturating_add(999) / 1000).clamp(1, self.size_secs);
        WindowSlot {
            start,
            retry_after: retry_after as u64,
        }
    }
}

impl Default for FixedWindow {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SECS)
    }
}
