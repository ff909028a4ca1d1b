//! Deadline and backoff bookkeeping for the acquisition poll loop.

use std::time::{Duration, Instant};

/// Polling cadence for contended acquisitions.
///
/// The first retry waits `interval`; each further retry doubles the wait up
/// to `max_interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_interval: Duration,
}

impl PollSettings {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(10);
    pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_millis(200);

    pub fn new(interval: Duration, max_interval: Duration) -> Self {
        Self {
            interval,
            max_interval: max_interval.max(interval),
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL, Self::DEFAULT_MAX_INTERVAL)
    }
}

/// Bounded exponential backoff.
#[derive(Debug)]
pub(crate) struct Backoff {
    next: Duration,
    max: Duration,
}

impl Backoff {
    pub(crate) fn new(settings: PollSettings) -> Self {
        Self {
            next: settings.interval,
            max: settings.max_interval,
        }
    }

    pub(crate) fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = self.next.saturating_mul(2).min(self.max);
        delay
    }
}

/// Monotonic deadline measured from the start of an acquisition.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    start: Instant,
    at: Option<Instant>,
}

impl Deadline {
    /// `at` is `None` when `timeout` does not fit on the clock, which makes
    /// the wait unbounded.
    pub(crate) fn after(timeout: Duration) -> Self {
        let start = Instant::now();
        Self {
            start,
            at: start.checked_add(timeout),
        }
    }

    pub(crate) fn at(&self) -> Option<Instant> {
        self.at
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// How long to sleep before the next attempt, or `None` once expired.
    pub(crate) fn sleep_for(&self, wanted: Duration) -> Option<Duration> {
        let Some(at) = self.at else {
            return Some(wanted);
        };
        let remaining = at.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            None
        } else {
            Some(wanted.min(remaining))
        }
    }
}
