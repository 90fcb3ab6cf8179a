//! Process-wide monotonic clock (component A).
//!
//! All internal timeouts, retention windows and orderings are expressed against this clock,
//! never against wall time, so a stepped or NTP-corrected system clock can't reorder events.

use std::sync::OnceLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

static REAL_TIME_REF: OnceLock<(Instant, DateTime<Utc>)> = OnceLock::new();
static PROCESS_START: OnceLock<Instant> = OnceLock::new();

/// A handle onto the process-wide monotonic clock. Cheap to clone; carries no state of its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct Clock;

impl Clock {
    pub fn new() -> Self {
        Clock
    }

    /// Current monotonic instant.
    pub fn now(&self) -> Instant {
        Instant::now()
    }

    /// Duration elapsed since `t`.
    pub fn since(&self, t: Instant) -> Duration {
        self.now().saturating_duration_since(t)
    }

    /// Seconds since this clock's own zero point, latched the first time any clock handle is
    /// asked for it. Not wall time.
    pub fn unix(&self) -> f64 {
        let start = *PROCESS_START.get_or_init(Instant::now);
        self.now().saturating_duration_since(start).as_secs_f64()
    }

    /// Latch a wall-clock reference against the current monotonic instant. May be set exactly
    /// once; subsequent calls are no-ops.
    pub fn set_real_time_reference(&self, wall_time: DateTime<Utc>) {
        let _ = REAL_TIME_REF.set((Instant::now(), wall_time));
    }

    pub fn has_real_time_reference(&self) -> bool {
        REAL_TIME_REF.get().is_some()
    }

    /// Best-effort current wall time, derived from the latched reference plus monotonic drift
    /// since it was set. Falls back to `Utc::now()` if no reference has been set.
    pub fn wall_time(&self, at: Instant) -> DateTime<Utc> {
        match REAL_TIME_REF.get() {
            Some((ref_instant, ref_wall)) => {
                let delta = at.saturating_duration_since(*ref_instant);
                *ref_wall + chrono::Duration::from_std(delta).unwrap_or_default()
            }
            None => Utc::now(),
        }
    }

    /// English relative-time rendering, e.g. "3 seconds ago" / "in 3 seconds" / "now".
    pub fn humanize(&self, t: Instant) -> String {
        let now = self.now();
        if t > now {
            let d = t - now;
            if d < Duration::from_millis(500) {
                "now".to_string()
            } else {
                format!("in {} seconds", d.as_secs())
            }
        } else {
            let d = now - t;
            if d < Duration::from_millis(500) {
                "now".to_string()
            } else {
                format!("{} seconds ago", d.as_secs())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn humanize_now_is_now() {
        let clock = Clock::new();
        let t = clock.now();
        assert_eq!(clock.humanize(t), "now");
    }

    #[test]
    fn unix_advances_with_elapsed_time() {
        let clock = Clock::new();
        let first = clock.unix();
        std::thread::sleep(Duration::from_millis(5));
        let second = clock.unix();
        assert!(second > first);
    }

    #[test]
    fn humanize_past() {
        let clock = Clock::new();
        let t = clock.now() - Duration::from_secs(5);
        assert_eq!(clock.humanize(t), "5 seconds ago");
    }
}
