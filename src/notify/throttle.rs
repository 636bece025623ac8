// src/notify/throttle.rs
use chrono::{DateTime, Duration as ChronoDuration, Utc};

pub const DEFAULT_WINDOW_SECS: i64 = 24 * 3600;

/// Rolling-window gate on outbound alerts.
/// - First alert always allowed.
/// - Afterwards only once `window` has fully elapsed since the last dispatch.
/// - State moves only through `record_dispatch`.
#[derive(Debug, Clone)]
pub struct Throttle {
    window: ChronoDuration,
    last_sent_at: Option<DateTime<Utc>>,
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SECS)
    }
}

impl Throttle {
    /// `window_secs` < 0 is treated as 0 (no throttling).
    pub fn new(window_secs: i64) -> Self {
        Self {
            window: ChronoDuration::seconds(window_secs.max(0)),
            last_sent_at: None,
        }
    }

    /// Does NOT mutate state.
    pub fn permits(&self, now: DateTime<Utc>) -> bool {
        match self.last_sent_at {
            None => true,
            Some(ts) => now.signed_duration_since(ts) > self.window,
        }
    }

    pub fn record_dispatch(&mut self, now: DateTime<Utc>) {
        self.last_sent_at = Some(now);
    }

    /// Check and record in one step; true means the caller owns this window.
    pub fn try_claim(&mut self, now: DateTime<Utc>) -> bool {
        if !self.permits(now) {
            return false;
        }
        self.record_dispatch(now);
        true
    }

    pub fn last_sent_at(&self) -> Option<DateTime<Utc>> {
        self.last_sent_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 14, 9, 0, 0).unwrap()
    }

    #[test]
    fn first_alert_passes() {
        let th = Throttle::default();
        assert!(th.permits(t0()));
    }

    #[test]
    fn inside_window_blocked() {
        let mut th = Throttle::default();
        assert!(th.try_claim(t0()));
        assert!(!th.permits(t0() + ChronoDuration::minutes(10)));
        assert!(!th.permits(t0() + ChronoDuration::hours(24)));
    }

    #[test]
    fn after_window_passes() {
        let mut th = Throttle::default();
        assert!(th.try_claim(t0()));
        assert!(th.try_claim(t0() + ChronoDuration::hours(25)));
        assert_eq!(th.last_sent_at(), Some(t0() + ChronoDuration::hours(25)));
    }

    #[test]
    fn negative_window_never_blocks() {
        let mut th = Throttle::new(-5);
        assert!(th.try_claim(t0()));
        assert!(th.try_claim(t0() + ChronoDuration::seconds(1)));
    }
}
