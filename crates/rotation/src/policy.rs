//! The rotation-due decision.

use chrono::{DateTime, Duration, Utc};

/// When to rotate: a fixed interval in days, immutable at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPolicy {
    interval_days: u32,
}

impl RotationPolicy {
    pub fn new(interval_days: u32) -> Self {
        Self { interval_days }
    }

    pub fn interval_days(self) -> u32 {
        self.interval_days
    }

    /// Whether a new rotation cycle is due.
    ///
    /// Due when the keys have never been rotated, or strictly after
    /// `last_rotated_at + interval_days`. Pure; exact at second granularity
    /// over day-sized intervals.
    pub fn is_due(self, last_rotated_at: Option<i64>, now: DateTime<Utc>) -> bool {
        let Some(last) = last_rotated_at else {
            return true;
        };
        // A stored timestamp outside chrono's range cannot be trusted;
        // rotate rather than wait forever.
        let Some(last) = DateTime::from_timestamp(last, 0) else {
            return true;
        };
        now > last + Duration::days(i64::from(self.interval_days))
    }
}
