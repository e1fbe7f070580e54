//! Time windows and batch sizes that drive the lifecycle.

use chrono::TimeDelta;
use rentora_config::SweepsConfig;
use std::time::Duration;

/// Lifecycle timing, derived from [`SweepsConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecyclePolicy {
    /// Age at which an unapproved or unpaid booking expires.
    pub pending_expiry: TimeDelta,
    /// Lead time for upcoming and return-due reminders.
    pub reminder_lead: TimeDelta,
    /// Time after `end_date` before auto-completion is considered.
    pub inspection_grace: TimeDelta,
    pub payment_release_delay: Duration,
    /// Bookings selected per sweep query.
    pub batch_size: usize,
    /// Scheduled notifications claimed per flush tick.
    pub flush_batch_size: usize,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self::from(&SweepsConfig::default())
    }
}

impl From<&SweepsConfig> for LifecyclePolicy {
    fn from(config: &SweepsConfig) -> Self {
        Self {
            pending_expiry: minutes(config.pending_expiry_mins),
            reminder_lead: hours(config.reminder_lead_hours),
            inspection_grace: hours(config.inspection_grace_hours),
            payment_release_delay: Duration::from_secs(config.payment_release_delay_secs),
            batch_size: config.batch_size,
            flush_batch_size: config.flush_batch_size,
        }
    }
}

fn minutes(value: u64) -> TimeDelta {
    i64::try_from(value)
        .ok()
        .and_then(TimeDelta::try_minutes)
        .unwrap_or(TimeDelta::MAX)
}

fn hours(value: u64) -> TimeDelta {
    i64::try_from(value)
        .ok()
        .and_then(TimeDelta::try_hours)
        .unwrap_or(TimeDelta::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let policy = LifecyclePolicy::default();
        assert_eq!(policy.pending_expiry, TimeDelta::minutes(30));
        assert_eq!(policy.reminder_lead, TimeDelta::hours(24));
        assert_eq!(policy.inspection_grace, TimeDelta::hours(48));
        assert_eq!(policy.payment_release_delay, Duration::from_secs(5));
        assert_eq!(policy.flush_batch_size, 100);
    }

    #[test]
    fn test_out_of_range_saturates() {
        assert_eq!(hours(u64::MAX), TimeDelta::MAX);
    }
}
