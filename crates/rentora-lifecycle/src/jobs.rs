//! Lifecycle job payloads and the producer handle that enqueues them.

use crate::policy::LifecyclePolicy;
use chrono::{DateTime, Utc};
use rentora_core::{Booking, BookingId, BookingMarker, ListingId};
use rentora_jobs::{EnqueueOptions, JobId, JobPayload, JobQueue, JobResult, PushOutcome};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const BOOKINGS_QUEUE: &str = "bookings";
pub const PAYMENTS_QUEUE: &str = "payments";
pub const SEARCH_QUEUE: &str = "search";

/// Cancel a booking still pending at `expires_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckExpiration {
    pub booking_id: BookingId,
    pub expires_at: DateTime<Utc>,
}

impl JobPayload for CheckExpiration {
    const JOB_TYPE: &'static str = "booking.check_expiration";
    const QUEUE: &'static str = BOOKINGS_QUEUE;

    fn dedup_key(&self) -> Option<String> {
        Some(format!("expire:{}", self.booking_id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReminderKind {
    /// Rental starts soon.
    Upcoming,
    /// Rental is under way.
    Ongoing,
    /// Return is due soon.
    ReturnDue,
}

impl ReminderKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upcoming => "UPCOMING",
            Self::Ongoing => "ONGOING",
            Self::ReturnDue => "RETURN_DUE",
        }
    }

    /// One-shot marker recording that this reminder went out.
    pub const fn marker(self) -> BookingMarker {
        match self {
            Self::Upcoming => BookingMarker::UpcomingReminder,
            Self::Ongoing => BookingMarker::OngoingReminder,
            Self::ReturnDue => BookingMarker::ReturnReminder,
        }
    }
}

impl fmt::Display for ReminderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReminder {
    pub booking_id: BookingId,
    #[serde(rename = "type")]
    pub kind: ReminderKind,
}

impl JobPayload for SendReminder {
    const JOB_TYPE: &'static str = "booking.send_reminder";
    const QUEUE: &'static str = BOOKINGS_QUEUE;

    fn dedup_key(&self) -> Option<String> {
        Some(format!("remind:{}:{}", self.kind.as_str(), self.booking_id))
    }
}

/// Complete a returned booking once inspection clears it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoComplete {
    pub booking_id: BookingId,
}

impl JobPayload for AutoComplete {
    const JOB_TYPE: &'static str = "booking.auto_complete";
    const QUEUE: &'static str = BOOKINGS_QUEUE;

    fn dedup_key(&self) -> Option<String> {
        Some(format!("complete:{}", self.booking_id))
    }
}

/// Release the held payment of a completed booking to its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleasePayment {
    pub booking_id: BookingId,
}

impl JobPayload for ReleasePayment {
    const JOB_TYPE: &'static str = "payment.release";
    const QUEUE: &'static str = PAYMENTS_QUEUE;

    fn dedup_key(&self) -> Option<String> {
        Some(format!("release:{}", self.booking_id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexOp {
    Upsert,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexListing {
    pub listing_id: ListingId,
    pub op: IndexOp,
}

impl JobPayload for IndexListing {
    const JOB_TYPE: &'static str = "search.index_listing";
    const QUEUE: &'static str = SEARCH_QUEUE;

    fn dedup_key(&self) -> Option<String> {
        let op = match self.op {
            IndexOp::Upsert => "upsert",
            IndexOp::Delete => "delete",
        };
        Some(format!("index:{op}:{}", self.listing_id))
    }
}

/// Producer handle for lifecycle jobs.
#[derive(Clone)]
pub struct LifecycleJobs {
    queue: JobQueue,
    policy: LifecyclePolicy,
}

impl LifecycleJobs {
    pub fn new(queue: JobQueue, policy: LifecyclePolicy) -> Self {
        Self { queue, policy }
    }

    pub fn policy(&self) -> &LifecyclePolicy {
        &self.policy
    }

    /// Schedules the expiration check for a new booking, due once the
    /// pending window has passed.
    pub async fn schedule_expiration(&self, booking: &Booking) -> JobResult<PushOutcome> {
        let expires_at = booking.created_at + self.policy.pending_expiry;
        let payload = CheckExpiration {
            booking_id: booking.id,
            expires_at,
        };
        let opts = EnqueueOptions::new().run_at(expires_at, self.queue.clock().now());
        self.queue.push_job(&payload, opts).await
    }

    /// Schedules a reminder; a `run_at` in the past runs immediately.
    pub async fn schedule_reminder(
        &self,
        booking_id: BookingId,
        kind: ReminderKind,
        run_at: DateTime<Utc>,
    ) -> JobResult<PushOutcome> {
        let opts = EnqueueOptions::new().run_at(run_at, self.queue.clock().now());
        self.queue
            .push_job(&SendReminder { booking_id, kind }, opts)
            .await
    }

    pub async fn schedule_auto_complete(&self, booking_id: BookingId) -> JobResult<PushOutcome> {
        self.queue
            .push_job(&AutoComplete { booking_id }, EnqueueOptions::new())
            .await
    }

    /// Enqueues the payment release after the configured settle delay.
    pub async fn schedule_payment_release(&self, booking_id: BookingId) -> JobResult<JobId> {
        let opts = EnqueueOptions::new().delay(self.policy.payment_release_delay);
        self.queue
            .enqueue_job(&ReleasePayment { booking_id }, opts)
            .await
    }

    pub async fn index_listing(&self, listing_id: ListingId, op: IndexOp) -> JobResult<JobId> {
        self.queue
            .enqueue_job(&IndexListing { listing_id, op }, EnqueueOptions::new())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use rentora_core::{BookingStatus, Clock, ManualClock, UserId};
    use rentora_jobs::InMemoryBroker;
    use std::sync::Arc;

    #[test]
    fn test_reminder_payload_wire_shape() {
        let payload = SendReminder {
            booking_id: BookingId::new(),
            kind: ReminderKind::ReturnDue,
        };
        let value = serde_json::to_value(payload).unwrap();
        assert_eq!(value["type"], "RETURN_DUE");
        assert!(value.get("bookingId").is_some());
    }

    #[test]
    fn test_dedup_keys_are_per_transition() {
        let booking_id = BookingId::new();
        let upcoming = SendReminder {
            booking_id,
            kind: ReminderKind::Upcoming,
        };
        let ret = SendReminder {
            booking_id,
            kind: ReminderKind::ReturnDue,
        };
        assert_ne!(upcoming.dedup_key(), ret.dedup_key());
        assert_eq!(
            ReleasePayment { booking_id }.dedup_key(),
            Some(format!("release:{booking_id}"))
        );
    }

    #[tokio::test]
    async fn test_expiration_is_delayed_until_window_passes() {
        let clock = Arc::new(ManualClock::starting_now());
        let broker = Arc::new(InMemoryBroker::new(100));
        let queue = JobQueue::new(broker.clone(), clock.clone(), 3);
        let jobs = LifecycleJobs::new(queue.clone(), LifecyclePolicy::default());

        let booking = Booking::new(
            BookingStatus::PendingPayment,
            clock.now(),
            clock.now() + TimeDelta::days(3),
            clock.now() + TimeDelta::days(5),
            UserId::new(),
            UserId::new(),
            ListingId::new(),
        );
        jobs.schedule_expiration(&booking).await.unwrap();

        let counts = queue.counts(BOOKINGS_QUEUE).await.unwrap();
        assert_eq!(counts.delayed, 1);
        assert_eq!(counts.waiting, 0);
    }
}
