//! Periodic sweeps.
//!
//! Each sweep re-selects its rows from storage on every tick, so a failed
//! or skipped tick only delays work. Follow-on jobs carry dedup keys, which
//! keeps overlapping ticks and the delayed per-booking jobs from admitting
//! duplicates.

use crate::jobs::{LifecycleJobs, ReminderKind};
use async_trait::async_trait;
use metrics::counter;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rentora_core::{
    Booking, BookingFilter, BookingId, BookingStatus, NotificationStatus, RatingSummary,
    SharedClock,
};
use rentora_jobs::{JobResult, PushOutcome, TriggerAction};
use rentora_notify::Notifier;
use rentora_repository::{BookingRepository, NotificationRepository, ReviewRepository};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const EXPIRATION: &str = "expiration";
pub const UPCOMING_REMINDERS: &str = "upcoming_reminders";
pub const RETURN_REMINDERS: &str = "return_reminders";
pub const AUTO_COMPLETION: &str = "auto_completion";
pub const RATING_RECONCILIATION: &str = "rating_reconciliation";
pub const NOTIFICATION_FLUSH: &str = "notification_flush";

fn record(sweep: &'static str, count: usize) {
    counter!("rentora_sweep_items_total", "sweep" => sweep).increment(count as u64);
    if count > 0 {
        info!(sweep, count, "Sweep finished");
    } else {
        debug!(sweep, "Sweep found nothing to do");
    }
}

/// Where a paged sweep resumes.
///
/// Each tick reads the page after the last row of the previous one and wraps
/// to the start after a short page, so rows that stay selected (a job that
/// keeps failing) cannot starve the rows ordered behind them.
#[derive(Default)]
struct SweepCursor(Mutex<Option<(DateTime<Utc>, BookingId)>>);

impl SweepCursor {
    async fn next_page(
        &self,
        bookings: &dyn BookingRepository,
        mut filter: BookingFilter,
    ) -> JobResult<Vec<Booking>> {
        filter.after = *self.0.lock();
        let page = bookings.find_bookings(&filter).await?;
        let full = filter.limit.is_some_and(|limit| page.len() >= limit);
        *self.0.lock() = if full {
            page.last().map(|b| (b.created_at, b.id))
        } else {
            None
        };
        Ok(page)
    }
}

/// Re-enqueues expiration checks for pending bookings past their window.
pub struct ExpirationSweep {
    bookings: Arc<dyn BookingRepository>,
    jobs: LifecycleJobs,
    clock: SharedClock,
    cursor: SweepCursor,
}

impl ExpirationSweep {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        jobs: LifecycleJobs,
        clock: SharedClock,
    ) -> Self {
        Self {
            bookings,
            jobs,
            clock,
            cursor: SweepCursor::default(),
        }
    }

    /// Returns the number of bookings selected.
    pub async fn run(&self) -> JobResult<usize> {
        let policy = self.jobs.policy();
        let filter = BookingFilter {
            created_before: Some(self.clock.now() - policy.pending_expiry),
            limit: Some(policy.batch_size),
            ..BookingFilter::with_statuses(BookingStatus::PENDING)
        };
        let stale = self.cursor.next_page(self.bookings.as_ref(), filter).await?;
        for booking in &stale {
            self.jobs.schedule_expiration(booking).await?;
        }
        Ok(stale.len())
    }
}

#[async_trait]
impl TriggerAction for ExpirationSweep {
    async fn fire(&self) -> JobResult<()> {
        record(EXPIRATION, self.run().await?);
        Ok(())
    }
}

/// Enqueues upcoming or return-due reminders for bookings entering the
/// reminder lead window.
pub struct ReminderSweep {
    bookings: Arc<dyn BookingRepository>,
    jobs: LifecycleJobs,
    clock: SharedClock,
    kind: ReminderKind,
    cursor: SweepCursor,
}

impl ReminderSweep {
    pub fn upcoming(
        bookings: Arc<dyn BookingRepository>,
        jobs: LifecycleJobs,
        clock: SharedClock,
    ) -> Self {
        Self {
            bookings,
            jobs,
            clock,
            kind: ReminderKind::Upcoming,
            cursor: SweepCursor::default(),
        }
    }

    pub fn return_due(
        bookings: Arc<dyn BookingRepository>,
        jobs: LifecycleJobs,
        clock: SharedClock,
    ) -> Self {
        Self {
            bookings,
            jobs,
            clock,
            kind: ReminderKind::ReturnDue,
            cursor: SweepCursor::default(),
        }
    }

    fn name(&self) -> &'static str {
        match self.kind {
            ReminderKind::ReturnDue => RETURN_REMINDERS,
            ReminderKind::Upcoming | ReminderKind::Ongoing => UPCOMING_REMINDERS,
        }
    }

    fn filter(&self) -> BookingFilter {
        let policy = self.jobs.policy();
        let now = self.clock.now();
        let window = Some((now, now + policy.reminder_lead));
        let base = BookingFilter {
            without_marker: Some(self.kind.marker()),
            limit: Some(policy.batch_size),
            ..BookingFilter::default()
        };
        match self.kind {
            ReminderKind::ReturnDue => BookingFilter {
                statuses: vec![BookingStatus::InProgress],
                end_between: window,
                ..base
            },
            ReminderKind::Upcoming | ReminderKind::Ongoing => BookingFilter {
                statuses: vec![BookingStatus::Confirmed],
                start_between: window,
                ..base
            },
        }
    }

    /// Returns the number of reminders enqueued; bookings whose reminder is
    /// already queued are not counted.
    pub async fn run(&self) -> JobResult<usize> {
        let now = self.clock.now();
        let due = self
            .cursor
            .next_page(self.bookings.as_ref(), self.filter())
            .await?;
        let mut enqueued = 0;
        for booking in &due {
            let outcome = self.jobs.schedule_reminder(booking.id, self.kind, now).await?;
            if matches!(outcome, PushOutcome::Enqueued(_)) {
                enqueued += 1;
            }
        }
        Ok(enqueued)
    }
}

#[async_trait]
impl TriggerAction for ReminderSweep {
    async fn fire(&self) -> JobResult<()> {
        record(self.name(), self.run().await?);
        Ok(())
    }
}

/// Enqueues auto-completion for returned bookings past the inspection grace.
pub struct AutoCompletionSweep {
    bookings: Arc<dyn BookingRepository>,
    jobs: LifecycleJobs,
    clock: SharedClock,
    cursor: SweepCursor,
}

impl AutoCompletionSweep {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        jobs: LifecycleJobs,
        clock: SharedClock,
    ) -> Self {
        Self {
            bookings,
            jobs,
            clock,
            cursor: SweepCursor::default(),
        }
    }

    /// Returns the number of bookings selected.
    pub async fn run(&self) -> JobResult<usize> {
        let policy = self.jobs.policy();
        let filter = BookingFilter {
            end_before: Some(self.clock.now() - policy.inspection_grace),
            limit: Some(policy.batch_size),
            ..BookingFilter::with_statuses([BookingStatus::AwaitingReturnInspection])
        };
        let candidates = self.cursor.next_page(self.bookings.as_ref(), filter).await?;
        for booking in &candidates {
            self.jobs.schedule_auto_complete(booking.id).await?;
        }
        Ok(candidates.len())
    }
}

#[async_trait]
impl TriggerAction for AutoCompletionSweep {
    async fn fire(&self) -> JobResult<()> {
        record(AUTO_COMPLETION, self.run().await?);
        Ok(())
    }
}

/// Repairs rating summaries that drifted from their reviews.
///
/// Summaries are maintained incrementally on every review insert; this sweep
/// recomputes each from its reviews and rewrites only the ones that differ.
pub struct RatingReconciliationSweep {
    reviews: Arc<dyn ReviewRepository>,
}

impl RatingReconciliationSweep {
    pub fn new(reviews: Arc<dyn ReviewRepository>) -> Self {
        Self { reviews }
    }

    /// Returns the number of summaries repaired.
    pub async fn run(&self) -> JobResult<usize> {
        let mut repaired = 0;
        for subject in self.reviews.rated_subjects().await? {
            let reviews = self.reviews.reviews_for_subject(subject).await?;
            let expected = RatingSummary::from_ratings(reviews.iter().map(|r| r.rating));
            let stored = self.reviews.rating_summary(subject).await?;
            if stored == Some(expected) {
                continue;
            }
            warn!(
                subject = %subject,
                stored = ?stored,
                expected = ?expected,
                "Rating summary drifted, repairing"
            );
            self.reviews.store_rating_summary(subject, expected).await?;
            repaired += 1;
        }
        Ok(repaired)
    }
}

#[async_trait]
impl TriggerAction for RatingReconciliationSweep {
    async fn fire(&self) -> JobResult<()> {
        record(RATING_RECONCILIATION, self.run().await?);
        Ok(())
    }
}

/// Hands due scheduled notifications to the delivery queue.
///
/// Each notification is claimed (`Scheduled` to `Pending`) before its
/// delivery job is enqueued, so the next tick cannot select it again. A
/// failed enqueue returns the claim.
pub struct NotificationFlushSweep {
    notifications: Arc<dyn NotificationRepository>,
    notifier: Notifier,
    clock: SharedClock,
    batch_size: usize,
}

impl NotificationFlushSweep {
    pub fn new(
        notifications: Arc<dyn NotificationRepository>,
        notifier: Notifier,
        clock: SharedClock,
        batch_size: usize,
    ) -> Self {
        Self {
            notifications,
            notifier,
            clock,
            batch_size,
        }
    }

    /// Returns the number of delivery jobs enqueued.
    pub async fn run(&self) -> JobResult<usize> {
        let due = self
            .notifications
            .find_due_scheduled(self.clock.now(), self.batch_size)
            .await?;

        let mut enqueued = 0;
        for notification in due {
            let id = notification.id;
            let claimed = self
                .notifications
                .transition_status(id, NotificationStatus::Scheduled, NotificationStatus::Pending)
                .await?;
            if !claimed {
                continue;
            }

            if let Err(e) = self.notifier.deliver_scheduled(id).await {
                warn!(
                    notification_id = %id,
                    error = %e,
                    "Delivery enqueue failed, releasing claim"
                );
                self.notifications
                    .transition_status(
                        id,
                        NotificationStatus::Pending,
                        NotificationStatus::Scheduled,
                    )
                    .await?;
                return Err(e);
            }
            enqueued += 1;
        }
        Ok(enqueued)
    }
}

#[async_trait]
impl TriggerAction for NotificationFlushSweep {
    async fn fire(&self) -> JobResult<()> {
        record(NOTIFICATION_FLUSH, self.run().await?);
        Ok(())
    }
}
