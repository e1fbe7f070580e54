use crate::jobs::{AutoComplete, LifecycleJobs};
use async_trait::async_trait;
use rentora_core::{Booking, BookingMarker, BookingPatch, BookingStatus, ReportKind, SharedClock};
use rentora_events::{DomainEvent, EventBus};
use rentora_jobs::{JobContext, JobResult, PayloadHandler};
use rentora_repository::{BookingRepository, ConditionReportRepository};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Completes a returned booking once its return inspection clears it.
pub struct AutoCompleteHandler {
    bookings: Arc<dyn BookingRepository>,
    reports: Arc<dyn ConditionReportRepository>,
    jobs: LifecycleJobs,
    events: EventBus,
    clock: SharedClock,
}

impl AutoCompleteHandler {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        reports: Arc<dyn ConditionReportRepository>,
        jobs: LifecycleJobs,
        events: EventBus,
        clock: SharedClock,
    ) -> Self {
        Self {
            bookings,
            reports,
            jobs,
            events,
            clock,
        }
    }

    /// True once a completed return report exists and no completed return
    /// report records severe damage.
    async fn inspection_cleared(&self, booking: &Booking) -> JobResult<bool> {
        let reports = self.reports.reports_for_booking(booking.id).await?;
        let mut returns = reports
            .iter()
            .filter(|r| r.kind == ReportKind::Return && r.completed)
            .peekable();
        if returns.peek().is_none() {
            return Ok(false);
        }
        Ok(returns.all(|r| r.clears_for_completion()))
    }
}

#[async_trait]
impl PayloadHandler<AutoComplete> for AutoCompleteHandler {
    async fn handle(&self, payload: AutoComplete, _ctx: &JobContext) -> JobResult<()> {
        let id = payload.booking_id;
        let Some(booking) = self.bookings.find_booking(id).await? else {
            debug!(booking_id = %id, "Booking gone, skipping auto-completion");
            return Ok(());
        };

        match booking.status {
            BookingStatus::AwaitingReturnInspection => {}
            // Completed by an earlier delivery that failed before the
            // release was enqueued.
            BookingStatus::Completed if !booking.has_marker(BookingMarker::PaymentReleased) => {
                self.jobs.schedule_payment_release(id).await?;
                return Ok(());
            }
            status => {
                debug!(booking_id = %id, status = %status, "Booking not awaiting inspection");
                return Ok(());
            }
        }

        let now = self.clock.now();
        if now < booking.end_date + self.jobs.policy().inspection_grace {
            debug!(booking_id = %id, "Inspection grace period still running");
            return Ok(());
        }

        if !self.inspection_cleared(&booking).await? {
            debug!(booking_id = %id, "Return inspection has not cleared the booking");
            return Ok(());
        }

        let patch = BookingPatch::status(BookingStatus::Completed).with_completed_at(now);
        let Some(completed) = self
            .bookings
            .transition(id, &[BookingStatus::AwaitingReturnInspection], &patch)
            .await?
        else {
            debug!(booking_id = %id, "Booking changed before auto-completion");
            return Ok(());
        };
        info!(booking_id = %id, "Booking auto-completed");

        self.jobs.schedule_payment_release(id).await?;

        let report = self.events.emit(&DomainEvent::booking_completed(completed)).await;
        if !report.is_clean() {
            warn!(
                booking_id = %id,
                failed = report.failed.len(),
                "Some booking.completed listeners failed"
            );
        }
        Ok(())
    }
}
