use crate::jobs::CheckExpiration;
use crate::messages::{self, EXPIRED_REASON};
use async_trait::async_trait;
use rentora_core::{BookingPatch, BookingStatus, SharedClock};
use rentora_jobs::{JobContext, JobResult, PayloadHandler};
use rentora_notify::Notifier;
use rentora_repository::BookingRepository;
use std::sync::Arc;
use tracing::{debug, info};

/// Cancels a booking that is still pending once its window has passed.
///
/// The status re-read is the idempotency guard: a booking that has moved
/// on, or was already expired by an earlier delivery, is left alone.
pub struct ExpirationHandler {
    bookings: Arc<dyn BookingRepository>,
    notifier: Notifier,
    clock: SharedClock,
}

impl ExpirationHandler {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        notifier: Notifier,
        clock: SharedClock,
    ) -> Self {
        Self {
            bookings,
            notifier,
            clock,
        }
    }
}

#[async_trait]
impl PayloadHandler<CheckExpiration> for ExpirationHandler {
    async fn handle(&self, payload: CheckExpiration, _ctx: &JobContext) -> JobResult<()> {
        let id = payload.booking_id;
        let Some(booking) = self.bookings.find_booking(id).await? else {
            debug!(booking_id = %id, "Booking gone, nothing to expire");
            return Ok(());
        };

        if !booking.status.is_pending() {
            debug!(booking_id = %id, status = %booking.status, "Booking no longer pending");
            return Ok(());
        }

        let now = self.clock.now();
        if now < payload.expires_at {
            debug!(booking_id = %id, expires_at = %payload.expires_at, "Booking not yet expired");
            return Ok(());
        }

        let patch = BookingPatch::status(BookingStatus::Cancelled)
            .with_cancellation_reason(EXPIRED_REASON);
        let Some(expired) = self
            .bookings
            .transition(id, &BookingStatus::PENDING, &patch)
            .await?
        else {
            debug!(booking_id = %id, "Booking progressed before it could expire");
            return Ok(());
        };

        info!(booking_id = %id, "Booking expired");
        self.notifier
            .notify_once(messages::booking_expired(&expired), format!("expired:{id}"))
            .await?;
        Ok(())
    }
}
