use crate::jobs::ReleasePayment;
use crate::messages;
use crate::ports::PaymentReleaser;
use async_trait::async_trait;
use rentora_core::{BookingMarker, BookingStatus, SharedClock};
use rentora_jobs::{JobContext, JobResult, PayloadHandler};
use rentora_notify::Notifier;
use rentora_repository::BookingRepository;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Releases the payment of a completed booking, once.
pub struct ReleasePaymentHandler {
    bookings: Arc<dyn BookingRepository>,
    payments: Arc<dyn PaymentReleaser>,
    notifier: Notifier,
    clock: SharedClock,
}

impl ReleasePaymentHandler {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        payments: Arc<dyn PaymentReleaser>,
        notifier: Notifier,
        clock: SharedClock,
    ) -> Self {
        Self {
            bookings,
            payments,
            notifier,
            clock,
        }
    }
}

#[async_trait]
impl PayloadHandler<ReleasePayment> for ReleasePaymentHandler {
    async fn handle(&self, payload: ReleasePayment, _ctx: &JobContext) -> JobResult<()> {
        let id = payload.booking_id;
        let Some(booking) = self.bookings.find_booking(id).await? else {
            warn!(booking_id = %id, "Booking gone, cannot release payment");
            return Ok(());
        };

        if booking.status != BookingStatus::Completed {
            warn!(
                booking_id = %id,
                status = %booking.status,
                "Refusing to release payment of an incomplete booking"
            );
            return Ok(());
        }
        if booking.has_marker(BookingMarker::PaymentReleased) {
            debug!(booking_id = %id, "Payment already released");
            return Ok(());
        }

        // Idempotent by booking id.
        self.payments.release(&booking).await?;
        let first = self
            .bookings
            .set_marker_once(id, BookingMarker::PaymentReleased, self.clock.now())
            .await?;
        if !first {
            return Ok(());
        }

        info!(booking_id = %id, "Booking payment released");
        self.notifier
            .notify_once(messages::payout_released(&booking), format!("payout:{id}"))
            .await?;
        Ok(())
    }
}
