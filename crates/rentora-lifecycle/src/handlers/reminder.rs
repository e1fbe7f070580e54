use crate::jobs::{ReminderKind, SendReminder};
use crate::messages;
use async_trait::async_trait;
use rentora_core::{BookingStatus, SharedClock};
use rentora_jobs::{JobContext, JobResult, PayloadHandler};
use rentora_notify::Notifier;
use rentora_repository::BookingRepository;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Status a booking must still be in for a reminder to make sense.
const fn expected_status(kind: ReminderKind) -> BookingStatus {
    match kind {
        ReminderKind::Upcoming => BookingStatus::Confirmed,
        ReminderKind::Ongoing | ReminderKind::ReturnDue => BookingStatus::InProgress,
    }
}

/// Sends each reminder at most once per booking.
///
/// The booking's reminder marker is claimed before the notification is
/// enqueued and released again if the enqueue fails, so a retry can send it.
pub struct ReminderHandler {
    bookings: Arc<dyn BookingRepository>,
    notifier: Notifier,
    clock: SharedClock,
}

impl ReminderHandler {
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
impl PayloadHandler<SendReminder> for ReminderHandler {
    async fn handle(&self, payload: SendReminder, _ctx: &JobContext) -> JobResult<()> {
        let SendReminder { booking_id, kind } = payload;
        let Some(booking) = self.bookings.find_booking(booking_id).await? else {
            debug!(booking_id = %booking_id, "Booking gone, skipping reminder");
            return Ok(());
        };

        if booking.status != expected_status(kind) {
            debug!(
                booking_id = %booking_id,
                reminder = %kind,
                status = %booking.status,
                "Reminder no longer applies"
            );
            return Ok(());
        }

        let marker = kind.marker();
        let claimed = self
            .bookings
            .set_marker_once(booking_id, marker, self.clock.now())
            .await?;
        if !claimed {
            debug!(booking_id = %booking_id, reminder = %kind, "Reminder already sent");
            return Ok(());
        }

        let dedup = format!("reminder:{}:{booking_id}", kind.as_str());
        if let Err(e) = self
            .notifier
            .notify_once(messages::reminder(&booking, kind), dedup)
            .await
        {
            warn!(
                booking_id = %booking_id,
                reminder = %kind,
                error = %e,
                "Reminder enqueue failed, releasing marker"
            );
            self.bookings.clear_marker(booking_id, marker).await?;
            return Err(e);
        }

        info!(booking_id = %booking_id, reminder = %kind, "Reminder sent");
        Ok(())
    }
}
