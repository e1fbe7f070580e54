//! Notification content for lifecycle transitions and domain events.

use crate::jobs::ReminderKind;
use chrono::{DateTime, Utc};
use rentora_core::{Booking, NotificationKind, NotificationPriority, Review, UserId};
use rentora_events::{DisputeEvent, DomainEvent, MessageEvent, PaymentEvent, UserEvent};
use rentora_notify::NotificationRequest;
use serde_json::json;

/// Cancellation reason recorded on expired bookings.
pub const EXPIRED_REASON: &str = "Expired - Payment not received within time limit";

fn when(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}

fn booking_data(booking: &Booking) -> serde_json::Value {
    json!({
        "bookingId": booking.id,
        "listingId": booking.listing_id,
        "status": booking.status,
    })
}

pub fn booking_expired(booking: &Booking) -> NotificationRequest {
    NotificationRequest::new(
        booking.renter_id,
        NotificationKind::BookingExpired,
        "Booking expired",
        "Your booking was cancelled because payment was not received in time.",
    )
    .with_data(booking_data(booking))
}

pub fn reminder(booking: &Booking, kind: ReminderKind) -> NotificationRequest {
    let (title, message) = match kind {
        ReminderKind::Upcoming => (
            "Your rental starts soon",
            format!("Pick-up is scheduled for {}.", when(booking.start_date)),
        ),
        ReminderKind::Ongoing => (
            "Your rental is under way",
            format!("Enjoy your rental. It is due back {}.", when(booking.end_date)),
        ),
        ReminderKind::ReturnDue => (
            "Return due soon",
            format!(
                "Your rental ends {}. Please arrange the return with the owner.",
                when(booking.end_date)
            ),
        ),
    };
    let mut data = booking_data(booking);
    data["reminderType"] = json!(kind.as_str());
    NotificationRequest::new(booking.renter_id, NotificationKind::BookingReminder, title, message)
        .with_data(data)
}

pub fn payout_released(booking: &Booking) -> NotificationRequest {
    NotificationRequest::new(
        booking.owner_id,
        NotificationKind::PaymentReceived,
        "Payout released",
        "The payment for your completed rental has been released.",
    )
    .with_data(booking_data(booking))
}

pub fn dispute_opened(admin_id: UserId, dispute: &DisputeEvent) -> NotificationRequest {
    NotificationRequest::new(
        admin_id,
        NotificationKind::DisputeOpened,
        "New dispute opened",
        format!("A dispute was opened on booking {}: {}", dispute.booking_id, dispute.reason),
    )
    .with_data(json!({
        "disputeId": dispute.dispute_id,
        "bookingId": dispute.booking_id,
        "openedBy": dispute.opened_by,
    }))
    .with_priority(NotificationPriority::High)
}

pub fn message_received(message: &MessageEvent) -> NotificationRequest {
    NotificationRequest::new(
        message.recipient_id,
        NotificationKind::MessageReceived,
        "New message",
        message.preview.clone(),
    )
    .with_data(json!({
        "messageId": message.message_id,
        "senderId": message.sender_id,
    }))
}

/// Party notifications for an event, or none if the event notifies nobody
/// directly.
pub fn for_event(event: &DomainEvent) -> Vec<NotificationRequest> {
    match event {
        DomainEvent::BookingCreated(e) => vec![NotificationRequest::new(
            e.booking.owner_id,
            NotificationKind::BookingRequest,
            "New booking request",
            format!(
                "You have a new booking request from {} to {}.",
                when(e.booking.start_date),
                when(e.booking.end_date)
            ),
        )
        .with_data(booking_data(&e.booking))],
        DomainEvent::BookingConfirmed(e) => vec![NotificationRequest::new(
            e.booking.renter_id,
            NotificationKind::BookingConfirmed,
            "Booking confirmed",
            format!("Your booking starting {} is confirmed.", when(e.booking.start_date)),
        )
        .with_data(booking_data(&e.booking))],
        DomainEvent::BookingCancelled(e) => {
            let message = match &e.booking.cancellation_reason {
                Some(reason) => format!("The booking was cancelled: {reason}"),
                None => "The booking was cancelled.".to_string(),
            };
            [e.booking.renter_id, e.booking.owner_id]
                .into_iter()
                .map(|user_id| {
                    NotificationRequest::new(
                        user_id,
                        NotificationKind::BookingCancelled,
                        "Booking cancelled",
                        message.clone(),
                    )
                    .with_data(booking_data(&e.booking))
                })
                .collect()
        }
        DomainEvent::BookingCompleted(e) => [e.booking.renter_id, e.booking.owner_id]
            .into_iter()
            .map(|user_id| {
                NotificationRequest::new(
                    user_id,
                    NotificationKind::ReviewPrompt,
                    "How did it go?",
                    "Your rental is complete. Leave a review for the other party.",
                )
                .with_data(booking_data(&e.booking))
            })
            .collect(),
        DomainEvent::PaymentSucceeded(p) => vec![
            payment(
                p,
                p.payer_id,
                NotificationKind::PaymentReceived,
                "Payment successful",
                "Your payment was received.",
            ),
            payment(
                p,
                p.payee_id,
                NotificationKind::PaymentReceived,
                "Payment received",
                "A renter has paid for a booking.",
            ),
        ],
        DomainEvent::PaymentFailed(p) => vec![payment(
            p,
            p.payer_id,
            NotificationKind::PaymentFailed,
            "Payment failed",
            "Your payment could not be processed. Please update your payment method.",
        )],
        DomainEvent::PaymentRefunded(p) => vec![payment(
            p,
            p.payer_id,
            NotificationKind::PaymentRefunded,
            "Refund issued",
            "Your payment has been refunded.",
        )],
        DomainEvent::ReviewCreated(e) => vec![review_received(&e.review)],
        DomainEvent::UserRegistered(u) => vec![welcome(u)],
        DomainEvent::UserVerifiedEmail(u) => vec![NotificationRequest::new(
            u.user_id,
            NotificationKind::EmailVerified,
            "Email verified",
            "Your email address has been verified.",
        )],
        DomainEvent::ListingCreated(_)
        | DomainEvent::ListingUpdated(_)
        | DomainEvent::ListingDeleted(_)
        | DomainEvent::DisputeCreated(_)
        | DomainEvent::MessageSent(_) => Vec::new(),
    }
}

fn payment(
    event: &PaymentEvent,
    user_id: UserId,
    kind: NotificationKind,
    title: &str,
    message: &str,
) -> NotificationRequest {
    NotificationRequest::new(user_id, kind, title, message).with_data(json!({
        "paymentId": event.payment_id,
        "bookingId": event.booking_id,
        "amount": event.amount,
        "currency": event.currency,
        "reason": event.reason,
    }))
}

fn review_received(review: &Review) -> NotificationRequest {
    NotificationRequest::new(
        review.reviewee_id,
        NotificationKind::ReviewReceived,
        "New review",
        format!("You received a {}-star review.", review.rating),
    )
    .with_data(json!({
        "reviewId": review.id,
        "bookingId": review.booking_id,
        "rating": review.rating,
    }))
}

fn welcome(user: &UserEvent) -> NotificationRequest {
    NotificationRequest::new(
        user.user_id,
        NotificationKind::Welcome,
        "Welcome to Rentora",
        format!("Hi {}, thanks for joining.", user.display_name),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rentora_core::{BookingId, BookingStatus, ListingId, PaymentId};
    use rentora_events::BookingEvent;

    fn booking() -> Booking {
        let now = Utc::now();
        Booking::new(
            BookingStatus::Cancelled,
            now,
            now,
            now,
            UserId::new(),
            UserId::new(),
            ListingId::new(),
        )
    }

    #[test]
    fn test_cancellation_notifies_both_parties() {
        let b = booking();
        let event = DomainEvent::BookingCancelled(BookingEvent { booking: b.clone() });
        let requests = for_event(&event);
        let recipients: Vec<_> = requests.iter().map(|r| r.user_id).collect();
        assert_eq!(recipients, vec![b.renter_id, b.owner_id]);
    }

    #[test]
    fn test_payment_failure_goes_to_payer_only() {
        let event = PaymentEvent {
            payment_id: PaymentId::new(),
            booking_id: BookingId::new(),
            payer_id: UserId::new(),
            payee_id: UserId::new(),
            amount: 12_000,
            currency: "EUR".into(),
            reason: Some("card declined".into()),
        };
        let requests = for_event(&DomainEvent::PaymentFailed(event.clone()));
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].user_id, event.payer_id);
        assert_eq!(requests[0].data["reason"], "card declined");
    }

    #[test]
    fn test_reminder_carries_type() {
        let request = reminder(&booking(), ReminderKind::ReturnDue);
        assert_eq!(request.data["reminderType"], "RETURN_DUE");
        assert_eq!(request.kind, NotificationKind::BookingReminder);
    }
}
