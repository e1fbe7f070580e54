//! Domain events emitted into the dispatch fabric.

use chrono::{DateTime, Utc};
use rentora_core::{
    Booking, BookingId, DisputeId, ListingId, MessageId, PaymentId, Review, UserId,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dot-namespaced event names.
pub mod names {
    pub const BOOKING_CREATED: &str = "booking.created";
    pub const BOOKING_CONFIRMED: &str = "booking.confirmed";
    pub const BOOKING_CANCELLED: &str = "booking.cancelled";
    pub const BOOKING_COMPLETED: &str = "booking.completed";
    pub const PAYMENT_SUCCEEDED: &str = "payment.succeeded";
    pub const PAYMENT_FAILED: &str = "payment.failed";
    pub const PAYMENT_REFUNDED: &str = "payment.refunded";
    pub const LISTING_CREATED: &str = "listing.created";
    pub const LISTING_UPDATED: &str = "listing.updated";
    pub const LISTING_DELETED: &str = "listing.deleted";
    pub const REVIEW_CREATED: &str = "review.created";
    pub const DISPUTE_CREATED: &str = "dispute.created";
    pub const MESSAGE_SENT: &str = "message.sent";
    pub const USER_REGISTERED: &str = "user.registered";
    pub const USER_VERIFIED_EMAIL: &str = "user.verified.email";

    /// Every event the fabric knows.
    pub const ALL: [&str; 15] = [
        BOOKING_CREATED,
        BOOKING_CONFIRMED,
        BOOKING_CANCELLED,
        BOOKING_COMPLETED,
        PAYMENT_SUCCEEDED,
        PAYMENT_FAILED,
        PAYMENT_REFUNDED,
        LISTING_CREATED,
        LISTING_UPDATED,
        LISTING_DELETED,
        REVIEW_CREATED,
        DISPUTE_CREATED,
        MESSAGE_SENT,
        USER_REGISTERED,
        USER_VERIFIED_EMAIL,
    ];

    /// Returns true if `name` is a known event.
    pub fn is_known(name: &str) -> bool {
        ALL.contains(&name)
    }
}

/// Booking snapshot taken when the event was emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingEvent {
    pub booking: Booking,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub payment_id: PaymentId,
    pub booking_id: BookingId,
    pub payer_id: UserId,
    pub payee_id: UserId,
    /// Minor currency units.
    pub amount: i64,
    pub currency: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingEvent {
    pub listing_id: ListingId,
    pub owner_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewEvent {
    pub review: Review,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisputeEvent {
    pub dispute_id: DisputeId,
    pub booking_id: BookingId,
    pub opened_by: UserId,
    pub reason: String,
    pub opened_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEvent {
    pub message_id: MessageId,
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub preview: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEvent {
    pub user_id: UserId,
    pub display_name: String,
}

/// An immutable fact, typed per event name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum DomainEvent {
    #[serde(rename = "booking.created")]
    BookingCreated(BookingEvent),
    #[serde(rename = "booking.confirmed")]
    BookingConfirmed(BookingEvent),
    #[serde(rename = "booking.cancelled")]
    BookingCancelled(BookingEvent),
    #[serde(rename = "booking.completed")]
    BookingCompleted(BookingEvent),
    #[serde(rename = "payment.succeeded")]
    PaymentSucceeded(PaymentEvent),
    #[serde(rename = "payment.failed")]
    PaymentFailed(PaymentEvent),
    #[serde(rename = "payment.refunded")]
    PaymentRefunded(PaymentEvent),
    #[serde(rename = "listing.created")]
    ListingCreated(ListingEvent),
    #[serde(rename = "listing.updated")]
    ListingUpdated(ListingEvent),
    #[serde(rename = "listing.deleted")]
    ListingDeleted(ListingEvent),
    #[serde(rename = "review.created")]
    ReviewCreated(ReviewEvent),
    #[serde(rename = "dispute.created")]
    DisputeCreated(DisputeEvent),
    #[serde(rename = "message.sent")]
    MessageSent(MessageEvent),
    #[serde(rename = "user.registered")]
    UserRegistered(UserEvent),
    #[serde(rename = "user.verified.email")]
    UserVerifiedEmail(UserEvent),
}

impl DomainEvent {
    pub fn booking_created(booking: Booking) -> Self {
        Self::BookingCreated(BookingEvent { booking })
    }

    pub fn booking_confirmed(booking: Booking) -> Self {
        Self::BookingConfirmed(BookingEvent { booking })
    }

    pub fn booking_cancelled(booking: Booking) -> Self {
        Self::BookingCancelled(BookingEvent { booking })
    }

    pub fn booking_completed(booking: Booking) -> Self {
        Self::BookingCompleted(BookingEvent { booking })
    }

    /// The event's dot-namespaced name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::BookingCreated(_) => names::BOOKING_CREATED,
            Self::BookingConfirmed(_) => names::BOOKING_CONFIRMED,
            Self::BookingCancelled(_) => names::BOOKING_CANCELLED,
            Self::BookingCompleted(_) => names::BOOKING_COMPLETED,
            Self::PaymentSucceeded(_) => names::PAYMENT_SUCCEEDED,
            Self::PaymentFailed(_) => names::PAYMENT_FAILED,
            Self::PaymentRefunded(_) => names::PAYMENT_REFUNDED,
            Self::ListingCreated(_) => names::LISTING_CREATED,
            Self::ListingUpdated(_) => names::LISTING_UPDATED,
            Self::ListingDeleted(_) => names::LISTING_DELETED,
            Self::ReviewCreated(_) => names::REVIEW_CREATED,
            Self::DisputeCreated(_) => names::DISPUTE_CREATED,
            Self::MessageSent(_) => names::MESSAGE_SENT,
            Self::UserRegistered(_) => names::USER_REGISTERED,
            Self::UserVerifiedEmail(_) => names::USER_VERIFIED_EMAIL,
        }
    }

    /// Id of the entity the event is about, for log correlation.
    pub fn subject_id(&self) -> String {
        match self {
            Self::BookingCreated(e)
            | Self::BookingConfirmed(e)
            | Self::BookingCancelled(e)
            | Self::BookingCompleted(e) => e.booking.id.to_string(),
            Self::PaymentSucceeded(e) | Self::PaymentFailed(e) | Self::PaymentRefunded(e) => {
                e.payment_id.to_string()
            }
            Self::ListingCreated(e) | Self::ListingUpdated(e) | Self::ListingDeleted(e) => {
                e.listing_id.to_string()
            }
            Self::ReviewCreated(e) => e.review.id.to_string(),
            Self::DisputeCreated(e) => e.dispute_id.to_string(),
            Self::MessageSent(e) => e.message_id.to_string(),
            Self::UserRegistered(e) | Self::UserVerifiedEmail(e) => e.user_id.to_string(),
        }
    }

    /// The booking snapshot, for booking events.
    pub fn booking(&self) -> Option<&Booking> {
        match self {
            Self::BookingCreated(e)
            | Self::BookingConfirmed(e)
            | Self::BookingCancelled(e)
            | Self::BookingCompleted(e) => Some(&e.booking),
            _ => None,
        }
    }
}

impl fmt::Display for DomainEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.subject_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_tag_matches_name() {
        let event = DomainEvent::UserRegistered(UserEvent {
            user_id: UserId::new(),
            display_name: "Ada".into(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], event.name());
        assert!(names::is_known(event.name()));
        assert!(!names::is_known("user.deleted"));
    }
}
