//! Booking entity and its lifecycle state graph.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::{BookingId, ListingId, RentoraError, RentoraResult, UserId};

/// Lifecycle state of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    PendingOwnerApproval,
    PendingPayment,
    Confirmed,
    InProgress,
    AwaitingReturnInspection,
    Completed,
    Cancelled,
    Disputed,
}

impl BookingStatus {
    /// Statuses an unpaid or unapproved booking can sit in before expiring.
    pub const PENDING: [Self; 2] = [Self::PendingOwnerApproval, Self::PendingPayment];

    /// Returns the wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PendingOwnerApproval => "PENDING_OWNER_APPROVAL",
            Self::PendingPayment => "PENDING_PAYMENT",
            Self::Confirmed => "CONFIRMED",
            Self::InProgress => "IN_PROGRESS",
            Self::AwaitingReturnInspection => "AWAITING_RETURN_INSPECTION",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
            Self::Disputed => "DISPUTED",
        }
    }

    /// Returns true while the booking awaits approval or payment.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::PendingOwnerApproval | Self::PendingPayment)
    }

    /// Returns true for states no transition leaves.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Returns true if the lifecycle graph has an edge from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        use BookingStatus::{
            AwaitingReturnInspection, Cancelled, Completed, Confirmed, Disputed, InProgress,
            PendingOwnerApproval, PendingPayment,
        };
        matches!(
            (self, next),
            (PendingOwnerApproval, PendingPayment | Confirmed | Cancelled)
                | (PendingPayment, Confirmed | Cancelled)
                | (Confirmed, InProgress | Cancelled | Disputed)
                | (InProgress, AwaitingReturnInspection | Disputed)
                | (AwaitingReturnInspection, Completed | Disputed)
                | (Disputed, Completed | Cancelled)
        )
    }

    /// Validates an edge, returning `InvalidTransition` if it is not in the graph.
    pub fn ensure_transition(self, next: Self) -> RentoraResult<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(RentoraError::InvalidTransition {
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
            })
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One-shot side effects recorded on a booking so they are never repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingMarker {
    UpcomingReminder,
    OngoingReminder,
    ReturnReminder,
    PaymentReleased,
}

/// A rental booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: BookingId,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub renter_id: UserId,
    pub owner_id: UserId,
    pub listing_id: ListingId,
    pub cancellation_reason: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub markers: BTreeMap<BookingMarker, DateTime<Utc>>,
}

impl Booking {
    /// Creates a booking in the given initial status.
    #[must_use]
    pub fn new(
        status: BookingStatus,
        created_at: DateTime<Utc>,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        renter_id: UserId,
        owner_id: UserId,
        listing_id: ListingId,
    ) -> Self {
        Self {
            id: BookingId::new(),
            status,
            created_at,
            start_date,
            end_date,
            renter_id,
            owner_id,
            listing_id,
            cancellation_reason: None,
            completed_at: None,
            markers: BTreeMap::new(),
        }
    }

    /// Returns true if the one-shot marker has been recorded.
    #[must_use]
    pub fn has_marker(&self, marker: BookingMarker) -> bool {
        self.markers.contains_key(&marker)
    }

    /// Applies a partial update in place.
    pub fn apply(&mut self, patch: &BookingPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(reason) = &patch.cancellation_reason {
            self.cancellation_reason = Some(reason.clone());
        }
        if let Some(completed_at) = patch.completed_at {
            self.completed_at = Some(completed_at);
        }
    }
}

/// Partial-field update for a booking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingPatch {
    pub status: Option<BookingStatus>,
    pub cancellation_reason: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BookingPatch {
    /// Patch that moves the booking to `status`.
    #[must_use]
    pub fn status(status: BookingStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Sets the cancellation reason.
    #[must_use]
    pub fn with_cancellation_reason(mut self, reason: impl Into<String>) -> Self {
        self.cancellation_reason = Some(reason.into());
        self
    }

    /// Stamps the completion time.
    #[must_use]
    pub fn with_completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.completed_at = Some(at);
        self
    }
}

/// Filtered read over bookings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingFilter {
    /// Match any of these statuses; empty matches all.
    pub statuses: Vec<BookingStatus>,
    pub created_before: Option<DateTime<Utc>>,
    pub start_between: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub end_between: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub end_before: Option<DateTime<Utc>>,
    /// Exclude bookings already carrying this marker.
    pub without_marker: Option<BookingMarker>,
    /// Keyset cursor: only bookings ordered after this `(created_at, id)`.
    pub after: Option<(DateTime<Utc>, BookingId)>,
    pub limit: Option<usize>,
}

impl BookingFilter {
    /// Filter on a set of statuses.
    #[must_use]
    pub fn with_statuses(statuses: impl IntoIterator<Item = BookingStatus>) -> Self {
        Self {
            statuses: statuses.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Returns true if `booking` satisfies every set condition.
    #[must_use]
    pub fn matches(&self, booking: &Booking) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&booking.status) {
            return false;
        }
        if self.created_before.is_some_and(|t| booking.created_at >= t) {
            return false;
        }
        if let Some((from, to)) = self.start_between {
            if booking.start_date < from || booking.start_date > to {
                return false;
            }
        }
        if let Some((from, to)) = self.end_between {
            if booking.end_date < from || booking.end_date > to {
                return false;
            }
        }
        if self.end_before.is_some_and(|t| booking.end_date >= t) {
            return false;
        }
        if self.without_marker.is_some_and(|m| booking.has_marker(m)) {
            return false;
        }
        if self.after.is_some_and(|key| (booking.created_at, booking.id) <= key) {
            return false;
        }
        true
    }
}
