//! Storage collaborator ports.
//!
//! The scheduler issues only filtered reads and partial-field updates through
//! these traits. Conditional writes (`transition`, `set_marker_once`,
//! `transition_status`) are how duplicate job deliveries turn into no-ops.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rentora_core::{
    Booking, BookingFilter, BookingId, BookingMarker, BookingPatch, BookingStatus,
    ConditionReport, Notification, NotificationId, NotificationStatus, RatingSubject,
    RatingSummary, RentoraResult, Review, User, UserId, UserRole,
};

/// Booking storage.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Finds a booking by ID.
    async fn find_booking(&self, id: BookingId) -> RentoraResult<Option<Booking>>;

    /// Finds bookings matching the filter, oldest first.
    async fn find_bookings(&self, filter: &BookingFilter) -> RentoraResult<Vec<Booking>>;

    /// Applies a partial update unconditionally.
    ///
    /// Returns `NotFound` if the booking does not exist.
    async fn update_booking(&self, id: BookingId, patch: &BookingPatch) -> RentoraResult<Booking>;

    /// Applies `patch` only if the current status is one of `expected`.
    ///
    /// Returns `Ok(None)` when the precondition no longer holds, and
    /// `InvalidTransition` when the patch names a status the graph forbids.
    async fn transition(
        &self,
        id: BookingId,
        expected: &[BookingStatus],
        patch: &BookingPatch,
    ) -> RentoraResult<Option<Booking>>;

    /// Records a one-shot marker. Returns `false` if it was already set.
    async fn set_marker_once(
        &self,
        id: BookingId,
        marker: BookingMarker,
        at: DateTime<Utc>,
    ) -> RentoraResult<bool>;

    /// Clears a marker so a failed side effect can be attempted again.
    async fn clear_marker(&self, id: BookingId, marker: BookingMarker) -> RentoraResult<()>;

    /// Saves a new booking.
    async fn insert_booking(&self, booking: Booking) -> RentoraResult<Booking>;
}

/// Condition report storage.
#[async_trait]
pub trait ConditionReportRepository: Send + Sync {
    /// Finds every report attached to a booking.
    async fn reports_for_booking(&self, booking_id: BookingId)
        -> RentoraResult<Vec<ConditionReport>>;

    /// Saves a report.
    async fn insert_report(&self, report: ConditionReport) -> RentoraResult<ConditionReport>;
}

/// Review storage and rating aggregates.
#[async_trait]
pub trait ReviewRepository: Send + Sync {
    /// Saves a review and folds its rating into every subject's summary in the
    /// same write.
    async fn insert_review(&self, review: Review) -> RentoraResult<Review>;

    /// Reviews contributing to a subject's rating.
    async fn reviews_for_subject(&self, subject: RatingSubject) -> RentoraResult<Vec<Review>>;

    /// Every subject with at least one review.
    async fn rated_subjects(&self) -> RentoraResult<Vec<RatingSubject>>;

    /// Current stored summary.
    async fn rating_summary(&self, subject: RatingSubject) -> RentoraResult<Option<RatingSummary>>;

    /// Overwrites a stored summary.
    async fn store_rating_summary(
        &self,
        subject: RatingSubject,
        summary: RatingSummary,
    ) -> RentoraResult<()>;
}

/// Notification storage.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Saves a notification.
    async fn insert_notification(&self, notification: Notification)
        -> RentoraResult<Notification>;

    /// Finds a notification by ID.
    async fn find_notification(&self, id: NotificationId) -> RentoraResult<Option<Notification>>;

    /// Scheduled notifications whose time has come, oldest first.
    async fn find_due_scheduled(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> RentoraResult<Vec<Notification>>;

    /// Compare-and-set on status. Returns `false` if the status was not `from`.
    async fn transition_status(
        &self,
        id: NotificationId,
        from: NotificationStatus,
        to: NotificationStatus,
    ) -> RentoraResult<bool>;

    /// Marks a notification as delivered.
    async fn mark_sent(&self, id: NotificationId, at: DateTime<Utc>) -> RentoraResult<()>;

    /// Marks a notification as failed with a reason.
    async fn mark_failed(&self, id: NotificationId, reason: &str) -> RentoraResult<()>;
}

/// User profile storage.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Finds a user by ID.
    async fn find_user(&self, id: UserId) -> RentoraResult<Option<User>>;

    /// Finds users by role.
    async fn find_users_by_role(&self, role: UserRole) -> RentoraResult<Vec<User>>;

    /// Saves a new user.
    async fn insert_user(&self, user: User) -> RentoraResult<User>;

    /// Updates an existing user.
    async fn update_user(&self, user: &User) -> RentoraResult<User>;
}
