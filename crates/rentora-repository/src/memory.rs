//! In-memory storage used by tests and single-process deployments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rentora_core::{
    Booking, BookingFilter, BookingId, BookingMarker, BookingPatch, BookingStatus,
    ConditionReport, Notification, NotificationId, NotificationStatus, RatingSubject,
    RatingSummary, RentoraError, RentoraResult, Review, User, UserId, UserRole,
};
use std::collections::{BTreeMap, HashMap};

use crate::traits::{
    BookingRepository, ConditionReportRepository, NotificationRepository, ReviewRepository,
    UserRepository,
};

#[derive(Default)]
struct Tables {
    bookings: HashMap<BookingId, Booking>,
    reports: Vec<ConditionReport>,
    reviews: Vec<Review>,
    ratings: BTreeMap<RatingSubject, RatingSummary>,
    notifications: HashMap<NotificationId, Notification>,
    users: HashMap<UserId, User>,
}

/// Implements every repository port over in-process maps.
///
/// Each call takes the lock for its own duration only, so conditional writes
/// are atomic with respect to each other.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications stored for a user, oldest first.
    #[must_use]
    pub fn notifications_for(&self, user_id: UserId) -> Vec<Notification> {
        let tables = self.tables.read();
        let mut found: Vec<_> = tables
            .notifications
            .values()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by_key(|n| n.created_at);
        found
    }
}

#[async_trait]
impl BookingRepository for InMemoryStore {
    async fn find_booking(&self, id: BookingId) -> RentoraResult<Option<Booking>> {
        Ok(self.tables.read().bookings.get(&id).cloned())
    }

    async fn find_bookings(&self, filter: &BookingFilter) -> RentoraResult<Vec<Booking>> {
        let tables = self.tables.read();
        let mut found: Vec<_> = tables
            .bookings
            .values()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();
        found.sort_by_key(|b| (b.created_at, b.id));
        if let Some(limit) = filter.limit {
            found.truncate(limit);
        }
        Ok(found)
    }

    async fn update_booking(&self, id: BookingId, patch: &BookingPatch) -> RentoraResult<Booking> {
        let mut tables = self.tables.write();
        let booking = tables
            .bookings
            .get_mut(&id)
            .ok_or_else(|| RentoraError::not_found("Booking", id))?;
        booking.apply(patch);
        Ok(booking.clone())
    }

    async fn transition(
        &self,
        id: BookingId,
        expected: &[BookingStatus],
        patch: &BookingPatch,
    ) -> RentoraResult<Option<Booking>> {
        let mut tables = self.tables.write();
        let Some(booking) = tables.bookings.get_mut(&id) else {
            return Ok(None);
        };
        if !expected.contains(&booking.status) {
            return Ok(None);
        }
        if let Some(next) = patch.status {
            booking.status.ensure_transition(next)?;
        }
        booking.apply(patch);
        Ok(Some(booking.clone()))
    }

    async fn set_marker_once(
        &self,
        id: BookingId,
        marker: BookingMarker,
        at: DateTime<Utc>,
    ) -> RentoraResult<bool> {
        let mut tables = self.tables.write();
        let booking = tables
            .bookings
            .get_mut(&id)
            .ok_or_else(|| RentoraError::not_found("Booking", id))?;
        if booking.has_marker(marker) {
            return Ok(false);
        }
        booking.markers.insert(marker, at);
        Ok(true)
    }

    async fn clear_marker(&self, id: BookingId, marker: BookingMarker) -> RentoraResult<()> {
        if let Some(booking) = self.tables.write().bookings.get_mut(&id) {
            booking.markers.remove(&marker);
        }
        Ok(())
    }

    async fn insert_booking(&self, booking: Booking) -> RentoraResult<Booking> {
        let mut tables = self.tables.write();
        if tables.bookings.contains_key(&booking.id) {
            return Err(RentoraError::Conflict(format!(
                "Booking {} already exists",
                booking.id
            )));
        }
        tables.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }
}

#[async_trait]
impl ConditionReportRepository for InMemoryStore {
    async fn reports_for_booking(
        &self,
        booking_id: BookingId,
    ) -> RentoraResult<Vec<ConditionReport>> {
        Ok(self
            .tables
            .read()
            .reports
            .iter()
            .filter(|r| r.booking_id == booking_id)
            .cloned()
            .collect())
    }

    async fn insert_report(&self, report: ConditionReport) -> RentoraResult<ConditionReport> {
        self.tables.write().reports.push(report.clone());
        Ok(report)
    }
}

#[async_trait]
impl ReviewRepository for InMemoryStore {
    async fn insert_review(&self, review: Review) -> RentoraResult<Review> {
        if !(1..=5).contains(&review.rating) {
            return Err(RentoraError::validation("Rating must be between 1 and 5"));
        }
        let mut tables = self.tables.write();
        for subject in review.subjects() {
            tables.ratings.entry(subject).or_default().add(review.rating);
        }
        tables.reviews.push(review.clone());
        Ok(review)
    }

    async fn reviews_for_subject(&self, subject: RatingSubject) -> RentoraResult<Vec<Review>> {
        Ok(self
            .tables
            .read()
            .reviews
            .iter()
            .filter(|r| r.subjects().contains(&subject))
            .cloned()
            .collect())
    }

    async fn rated_subjects(&self) -> RentoraResult<Vec<RatingSubject>> {
        let tables = self.tables.read();
        let mut subjects: Vec<_> = tables.reviews.iter().flat_map(Review::subjects).collect();
        subjects.sort();
        subjects.dedup();
        Ok(subjects)
    }

    async fn rating_summary(&self, subject: RatingSubject) -> RentoraResult<Option<RatingSummary>> {
        Ok(self.tables.read().ratings.get(&subject).copied())
    }

    async fn store_rating_summary(
        &self,
        subject: RatingSubject,
        summary: RatingSummary,
    ) -> RentoraResult<()> {
        self.tables.write().ratings.insert(subject, summary);
        Ok(())
    }
}

#[async_trait]
impl NotificationRepository for InMemoryStore {
    async fn insert_notification(
        &self,
        notification: Notification,
    ) -> RentoraResult<Notification> {
        self.tables
            .write()
            .notifications
            .insert(notification.id, notification.clone());
        Ok(notification)
    }

    async fn find_notification(&self, id: NotificationId) -> RentoraResult<Option<Notification>> {
        Ok(self.tables.read().notifications.get(&id).cloned())
    }

    async fn find_due_scheduled(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> RentoraResult<Vec<Notification>> {
        let tables = self.tables.read();
        let mut due: Vec<_> = tables
            .notifications
            .values()
            .filter(|n| n.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|n| (n.scheduled_for, n.created_at));
        due.truncate(limit);
        Ok(due)
    }

    async fn transition_status(
        &self,
        id: NotificationId,
        from: NotificationStatus,
        to: NotificationStatus,
    ) -> RentoraResult<bool> {
        let mut tables = self.tables.write();
        match tables.notifications.get_mut(&id) {
            Some(n) if n.status == from => {
                n.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_sent(&self, id: NotificationId, at: DateTime<Utc>) -> RentoraResult<()> {
        let mut tables = self.tables.write();
        let n = tables
            .notifications
            .get_mut(&id)
            .ok_or_else(|| RentoraError::not_found("Notification", id))?;
        n.status = NotificationStatus::Sent;
        n.sent_at = Some(at);
        n.failure_reason = None;
        Ok(())
    }

    async fn mark_failed(&self, id: NotificationId, reason: &str) -> RentoraResult<()> {
        let mut tables = self.tables.write();
        let n = tables
            .notifications
            .get_mut(&id)
            .ok_or_else(|| RentoraError::not_found("Notification", id))?;
        n.status = NotificationStatus::Failed;
        n.failure_reason = Some(reason.to_string());
        Ok(())
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_user(&self, id: UserId) -> RentoraResult<Option<User>> {
        Ok(self.tables.read().users.get(&id).cloned())
    }

    async fn find_users_by_role(&self, role: UserRole) -> RentoraResult<Vec<User>> {
        let tables = self.tables.read();
        let mut users: Vec<_> = tables
            .users
            .values()
            .filter(|u| u.role == role)
            .cloned()
            .collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn insert_user(&self, user: User) -> RentoraResult<User> {
        self.tables.write().users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_user(&self, user: &User) -> RentoraResult<User> {
        let mut tables = self.tables.write();
        let existing = tables
            .users
            .get_mut(&user.id)
            .ok_or_else(|| RentoraError::not_found("User", user.id))?;
        *existing = user.clone();
        Ok(user.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rentora_core::{ListingId, NotificationKind, NotificationPriority, ReviewId};

    fn booking(status: BookingStatus) -> Booking {
        let now = Utc::now();
        Booking::new(
            status,
            now,
            now + Duration::days(1),
            now + Duration::days(3),
            UserId::new(),
            UserId::new(),
            ListingId::new(),
        )
    }

    fn scheduled(at: DateTime<Utc>) -> Notification {
        Notification {
            id: NotificationId::new(),
            user_id: UserId::new(),
            kind: NotificationKind::System,
            title: "t".into(),
            message: "m".into(),
            data: serde_json::Value::Null,
            channels: Vec::new(),
            priority: NotificationPriority::Normal,
            status: NotificationStatus::Scheduled,
            scheduled_for: Some(at),
            read: false,
            created_at: at,
            sent_at: None,
            failure_reason: None,
        }
    }

    #[tokio::test]
    async fn test_conditional_transition() {
        let store = InMemoryStore::new();
        let b = store.insert_booking(booking(BookingStatus::PendingPayment)).await.unwrap();
        let patch = BookingPatch::status(BookingStatus::Cancelled).with_cancellation_reason("x");

        let first = store.transition(b.id, &BookingStatus::PENDING, &patch).await.unwrap();
        assert_eq!(first.unwrap().status, BookingStatus::Cancelled);

        let second = store.transition(b.id, &BookingStatus::PENDING, &patch).await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_transition_rejects_illegal_edge() {
        let store = InMemoryStore::new();
        let b = store.insert_booking(booking(BookingStatus::Confirmed)).await.unwrap();
        let err = store
            .transition(
                b.id,
                &[BookingStatus::Confirmed],
                &BookingPatch::status(BookingStatus::Completed),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RentoraError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_marker_is_set_once() {
        let store = InMemoryStore::new();
        let b = store.insert_booking(booking(BookingStatus::Confirmed)).await.unwrap();
        let now = Utc::now();
        assert!(store.set_marker_once(b.id, BookingMarker::UpcomingReminder, now).await.unwrap());
        assert!(!store.set_marker_once(b.id, BookingMarker::UpcomingReminder, now).await.unwrap());

        store.clear_marker(b.id, BookingMarker::UpcomingReminder).await.unwrap();
        assert!(store.set_marker_once(b.id, BookingMarker::UpcomingReminder, now).await.unwrap());
    }

    #[tokio::test]
    async fn test_find_bookings_applies_limit() {
        let store = InMemoryStore::new();
        for _ in 0..3 {
            store.insert_booking(booking(BookingStatus::PendingPayment)).await.unwrap();
        }
        store.insert_booking(booking(BookingStatus::Confirmed)).await.unwrap();

        let mut filter = BookingFilter::with_statuses(BookingStatus::PENDING);
        assert_eq!(store.find_bookings(&filter).await.unwrap().len(), 3);
        filter.limit = Some(2);
        assert_eq!(store.find_bookings(&filter).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_review_updates_summary_incrementally() {
        let store = InMemoryStore::new();
        let reviewee = UserId::new();
        let listing = ListingId::new();
        for rating in [5, 3] {
            store
                .insert_review(Review {
                    id: ReviewId::new(),
                    booking_id: BookingId::new(),
                    reviewer_id: UserId::new(),
                    reviewee_id: reviewee,
                    listing_id: Some(listing),
                    rating,
                    comment: None,
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }
        let summary = store
            .rating_summary(RatingSubject::User(reviewee))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.average(), Some(4.0));
        assert_eq!(store.rated_subjects().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_notification_claim_is_compare_and_set() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let n = store.insert_notification(scheduled(now - Duration::minutes(1))).await.unwrap();
        store.insert_notification(scheduled(now + Duration::hours(1))).await.unwrap();

        let due = store.find_due_scheduled(now, 100).await.unwrap();
        assert_eq!(due.len(), 1);

        assert!(store
            .transition_status(n.id, NotificationStatus::Scheduled, NotificationStatus::Pending)
            .await
            .unwrap());
        assert!(!store
            .transition_status(n.id, NotificationStatus::Scheduled, NotificationStatus::Pending)
            .await
            .unwrap());
        assert!(store.find_due_scheduled(now, 100).await.unwrap().is_empty());
    }
}
