//! Sweeps, trigger table and listener table.

mod common;

use chrono::TimeDelta;
use common::Fixture;
use rentora_config::SweepsConfig;
use rentora_core::{
    BookingId, BookingStatus, Clock, Notification, NotificationId, NotificationKind,
    NotificationPriority, NotificationStatus, RatingSubject, RatingSummary, Review, ReviewId,
};
use rentora_events::names;
use rentora_lifecycle::{
    AutoCompletionSweep, ExpirationSweep, LifecycleJobs, LifecyclePolicy, NotificationFlushSweep,
    RatingReconciliationSweep, ReminderSweep, BOOKINGS_QUEUE,
};
use rentora_notify::NOTIFICATIONS_QUEUE;
use rentora_repository::{NotificationRepository, ReviewRepository};

async fn scheduled_notification(f: &Fixture, due_in: TimeDelta) -> NotificationId {
    let now = f.clock.now();
    f.store
        .insert_notification(Notification {
            id: NotificationId::new(),
            user_id: f.renter.id,
            kind: NotificationKind::System,
            title: "Heads up".into(),
            message: "Scheduled message".into(),
            data: serde_json::Value::Null,
            channels: Vec::new(),
            priority: NotificationPriority::Normal,
            status: NotificationStatus::Scheduled,
            scheduled_for: Some(now + due_in),
            read: false,
            created_at: now,
            sent_at: None,
            failure_reason: None,
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn test_flush_enqueues_each_due_notification_once() {
    let f = Fixture::new().await;
    let mut due = Vec::new();
    for minutes in [5, 3, 1] {
        due.push(scheduled_notification(&f, -TimeDelta::minutes(minutes)).await);
    }
    let later = scheduled_notification(&f, TimeDelta::hours(1)).await;

    let sweep = NotificationFlushSweep::new(
        f.services.notifications.clone(),
        f.services.notifier.clone(),
        f.clock.clone(),
        100,
    );

    assert_eq!(sweep.run().await.unwrap(), 3);
    for id in &due {
        let n = f.store.find_notification(*id).await.unwrap().unwrap();
        assert_eq!(n.status, NotificationStatus::Pending);
    }
    assert_eq!(sweep.run().await.unwrap(), 0);
    assert_eq!(f.counts(NOTIFICATIONS_QUEUE).await.waiting, 3);

    let untouched = f.store.find_notification(later).await.unwrap().unwrap();
    assert_eq!(untouched.status, NotificationStatus::Scheduled);
}

#[tokio::test]
async fn test_flush_respects_batch_size() {
    let f = Fixture::new().await;
    for _ in 0..3 {
        scheduled_notification(&f, -TimeDelta::minutes(1)).await;
    }
    let sweep = NotificationFlushSweep::new(
        f.services.notifications.clone(),
        f.services.notifier.clone(),
        f.clock.clone(),
        2,
    );
    assert_eq!(sweep.run().await.unwrap(), 2);
    assert_eq!(sweep.run().await.unwrap(), 1);
}

#[tokio::test]
async fn test_expiration_sweep_selects_stale_pending_bookings() {
    let f = Fixture::new().await;
    let stale = f
        .booking(BookingStatus::PendingPayment, TimeDelta::minutes(45), TimeDelta::days(2))
        .await;
    f.booking(BookingStatus::PendingPayment, TimeDelta::minutes(5), TimeDelta::days(2))
        .await;
    f.booking(BookingStatus::Confirmed, TimeDelta::hours(5), TimeDelta::days(2))
        .await;

    let sweep = ExpirationSweep::new(
        f.services.bookings.clone(),
        f.services.jobs.clone(),
        f.clock.clone(),
    );
    assert_eq!(sweep.run().await.unwrap(), 1);
    // Overlapping ticks do not duplicate the check.
    assert_eq!(sweep.run().await.unwrap(), 1);

    let counts = f.counts(BOOKINGS_QUEUE).await;
    assert_eq!(counts.waiting, 1);
    let job = f.queue.broker().reserve(BOOKINGS_QUEUE, f.clock.now()).await.unwrap().unwrap();
    assert_eq!(job.payload["bookingId"], serde_json::json!(stale.id));
}

#[tokio::test]
async fn test_reminder_sweeps_select_their_window() {
    let f = Fixture::new().await;
    f.booking(BookingStatus::Confirmed, TimeDelta::days(2), TimeDelta::hours(10))
        .await;
    f.booking(BookingStatus::Confirmed, TimeDelta::days(2), TimeDelta::days(4))
        .await;
    // Ends in twelve hours.
    f.booking(BookingStatus::InProgress, TimeDelta::days(5), -TimeDelta::hours(60))
        .await;

    let upcoming = ReminderSweep::upcoming(
        f.services.bookings.clone(),
        f.services.jobs.clone(),
        f.clock.clone(),
    );
    let returns = ReminderSweep::return_due(
        f.services.bookings.clone(),
        f.services.jobs.clone(),
        f.clock.clone(),
    );

    assert_eq!(upcoming.run().await.unwrap(), 1);
    assert_eq!(returns.run().await.unwrap(), 1);
    assert_eq!(f.counts(BOOKINGS_QUEUE).await.waiting, 2);

    // Reminders still queued are selected again but not counted.
    assert_eq!(upcoming.run().await.unwrap(), 0);
    assert_eq!(f.counts(BOOKINGS_QUEUE).await.waiting, 2);
}

#[tokio::test]
async fn test_expiration_sweep_pages_past_stuck_rows() {
    let f = Fixture::new().await;
    for hours in [3, 2, 1] {
        f.booking(BookingStatus::PendingPayment, TimeDelta::hours(hours), TimeDelta::days(2))
            .await;
    }
    let policy = LifecyclePolicy {
        batch_size: 2,
        ..LifecyclePolicy::default()
    };
    let sweep = ExpirationSweep::new(
        f.services.bookings.clone(),
        LifecycleJobs::new(f.queue.clone(), policy),
        f.clock.clone(),
    );

    // Nothing processes the checks, so the oldest two stay selectable.
    assert_eq!(sweep.run().await.unwrap(), 2);
    assert_eq!(sweep.run().await.unwrap(), 1);
    assert_eq!(f.counts(BOOKINGS_QUEUE).await.waiting, 3);

    // A short page wraps back to the oldest rows.
    assert_eq!(sweep.run().await.unwrap(), 2);
    assert_eq!(f.counts(BOOKINGS_QUEUE).await.waiting, 3);
}

#[tokio::test]
async fn test_auto_completion_sweep_selects_past_grace() {
    let f = Fixture::new().await;
    // Ends three days ago.
    let ended = -TimeDelta::days(6);
    f.booking(BookingStatus::AwaitingReturnInspection, TimeDelta::days(10), ended)
        .await;
    // Ends one day ago.
    let recent = -TimeDelta::days(4);
    f.booking(BookingStatus::AwaitingReturnInspection, TimeDelta::days(10), recent)
        .await;

    let sweep = AutoCompletionSweep::new(
        f.services.bookings.clone(),
        f.services.jobs.clone(),
        f.clock.clone(),
    );
    assert_eq!(sweep.run().await.unwrap(), 1);
}

#[tokio::test]
async fn test_rating_reconciliation_repairs_drift() {
    let f = Fixture::new().await;
    let listing_id = rentora_core::ListingId::new();
    for rating in [5, 3] {
        f.store
            .insert_review(Review {
                id: ReviewId::new(),
                booking_id: BookingId::new(),
                reviewer_id: f.renter.id,
                reviewee_id: f.owner.id,
                listing_id: Some(listing_id),
                rating,
                comment: None,
                created_at: f.clock.now(),
            })
            .await
            .unwrap();
    }
    let owner = RatingSubject::User(f.owner.id);
    f.store
        .store_rating_summary(owner, RatingSummary { sum: 1, count: 1 })
        .await
        .unwrap();

    let sweep = RatingReconciliationSweep::new(f.services.reviews.clone());
    assert_eq!(sweep.run().await.unwrap(), 1);
    assert_eq!(sweep.run().await.unwrap(), 0);

    let repaired = f.store.rating_summary(owner).await.unwrap().unwrap();
    assert_eq!(repaired.average(), Some(4.0));
}

#[tokio::test]
async fn test_trigger_table_binds_every_sweep() {
    let f = Fixture::new().await;
    let table = f.services.trigger_table(&SweepsConfig::default()).unwrap();
    assert_eq!(
        table.names(),
        vec![
            "expiration",
            "upcoming_reminders",
            "return_reminders",
            "auto_completion",
            "rating_reconciliation",
            "notification_flush",
        ]
    );

    let disabled = SweepsConfig {
        enabled: false,
        ..SweepsConfig::default()
    };
    assert!(f.services.trigger_table(&disabled).unwrap().is_empty());
}

#[tokio::test]
async fn test_every_event_has_a_listener() {
    let f = Fixture::new().await;
    let registry = f.services.event_registry().unwrap();
    for event in names::ALL {
        assert!(!registry.listener_names(event).is_empty(), "{event}");
    }
    assert_eq!(
        registry.listener_names(names::BOOKING_CREATED),
        vec!["notify-parties", "schedule-expiration"]
    );
}
