//! Lifecycle job handlers against the in-memory store and broker.

mod common;

use async_trait::async_trait;
use chrono::TimeDelta;
use common::{ctx, Fixture};
use rentora_core::{BookingMarker, BookingStatus, Clock, DamageSeverity};
use rentora_events::DomainEvent;
use rentora_jobs::PayloadHandler;
use rentora_lifecycle::{
    AutoComplete, AutoCompleteHandler, CheckExpiration, ExpirationHandler, ReminderHandler,
    ReminderKind, SendReminder, BOOKINGS_QUEUE, EXPIRED_REASON, PAYMENTS_QUEUE,
};
use rentora_notify::NOTIFICATIONS_QUEUE;
use rentora_repository::BookingRepository;
use std::sync::Arc;

fn expiration_handler(f: &Fixture) -> ExpirationHandler {
    ExpirationHandler::new(
        f.services.bookings.clone(),
        f.services.notifier.clone(),
        f.clock.clone(),
    )
}

#[tokio::test]
async fn test_expiration_cancels_exactly_once() {
    let f = Fixture::new().await;
    for status in BookingStatus::PENDING {
        let booking = f.booking(status, TimeDelta::minutes(31), TimeDelta::days(2)).await;
        let payload = CheckExpiration {
            booking_id: booking.id,
            expires_at: booking.created_at + TimeDelta::minutes(30),
        };
        let handler = expiration_handler(&f);

        handler.handle(payload, &ctx()).await.unwrap();
        handler.handle(payload, &ctx()).await.unwrap();

        let stored = f.store.find_booking(booking.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Cancelled);
        assert_eq!(stored.cancellation_reason.as_deref(), Some(EXPIRED_REASON));
    }
    assert_eq!(f.counts(NOTIFICATIONS_QUEUE).await.waiting, 2);
}

#[tokio::test]
async fn test_expiration_leaves_confirmed_booking_alone() {
    let f = Fixture::new().await;
    let booking = f
        .booking(BookingStatus::Confirmed, TimeDelta::hours(2), TimeDelta::days(2))
        .await;
    let stale = CheckExpiration {
        booking_id: booking.id,
        expires_at: booking.created_at - TimeDelta::hours(1),
    };

    expiration_handler(&f).handle(stale, &ctx()).await.unwrap();

    let stored = f.store.find_booking(booking.id).await.unwrap().unwrap();
    assert_eq!(stored, booking);
    assert_eq!(f.counts(NOTIFICATIONS_QUEUE).await.waiting, 0);
}

#[tokio::test]
async fn test_expiration_waits_for_deadline() {
    let f = Fixture::new().await;
    let booking = f
        .booking(BookingStatus::PendingPayment, TimeDelta::minutes(10), TimeDelta::days(2))
        .await;
    let payload = CheckExpiration {
        booking_id: booking.id,
        expires_at: booking.created_at + TimeDelta::minutes(30),
    };

    expiration_handler(&f).handle(payload, &ctx()).await.unwrap();
    assert_eq!(f.status(&booking).await, BookingStatus::PendingPayment);

    f.clock.advance(TimeDelta::minutes(20));
    expiration_handler(&f).handle(payload, &ctx()).await.unwrap();
    assert_eq!(f.status(&booking).await, BookingStatus::Cancelled);
}

#[tokio::test]
async fn test_reminder_sent_once() {
    let f = Fixture::new().await;
    let booking = f
        .booking(BookingStatus::Confirmed, TimeDelta::days(3), TimeDelta::hours(20))
        .await;
    let handler = ReminderHandler::new(
        f.services.bookings.clone(),
        f.services.notifier.clone(),
        f.clock.clone(),
    );
    let payload = SendReminder {
        booking_id: booking.id,
        kind: ReminderKind::Upcoming,
    };

    handler.handle(payload, &ctx()).await.unwrap();
    handler.handle(payload, &ctx()).await.unwrap();

    let stored = f.store.find_booking(booking.id).await.unwrap().unwrap();
    assert!(stored.has_marker(BookingMarker::UpcomingReminder));
    assert_eq!(f.counts(NOTIFICATIONS_QUEUE).await.waiting, 1);

    // A return reminder makes no sense before the rental starts.
    let wrong_state = SendReminder {
        booking_id: booking.id,
        kind: ReminderKind::ReturnDue,
    };
    handler.handle(wrong_state, &ctx()).await.unwrap();
    assert_eq!(f.counts(NOTIFICATIONS_QUEUE).await.waiting, 1);
}

fn auto_complete_handler(f: &Fixture) -> AutoCompleteHandler {
    let events = f.services.event_registry().unwrap().build();
    AutoCompleteHandler::new(
        f.services.bookings.clone(),
        f.services.reports.clone(),
        f.services.jobs.clone(),
        events,
        f.clock.clone(),
    )
}

#[tokio::test]
async fn test_auto_completion_damage_gate() {
    let f = Fixture::new().await;
    let ended = -TimeDelta::days(6);
    let severe = f
        .booking(BookingStatus::AwaitingReturnInspection, TimeDelta::days(10), ended)
        .await;
    let minor = f
        .booking(BookingStatus::AwaitingReturnInspection, TimeDelta::days(10), ended)
        .await;
    f.return_report(&severe, &[DamageSeverity::Minor, DamageSeverity::Severe])
        .await;
    f.return_report(&minor, &[DamageSeverity::Minor]).await;

    let handler = auto_complete_handler(&f);
    for booking in [&severe, &minor] {
        handler
            .handle(AutoComplete { booking_id: booking.id }, &ctx())
            .await
            .unwrap();
    }

    assert_eq!(f.status(&severe).await, BookingStatus::AwaitingReturnInspection);
    let completed = f.store.find_booking(minor.id).await.unwrap().unwrap();
    assert_eq!(completed.status, BookingStatus::Completed);
    assert_eq!(completed.completed_at, Some(f.clock.now()));

    // Release waits out the settle delay.
    assert_eq!(f.counts(PAYMENTS_QUEUE).await.delayed, 1);
    // booking.completed prompts both parties for a review.
    assert_eq!(f.counts(NOTIFICATIONS_QUEUE).await.waiting, 2);
}

#[tokio::test]
async fn test_auto_completion_needs_a_return_report_and_grace() {
    let f = Fixture::new().await;
    let awaiting = BookingStatus::AwaitingReturnInspection;
    let no_report = f
        .booking(awaiting, TimeDelta::days(10), -TimeDelta::days(6))
        .await;
    // Ended one day ago: inside the 48h grace.
    let recent = f
        .booking(awaiting, TimeDelta::days(10), -TimeDelta::days(4))
        .await;
    f.return_report(&recent, &[]).await;

    let handler = auto_complete_handler(&f);
    for booking in [&no_report, &recent] {
        handler
            .handle(AutoComplete { booking_id: booking.id }, &ctx())
            .await
            .unwrap();
        assert_eq!(f.status(booking).await, BookingStatus::AwaitingReturnInspection);
    }
    assert_eq!(f.counts(PAYMENTS_QUEUE).await.delayed, 0);
}

#[tokio::test]
async fn test_booking_created_fan_out_survives_failing_listener() {
    struct Broken;

    #[async_trait]
    impl rentora_events::EventListener for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        async fn handle(&self, _event: &DomainEvent) -> rentora_events::ListenerResult {
            anyhow::bail!("listener exploded")
        }
    }

    let f = Fixture::new().await;
    let booking = f
        .booking(BookingStatus::PendingOwnerApproval, TimeDelta::zero(), TimeDelta::days(2))
        .await;

    let mut registry = rentora_events::EventRegistry::new();
    registry
        .on(rentora_events::names::BOOKING_CREATED, Arc::new(Broken))
        .unwrap();
    registry
        .on(
            rentora_events::names::BOOKING_CREATED,
            Arc::new(rentora_lifecycle::listeners::ScheduleExpiration::new(
                f.services.jobs.clone(),
            )),
        )
        .unwrap();

    let report = registry
        .build()
        .emit(&DomainEvent::booking_created(booking))
        .await;

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.succeeded, vec!["schedule-expiration".to_string()]);
    assert_eq!(f.counts(BOOKINGS_QUEUE).await.delayed, 1);
}
