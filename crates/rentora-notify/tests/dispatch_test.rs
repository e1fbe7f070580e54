//! Channel isolation and delivery job behaviour.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rentora_config::NotificationsConfig;
use rentora_core::{
    Channel, ManualClock, Notification, NotificationId, NotificationKind, NotificationPriority,
    NotificationStatus, User, UserRole,
};
use rentora_jobs::{JobContext, JobData, JobError, PayloadHandler};
use rentora_notify::{
    ChannelOutcome, DeliverScheduled, DeliverScheduledHandler, EmailProvider, MessageContent,
    NotificationDispatcher, NotificationRequest, NotifyError, NotifyResult, PushProvider,
    SendNotification, SendNotificationHandler,
};
use rentora_repository::{InMemoryStore, NotificationRepository, UserRepository};
use std::sync::Arc;
use std::time::Duration;

struct DownEmail;

#[async_trait]
impl EmailProvider for DownEmail {
    async fn send_email(&self, _to: &str, _content: &MessageContent) -> NotifyResult<()> {
        Err(NotifyError::provider(Channel::Email, "smtp unreachable"))
    }
}

#[derive(Default)]
struct RecordingPush {
    sent: Mutex<Vec<String>>,
}

#[async_trait]
impl PushProvider for RecordingPush {
    async fn send_push(&self, _tokens: &[String], content: &MessageContent) -> NotifyResult<()> {
        self.sent.lock().push(content.title.clone());
        Ok(())
    }
}

struct Fixture {
    store: Arc<InMemoryStore>,
    push: Arc<RecordingPush>,
    dispatcher: Arc<NotificationDispatcher>,
    clock: Arc<ManualClock>,
    user: User,
}

async fn fixture() -> Fixture {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(ManualClock::starting_now());
    let push = Arc::new(RecordingPush::default());
    let user = store
        .insert_user(
            User::new("Renter", UserRole::Renter)
                .with_email("renter@example.com")
                .with_push_token("device-1"),
        )
        .await
        .unwrap();

    let dispatcher = Arc::new(
        NotificationDispatcher::new(
            store.clone(),
            store.clone(),
            NotificationsConfig::default(),
            clock.clone(),
        )
        .with_email(Arc::new(DownEmail))
        .with_push(push.clone()),
    );

    Fixture {
        store,
        push,
        dispatcher,
        clock,
        user,
    }
}

fn ctx(attempt: u32, max_attempts: u32) -> JobContext {
    let mut job = JobData::new(
        "notifications",
        "t",
        serde_json::json!({}),
        max_attempts,
        Utc::now(),
        Duration::ZERO,
    );
    job.attempts = attempt;
    JobContext::new(&job, "test-worker", Utc::now())
}

#[tokio::test]
async fn test_email_failure_does_not_block_other_channels() {
    let f = fixture().await;
    let request = NotificationRequest::new(
        f.user.id,
        NotificationKind::BookingConfirmed,
        "Booking confirmed",
        "See you soon",
    );

    let report = f.dispatcher.send(&request).await.unwrap();

    assert_eq!(report.delivered(), vec![Channel::Push, Channel::InApp]);
    assert_eq!(report.failed(), vec![Channel::Email]);
    assert!(!report.is_undelivered());
    assert_eq!(*f.push.sent.lock(), vec!["Booking confirmed".to_string()]);

    let stored = f.store.notifications_for(f.user.id);
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].status, NotificationStatus::Sent);
}

#[tokio::test]
async fn test_disabled_channel_is_skipped() {
    let f = fixture().await;
    let request = NotificationRequest::new(f.user.id, NotificationKind::System, "t", "m")
        .with_channels([Channel::Sms, Channel::Push]);

    let report = f.dispatcher.send(&request).await.unwrap();
    assert_eq!(
        report.outcomes,
        vec![
            (Channel::Sms, ChannelOutcome::Disabled),
            (Channel::Push, ChannelOutcome::Delivered),
        ]
    );
}

#[tokio::test]
async fn test_batch_isolates_unknown_recipient() {
    let f = fixture().await;
    let good = NotificationRequest::new(f.user.id, NotificationKind::Welcome, "Welcome", "hi");
    let missing = NotificationRequest::new(
        rentora_core::UserId::new(),
        NotificationKind::Welcome,
        "Welcome",
        "hi",
    );

    let results = f.dispatcher.send_batch(&[missing, good]).await;
    assert!(matches!(results[0], Err(NotifyError::UserNotFound(_))));
    assert!(results[1].is_ok());
}

#[tokio::test]
async fn test_send_job_fails_only_when_nothing_delivered() {
    let f = fixture().await;
    let handler = SendNotificationHandler::new(f.dispatcher.clone());

    let email_only = SendNotification {
        request: NotificationRequest::new(f.user.id, NotificationKind::System, "t", "m")
            .with_channels([Channel::Email]),
        dedup_key: None,
    };
    let err = handler.handle(email_only, &ctx(1, 3)).await.unwrap_err();
    assert!(err.is_retryable());

    let mixed = SendNotification {
        request: NotificationRequest::new(f.user.id, NotificationKind::System, "t", "m")
            .with_channels([Channel::Email, Channel::Push]),
        dedup_key: None,
    };
    handler.handle(mixed, &ctx(1, 3)).await.unwrap();
}

async fn pending_notification(f: &Fixture, channels: Vec<Channel>) -> NotificationId {
    let now = Utc::now();
    let notification = Notification {
        id: NotificationId::new(),
        user_id: f.user.id,
        kind: NotificationKind::BookingReminder,
        title: "Pick-up tomorrow".into(),
        message: "Your rental starts tomorrow".into(),
        data: serde_json::Value::Null,
        channels,
        priority: NotificationPriority::Normal,
        status: NotificationStatus::Pending,
        scheduled_for: Some(now),
        read: false,
        created_at: now,
        sent_at: None,
        failure_reason: None,
    };
    f.store.insert_notification(notification).await.unwrap().id
}

#[tokio::test]
async fn test_deliver_scheduled_marks_sent_once() {
    let f = fixture().await;
    let id = pending_notification(&f, vec![Channel::Push, Channel::InApp]).await;
    let handler =
        DeliverScheduledHandler::new(f.dispatcher.clone(), f.store.clone(), f.clock.clone());

    handler.handle(DeliverScheduled { notification_id: id }, &ctx(1, 3)).await.unwrap();
    handler.handle(DeliverScheduled { notification_id: id }, &ctx(2, 3)).await.unwrap();

    let stored = f.store.find_notification(id).await.unwrap().unwrap();
    assert_eq!(stored.status, NotificationStatus::Sent);
    assert_eq!(f.push.sent.lock().len(), 1);
}

#[tokio::test]
async fn test_deliver_scheduled_marks_failed_on_last_attempt() {
    let f = fixture().await;
    let id = pending_notification(&f, vec![Channel::Email]).await;
    let handler =
        DeliverScheduledHandler::new(f.dispatcher.clone(), f.store.clone(), f.clock.clone());

    let err = handler
        .handle(DeliverScheduled { notification_id: id }, &ctx(1, 2))
        .await
        .unwrap_err();
    assert!(matches!(err, JobError::ExecutionFailed(_)));
    assert_eq!(
        f.store.find_notification(id).await.unwrap().unwrap().status,
        NotificationStatus::Pending
    );

    handler
        .handle(DeliverScheduled { notification_id: id }, &ctx(2, 2))
        .await
        .unwrap_err();
    let stored = f.store.find_notification(id).await.unwrap().unwrap();
    assert_eq!(stored.status, NotificationStatus::Failed);
    assert!(stored.failure_reason.unwrap().contains("smtp unreachable"));
}
