//! Notification queue jobs and their handlers.

use crate::dispatcher::NotificationDispatcher;
use crate::error::NotifyError;
use crate::request::NotificationRequest;
use async_trait::async_trait;
use rentora_core::{NotificationId, NotificationStatus, SharedClock};
use rentora_jobs::{
    EnqueueOptions, HandlerRegistry, JobContext, JobError, JobId, JobPayload, JobQueue,
    JobResult, PayloadHandler,
};
use rentora_repository::NotificationRepository;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const NOTIFICATIONS_QUEUE: &str = "notifications";

/// Deliver a notification request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendNotification {
    pub request: NotificationRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedup_key: Option<String>,
}

impl JobPayload for SendNotification {
    const JOB_TYPE: &'static str = "notifications.send";
    const QUEUE: &'static str = NOTIFICATIONS_QUEUE;

    fn dedup_key(&self) -> Option<String> {
        self.dedup_key.clone()
    }
}

/// Deliver a stored notification claimed by the scheduled flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverScheduled {
    pub notification_id: NotificationId,
}

impl JobPayload for DeliverScheduled {
    const JOB_TYPE: &'static str = "notifications.deliver_scheduled";
    const QUEUE: &'static str = NOTIFICATIONS_QUEUE;

    fn dedup_key(&self) -> Option<String> {
        Some(format!("deliver:{}", self.notification_id))
    }
}

/// Producer-side handle for the notification queue.
#[derive(Clone)]
pub struct Notifier {
    queue: JobQueue,
}

impl Notifier {
    pub fn new(queue: JobQueue) -> Self {
        Self { queue }
    }

    /// Enqueues a request for delivery.
    pub async fn notify(&self, request: NotificationRequest) -> JobResult<JobId> {
        self.enqueue(request, None, Duration::ZERO).await
    }

    /// Enqueues a request; a live job with the same key suppresses it.
    pub async fn notify_once(
        &self,
        request: NotificationRequest,
        dedup_key: impl Into<String>,
    ) -> JobResult<JobId> {
        self.enqueue(request, Some(dedup_key.into()), Duration::ZERO).await
    }

    pub async fn enqueue(
        &self,
        request: NotificationRequest,
        dedup_key: Option<String>,
        delay: Duration,
    ) -> JobResult<JobId> {
        let payload = SendNotification { request, dedup_key };
        self.queue
            .enqueue_job(&payload, EnqueueOptions::new().delay(delay))
            .await
    }

    /// Enqueues delivery of a claimed scheduled notification.
    pub async fn deliver_scheduled(&self, notification_id: NotificationId) -> JobResult<JobId> {
        self.queue
            .enqueue_job(&DeliverScheduled { notification_id }, EnqueueOptions::new())
            .await
    }
}

/// Runs `send`; fails the attempt only when no channel delivered.
pub struct SendNotificationHandler {
    dispatcher: Arc<NotificationDispatcher>,
}

impl SendNotificationHandler {
    pub fn new(dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl PayloadHandler<SendNotification> for SendNotificationHandler {
    async fn handle(&self, payload: SendNotification, _ctx: &JobContext) -> JobResult<()> {
        let report = self.dispatcher.send(&payload.request).await?;
        if report.is_undelivered() {
            return Err(NotifyError::Undelivered(report.failure_summary()).into());
        }
        Ok(())
    }
}

/// Delivers a notification the flush moved to `Pending`.
///
/// Anything not `Pending` has already been handled and is skipped.
pub struct DeliverScheduledHandler {
    dispatcher: Arc<NotificationDispatcher>,
    notifications: Arc<dyn NotificationRepository>,
    clock: SharedClock,
}

impl DeliverScheduledHandler {
    pub fn new(
        dispatcher: Arc<NotificationDispatcher>,
        notifications: Arc<dyn NotificationRepository>,
        clock: SharedClock,
    ) -> Self {
        Self {
            dispatcher,
            notifications,
            clock,
        }
    }
}

#[async_trait]
impl PayloadHandler<DeliverScheduled> for DeliverScheduledHandler {
    async fn handle(&self, payload: DeliverScheduled, ctx: &JobContext) -> JobResult<()> {
        let id = payload.notification_id;
        let Some(notification) = self.notifications.find_notification(id).await? else {
            warn!(notification_id = %id, "Scheduled notification vanished");
            return Ok(());
        };

        if notification.status != NotificationStatus::Pending {
            debug!(notification_id = %id, status = ?notification.status, "Already delivered");
            return Ok(());
        }

        let report = match self.dispatcher.deliver_stored(&notification).await {
            Ok(report) => report,
            Err(NotifyError::UserNotFound(user_id)) => {
                let reason = format!("recipient {user_id} not found");
                self.notifications.mark_failed(id, &reason).await?;
                return Err(JobError::Rejected(reason));
            }
            Err(e) => return Err(e.into()),
        };

        if report.is_undelivered() {
            let summary = report.failure_summary();
            if ctx.is_last_attempt() {
                self.notifications.mark_failed(id, &summary).await?;
            }
            return Err(NotifyError::Undelivered(summary).into());
        }

        self.notifications.mark_sent(id, self.clock.now()).await?;
        info!(notification_id = %id, "Scheduled notification delivered");
        Ok(())
    }
}

/// Binds the notification handlers.
pub fn register_handlers(
    registry: &mut HandlerRegistry,
    dispatcher: &Arc<NotificationDispatcher>,
    notifications: Arc<dyn NotificationRepository>,
    clock: SharedClock,
) -> JobResult<()> {
    registry.register_payload::<SendNotification, _>(SendNotificationHandler::new(Arc::clone(
        dispatcher,
    )))?;
    registry.register_payload::<DeliverScheduled, _>(DeliverScheduledHandler::new(
        Arc::clone(dispatcher),
        notifications,
        clock,
    ))?;
    Ok(())
}
