//! Channel routing for notification requests.
//!
//! Each channel attempt is isolated: a failing provider is recorded in the
//! [`DeliveryReport`] and the remaining channels are still tried.

use crate::error::{NotifyError, NotifyResult};
use crate::provider::{EmailProvider, LoggingProvider, MessageContent, PushProvider, SmsProvider};
use crate::request::NotificationRequest;
use futures::future::join_all;
use metrics::counter;
use rentora_config::NotificationsConfig;
use rentora_core::{
    Channel, Notification, NotificationId, NotificationKind, NotificationStatus, SharedClock, User,
    UserId,
};
use rentora_repository::{NotificationRepository, UserRepository};
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of one channel attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelOutcome {
    Delivered,
    /// Channel disabled by configuration.
    Disabled,
    Failed(String),
}

/// Per-channel outcomes for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub outcomes: Vec<(Channel, ChannelOutcome)>,
}

impl DeliveryReport {
    pub fn delivered(&self) -> Vec<Channel> {
        self.channels_where(|o| *o == ChannelOutcome::Delivered)
    }

    pub fn failed(&self) -> Vec<Channel> {
        self.channels_where(|o| matches!(o, ChannelOutcome::Failed(_)))
    }

    /// True if at least one channel was attempted and none succeeded.
    pub fn is_undelivered(&self) -> bool {
        self.delivered().is_empty() && !self.failed().is_empty()
    }

    /// Joined failure messages, for logs and job errors.
    pub fn failure_summary(&self) -> String {
        self.outcomes
            .iter()
            .filter_map(|(channel, outcome)| match outcome {
                ChannelOutcome::Failed(e) => Some(format!("{channel}: {e}")),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn channels_where(&self, pred: impl Fn(&ChannelOutcome) -> bool) -> Vec<Channel> {
        self.outcomes
            .iter()
            .filter(|(_, o)| pred(o))
            .map(|(c, _)| *c)
            .collect()
    }
}

/// Sends notification requests through the configured providers.
pub struct NotificationDispatcher {
    users: Arc<dyn UserRepository>,
    notifications: Arc<dyn NotificationRepository>,
    email: Arc<dyn EmailProvider>,
    push: Arc<dyn PushProvider>,
    sms: Arc<dyn SmsProvider>,
    config: NotificationsConfig,
    clock: SharedClock,
}

impl NotificationDispatcher {
    /// Dispatcher wired to logging providers.
    pub fn new(
        users: Arc<dyn UserRepository>,
        notifications: Arc<dyn NotificationRepository>,
        config: NotificationsConfig,
        clock: SharedClock,
    ) -> Self {
        Self {
            users,
            notifications,
            email: Arc::new(LoggingProvider),
            push: Arc::new(LoggingProvider),
            sms: Arc::new(LoggingProvider),
            config,
            clock,
        }
    }

    #[must_use]
    pub fn with_email(mut self, provider: Arc<dyn EmailProvider>) -> Self {
        self.email = provider;
        self
    }

    #[must_use]
    pub fn with_push(mut self, provider: Arc<dyn PushProvider>) -> Self {
        self.push = provider;
        self
    }

    #[must_use]
    pub fn with_sms(mut self, provider: Arc<dyn SmsProvider>) -> Self {
        self.sms = provider;
        self
    }

    /// Delivers one request on each resolved channel.
    ///
    /// The in-app channel stores a `Sent` notification record.
    pub async fn send(&self, request: &NotificationRequest) -> NotifyResult<DeliveryReport> {
        let user = self.recipient(request.user_id).await?;
        let content = MessageContent {
            title: request.title.clone(),
            body: request.message.clone(),
            data: request.data.clone(),
        };

        let mut outcomes = Vec::new();
        for channel in request.resolved_channels() {
            let outcome = if !self.channel_enabled(channel) {
                ChannelOutcome::Disabled
            } else if channel == Channel::InApp {
                self.store_in_app(request).await.into()
            } else {
                self.send_external(channel, &user, &content).await.into()
            };
            record(channel, &outcome);
            outcomes.push((channel, outcome));
        }

        let report = DeliveryReport {
            user_id: request.user_id,
            kind: request.kind,
            outcomes,
        };
        log_report(&report);
        Ok(report)
    }

    /// Sends every request independently; one failing request does not
    /// affect the others.
    pub async fn send_batch(
        &self,
        requests: &[NotificationRequest],
    ) -> Vec<NotifyResult<DeliveryReport>> {
        join_all(requests.iter().map(|r| self.send(r))).await
    }

    /// Delivers a stored notification on its external channels. Its in-app
    /// record is the stored notification itself.
    pub async fn deliver_stored(
        &self,
        notification: &Notification,
    ) -> NotifyResult<DeliveryReport> {
        let user = self.recipient(notification.user_id).await?;
        let content = MessageContent {
            title: notification.title.clone(),
            body: notification.message.clone(),
            data: notification.data.clone(),
        };
        let channels: &[Channel] = if notification.channels.is_empty() {
            notification.kind.default_channels()
        } else {
            &notification.channels
        };

        let mut outcomes = Vec::new();
        for &channel in channels.iter().filter(|c| **c != Channel::InApp) {
            let outcome = if self.channel_enabled(channel) {
                self.send_external(channel, &user, &content).await.into()
            } else {
                ChannelOutcome::Disabled
            };
            record(channel, &outcome);
            outcomes.push((channel, outcome));
        }

        let report = DeliveryReport {
            user_id: notification.user_id,
            kind: notification.kind,
            outcomes,
        };
        log_report(&report);
        Ok(report)
    }

    async fn recipient(&self, user_id: UserId) -> NotifyResult<User> {
        self.users
            .find_user(user_id)
            .await?
            .ok_or(NotifyError::UserNotFound(user_id))
    }

    async fn send_external(
        &self,
        channel: Channel,
        user: &User,
        content: &MessageContent,
    ) -> NotifyResult<()> {
        match channel {
            Channel::Email => {
                let to = user.email.as_deref().ok_or(NotifyError::NoAddress(channel))?;
                self.email.send_email(to, content).await
            }
            Channel::Push => {
                if user.push_tokens.is_empty() {
                    return Err(NotifyError::NoAddress(channel));
                }
                self.push.send_push(&user.push_tokens, content).await
            }
            Channel::Sms => {
                let to = user.phone.as_deref().ok_or(NotifyError::NoAddress(channel))?;
                self.sms.send_sms(to, content).await
            }
            Channel::InApp => Ok(()),
        }
    }

    async fn store_in_app(&self, request: &NotificationRequest) -> NotifyResult<()> {
        let now = self.clock.now();
        self.notifications
            .insert_notification(Notification {
                id: NotificationId::new(),
                user_id: request.user_id,
                kind: request.kind,
                title: request.title.clone(),
                message: request.message.clone(),
                data: request.data.clone(),
                channels: vec![Channel::InApp],
                priority: request.priority(),
                status: NotificationStatus::Sent,
                scheduled_for: None,
                read: false,
                created_at: now,
                sent_at: Some(now),
                failure_reason: None,
            })
            .await?;
        Ok(())
    }

    fn channel_enabled(&self, channel: Channel) -> bool {
        match channel {
            Channel::Email => self.config.email_enabled,
            Channel::Push => self.config.push_enabled,
            Channel::Sms => self.config.sms_enabled,
            Channel::InApp => self.config.in_app_enabled,
        }
    }
}

impl From<NotifyResult<()>> for ChannelOutcome {
    fn from(result: NotifyResult<()>) -> Self {
        match result {
            Ok(()) => Self::Delivered,
            Err(e) => Self::Failed(e.to_string()),
        }
    }
}

fn record(channel: Channel, outcome: &ChannelOutcome) {
    let label = match outcome {
        ChannelOutcome::Delivered => "delivered",
        ChannelOutcome::Disabled => "disabled",
        ChannelOutcome::Failed(_) => "failed",
    };
    counter!(
        "rentora_notifications_total",
        "channel" => channel.as_str(),
        "outcome" => label
    )
    .increment(1);
}

fn log_report(report: &DeliveryReport) {
    if report.failed().is_empty() {
        debug!(
            user_id = %report.user_id,
            kind = ?report.kind,
            delivered = ?report.delivered(),
            "Notification dispatched"
        );
    } else {
        warn!(
            user_id = %report.user_id,
            kind = ?report.kind,
            delivered = ?report.delivered(),
            failures = %report.failure_summary(),
            "Notification partially delivered"
        );
    }
}
