//! Stored notifications and the vocabulary shared with the dispatch layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{NotificationId, UserId};

/// Delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Channel {
    Email,
    Push,
    InApp,
    Sms,
}

impl Channel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Push => "push",
            Self::InApp => "in_app",
            Self::Sms => "sms",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of notification; selects the default channel set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    BookingRequest,
    BookingConfirmed,
    BookingCancelled,
    BookingExpired,
    BookingCompleted,
    BookingReminder,
    PaymentReceived,
    PaymentFailed,
    PaymentRefunded,
    ReviewReceived,
    ReviewPrompt,
    DisputeOpened,
    MessageReceived,
    Welcome,
    EmailVerified,
    System,
}

impl NotificationKind {
    /// Channels used when a request does not name any.
    #[must_use]
    pub fn default_channels(self) -> &'static [Channel] {
        match self {
            Self::BookingRequest
            | Self::BookingConfirmed
            | Self::BookingCancelled
            | Self::BookingExpired
            | Self::PaymentReceived
            | Self::PaymentFailed
            | Self::PaymentRefunded
            | Self::DisputeOpened => &[Channel::Email, Channel::Push, Channel::InApp],
            Self::BookingReminder | Self::BookingCompleted | Self::ReviewPrompt => {
                &[Channel::Push, Channel::InApp, Channel::Email]
            }
            Self::ReviewReceived | Self::System => &[Channel::InApp, Channel::Push],
            Self::MessageReceived => &[Channel::Push],
            Self::Welcome | Self::EmailVerified => &[Channel::Email, Channel::InApp],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationPriority {
    Low,
    #[default]
    Normal,
    High,
}

/// Persistence status of a stored notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationStatus {
    /// Waiting for `scheduled_for` to pass.
    Scheduled,
    /// Claimed by the flush sweep, delivery job enqueued.
    Pending,
    Sent,
    Failed,
}

/// A notification persisted by the storage collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
    /// Empty means the kind's default channels.
    pub channels: Vec<Channel>,
    pub priority: NotificationPriority,
    pub status: NotificationStatus,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
}

impl Notification {
    /// Returns true if the notification is scheduled and its time has come.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == NotificationStatus::Scheduled
            && self.scheduled_for.map_or(true, |at| at <= now)
    }
}
