//! Delivery intents.

use rentora_core::{Channel, NotificationKind, NotificationPriority, UserId};
use serde::{Deserialize, Serialize};

/// What to tell a user, and on which channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub data: serde_json::Value,
    /// Empty means the kind's default channels.
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub priority: Option<NotificationPriority>,
}

impl NotificationRequest {
    pub fn new(
        user_id: UserId,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            kind,
            title: title.into(),
            message: message.into(),
            data: serde_json::Value::Null,
            channels: Vec::new(),
            priority: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    #[must_use]
    pub fn with_channels(mut self, channels: impl IntoIterator<Item = Channel>) -> Self {
        self.channels = channels.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Explicit channels, or the kind's defaults. Never empty; duplicates
    /// removed in first-seen order.
    pub fn resolved_channels(&self) -> Vec<Channel> {
        let source: &[Channel] = if self.channels.is_empty() {
            self.kind.default_channels()
        } else {
            &self.channels
        };
        let mut resolved = Vec::with_capacity(source.len());
        for channel in source {
            if !resolved.contains(channel) {
                resolved.push(*channel);
            }
        }
        resolved
    }

    pub fn priority(&self) -> NotificationPriority {
        self.priority.unwrap_or_default()
    }
}
