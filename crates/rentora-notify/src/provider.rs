//! Delivery provider ports.
//!
//! Real email, push and SMS gateways live outside the scheduler. The
//! logging providers stand in for them in development.

use crate::error::NotifyResult;
use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

/// Rendered content handed to a provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageContent {
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send_email(&self, to: &str, content: &MessageContent) -> NotifyResult<()>;
}

#[async_trait]
pub trait PushProvider: Send + Sync {
    async fn send_push(&self, device_tokens: &[String], content: &MessageContent)
        -> NotifyResult<()>;
}

#[async_trait]
pub trait SmsProvider: Send + Sync {
    async fn send_sms(&self, to: &str, content: &MessageContent) -> NotifyResult<()>;
}

/// Logs instead of sending.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingProvider;

#[async_trait]
impl EmailProvider for LoggingProvider {
    async fn send_email(&self, to: &str, content: &MessageContent) -> NotifyResult<()> {
        info!(to, title = %content.title, "Email sent");
        Ok(())
    }
}

#[async_trait]
impl PushProvider for LoggingProvider {
    async fn send_push(
        &self,
        device_tokens: &[String],
        content: &MessageContent,
    ) -> NotifyResult<()> {
        info!(devices = device_tokens.len(), title = %content.title, "Push sent");
        Ok(())
    }
}

#[async_trait]
impl SmsProvider for LoggingProvider {
    async fn send_sms(&self, to: &str, content: &MessageContent) -> NotifyResult<()> {
        info!(to, title = %content.title, "SMS sent");
        Ok(())
    }
}
