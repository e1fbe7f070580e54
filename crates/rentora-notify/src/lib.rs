//! # Rentora Notify
//!
//! Notification dispatch consumer. Requests resolve their channels (explicit
//! or the kind's defaults) and each channel is handed to its provider port
//! independently; in-app delivery writes a notification record.
//!
//! Requests normally travel through the `notifications` job queue via
//! [`Notifier`], so delivery gets the queue's retry and dedup guarantees.

pub mod directory;
pub mod dispatcher;
pub mod error;
pub mod jobs;
pub mod provider;
pub mod request;

pub use directory::{AdminDirectory, InMemoryPresence, PresenceDirectory, RepositoryAdminDirectory};
pub use dispatcher::{ChannelOutcome, DeliveryReport, NotificationDispatcher};
pub use error::{NotifyError, NotifyResult};
pub use jobs::{
    register_handlers, DeliverScheduled, DeliverScheduledHandler, Notifier, SendNotification,
    SendNotificationHandler, NOTIFICATIONS_QUEUE,
};
pub use provider::{EmailProvider, LoggingProvider, MessageContent, PushProvider, SmsProvider};
pub use request::NotificationRequest;
