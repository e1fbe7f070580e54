//! Domain event listeners.
//!
//! | Event | Listeners |
//! |---|---|
//! | `booking.created` | notify owner, schedule expiration check |
//! | `booking.confirmed` | notify renter, schedule upcoming reminder |
//! | `booking.cancelled` | notify both parties |
//! | `booking.completed` | prompt both parties for reviews |
//! | `payment.*` | notify payer (and payee on success) |
//! | `listing.*` | enqueue search index operation |
//! | `review.created` | notify reviewee, reindex listing |
//! | `dispute.created` | notify every admin, high priority |
//! | `message.sent` | push to the recipient if offline |
//! | `user.registered`, `user.verified.email` | welcome / verified notices |

use crate::jobs::{IndexOp, LifecycleJobs, ReminderKind};
use crate::messages;
use anyhow::Context;
use async_trait::async_trait;
use rentora_core::Channel;
use rentora_events::{names, DomainEvent, EventListener, EventRegistry, EventResult, ListenerResult};
use rentora_notify::{AdminDirectory, Notifier, PresenceDirectory};
use std::sync::Arc;
use tracing::{debug, warn};

/// Sends the party notifications `messages::for_event` composes.
///
/// Each request is deduplicated per event subject and recipient.
pub struct NotifyParties {
    notifier: Notifier,
}

impl NotifyParties {
    pub fn new(notifier: Notifier) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl EventListener for NotifyParties {
    fn name(&self) -> &str {
        "notify-parties"
    }

    async fn handle(&self, event: &DomainEvent) -> ListenerResult {
        for request in messages::for_event(event) {
            let key = format!("{}:{}:{}", event.name(), event.subject_id(), request.user_id);
            self.notifier.notify_once(request, key).await?;
        }
        Ok(())
    }
}

/// Schedules the delayed expiration check for a new booking.
pub struct ScheduleExpiration {
    jobs: LifecycleJobs,
}

impl ScheduleExpiration {
    pub fn new(jobs: LifecycleJobs) -> Self {
        Self { jobs }
    }
}

#[async_trait]
impl EventListener for ScheduleExpiration {
    fn name(&self) -> &str {
        "schedule-expiration"
    }

    async fn handle(&self, event: &DomainEvent) -> ListenerResult {
        if let DomainEvent::BookingCreated(e) = event {
            if e.booking.status.is_pending() {
                self.jobs.schedule_expiration(&e.booking).await?;
            }
        }
        Ok(())
    }
}

/// Schedules the upcoming reminder for the reminder lead before start.
pub struct ScheduleUpcomingReminder {
    jobs: LifecycleJobs,
}

impl ScheduleUpcomingReminder {
    pub fn new(jobs: LifecycleJobs) -> Self {
        Self { jobs }
    }
}

#[async_trait]
impl EventListener for ScheduleUpcomingReminder {
    fn name(&self) -> &str {
        "schedule-upcoming-reminder"
    }

    async fn handle(&self, event: &DomainEvent) -> ListenerResult {
        if let DomainEvent::BookingConfirmed(e) = event {
            let run_at = e.booking.start_date - self.jobs.policy().reminder_lead;
            self.jobs
                .schedule_reminder(e.booking.id, ReminderKind::Upcoming, run_at)
                .await?;
        }
        Ok(())
    }
}

/// Keeps listings searchable after listing and review changes.
pub struct IndexListings {
    jobs: LifecycleJobs,
}

impl IndexListings {
    pub fn new(jobs: LifecycleJobs) -> Self {
        Self { jobs }
    }
}

#[async_trait]
impl EventListener for IndexListings {
    fn name(&self) -> &str {
        "index-listings"
    }

    async fn handle(&self, event: &DomainEvent) -> ListenerResult {
        let (listing_id, op) = match event {
            DomainEvent::ListingCreated(e) | DomainEvent::ListingUpdated(e) => {
                (e.listing_id, IndexOp::Upsert)
            }
            DomainEvent::ListingDeleted(e) => (e.listing_id, IndexOp::Delete),
            DomainEvent::ReviewCreated(e) => match e.review.listing_id {
                Some(listing_id) => (listing_id, IndexOp::Upsert),
                None => return Ok(()),
            },
            _ => return Ok(()),
        };
        self.jobs.index_listing(listing_id, op).await?;
        Ok(())
    }
}

/// Alerts the admin team to a new dispute.
pub struct NotifyAdmins {
    notifier: Notifier,
    admins: Arc<dyn AdminDirectory>,
}

impl NotifyAdmins {
    pub fn new(notifier: Notifier, admins: Arc<dyn AdminDirectory>) -> Self {
        Self { notifier, admins }
    }
}

#[async_trait]
impl EventListener for NotifyAdmins {
    fn name(&self) -> &str {
        "notify-admins"
    }

    async fn handle(&self, event: &DomainEvent) -> ListenerResult {
        let DomainEvent::DisputeCreated(dispute) = event else {
            return Ok(());
        };

        let admins = self
            .admins
            .admins()
            .await
            .context("resolving admin audience")?;
        if admins.is_empty() {
            warn!(dispute_id = %dispute.dispute_id, "No admins to notify of dispute");
        }
        for admin_id in admins {
            let key = format!("dispute:{}:{admin_id}", dispute.dispute_id);
            self.notifier
                .notify_once(messages::dispute_opened(admin_id, dispute), key)
                .await?;
        }
        Ok(())
    }
}

/// Pushes new messages to recipients without a live connection.
pub struct NotifyOfflineRecipient {
    notifier: Notifier,
    presence: Arc<dyn PresenceDirectory>,
}

impl NotifyOfflineRecipient {
    pub fn new(notifier: Notifier, presence: Arc<dyn PresenceDirectory>) -> Self {
        Self { notifier, presence }
    }
}

#[async_trait]
impl EventListener for NotifyOfflineRecipient {
    fn name(&self) -> &str {
        "notify-offline-recipient"
    }

    async fn handle(&self, event: &DomainEvent) -> ListenerResult {
        let DomainEvent::MessageSent(message) = event else {
            return Ok(());
        };
        if self.presence.is_online(message.recipient_id).await {
            debug!(message_id = %message.message_id, "Recipient online, skipping push");
            return Ok(());
        }
        let request = messages::message_received(message).with_channels([Channel::Push]);
        self.notifier
            .notify_once(request, format!("message:{}", message.message_id))
            .await?;
        Ok(())
    }
}

/// Binds every lifecycle listener and checks each known event has one.
pub fn register_listeners(
    registry: &mut EventRegistry,
    notifier: &Notifier,
    jobs: &LifecycleJobs,
    admins: Arc<dyn AdminDirectory>,
    presence: Arc<dyn PresenceDirectory>,
) -> EventResult<()> {
    let parties: Arc<dyn EventListener> = Arc::new(NotifyParties::new(notifier.clone()));
    let indexer: Arc<dyn EventListener> = Arc::new(IndexListings::new(jobs.clone()));

    registry.on(names::BOOKING_CREATED, Arc::clone(&parties))?;
    registry.on(
        names::BOOKING_CREATED,
        Arc::new(ScheduleExpiration::new(jobs.clone())),
    )?;
    registry.on(names::BOOKING_CONFIRMED, Arc::clone(&parties))?;
    registry.on(
        names::BOOKING_CONFIRMED,
        Arc::new(ScheduleUpcomingReminder::new(jobs.clone())),
    )?;
    registry.on_each(
        &[
            names::BOOKING_CANCELLED,
            names::BOOKING_COMPLETED,
            names::PAYMENT_SUCCEEDED,
            names::PAYMENT_FAILED,
            names::PAYMENT_REFUNDED,
            names::REVIEW_CREATED,
            names::USER_REGISTERED,
            names::USER_VERIFIED_EMAIL,
        ],
        &parties,
    )?;
    registry.on_each(
        &[
            names::LISTING_CREATED,
            names::LISTING_UPDATED,
            names::LISTING_DELETED,
            names::REVIEW_CREATED,
        ],
        &indexer,
    )?;
    registry.on(
        names::DISPUTE_CREATED,
        Arc::new(NotifyAdmins::new(notifier.clone(), admins)),
    )?;
    registry.on(
        names::MESSAGE_SENT,
        Arc::new(NotifyOfflineRecipient::new(notifier.clone(), presence)),
    )?;

    registry.validate(&names::ALL)
}
