//! Explicit construction of the lifecycle's handlers, triggers and listeners.

use crate::handlers::{
    AutoCompleteHandler, ExpirationHandler, IndexListingHandler, ReleasePaymentHandler,
    ReminderHandler,
};
use crate::jobs::{
    AutoComplete, CheckExpiration, IndexListing, LifecycleJobs, ReleasePayment, SendReminder,
};
use crate::listeners::register_listeners;
use crate::policy::LifecyclePolicy;
use crate::ports::{LoggingPaymentReleaser, NoopSearchIndexer, PaymentReleaser, SearchIndexer};
use crate::sweeps::{
    self, AutoCompletionSweep, ExpirationSweep, NotificationFlushSweep, RatingReconciliationSweep,
    ReminderSweep,
};
use rentora_config::SweepsConfig;
use rentora_core::SharedClock;
use rentora_events::{EventBus, EventRegistry, EventResult};
use rentora_jobs::{
    HandlerRegistry, JobError, JobQueue, JobResult, TriggerAction, TriggerSchedule, TriggerTable,
};
use rentora_notify::{
    AdminDirectory, InMemoryPresence, Notifier, PresenceDirectory, RepositoryAdminDirectory,
};
use rentora_repository::{
    BookingRepository, ConditionReportRepository, NotificationRepository, ReviewRepository,
    UserRepository,
};
use std::sync::Arc;
use tracing::info;

/// Everything the lifecycle needs, constructed once by the process
/// bootstrap and passed by handle.
#[derive(Clone)]
pub struct LifecycleServices {
    pub bookings: Arc<dyn BookingRepository>,
    pub reports: Arc<dyn ConditionReportRepository>,
    pub reviews: Arc<dyn ReviewRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub jobs: LifecycleJobs,
    pub notifier: Notifier,
    pub admins: Arc<dyn AdminDirectory>,
    pub presence: Arc<dyn PresenceDirectory>,
    pub payments: Arc<dyn PaymentReleaser>,
    pub search: Arc<dyn SearchIndexer>,
    pub clock: SharedClock,
}

impl LifecycleServices {
    /// Services over one store implementing every repository port, with
    /// repository-backed admin resolution, in-process presence, and the
    /// logging payment and no-op search collaborators.
    pub fn from_store<S>(store: Arc<S>, queue: JobQueue, policy: LifecyclePolicy) -> Self
    where
        S: BookingRepository
            + ConditionReportRepository
            + ReviewRepository
            + NotificationRepository
            + UserRepository
            + 'static,
    {
        let clock = Arc::clone(queue.clock());
        Self {
            bookings: store.clone(),
            reports: store.clone(),
            reviews: store.clone(),
            notifications: store.clone(),
            admins: Arc::new(RepositoryAdminDirectory::new(store)),
            presence: Arc::new(InMemoryPresence::new()),
            payments: Arc::new(LoggingPaymentReleaser),
            search: Arc::new(NoopSearchIndexer),
            notifier: Notifier::new(queue.clone()),
            jobs: LifecycleJobs::new(queue, policy),
            clock,
        }
    }

    #[must_use]
    pub fn with_presence(mut self, presence: Arc<dyn PresenceDirectory>) -> Self {
        self.presence = presence;
        self
    }

    #[must_use]
    pub fn with_admins(mut self, admins: Arc<dyn AdminDirectory>) -> Self {
        self.admins = admins;
        self
    }

    #[must_use]
    pub fn with_payments(mut self, payments: Arc<dyn PaymentReleaser>) -> Self {
        self.payments = payments;
        self
    }

    #[must_use]
    pub fn with_search(mut self, search: Arc<dyn SearchIndexer>) -> Self {
        self.search = search;
        self
    }

    /// Event registration table with every lifecycle listener bound.
    pub fn event_registry(&self) -> EventResult<EventRegistry> {
        let mut registry = EventRegistry::new();
        register_listeners(
            &mut registry,
            &self.notifier,
            &self.jobs,
            Arc::clone(&self.admins),
            Arc::clone(&self.presence),
        )?;
        Ok(registry)
    }

    /// Binds the `bookings`, `payments` and `search` handlers. `events` is
    /// the bus auto-completion emits `booking.completed` on.
    pub fn register_handlers(
        &self,
        registry: &mut HandlerRegistry,
        events: EventBus,
    ) -> JobResult<()> {
        registry.register_payload::<CheckExpiration, _>(ExpirationHandler::new(
            Arc::clone(&self.bookings),
            self.notifier.clone(),
            Arc::clone(&self.clock),
        ))?;
        registry.register_payload::<SendReminder, _>(ReminderHandler::new(
            Arc::clone(&self.bookings),
            self.notifier.clone(),
            Arc::clone(&self.clock),
        ))?;
        registry.register_payload::<AutoComplete, _>(AutoCompleteHandler::new(
            Arc::clone(&self.bookings),
            Arc::clone(&self.reports),
            self.jobs.clone(),
            events,
            Arc::clone(&self.clock),
        ))?;
        registry.register_payload::<ReleasePayment, _>(ReleasePaymentHandler::new(
            Arc::clone(&self.bookings),
            Arc::clone(&self.payments),
            self.notifier.clone(),
            Arc::clone(&self.clock),
        ))?;
        registry.register_payload::<IndexListing, _>(IndexListingHandler::new(Arc::clone(
            &self.search,
        )))?;
        Ok(())
    }

    /// Sweep trigger table; empty when sweeps are disabled.
    pub fn trigger_table(&self, config: &SweepsConfig) -> JobResult<TriggerTable> {
        let mut table = TriggerTable::new();
        if !config.enabled {
            info!("Lifecycle sweeps disabled");
            return Ok(table);
        }
        for (name, schedule) in config.schedules() {
            table.add(name, TriggerSchedule::from_config(schedule)?, self.sweep(name)?)?;
        }
        Ok(table)
    }

    fn sweep(&self, name: &str) -> JobResult<Arc<dyn TriggerAction>> {
        let bookings = Arc::clone(&self.bookings);
        let clock = Arc::clone(&self.clock);
        let action: Arc<dyn TriggerAction> = match name {
            sweeps::EXPIRATION => {
                Arc::new(ExpirationSweep::new(bookings, self.jobs.clone(), clock))
            }
            sweeps::UPCOMING_REMINDERS => {
                Arc::new(ReminderSweep::upcoming(bookings, self.jobs.clone(), clock))
            }
            sweeps::RETURN_REMINDERS => {
                Arc::new(ReminderSweep::return_due(bookings, self.jobs.clone(), clock))
            }
            sweeps::AUTO_COMPLETION => {
                Arc::new(AutoCompletionSweep::new(bookings, self.jobs.clone(), clock))
            }
            sweeps::RATING_RECONCILIATION => {
                Arc::new(RatingReconciliationSweep::new(Arc::clone(&self.reviews)))
            }
            sweeps::NOTIFICATION_FLUSH => Arc::new(NotificationFlushSweep::new(
                Arc::clone(&self.notifications),
                self.notifier.clone(),
                clock,
                self.jobs.policy().flush_batch_size,
            )),
            other => return Err(JobError::Configuration(format!("Unknown sweep: {other}"))),
        };
        Ok(action)
    }
}
