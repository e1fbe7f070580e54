//! # Rentora Lifecycle
//!
//! Drives bookings through the time-based part of their lifecycle.
//!
//! ```text
//! booking.created ──► schedule-expiration ──► CheckExpiration (delayed 30m)
//!                                                  │
//! expiration sweep (5m) ─────────────────────────► ┘   PENDING_* ──► CANCELLED
//!
//! booking.confirmed ──► SendReminder(UPCOMING) (delayed to start - 24h)
//! reminder sweeps (1h / 6h) ──► SendReminder(UPCOMING | RETURN_DUE)
//!
//! auto-completion sweep (1h) ──► AutoComplete ──► COMPLETED ──► ReleasePayment
//!                                                     └──► booking.completed
//!
//! notification flush (1m): SCHEDULED ──► PENDING ──► DeliverScheduled
//! rating reconciliation (6h): recompute and repair drifted summaries
//! ```
//!
//! The delayed per-booking expiration job and the expiration sweep overlap
//! on purpose: the sweep picks up any booking whose delayed job was lost.
//! Both enqueue under the same dedup key.

pub mod handlers;
pub mod jobs;
pub mod listeners;
pub mod messages;
pub mod policy;
pub mod ports;
pub mod sweeps;
pub mod wiring;

pub use handlers::{
    AutoCompleteHandler, ExpirationHandler, IndexListingHandler, ReleasePaymentHandler,
    ReminderHandler,
};
pub use jobs::{
    AutoComplete, CheckExpiration, IndexListing, IndexOp, LifecycleJobs, ReleasePayment,
    ReminderKind, SendReminder, BOOKINGS_QUEUE, PAYMENTS_QUEUE, SEARCH_QUEUE,
};
pub use listeners::register_listeners;
pub use messages::EXPIRED_REASON;
pub use policy::LifecyclePolicy;
pub use ports::{LoggingPaymentReleaser, NoopSearchIndexer, PaymentReleaser, SearchIndexer};
pub use sweeps::{
    AutoCompletionSweep, ExpirationSweep, NotificationFlushSweep, RatingReconciliationSweep,
    ReminderSweep,
};
pub use wiring::LifecycleServices;
