//! Job handlers for the `bookings`, `payments` and `search` queues.
//!
//! Every handler re-reads the booking before acting and treats a status
//! that no longer matches as a successful no-op.

mod completion;
mod expiration;
mod payment;
mod reminder;
mod search;

pub use completion::AutoCompleteHandler;
pub use expiration::ExpirationHandler;
pub use payment::ReleasePaymentHandler;
pub use reminder::ReminderHandler;
pub use search::IndexListingHandler;
