//! # Rentora Events
//!
//! In-process publish/subscribe for domain events. HTTP actions and job
//! handlers emit a [`DomainEvent`]; the [`EventBus`] runs every listener
//! registered for that event name, isolating failures so one broken
//! listener never stops its siblings.
//!
//! Listeners are bound in an explicit [`EventRegistry`] built at startup and
//! validated before the process accepts traffic.

pub mod bus;
pub mod error;
pub mod event;
pub mod listener;
pub mod registry;

pub use bus::{DispatchReport, EventBus, ListenerFailure};
pub use error::{EventError, EventResult};
pub use event::{
    names, BookingEvent, DisputeEvent, DomainEvent, ListingEvent, MessageEvent, PaymentEvent,
    ReviewEvent, UserEvent,
};
pub use listener::{listener_fn, EventListener, ListenerResult};
pub use registry::EventRegistry;
