//! Event fabric errors.

use thiserror::Error;

/// Result type for registration.
pub type EventResult<T> = Result<T, EventError>;

/// Registration-time errors. Listener failures at dispatch time are logged
/// and reported, never raised.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    #[error("Listener {listener} is already registered for {event}")]
    DuplicateListener { event: String, listener: String },

    #[error("No listeners registered for: {}", .0.join(", "))]
    MissingListeners(Vec<String>),
}
