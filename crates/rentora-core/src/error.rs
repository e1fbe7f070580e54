//! Unified error types for the scheduler core and its collaborators.

use thiserror::Error;

/// Unified error type for domain and storage operations.
///
/// Job-layer, event-layer and notification-layer errors wrap this type so a
/// storage failure surfacing inside a job handler keeps its retry semantics.
#[derive(Error, Debug)]
pub enum RentoraError {
    // ============ Domain Errors ============
    /// Resource not found
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Conflict error (e.g., duplicate entry)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A lifecycle transition that the booking state graph does not allow.
    #[error("Invalid booking transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    // ============ Infrastructure Errors ============
    /// The storage collaborator failed or could not be reached.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Redis/Cache error
    #[error("Cache error: {0}")]
    Cache(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// External service error
    #[error("External service error: {service} - {message}")]
    ExternalService { service: String, message: String },

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    // ============ Internal Errors ============
    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RentoraError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Cache(_) => "CACHE_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::ExternalService { .. } => "EXTERNAL_SERVICE_ERROR",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Creates a not found error for a resource.
    #[must_use]
    pub fn not_found<T: ToString>(resource_type: &'static str, id: T) -> Self {
        Self::NotFound {
            resource_type,
            id: id.to_string(),
        }
    }

    /// Creates a validation error.
    #[must_use]
    pub fn validation<T: Into<String>>(message: T) -> Self {
        Self::Validation(message.into())
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn configuration<T: Into<String>>(message: T) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates an external service error.
    #[must_use]
    pub fn external<S: Into<String>, M: Into<String>>(service: S, message: M) -> Self {
        Self::ExternalService {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal(message.into())
    }

    /// Checks if this error is a transient infrastructure failure.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::ExternalService { .. } | Self::Cache(_)
        )
    }
}

impl From<serde_json::Error> for RentoraError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON serialization error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(RentoraError::not_found("Booking", 1).error_code(), "NOT_FOUND");
        assert_eq!(RentoraError::validation("bad").error_code(), "VALIDATION_ERROR");
        assert_eq!(RentoraError::RateLimitExceeded.error_code(), "RATE_LIMIT_EXCEEDED");
        assert_eq!(
            RentoraError::InvalidTransition {
                from: "completed".into(),
                to: "cancelled".into()
            }
            .error_code(),
            "INVALID_TRANSITION"
        );
    }

    #[test]
    fn test_retriable_errors() {
        assert!(RentoraError::Storage("connection lost".into()).is_retriable());
        assert!(RentoraError::external("smtp", "down").is_retriable());
        assert!(RentoraError::Cache("evicted".into()).is_retriable());
        assert!(!RentoraError::not_found("Booking", "b-1").is_retriable());
        assert!(!RentoraError::validation("bad input").is_retriable());
        assert!(!RentoraError::configuration("missing").is_retriable());
    }

    #[test]
    fn test_not_found_display() {
        let err = RentoraError::not_found("Booking", "abc");
        let msg = err.to_string();
        assert!(msg.contains("Booking") && msg.contains("abc"));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<u32>("not-a-number").unwrap_err();
        let err = RentoraError::from(json_err);
        assert_eq!(err.error_code(), "INTERNAL_ERROR");
    }
}
