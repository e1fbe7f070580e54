//! Result type aliases for Rentora.

use crate::RentoraError;

/// A specialized `Result` type for Rentora operations.
pub type RentoraResult<T> = Result<T, RentoraError>;
