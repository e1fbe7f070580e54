//! # Rentora Core
//!
//! Core types, domain entities, and error definitions shared by every crate
//! of the Rentora booking scheduler.
//!
//! The scheduler never keeps a booking in memory between job runs; the
//! entities defined here are snapshots read from the storage collaborator
//! and written back through partial patches.

pub mod clock;
pub mod domain;
pub mod error;
pub mod id;
pub mod result;
pub mod telemetry;

pub use clock::*;
pub use domain::*;
pub use error::*;
pub use id::*;
pub use result::*;
