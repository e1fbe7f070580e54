//! # Rentora Server Library
//!
//! Builds the scheduler process from configuration: stores, queue broker,
//! handlers, listeners and triggers, plus the operational HTTP surface.

pub mod app;
pub mod rate_limit;
pub mod routes;
pub mod startup;

pub use app::App;
pub use routes::{create_router, AppState};
