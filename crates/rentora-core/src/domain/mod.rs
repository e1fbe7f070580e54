//! Domain entities read and written by the scheduler.

pub mod booking;
pub mod condition_report;
pub mod notification;
pub mod review;
pub mod user;

pub use booking::*;
pub use condition_report::*;
pub use notification::*;
pub use review::*;
pub use user::*;
