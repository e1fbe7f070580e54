//! # Rentora Repository
//!
//! Ports onto the storage collaborator plus the implementations the
//! scheduler ships with:
//!
//! ```text
//! lifecycle / notify
//!   ↓  Arc<dyn BookingRepository>, Arc<dyn NotificationRepository>, ...
//! InMemoryStore                     (tests, single-process runs)
//!
//! notify
//!   ↓  Arc<dyn UserRepository>
//! CachedUserRepository              (TTL read cache, invalidated on write)
//!   ↓  Arc<dyn CacheInterface>
//! InMemoryCache | RedisCache
//! ```

pub mod cache;
pub mod memory;
pub mod traits;

pub use cache::{CacheExt, CacheInterface, CachedUserRepository, InMemoryCache, RedisCache};
pub use memory::InMemoryStore;
pub use traits::*;
