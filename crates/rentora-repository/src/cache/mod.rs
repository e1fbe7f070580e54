//! Read caches for user profiles.

mod cache_interface;
mod cached_user_repository;
mod memory_cache;
mod redis_cache;

pub use cache_interface::{CacheExt, CacheInterface};
pub use cached_user_repository::CachedUserRepository;
pub use memory_cache::InMemoryCache;
pub use redis_cache::RedisCache;
