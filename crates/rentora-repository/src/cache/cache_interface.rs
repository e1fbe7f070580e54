//! Cache interface trait for read-through caching.

use async_trait::async_trait;
use rentora_core::RentoraResult;
use std::time::Duration;

/// Cache for read-mostly entities.
///
/// Values are stored as JSON strings so the trait stays object-safe.
#[async_trait]
pub trait CacheInterface: Send + Sync {
    /// Get a raw JSON value. Returns `None` if missing or expired.
    async fn get_raw(&self, key: &str) -> RentoraResult<Option<String>>;

    /// Set a raw JSON value with a TTL.
    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> RentoraResult<()>;

    /// Delete a value. Returns `true` if the key existed.
    async fn delete(&self, key: &str) -> RentoraResult<bool>;

    /// Check if caching is enabled.
    fn is_enabled(&self) -> bool;
}

/// Typed helpers over [`CacheInterface`].
#[async_trait]
pub trait CacheExt: CacheInterface {
    /// Get a typed value from the cache.
    async fn get<T: serde::de::DeserializeOwned + Send>(
        &self,
        key: &str,
    ) -> RentoraResult<Option<T>> {
        match self.get_raw(key).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Set a typed value in the cache.
    async fn set<T: serde::Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> RentoraResult<()> {
        let json = serde_json::to_string(value)?;
        self.set_raw(key, &json, ttl).await
    }
}

impl<T: CacheInterface + ?Sized> CacheExt for T {}
