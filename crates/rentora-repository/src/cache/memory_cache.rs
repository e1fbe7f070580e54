//! Process-local TTL cache.

use super::CacheInterface;
use async_trait::async_trait;
use parking_lot::Mutex;
use rentora_core::RentoraResult;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// In-memory cache with per-entry expiry.
#[derive(Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl InMemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheInterface for InMemoryCache {
    async fn get_raw(&self, key: &str) -> RentoraResult<Option<String>> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some((value, expires_at)) if *expires_at > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> RentoraResult<()> {
        self.entries
            .lock()
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> RentoraResult<bool> {
        Ok(self.entries.lock().remove(key).is_some())
    }

    fn is_enabled(&self) -> bool {
        true
    }
}
