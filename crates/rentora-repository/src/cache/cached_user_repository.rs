//! Read-through cache in front of user profile reads.

use super::{CacheExt, CacheInterface};
use crate::traits::UserRepository;
use async_trait::async_trait;
use rentora_core::{RentoraResult, User, UserId, UserRole};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Caches `find_user` results and invalidates them on every write.
///
/// Cache failures degrade to a direct read; they never fail the call.
pub struct CachedUserRepository {
    inner: Arc<dyn UserRepository>,
    cache: Arc<dyn CacheInterface>,
    ttl: Duration,
}

impl CachedUserRepository {
    #[must_use]
    pub fn new(
        inner: Arc<dyn UserRepository>,
        cache: Arc<dyn CacheInterface>,
        ttl: Duration,
    ) -> Self {
        Self { inner, cache, ttl }
    }

    fn key(id: UserId) -> String {
        format!("user:{id}")
    }

    async fn invalidate(&self, id: UserId) {
        if let Err(e) = self.cache.delete(&Self::key(id)).await {
            warn!(user_id = %id, error = %e, "Failed to invalidate cached user");
        }
    }
}

#[async_trait]
impl UserRepository for CachedUserRepository {
    async fn find_user(&self, id: UserId) -> RentoraResult<Option<User>> {
        if self.cache.is_enabled() {
            match self.cache.get::<User>(&Self::key(id)).await {
                Ok(Some(user)) => return Ok(Some(user)),
                Ok(None) => {}
                Err(e) => warn!(user_id = %id, error = %e, "User cache read failed"),
            }
        }

        let user = self.inner.find_user(id).await?;
        if let Some(user) = &user {
            if let Err(e) = self.cache.set(&Self::key(id), user, self.ttl).await {
                warn!(user_id = %id, error = %e, "User cache write failed");
            }
        }
        Ok(user)
    }

    async fn find_users_by_role(&self, role: UserRole) -> RentoraResult<Vec<User>> {
        self.inner.find_users_by_role(role).await
    }

    async fn insert_user(&self, user: User) -> RentoraResult<User> {
        let id = user.id;
        let saved = self.inner.insert_user(user).await?;
        self.invalidate(id).await;
        Ok(saved)
    }

    async fn update_user(&self, user: &User) -> RentoraResult<User> {
        let saved = self.inner.update_user(user).await?;
        self.invalidate(user.id).await;
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::memory::InMemoryStore;
    use parking_lot::Mutex;

    /// Counts reads that reach the backing store.
    struct CountingUsers {
        inner: InMemoryStore,
        reads: Mutex<u32>,
    }

    #[async_trait]
    impl UserRepository for CountingUsers {
        async fn find_user(&self, id: UserId) -> RentoraResult<Option<User>> {
            *self.reads.lock() += 1;
            self.inner.find_user(id).await
        }

        async fn find_users_by_role(&self, role: UserRole) -> RentoraResult<Vec<User>> {
            self.inner.find_users_by_role(role).await
        }

        async fn insert_user(&self, user: User) -> RentoraResult<User> {
            self.inner.insert_user(user).await
        }

        async fn update_user(&self, user: &User) -> RentoraResult<User> {
            self.inner.update_user(user).await
        }
    }

    #[tokio::test]
    async fn test_reads_are_cached_and_writes_invalidate() {
        let backing = Arc::new(CountingUsers {
            inner: InMemoryStore::new(),
            reads: Mutex::new(0),
        });
        let repo = CachedUserRepository::new(
            backing.clone(),
            Arc::new(InMemoryCache::new()),
            Duration::from_secs(900),
        );

        let user = repo
            .insert_user(User::new("Ana", UserRole::Renter).with_email("ana@example.com"))
            .await
            .unwrap();

        repo.find_user(user.id).await.unwrap();
        repo.find_user(user.id).await.unwrap();
        assert_eq!(*backing.reads.lock(), 1);

        let mut updated = user.clone();
        updated.email = Some("ana@new.example.com".into());
        repo.update_user(&updated).await.unwrap();

        let fresh = repo.find_user(user.id).await.unwrap().unwrap();
        assert_eq!(fresh.email.as_deref(), Some("ana@new.example.com"));
        assert_eq!(*backing.reads.lock(), 2);
    }
}
