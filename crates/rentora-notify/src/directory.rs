//! Audience lookups: who the admins are, who is online.

use async_trait::async_trait;
use parking_lot::RwLock;
use rentora_core::{RentoraResult, UserId, UserRole};
use rentora_repository::UserRepository;
use std::collections::HashSet;
use std::sync::Arc;

/// Resolves the admin team.
#[async_trait]
pub trait AdminDirectory: Send + Sync {
    async fn admins(&self) -> RentoraResult<Vec<UserId>>;
}

/// Every user whose role is `Admin`.
pub struct RepositoryAdminDirectory {
    users: Arc<dyn UserRepository>,
}

impl RepositoryAdminDirectory {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl AdminDirectory for RepositoryAdminDirectory {
    async fn admins(&self) -> RentoraResult<Vec<UserId>> {
        Ok(self
            .users
            .find_users_by_role(UserRole::Admin)
            .await?
            .into_iter()
            .map(|u| u.id)
            .collect())
    }
}

/// Tells whether a user currently holds a live connection.
#[async_trait]
pub trait PresenceDirectory: Send + Sync {
    async fn is_online(&self, user_id: UserId) -> bool;
}

/// Presence tracked in process, fed by the connection layer.
#[derive(Debug, Default)]
pub struct InMemoryPresence {
    online: RwLock<HashSet<UserId>>,
}

impl InMemoryPresence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_online(&self, user_id: UserId) {
        self.online.write().insert(user_id);
    }

    pub fn set_offline(&self, user_id: UserId) {
        self.online.write().remove(&user_id);
    }
}

#[async_trait]
impl PresenceDirectory for InMemoryPresence {
    async fn is_online(&self, user_id: UserId) -> bool {
        self.online.read().contains(&user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rentora_core::User;
    use rentora_repository::InMemoryStore;

    #[tokio::test]
    async fn test_admins_resolved_by_role() {
        let store = Arc::new(InMemoryStore::new());
        let admin = store.insert_user(User::new("Root", UserRole::Admin)).await.unwrap();
        store.insert_user(User::new("Renter", UserRole::Renter)).await.unwrap();

        let directory = RepositoryAdminDirectory::new(store);
        assert_eq!(directory.admins().await.unwrap(), vec![admin.id]);
    }

    #[tokio::test]
    async fn test_presence() {
        let presence = InMemoryPresence::new();
        let user = UserId::new();
        assert!(!presence.is_online(user).await);
        presence.set_online(user);
        assert!(presence.is_online(user).await);
        presence.set_offline(user);
        assert!(!presence.is_online(user).await);
    }
}
