use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{UserError, UserResult};
use crate::users::model::{NewUser, User};
use crate::users::repo::UserStore;

/// In-memory `UserStore` backing the unit and router tests.
///
/// Uniqueness checks and writes happen under one write lock, so concurrent
/// inserts of the same username cannot both succeed.
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn username_taken(users: &HashMap<Uuid, User>, username: &str, except: Option<Uuid>) -> bool {
    users
        .values()
        .any(|u| u.is_active() && u.username == username && Some(u.id) != except)
}

fn by_creation(mut users: Vec<User>) -> Vec<User> {
    users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    users
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn list_active(&self) -> UserResult<Vec<User>> {
        let users = self.users.read().await;
        Ok(by_creation(
            users.values().filter(|u| u.is_active()).cloned().collect(),
        ))
    }

    async fn list_all(&self) -> UserResult<Vec<User>> {
        let users = self.users.read().await;
        Ok(by_creation(users.values().cloned().collect()))
    }

    async fn find_active_by_id(&self, id: Uuid) -> UserResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(&id).filter(|u| u.is_active()).cloned())
    }

    async fn find_active_by_username(&self, username: &str) -> UserResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| u.is_active() && u.username == username)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> UserResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(&id).cloned())
    }

    async fn insert(&self, new: NewUser) -> UserResult<User> {
        let mut users = self.users.write().await;
        if username_taken(&users, &new.username, None) {
            return Err(UserError::Conflict(new.username));
        }

        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            username: new.username,
            password_hash: new.password_hash,
            parent_user_id: new.parent_user_id,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn save(&self, user: &User) -> UserResult<User> {
        let mut users = self.users.write().await;
        if !users.contains_key(&user.id) {
            return Err(UserError::NotFound(user.id));
        }
        if user.is_active() && username_taken(&users, &user.username, Some(user.id)) {
            return Err(UserError::Conflict(user.username.clone()));
        }

        let mut saved = user.clone();
        saved.updated_at = OffsetDateTime::now_utc();
        users.insert(saved.id, saved.clone());
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.into(),
            password_hash: "hash".into(),
            parent_user_id: None,
        }
    }

    #[tokio::test]
    async fn concurrent_inserts_of_same_username_persist_once() {
        let store = InMemoryUserStore::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.insert(new_user("racer")).await })
            })
            .collect();

        let mut ok = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => ok += 1,
                Err(UserError::Conflict(name)) => assert_eq!(name, "racer"),
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn deleted_rows_are_hidden_from_active_reads_only() {
        let store = InMemoryUserStore::new();
        let mut user = store.insert(new_user("ghost")).await.unwrap();
        user.deleted_at = Some(OffsetDateTime::now_utc());
        store.save(&user).await.unwrap();

        assert!(store.find_active_by_id(user.id).await.unwrap().is_none());
        assert!(store.find_active_by_username("ghost").await.unwrap().is_none());
        assert!(store.list_active().await.unwrap().is_empty());
        assert!(store.find_by_id(user.id).await.unwrap().is_some());
        assert_eq!(store.list_all().await.unwrap().len(), 1);

        // the name is free again once its holder is deleted
        store.insert(new_user("ghost")).await.unwrap();
    }

    #[tokio::test]
    async fn save_refreshes_updated_at_and_rejects_unknown_ids() {
        let store = InMemoryUserStore::new();
        let user = store.insert(new_user("clock")).await.unwrap();
        let saved = store.save(&user).await.unwrap();
        assert!(saved.updated_at >= user.updated_at);
        assert_eq!(saved.created_at, user.created_at);

        let mut stranger = user.clone();
        stranger.id = Uuid::new_v4();
        assert!(matches!(
            store.save(&stranger).await,
            Err(UserError::NotFound(id)) if id == stranger.id
        ));
    }
}
