use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::password::PasswordHasher;
use crate::error::{UserError, UserResult};
use crate::users::model::{NewUser, User, UserChanges, UserNode, UserStatus};
use crate::users::repo::UserStore;
use crate::users::tree::build_tree;

/// CRUD and soft-delete orchestration over a `UserStore`.
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn UserStore>,
    hasher: PasswordHasher,
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>, hasher: PasswordHasher) -> Self {
        Self { store, hasher }
    }

    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    pub async fn get_all(&self) -> UserResult<Vec<User>> {
        self.store.list_active().await
    }

    pub async fn get_by_id(&self, id: Uuid) -> UserResult<Option<User>> {
        self.store.find_active_by_id(id).await
    }

    pub async fn get_by_username(&self, username: &str) -> UserResult<Option<User>> {
        self.store.find_active_by_username(username).await
    }

    /// Forest of everyone below `user_id`, soft-deleted users included.
    #[instrument(skip(self))]
    pub async fn get_user_tree(&self, user_id: Uuid) -> UserResult<Vec<UserNode>> {
        let users = self.store.list_all().await?;
        build_tree(users, Some(user_id))
    }

    #[instrument(skip(self, password))]
    pub async fn create(
        &self,
        username: &str,
        password: &str,
        parent_user_id: Option<Uuid>,
    ) -> UserResult<User> {
        // fast path; the store re-checks atomically on insert
        if self.store.find_active_by_username(username).await?.is_some() {
            warn!(%username, "username already exists");
            return Err(UserError::Conflict(username.to_string()));
        }

        let password_hash = self.hasher.hash_blocking(password.to_string()).await?;
        let user = self
            .store
            .insert(NewUser {
                username: username.to_string(),
                password_hash,
                parent_user_id,
            })
            .await?;

        info!(user_id = %user.id, %username, "user created");
        Ok(user)
    }

    /// Applies the provided fields. Works on soft-deleted records too and
    /// never touches `deleted_at`.
    #[instrument(skip(self, changes))]
    pub async fn update(&self, id: Uuid, changes: UserChanges) -> UserResult<User> {
        let mut user = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(UserError::NotFound(id))?;

        if let Some(username) = changes.username {
            user.username = username;
        }
        if let Some(password) = changes.password {
            user.password_hash = self.hasher.hash_blocking(password).await?;
        }
        if let Some(parent_user_id) = changes.parent_user_id {
            user.parent_user_id = parent_user_id;
        }

        let user = self.store.save(&user).await?;
        info!(user_id = %user.id, "user updated");
        Ok(user)
    }

    /// Marks the user deleted. Deletion is terminal: repeating it returns the
    /// record unchanged with its original `deleted_at`.
    #[instrument(skip(self))]
    pub async fn soft_delete(&self, id: Uuid) -> UserResult<User> {
        let mut user = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(UserError::NotFound(id))?;

        if user.status() == UserStatus::Deleted {
            info!(user_id = %id, "user already deleted");
            return Ok(user);
        }

        user.deleted_at = Some(OffsetDateTime::now_utc());
        let user = self.store.save(&user).await?;
        info!(user_id = %id, "user soft-deleted");
        Ok(user)
    }
}

#[cfg(test)]
pub(crate) fn memory_service() -> UserService {
    use crate::auth::password::fast_hasher;
    use crate::users::memory::InMemoryUserStore;

    UserService::new(Arc::new(InMemoryUserStore::new()), fast_hasher())
}
