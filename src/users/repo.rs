use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{UserError, UserResult};
use crate::users::model::{NewUser, User};

/// Persistence contract for user records.
///
/// "Active" reads skip soft-deleted rows; `list_all` and `find_by_id` do not.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn list_active(&self) -> UserResult<Vec<User>>;

    async fn list_all(&self) -> UserResult<Vec<User>>;

    async fn find_active_by_id(&self, id: Uuid) -> UserResult<Option<User>>;

    async fn find_active_by_username(&self, username: &str) -> UserResult<Option<User>>;

    async fn find_by_id(&self, id: Uuid) -> UserResult<Option<User>>;

    /// Inserts atomically, failing with `Conflict` if an active user already
    /// holds the username.
    async fn insert(&self, new: NewUser) -> UserResult<User>;

    /// Persists every mutable column of an existing record and refreshes
    /// `updated_at`. Active-username uniqueness applies here as well.
    async fn save(&self, user: &User) -> UserResult<User>;
}

const COLUMNS: &str =
    "id, username, password_hash, parent_user_id, created_at, updated_at, deleted_at";

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn with_username(e: sqlx::Error, username: &str) -> UserError {
    match UserError::from(e) {
        UserError::Conflict(_) => UserError::Conflict(username.to_string()),
        other => other,
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn list_active(&self) -> UserResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {COLUMNS} FROM users WHERE deleted_at IS NULL ORDER BY created_at"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }

    async fn list_all(&self) -> UserResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {COLUMNS} FROM users ORDER BY created_at"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }

    async fn find_active_by_id(&self, id: Uuid) -> UserResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_active_by_username(&self, username: &str) -> UserResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {COLUMNS} FROM users WHERE username = $1 AND deleted_at IS NULL"
        ))
        .bind(username)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> UserResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn insert(&self, new: NewUser) -> UserResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, password_hash, parent_user_id)
            VALUES ($1, $2, $3)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(&new.username)
        .bind(&new.password_hash)
        .bind(new.parent_user_id)
        .fetch_one(&self.db)
        .await
        .map_err(|e| with_username(e, &new.username))?;
        Ok(user)
    }

    async fn save(&self, user: &User) -> UserResult<User> {
        let saved = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET username = $2, password_hash = $3, parent_user_id = $4,
                deleted_at = $5, updated_at = now()
            WHERE id = $1
            RETURNING {COLUMNS}
            "#
        ))
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.parent_user_id)
        .bind(user.deleted_at)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| with_username(e, &user.username))?;
        saved.ok_or(UserError::NotFound(user.id))
    }
}
