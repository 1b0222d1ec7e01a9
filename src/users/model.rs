use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, FromRow, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string, never exposed in JSON
    pub parent_user_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub deleted_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserStatus {
    Active,
    Deleted,
}

impl User {
    pub fn status(&self) -> UserStatus {
        match self.deleted_at {
            Some(_) => UserStatus::Deleted,
            None => UserStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status() == UserStatus::Active
    }
}

/// A record about to be inserted; the store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub parent_user_id: Option<Uuid>,
}

/// Partial update. `None` leaves a field untouched; for the parent,
/// `Some(None)` clears it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserChanges {
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub parent_user_id: Option<Option<Uuid>>,
}

fn present<'de, D>(d: D) -> Result<Option<Option<Uuid>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Uuid>::deserialize(d).map(Some)
}

/// A user with its nested descendants.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserNode {
    #[serde(flatten)]
    pub user: User,
    pub children: Vec<UserNode>,
}
