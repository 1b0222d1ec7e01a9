use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{UserError, UserResult};
use crate::users::model::UserChanges;

pub const MIN_PASSWORD_LEN: usize = 6;

/// Request body for creating a user directly.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub parent_user_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

pub fn validate_username(username: &str) -> UserResult<String> {
    let username = username.trim();
    if username.is_empty() {
        return Err(UserError::Validation("Username is required".into()));
    }
    Ok(username.to_string())
}

pub fn validate_password(password: &str) -> UserResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(UserError::Validation("Password too short".into()));
    }
    Ok(())
}

pub fn validate_changes(mut changes: UserChanges) -> UserResult<UserChanges> {
    if let Some(username) = changes.username.as_deref() {
        changes.username = Some(validate_username(username)?);
    }
    if let Some(password) = changes.password.as_deref() {
        validate_password(password)?;
    }
    Ok(changes)
}
