use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Why a bearer token was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("token signature mismatch")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("token signing failed: {0}")]
    Signing(String),
}

#[derive(Debug, Error)]
pub enum UserError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("username '{0}' already exists")]
    Conflict(String),

    #[error("user not found: {0}")]
    NotFound(Uuid),

    #[error("unauthorized")]
    Unauthorized,

    #[error("invalid token: {0}")]
    InvalidToken(#[from] TokenError),

    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("cyclic user hierarchy at {0}")]
    CyclicHierarchy(Uuid),

    #[error("user hierarchy deeper than {0} levels")]
    HierarchyTooDeep(usize),

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type UserResult<T> = Result<T, UserError>;

const ACTIVE_USERNAME_INDEX: &str = "users_username_active_idx";

impl From<sqlx::Error> for UserError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() && db.constraint() == Some(ACTIVE_USERNAME_INDEX) {
                return UserError::Conflict(String::new());
            }
        }
        UserError::Persistence(e.to_string())
    }
}

impl IntoResponse for UserError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            UserError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            UserError::Conflict(_) => (StatusCode::CONFLICT, "Username already exists".to_string()),
            UserError::NotFound(_) => (StatusCode::NOT_FOUND, "User not found".to_string()),
            UserError::InvalidToken(TokenError::Signing(_))
            | UserError::Persistence(_)
            | UserError::CyclicHierarchy(_)
            | UserError::HierarchyTooDeep(_)
            | UserError::Hashing(_)
            | UserError::Internal(_) => {
                tracing::error!(error = %self, "internal failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            UserError::Unauthorized | UserError::InvalidToken(_) => {
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}
