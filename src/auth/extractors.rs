use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use crate::auth::services::IdentityService;
use crate::error::UserError;
use crate::users::{model::User, services::UserService};

/// The active user behind a valid `Authorization: Bearer` token.
pub struct CurrentUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    IdentityService: FromRef<S>,
    UserService: FromRef<S>,
{
    type Rejection = UserError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(UserError::Unauthorized)?;

        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or(UserError::Unauthorized)?;

        let claims = IdentityService::from_ref(state).verify(token).map_err(|e| {
            warn!(reason = %e, "invalid bearer token");
            UserError::from(e)
        })?;

        // tokens of since-deleted users stop working
        let user = UserService::from_ref(state)
            .get_by_id(claims.sub)
            .await?
            .ok_or_else(|| {
                warn!(user_id = %claims.sub, "token subject is not an active user");
                UserError::Unauthorized
            })?;

        Ok(CurrentUser(user))
    }
}
