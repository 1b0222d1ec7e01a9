use tracing::{info, instrument, warn};

use crate::auth::jwt::{Claims, JwtKeys};
use crate::error::{TokenError, UserResult};
use crate::users::model::User;
use crate::users::services::UserService;

/// Credential checks and token issuance on top of `UserService`.
#[derive(Clone)]
pub struct IdentityService {
    users: UserService,
    keys: JwtKeys,
}

impl IdentityService {
    pub fn new(users: UserService, keys: JwtKeys) -> Self {
        Self { users, keys }
    }

    /// The active user owning `username` iff `password` matches.
    ///
    /// Unknown usernames and wrong passwords both yield `Ok(None)`; only store
    /// failures surface as errors.
    #[instrument(skip(self, password))]
    pub async fn validate_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> UserResult<Option<User>> {
        let Some(user) = self.users.get_by_username(username).await? else {
            warn!(%username, "login unknown username");
            return Ok(None);
        };

        let ok = self
            .users
            .hasher()
            .verify_blocking(password.to_string(), user.password_hash.clone())
            .await;
        if !ok {
            warn!(user_id = %user.id, "login invalid password");
            return Ok(None);
        }
        Ok(Some(user))
    }

    pub fn login(&self, user: &User) -> Result<String, TokenError> {
        let token = self.keys.sign(user.id, &user.username)?;
        info!(user_id = %user.id, "user logged in");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.keys.verify(token)
    }
}

#[cfg(test)]
pub(crate) fn test_keys() -> JwtKeys {
    JwtKeys::from_config(&crate::config::JwtConfig {
        secret: "test-secret".into(),
        issuer: "test-issuer".into(),
        audience: "test-aud".into(),
        ttl_minutes: 60,
    })
}
