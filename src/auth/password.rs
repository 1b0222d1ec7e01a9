use argon2::{
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::{error, warn};

use crate::config::HashConfig;
use crate::error::{UserError, UserResult};

/// Argon2id hasher with a configurable work factor.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl PasswordHasher {
    pub fn new(cfg: HashConfig) -> UserResult<Self> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, cfg.parallelism, None)
            .map_err(|e| UserError::Hashing(e.to_string()))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Salted one-way hash in PHC string form.
    pub fn hash(&self, plain: &str) -> UserResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                UserError::Hashing(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    /// True iff `plain` produced `hash`. A malformed hash is a mismatch, not an error.
    ///
    /// The stored hash carries its own parameters, so hashes made under an
    /// older work factor still verify.
    pub fn verify(&self, plain: &str, hash: &str) -> bool {
        let parsed = match PasswordHash::new(hash) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "argon2 parse hash error");
                return false;
            }
        };
        self.argon2()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok()
    }

    /// `hash` on the blocking pool, keeping request workers free.
    pub async fn hash_blocking(&self, plain: String) -> UserResult<String> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&plain))
            .await
            .map_err(|e| UserError::Hashing(e.to_string()))?
    }

    pub async fn verify_blocking(&self, plain: String, hash: String) -> bool {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&plain, &hash))
            .await
            .unwrap_or(false)
    }
}

#[cfg(test)]
pub(crate) fn fast_hasher() -> PasswordHasher {
    PasswordHasher::new(HashConfig {
        memory_kib: 64,
        iterations: 1,
        parallelism: 1,
    })
    .expect("valid argon2 params")
}
