use std::net::SocketAddr;

use anyhow::Context;
use serde::Deserialize;

/// One year; longer validity windows are clamped to this.
pub const MAX_TTL_MINUTES: i64 = 60 * 24 * 365;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

impl JwtConfig {
    /// Token validity in seconds, bounded to `1..=MAX_TTL_MINUTES` minutes.
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_minutes.clamp(1, MAX_TTL_MINUTES) * 60
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct HashConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub jwt: JwtConfig,
    pub hash: HashConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;

        let listen_addr = listen_addr(
            &std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            env_or("APP_PORT", 8080),
        )?;

        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is required")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "userforest".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "userforest-users".into()),
            ttl_minutes: env_or("JWT_TTL_MINUTES", 60_i64).clamp(1, MAX_TTL_MINUTES),
        };
        let defaults = HashConfig::default();
        let hash = HashConfig {
            memory_kib: env_or("HASH_MEMORY_KIB", defaults.memory_kib),
            iterations: env_or("HASH_ITERATIONS", defaults.iterations),
            parallelism: env_or("HASH_PARALLELISM", defaults.parallelism),
        };
        Ok(Self {
            database_url,
            listen_addr,
            jwt,
            hash,
        })
    }
}

fn listen_addr(host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid APP_HOST {host:?}"))
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
