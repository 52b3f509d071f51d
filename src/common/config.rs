use jsonwebtoken::{DecodingKey, EncodingKey};

use crate::errors::Result;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,

    pub service_host: String,
    pub service_port: u16,

    pub postgres_connection_pool: u32,

    pub jwt_secret: String,
    pub jwt_keys: JwtKeys,

    /// Resource-limit profile for the execution engine:
    /// "default", "contest" or "practice".
    pub judge_limits: String,
}

#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
}

impl JwtKeys {
    fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

impl std::fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtKeys").finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let jwt_secret = env_get("JWT_SECRET");

        let config = Config {
            database_url: env_get("DATABASE_URL"),
            redis_url: env_get("REDIS_URL"),
            service_host: env_get_or("SERVICE_HOST", "0.0.0.0"),
            service_port: env_parse_or("SERVICE_PORT", 8000),
            postgres_connection_pool: env_parse_or("POSTGRES_CONNECTION_POOL", 5),
            jwt_keys: JwtKeys::new(jwt_secret.as_bytes()),
            jwt_secret,
            judge_limits: env_get_or("JUDGE_LIMITS", "default"),
        };

        Ok(config)
    }
}

#[inline]
fn env_get(key: &str) -> String {
    match std::env::var(key) {
        Ok(v) => v,
        Err(e) => {
            let msg = format!("{} {}", key, e);
            tracing::error!(msg);
            panic!("{msg}");
        }
    }
}

#[inline]
fn env_get_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[inline]
fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(v) => v.parse().map_or_else(
            |_| {
                let msg = format!("Failed to parse: {}", key);
                tracing::error!(msg);
                panic!("{msg}");
            },
            |v| v,
        ),
        Err(_) => default,
    }
}
