//! Process configuration loaded from environment variables.
//!
//! Every variable has a default so a bare `cargo run` starts an in-memory
//! service on port 8080. A variable that is present but unparsable is an error
//! rather than a silent fallback.

use std::time::Duration;

use thiserror::Error;

use pvz_auth::PasswordHasher;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

pub const DEV_JWT_SECRET: &str = "dev-secret";

/// Postgres connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Full connection URL. When set it wins over the discrete `DB_*` fields.
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub ssl_mode: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            name: "pvz".to_string(),
            ssl_mode: "disable".to_string(),
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

impl core::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("name", &self.name)
            .field("ssl_mode", &self.ssl_mode)
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .finish_non_exhaustive()
    }
}

/// Top-level service configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_ttl: chrono::Duration,
    /// bcrypt work factor for `/register` and `/login`.
    pub password_hasher: PasswordHasher,
    /// `true` selects Postgres, `false` the in-memory store.
    pub use_persistent_stores: bool,
    pub database: DatabaseConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_ttl: chrono::Duration::hours(24),
            password_hasher: PasswordHasher::default(),
            use_persistent_stores: false,
            database: DatabaseConfig::default(),
        }
    }
}

impl core::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("jwt_ttl", &self.jwt_ttl)
            .field("bcrypt_cost", &self.password_hasher.cost())
            .field("use_persistent_stores", &self.use_persistent_stores)
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self::from_lookup(|key| std::env::var(key).ok())?;
        if config.jwt_secret == DEV_JWT_SECRET {
            tracing::warn!("JWT_SECRET not set; using the development secret");
        }
        Ok(config)
    }

    /// Load from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();
        let db = defaults.database;

        let ttl_hours: i64 = parse_or(&get, "JWT_TTL_HOURS", 24)?;
        if ttl_hours <= 0 {
            return Err(invalid("JWT_TTL_HOURS", ttl_hours.to_string()));
        }

        let bcrypt_cost: u32 = parse_or(&get, "BCRYPT_COST", defaults.password_hasher.cost())?;
        let password_hasher =
            PasswordHasher::new(bcrypt_cost).map_err(|_| invalid("BCRYPT_COST", bcrypt_cost.to_string()))?;

        let acquire_secs: u64 = parse_or(&get, "DB_ACQUIRE_TIMEOUT_SECS", db.acquire_timeout.as_secs())?;

        Ok(Self {
            port: parse_or(&get, "PORT", defaults.port)?,
            jwt_secret: get("JWT_SECRET").unwrap_or(defaults.jwt_secret),
            jwt_ttl: chrono::Duration::hours(ttl_hours),
            password_hasher,
            use_persistent_stores: match get("USE_PERSISTENT_STORES") {
                Some(v) => parse_bool("USE_PERSISTENT_STORES", &v)?,
                None => defaults.use_persistent_stores,
            },
            database: DatabaseConfig {
                url: get("DATABASE_URL"),
                host: get("DB_HOST").unwrap_or(db.host),
                port: parse_or(&get, "DB_PORT", db.port)?,
                user: get("DB_USER").unwrap_or(db.user),
                password: get("DB_PASSWORD").unwrap_or(db.password),
                name: get("DB_NAME").unwrap_or(db.name),
                ssl_mode: get("DB_SSLMODE").unwrap_or(db.ssl_mode),
                max_connections: parse_or(&get, "DB_MAX_CONNECTIONS", db.max_connections)?,
                acquire_timeout: Duration::from_secs(acquire_secs),
            },
        })
    }
}

fn invalid(key: &'static str, value: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.into(),
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: core::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|_| invalid(key, raw)),
        None => Ok(default),
    }
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, raw)),
    }
}
