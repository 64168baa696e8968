//! Client settings loaded from files and environment variables.
//!
//! NATS settings come from an optional config file overlaid with `NATS_*`
//! variables (`NATS_SERVER`, `NATS_CREDENTIALS_FILE`, `NATS_JETSTREAM`).
//! Redis settings come from `REDIS_*` variables only.

use std::path::Path;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::AdapterError;

/// Server used when none is configured.
pub const DEFAULT_NATS_SERVER: &str = "nats://localhost:4222";

/// Redis port used when `REDIS_PORT` is missing or not a number.
pub const DEFAULT_REDIS_PORT: u16 = 6379;

/// NATS client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    /// Server URL, or a comma-separated list of URLs.
    pub server: String,

    /// Path to a `.creds` file for authentication.
    pub credentials_file: Option<String>,

    /// Whether to set up the JetStream durable-stream engine.
    pub jetstream: bool,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_NATS_SERVER.to_string(),
            credentials_file: None,
            jetstream: true,
        }
    }
}

impl NatsConfig {
    /// Prefix of the environment variables read by [`NatsConfig::load`].
    pub const ENV_PREFIX: &'static str = "NATS";

    /// Load settings from `NATS_*` environment variables.
    pub fn from_env() -> Result<Self, AdapterError> {
        Self::load(None)
    }

    /// Load settings from an optional file, then `NATS_*` environment
    /// variables. Environment values win.
    pub fn load(path: Option<&Path>) -> Result<Self, AdapterError> {
        Self::from_sources(path, Environment::with_prefix(Self::ENV_PREFIX))
    }

    fn from_sources(path: Option<&Path>, env: Environment) -> Result<Self, AdapterError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let config = builder.add_source(env.try_parsing(true)).build()?;
        Ok(config.try_deserialize()?)
    }
}

/// Redis client settings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RedisConfig {
    /// Host name. An empty host means Redis is not configured.
    pub host: String,
    /// User name for ACL authentication.
    pub user: String,
    /// Password.
    pub password: String,
    /// TCP port.
    pub port: u16,
    /// Logical database index.
    pub db: i64,
}

/// Raw `REDIS_*` values before numeric fallbacks are applied.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RedisEnv {
    host: String,
    user: String,
    password: String,
    port: Option<String>,
    db: Option<String>,
}

impl RedisConfig {
    /// Prefix of the environment variables read by [`RedisConfig::from_env`].
    pub const ENV_PREFIX: &'static str = "REDIS";

    /// Load settings from `REDIS_HOST`, `REDIS_USER`, `REDIS_PASSWORD`,
    /// `REDIS_PORT` and `REDIS_DB`.
    ///
    /// A port or database index that does not parse falls back to 6379 or 0.
    pub fn from_env() -> Result<Self, AdapterError> {
        Self::from_environment(Environment::with_prefix(Self::ENV_PREFIX))
    }

    fn from_environment(env: Environment) -> Result<Self, AdapterError> {
        let raw: RedisEnv = Config::builder()
            .add_source(env)
            .build()?
            .try_deserialize()?;

        Ok(Self {
            host: raw.host,
            user: raw.user,
            password: raw.password,
            port: raw
                .port
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(DEFAULT_REDIS_PORT),
            db: raw.db.and_then(|d| d.trim().parse().ok()).unwrap_or(0),
        })
    }

    /// Check whether a host is configured.
    pub fn is_configured(&self) -> bool {
        !self.host.is_empty()
    }

    /// `host:port`, as used for connecting and reporting.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
