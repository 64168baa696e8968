//! Redis adapter: cache client construction and PING-based health.
//!
//! ## Example
//!
//! ```rust,no_run
//! use busprobe_adapters::redis::RedisAdapter;
//! use busprobe_adapters::settings::RedisConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads REDIS_HOST, REDIS_PORT, REDIS_USER, REDIS_PASSWORD, REDIS_DB
//!     let config = RedisConfig::from_env()?;
//!
//!     if let Some(redis) = RedisAdapter::connect(config).await? {
//!         let snapshot = redis.health().await;
//!         println!("redis is {}", snapshot.status);
//!     }
//!
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::time::{Duration, Instant};

use redis::aio::MultiplexedConnection;
use redis::{Arg, Cmd, ConnectionAddr, ConnectionInfo, FromRedisValue, RedisConnectionInfo};
use tracing::{debug, error, info};

use busprobe_types::{keys, HealthSnapshot, HealthStatus};

use crate::health::ProbeContext;
use crate::settings::RedisConfig;
use crate::{AdapterError, ProbeError};

/// Backend identifier reported in Redis health snapshots.
pub const REDIS_BACKEND: &str = "REDIS";

/// How long [`RedisAdapter::connect`] waits for the initial PING.
pub const REDIS_PING_TIMEOUT: Duration = Duration::from_secs(5);

/// A Redis client built from [`RedisConfig`].
#[derive(Clone)]
pub struct RedisAdapter {
    client: redis::Client,
    config: RedisConfig,
}

impl RedisAdapter {
    /// Build a client and check that the server answers.
    ///
    /// Returns `Ok(None)` without connecting when no host is configured. A
    /// failed PING is logged and the client is returned anyway, so callers
    /// can keep reporting it as down.
    pub async fn connect(config: RedisConfig) -> Result<Option<Self>, AdapterError> {
        if !config.is_configured() {
            debug!("redis host not set, skipping connection");
            return Ok(None);
        }

        let address = config.address();
        debug!(address = %address, db = config.db, "connecting to redis");

        let client = redis::Client::open(connection_info(&config))?;
        let adapter = Self { client, config };

        match adapter.ping_within(REDIS_PING_TIMEOUT).await {
            Ok(()) => info!(address = %address, db = adapter.config.db, "connected to redis"),
            Err(err) => error!(address = %address, error = %err, "could not connect to redis"),
        }

        Ok(Some(adapter))
    }

    /// The underlying client.
    pub fn client(&self) -> &redis::Client {
        &self.client
    }

    /// The settings this client was built from.
    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    /// Open a multiplexed connection for issuing commands.
    pub async fn connection(&self) -> Result<MultiplexedConnection, AdapterError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    /// Run a command on a multiplexed connection.
    ///
    /// Every command is logged at debug level with its name, the server
    /// address and how long it took, whether it succeeded or not.
    pub async fn query<T: FromRedisValue>(&self, cmd: &Cmd) -> Result<T, AdapterError> {
        let command = command_name(cmd);
        let address = self.config.address();
        let start = Instant::now();

        let result = match self.connection().await {
            Ok(mut conn) => cmd.query_async::<T>(&mut conn).await.map_err(AdapterError::from),
            Err(err) => Err(err),
        };

        let duration_us = start.elapsed().as_micros() as u64;
        match &result {
            Ok(_) => debug!(command = %command, address = %address, duration_us, "redis command"),
            Err(err) => debug!(
                command = %command,
                address = %address,
                duration_us,
                error = %err,
                "redis command failed"
            ),
        }

        result
    }

    /// Send a PING.
    pub async fn ping(&self) -> Result<(), AdapterError> {
        self.query::<String>(&redis::cmd("PING")).await.map(drop)
    }

    async fn ping_within(&self, timeout: Duration) -> Result<(), AdapterError> {
        tokio::time::timeout(timeout, self.ping())
            .await
            .map_err(|_| AdapterError::Timeout)?
    }

    /// Report health, pinging without a deadline.
    pub async fn health(&self) -> HealthSnapshot {
        self.health_with(&ProbeContext::background()).await
    }

    /// Report health: UP if PING succeeds within `ctx`, DOWN otherwise.
    pub async fn health_with(&self, ctx: &ProbeContext) -> HealthSnapshot {
        let outcome = ctx
            .run(async {
                self.ping()
                    .await
                    .map_err(|e| ProbeError::Backend(e.to_string()))
            })
            .await;

        let snapshot = HealthSnapshot::builder()
            .detail(keys::HOST, self.config.address())
            .detail(keys::BACKEND, REDIS_BACKEND);

        match outcome {
            Ok(()) => snapshot.status(HealthStatus::Up).build(),
            Err(err) => {
                debug!(error = %err, "redis ping failed");
                snapshot
                    .status(HealthStatus::Down)
                    .detail(keys::ERROR, err.to_string())
                    .build()
            }
        }
    }
}

impl fmt::Debug for RedisAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisAdapter")
            .field("address", &self.config.address())
            .field("db", &self.config.db)
            .finish()
    }
}

/// First argument of a command, upper-cased.
fn command_name(cmd: &Cmd) -> String {
    match cmd.args_iter().next() {
        Some(Arg::Simple(name)) => String::from_utf8_lossy(name).to_ascii_uppercase(),
        _ => String::new(),
    }
}

/// Empty user or password means "not set".
fn connection_info(config: &RedisConfig) -> ConnectionInfo {
    ConnectionInfo {
        addr: ConnectionAddr::Tcp(config.host.clone(), config.port),
        redis: RedisConnectionInfo {
            db: config.db,
            username: (!config.user.is_empty()).then(|| config.user.clone()),
            password: (!config.password.is_empty()).then(|| config.password.clone()),
            ..Default::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use super::*;

    fn config(host: &str, port: u16) -> RedisConfig {
        RedisConfig {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_connect_without_host_is_none() {
        let adapter = RedisAdapter::connect(RedisConfig::default()).await.unwrap();
        assert!(adapter.is_none());
    }

    #[test]
    fn test_connection_info_mapping() {
        let info = connection_info(&RedisConfig {
            host: "cache.internal".into(),
            user: "app".into(),
            password: "secret".into(),
            port: 6380,
            db: 3,
        });

        assert!(matches!(
            &info.addr,
            ConnectionAddr::Tcp(host, 6380) if host == "cache.internal"
        ));
        assert_eq!(info.redis.db, 3);
        assert_eq!(info.redis.username.as_deref(), Some("app"));
        assert_eq!(info.redis.password.as_deref(), Some("secret"));
    }

    #[test]
    fn test_connection_info_without_credentials() {
        let info = connection_info(&config("localhost", 6379));
        assert!(info.redis.username.is_none());
        assert!(info.redis.password.is_none());
        assert_eq!(info.redis.db, 0);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_reported_down() {
        // Nothing listens on port 1; the connect attempt is refused.
        let adapter = RedisAdapter::connect(config("127.0.0.1", 1))
            .await
            .unwrap()
            .expect("host is configured");

        let snapshot = adapter
            .health_with(&ProbeContext::with_timeout(Duration::from_secs(2)))
            .await;

        assert_eq!(snapshot.status, HealthStatus::Down);
        assert_eq!(snapshot.text(keys::HOST), Some("127.0.0.1:1"));
        assert_eq!(snapshot.text(keys::BACKEND), Some("REDIS"));
        assert!(snapshot.contains(keys::ERROR));
    }

    #[test]
    fn test_command_name() {
        assert_eq!(command_name(&redis::cmd("ping")), "PING");
        assert_eq!(command_name(redis::cmd("GET").arg("session:42")), "GET");
        assert_eq!(command_name(&Cmd::new()), "");
    }

    #[tokio::test]
    #[traced_test]
    async fn test_query_logs_command_and_duration() {
        let adapter = RedisAdapter::connect(config("127.0.0.1", 1))
            .await
            .unwrap()
            .expect("host is configured");

        let result = adapter.query::<String>(redis::cmd("GET").arg("key")).await;

        assert!(result.is_err());
        assert!(logs_contain("redis command failed"));
        assert!(logs_contain("command=GET"));
        assert!(logs_contain("address=127.0.0.1:1"));
        assert!(logs_contain("duration_us="));
    }
}
