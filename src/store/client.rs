use std::time::Duration;

use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{
    Client, Cmd, ConnectionAddr, ConnectionInfo, ErrorKind, FromRedisValue, RedisConnectionInfo,
    RedisError,
};
use tokio::sync::{OnceCell, Semaphore};
use tracing::{debug, warn};

use super::StoreError;
use crate::config::StoreEndpoint;

/// Default maximum number of commands in flight per endpoint
pub const DEFAULT_MAX_ACTIVE: usize = 12000;
/// Default bound on dialing and on each command round trip
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Concurrency and timeout settings for one endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct StoreOptions {
    pub max_active: usize,
    pub timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            max_active: DEFAULT_MAX_ACTIVE,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Client for one store endpoint.
///
/// Commands share one multiplexed connection. It is dialed and authenticated
/// on first use, so the server starts even while the store is down, and the
/// connection manager redials it after it drops. A command that fails
/// because its connection went away is sent once more on the fresh one.
pub struct StoreClient {
    endpoint: StoreEndpoint,
    info: ConnectionInfo,
    options: StoreOptions,
    manager: OnceCell<ConnectionManager>,
    active: Semaphore,
}

impl StoreClient {
    /// An empty password skips AUTH
    pub fn new(endpoint: StoreEndpoint, password: &str, options: StoreOptions) -> Self {
        let info = ConnectionInfo {
            addr: ConnectionAddr::Tcp(endpoint.host.clone(), endpoint.port),
            redis: RedisConnectionInfo {
                password: (!password.is_empty()).then(|| password.to_string()),
                ..Default::default()
            },
        };
        let active = Semaphore::new(options.max_active.clamp(1, Semaphore::MAX_PERMITS));

        Self {
            endpoint,
            info,
            options,
            manager: OnceCell::new(),
            active,
        }
    }

    pub fn endpoint(&self) -> &StoreEndpoint {
        &self.endpoint
    }

    /// `GET key`; `None` when the key is absent
    pub async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.query("GET", redis::cmd("GET").arg(key)).await
    }

    /// `SET key value`
    pub async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.query("SET", redis::cmd("SET").arg(key).arg(value)).await
    }

    /// `KEYS pattern`
    pub async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        self.query("KEYS", redis::cmd("KEYS").arg(pattern)).await
    }

    async fn query<T: FromRedisValue>(
        &self,
        command: &'static str,
        cmd: &Cmd,
    ) -> Result<T, StoreError> {
        let _permit = self.active.acquire().await.map_err(|_| StoreError::Closed)?;
        let mut conn = self.connection().await?;

        let result = match cmd.query_async(&mut conn).await {
            Err(e) if e.is_io_error() && !e.is_timeout() => {
                debug!(
                    "Connection to {} dropped ({}), resending {}",
                    self.endpoint, e, command
                );
                cmd.query_async(&mut conn).await
            }
            result => result,
        };

        result.map_err(|e| self.error(command, e))
    }

    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        let manager = self
            .manager
            .get_or_try_init(|| async {
                let config = ConnectionManagerConfig::new()
                    .set_number_of_retries(0)
                    .set_connection_timeout(self.options.timeout)
                    .set_response_timeout(self.options.timeout);
                let manager = Client::open(self.info.clone())?
                    .get_connection_manager_with_config(config)
                    .await?;
                debug!("Connected to store at {}", self.endpoint);
                Ok::<_, RedisError>(manager)
            })
            .await
            .map_err(|e| {
                warn!("Could not connect to store at {}: {}", self.endpoint, e);
                self.error("connect", e)
            })?;

        Ok(manager.clone())
    }

    fn error(&self, command: &'static str, e: RedisError) -> StoreError {
        if e.kind() == ErrorKind::AuthenticationFailed {
            StoreError::Auth {
                addr: self.endpoint.to_string(),
                source: e,
            }
        } else if e.is_timeout() {
            StoreError::Timeout(self.options.timeout)
        } else if e.is_io_error() {
            StoreError::Connection {
                addr: self.endpoint.to_string(),
                source: e,
            }
        } else {
            StoreError::Command { command, source: e }
        }
    }
}
