//! Redis cache backend.
//!
//! The remote L2 tier. In a multi-instance deployment this is the layer
//! that actually dedupes upstream calls across instances — the in-process
//! coalescer only covers one instance, but an instance that loses the race
//! will find the winner's freshly-written entry here.

use async_trait::async_trait;
use chrono::Duration;
use redis::AsyncCommands as _;
use redis::aio::ConnectionManager;

use crate::{CacheBackend, CacheError};

/// Cache backend over a Redis connection manager.
///
/// `ConnectionManager` multiplexes and reconnects internally, so the
/// backend is cheap to clone and share across request handlers.
#[derive(Clone)]
pub struct RedisBackend {
    connection: ConnectionManager,
}

impl RedisBackend {
    /// Connects to Redis at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Redis`] if the client cannot be created or the
    /// initial connection fails.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let connection = client.get_connection_manager().await?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut connection = self.connection.clone();
        Ok(connection.get(key).await?)
    }

    async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let seconds = u64::try_from(ttl.num_seconds()).unwrap_or(1).max(1);
        let mut connection = self.connection.clone();
        connection.set_ex::<_, _, ()>(key, value, seconds).await?;
        Ok(())
    }
}
