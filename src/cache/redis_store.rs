// Durable cache backend on Redis.
// Connects lazily and reconnects on its own, so an unreachable server only costs cache misses.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use parking_lot::Mutex;

use crate::error::StoreError;

use super::store::CacheBackend;

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

pub struct RedisBackend {
    client: redis::Client,
    connection: Mutex<Option<ConnectionManager>>,
    /// Bound on connecting and on every command.
    timeout: Duration,
}

impl RedisBackend {
    /// Parse the connection string. Does not connect.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        Ok(Self {
            client,
            connection: Mutex::new(None),
            timeout,
        })
    }

    /// Shared connection, established on first use.
    ///
    /// Connecting happens outside the lock: during an outage every caller fails on its
    /// own timeout instead of queueing behind the others.
    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        if let Some(connection) = self.connection.lock().as_ref() {
            return Ok(connection.clone());
        }

        let connect = ConnectionManager::new(self.client.clone());
        let connection = tokio::time::timeout(self.timeout, connect)
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))??;

        let mut slot = self.connection.lock();
        match slot.as_ref() {
            // Lost the race to a concurrent connect; keep the installed one.
            Some(existing) => Ok(existing.clone()),
            None => {
                tracing::info!("connected to redis cache backend");
                *slot = Some(connection.clone());
                Ok(connection)
            }
        }
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut connection = self.connection().await?;
        let value = tokio::time::timeout(self.timeout, connection.get::<_, Option<String>>(key))
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))??;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let mut connection = self.connection().await?;
        tokio::time::timeout(self.timeout, connection.set::<_, _, ()>(key, value))
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))??;
        Ok(())
    }
}
