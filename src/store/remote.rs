//! Remote Store Module
//!
//! Thin adapter issuing the cache's commands over a multiplexed async
//! Redis connection.

use std::time::Duration;

use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, RedisError};

use super::SetCommand;
use crate::error::{CacheError, Result};

fn command_error(command: &'static str) -> impl FnOnce(RedisError) -> CacheError {
    move |err| CacheError::store(command, err.to_string())
}

/// Converts an expiry to the `PX` argument. Sub-millisecond expiries round up
/// to one millisecond; zero is passed through for the server to reject.
pub(crate) fn expiry_millis(ttl: Duration) -> u64 {
    if ttl.is_zero() {
        return 0;
    }
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

// == Redis Connection ==
/// A single multiplexed connection to a Redis server.
#[derive(Clone)]
pub struct RedisConnection {
    connection: MultiplexedConnection,
}

impl RedisConnection {
    /// Opens a new connection using `client`.
    pub async fn connect(client: &Client) -> Result<Self> {
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(command_error("CONNECT"))?;
        Ok(Self { connection })
    }

    pub async fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        self.connection.get(key).await.map_err(command_error("GET"))
    }

    /// Issues `SET key value` or `SET key value PX ms`.
    pub async fn set(&mut self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<bool> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(expiry_millis(ttl));
        }
        let reply: redis::Value = cmd
            .query_async(&mut self.connection)
            .await
            .map_err(command_error("SET"))?;
        Ok(matches!(reply, redis::Value::Okay))
    }

    pub async fn del(&mut self, key: &str) -> Result<u64> {
        self.connection.del(key).await.map_err(command_error("DEL"))
    }

    pub async fn exists(&mut self, key: &str) -> Result<bool> {
        self.connection
            .exists(key)
            .await
            .map_err(command_error("EXISTS"))
    }

    pub async fn incr_by(&mut self, key: &str, amount: i64) -> Result<i64> {
        redis::cmd("INCRBY")
            .arg(key)
            .arg(amount)
            .query_async(&mut self.connection)
            .await
            .map_err(command_error("INCRBY"))
    }

    pub async fn decr_by(&mut self, key: &str, amount: i64) -> Result<i64> {
        redis::cmd("DECRBY")
            .arg(key)
            .arg(amount)
            .query_async(&mut self.connection)
            .await
            .map_err(command_error("DECRBY"))
    }

    pub async fn mget(&mut self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        redis::cmd("MGET")
            .arg(keys)
            .query_async(&mut self.connection)
            .await
            .map_err(command_error("MGET"))
    }

    pub async fn flushdb(&mut self) -> Result<()> {
        redis::cmd("FLUSHDB")
            .query_async(&mut self.connection)
            .await
            .map_err(command_error("FLUSHDB"))
    }

    /// Sends every SET in one MULTI/EXEC round trip.
    pub async fn pipeline(&mut self, commands: &[SetCommand]) -> Result<()> {
        let mut pipe = redis::pipe();
        pipe.atomic();
        for command in commands {
            pipe.cmd("SET").arg(&command.key).arg(&command.value);
            if let Some(ttl) = command.ttl {
                pipe.arg("PX").arg(expiry_millis(ttl));
            }
            pipe.ignore();
        }
        pipe.query_async(&mut self.connection)
            .await
            .map_err(command_error("EXEC"))
    }

    pub async fn ping(&mut self) -> Result<()> {
        redis::cmd("PING")
            .query_async(&mut self.connection)
            .await
            .map_err(command_error("PING"))
    }
}
