//! Redis command surface used by the Redis backend

use async_trait::async_trait;
use pdict_core::{Error, Result};
use redis::aio::ConnectionManager;
use redis::{Cmd, FromRedisValue};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// The subset of Redis the backend relies on.
///
/// Values are raw bytes; encoding and decoding stay in the backend.
#[async_trait]
pub trait RedisCommands: Send + Sync + fmt::Debug {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>>;

    async fn mset(&self, items: Vec<(String, Vec<u8>)>) -> Result<()>;

    async fn del(&self, keys: &[String]) -> Result<u64>;

    async fn exists(&self, key: &str) -> Result<bool>;

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;

    async fn incrby(&self, key: &str, amount: i64) -> Result<i64>;

    async fn decrby(&self, key: &str, amount: i64) -> Result<i64>;

    async fn incrbyfloat(&self, key: &str, amount: f64) -> Result<f64>;

    async fn hget(&self, hash: &str, field: &str) -> Result<Option<Vec<u8>>>;

    async fn hmget(&self, hash: &str, fields: &[String]) -> Result<Vec<Option<Vec<u8>>>>;

    async fn hset(&self, hash: &str, items: Vec<(String, Vec<u8>)>) -> Result<()>;

    async fn hgetall(&self, hash: &str) -> Result<HashMap<String, Vec<u8>>>;

    async fn hdel(&self, hash: &str, fields: &[String]) -> Result<u64>;

    async fn hkeys(&self, hash: &str) -> Result<Vec<String>>;

    async fn hexists(&self, hash: &str, field: &str) -> Result<bool>;

    async fn hlen(&self, hash: &str) -> Result<usize>;

    async fn hincrby(&self, hash: &str, field: &str, amount: i64) -> Result<i64>;

    async fn hincrbyfloat(&self, hash: &str, field: &str, amount: f64) -> Result<f64>;
}

/// Seconds for `EX`/`EXPIRE`; Redis rejects zero
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

/// Multiplexed connection with automatic reconnects
#[derive(Clone)]
pub struct RedisConnection {
    manager: ConnectionManager,
    url: String,
}

impl fmt::Debug for RedisConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisConnection")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl RedisConnection {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| Error::backend_with_source("redis", "open client", e))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| Error::backend_with_source("redis", "connect", e))?;
        debug!("Connected to redis at {}", url);
        Ok(Self {
            manager,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn query<T: FromRedisValue>(&self, operation: &'static str, cmd: &Cmd) -> Result<T> {
        let mut conn = self.manager.clone();
        cmd.query_async(&mut conn)
            .await
            .map_err(|e| Error::backend_with_source("redis", operation, e))
    }
}

#[async_trait]
impl RedisCommands for RedisConnection {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.query("GET", redis::cmd("GET").arg(key)).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("EX").arg(ttl_secs(ttl));
        }
        self.query("SET", &cmd).await
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        self.query("MGET", redis::cmd("MGET").arg(keys)).await
    }

    async fn mset(&self, items: Vec<(String, Vec<u8>)>) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let mut cmd = redis::cmd("MSET");
        for (key, value) in items {
            cmd.arg(key).arg(value);
        }
        self.query("MSET", &cmd).await
    }

    async fn del(&self, keys: &[String]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.query("DEL", redis::cmd("DEL").arg(keys)).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.query("EXISTS", redis::cmd("EXISTS").arg(key)).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.query("EXPIRE", redis::cmd("EXPIRE").arg(key).arg(ttl_secs(ttl)))
            .await
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        self.query("KEYS", redis::cmd("KEYS").arg(pattern)).await
    }

    async fn incrby(&self, key: &str, amount: i64) -> Result<i64> {
        self.query("INCRBY", redis::cmd("INCRBY").arg(key).arg(amount))
            .await
    }

    async fn decrby(&self, key: &str, amount: i64) -> Result<i64> {
        self.query("DECRBY", redis::cmd("DECRBY").arg(key).arg(amount))
            .await
    }

    async fn incrbyfloat(&self, key: &str, amount: f64) -> Result<f64> {
        self.query("INCRBYFLOAT", redis::cmd("INCRBYFLOAT").arg(key).arg(amount))
            .await
    }

    async fn hget(&self, hash: &str, field: &str) -> Result<Option<Vec<u8>>> {
        self.query("HGET", redis::cmd("HGET").arg(hash).arg(field))
            .await
    }

    async fn hmget(&self, hash: &str, fields: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        if fields.is_empty() {
            return Ok(Vec::new());
        }
        self.query("HMGET", redis::cmd("HMGET").arg(hash).arg(fields))
            .await
    }

    async fn hset(&self, hash: &str, items: Vec<(String, Vec<u8>)>) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let mut cmd = redis::cmd("HSET");
        cmd.arg(hash);
        for (field, value) in items {
            cmd.arg(field).arg(value);
        }
        self.query::<u64>("HSET", &cmd).await.map(|_| ())
    }

    async fn hgetall(&self, hash: &str) -> Result<HashMap<String, Vec<u8>>> {
        self.query("HGETALL", redis::cmd("HGETALL").arg(hash)).await
    }

    async fn hdel(&self, hash: &str, fields: &[String]) -> Result<u64> {
        if fields.is_empty() {
            return Ok(0);
        }
        self.query("HDEL", redis::cmd("HDEL").arg(hash).arg(fields))
            .await
    }

    async fn hkeys(&self, hash: &str) -> Result<Vec<String>> {
        self.query("HKEYS", redis::cmd("HKEYS").arg(hash)).await
    }

    async fn hexists(&self, hash: &str, field: &str) -> Result<bool> {
        self.query("HEXISTS", redis::cmd("HEXISTS").arg(hash).arg(field))
            .await
    }

    async fn hlen(&self, hash: &str) -> Result<usize> {
        self.query("HLEN", redis::cmd("HLEN").arg(hash)).await
    }

    async fn hincrby(&self, hash: &str, field: &str, amount: i64) -> Result<i64> {
        self.query("HINCRBY", redis::cmd("HINCRBY").arg(hash).arg(field).arg(amount))
            .await
    }

    async fn hincrbyfloat(&self, hash: &str, field: &str, amount: f64) -> Result<f64> {
        self.query(
            "HINCRBYFLOAT",
            redis::cmd("HINCRBYFLOAT").arg(hash).arg(field).arg(amount),
        )
        .await
    }
}
