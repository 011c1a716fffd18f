//! Storage backends
//!
//! A [`StatefulBackend`] stores encoded values under a namespace. Every
//! operation is implemented once as an async method; the blocking surface in
//! [`crate::blocking`] drives these on a private runtime.

mod local;
mod namespace;
pub mod redis;

pub use self::local::LocalStatefulBackend;
pub use self::namespace::Namespace;
pub use self::redis::{
    RedisBackendOptions, RedisCommands, RedisConnection, RedisStatefulBackend,
};

use async_trait::async_trait;
use pdict_codec::{Payload, Serializer};
use pdict_core::{Error, Result, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Backend selection in configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Redis when a URL is configured, otherwise local
    #[default]
    Auto,
    Local,
    Redis,
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(BackendKind::Auto),
            "local" => Ok(BackendKind::Local),
            "redis" => Ok(BackendKind::Redis),
            _ => Err(Error::unsupported("backend", s)),
        }
    }
}

/// Snapshot iterator over keys
pub type KeyIter = std::vec::IntoIter<String>;

/// Durable key-value store for encoded values
#[async_trait]
pub trait StatefulBackend: Send + Sync + fmt::Debug {
    /// Backend type name, `"local"` or `"redis"`
    fn kind(&self) -> &'static str;

    fn namespace(&self) -> &Namespace;

    fn serializer(&self) -> &Arc<dyn Serializer>;

    /// Backend over the same store scoped under `base_key`
    fn child(&self, base_key: &str) -> Arc<dyn StatefulBackend>;

    fn base_key(&self) -> Option<&str> {
        self.namespace().base_key()
    }

    /// Decoded value, or `None` when missing, null or unreadable.
    /// Unreadable entries are deleted.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    async fn get_values(&self, keys: &[String]) -> Result<Vec<Option<Value>>>;

    async fn set(&self, key: &str, value: &Value, ttl: Option<Duration>) -> Result<()>;

    async fn set_batch(&self, data: &BTreeMap<String, Value>, ttl: Option<Duration>)
        -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Remove `keys`, or the whole namespace when `keys` is empty
    async fn clear(&self, keys: &[String]) -> Result<()>;

    async fn contains(&self, key: &str) -> Result<bool>;

    async fn get_all_keys(&self, exclude_base_key: bool) -> Result<Vec<String>>;

    async fn get_all_values(&self) -> Result<Vec<Value>>;

    async fn get_all_data(&self, exclude_base_key: bool) -> Result<BTreeMap<String, Value>>;

    async fn iterate(&self) -> Result<KeyIter> {
        Ok(self.get_all_keys(true).await?.into_iter())
    }

    async fn length(&self) -> Result<usize>;

    async fn incrby(&self, key: &str, amount: i64) -> Result<i64>;

    async fn incrbyfloat(&self, key: &str, amount: f64) -> Result<f64>;

    async fn decrby(&self, key: &str, amount: i64) -> Result<i64> {
        let amount = amount
            .checked_neg()
            .ok_or_else(|| Error::invalid_value(key, "a negatable amount"))?;
        self.incrby(key, amount).await
    }

    async fn decrbyfloat(&self, key: &str, amount: f64) -> Result<f64> {
        self.incrbyfloat(key, -amount).await
    }

    /// Per-key TTL; a logged no-op where the store cannot express it
    async fn expire(&self, key: &str, ttl: Duration) -> Result<()>;

    /// Re-encode every entry with the current codec; returns keys that failed
    async fn migrate_compression(&self) -> Result<Vec<String>>;

    /// Encoded payloads without decoding
    async fn get_all_raw(&self, exclude_base_key: bool) -> Result<BTreeMap<String, Payload>>;

    /// Store encoded payloads as-is
    async fn load_raw(&self, data: BTreeMap<String, Payload>, includes_base_key: bool)
        -> Result<()>;
}

/// Outcome of decoding a stored entry
pub(crate) enum Decoded {
    Present(Value),
    Absent,
    Corrupt(Error),
}

/// Decode a stored payload, classifying soft failures for self-healing
pub(crate) fn decode_entry(serializer: &dyn Serializer, payload: &Payload) -> Result<Decoded> {
    match serializer.decode_value(payload) {
        Ok(Value::Null) => Ok(Decoded::Absent),
        Ok(value) => Ok(Decoded::Present(value)),
        Err(e) if e.is_decode_error() => Ok(Decoded::Corrupt(e)),
        Err(e) => Err(e),
    }
}

/// Integer counter arithmetic shared by read-modify-write backends
pub(crate) fn add_integer(key: &str, current: Option<&Value>, amount: i64) -> Result<i64> {
    let base = match current {
        None => 0,
        Some(Value::Int(i)) => *i,
        Some(_) => return Err(Error::invalid_value(key, "an integer")),
    };
    base.checked_add(amount)
        .ok_or_else(|| Error::invalid_value(key, "an integer within range"))
}

/// Float counter arithmetic shared by read-modify-write backends
pub(crate) fn add_float(key: &str, current: Option<&Value>, amount: f64) -> Result<f64> {
    let base = match current {
        None => 0.0,
        Some(value) => value
            .as_f64()
            .ok_or_else(|| Error::invalid_value(key, "a number"))?,
    };
    Ok(base + amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("Redis".parse::<BackendKind>().unwrap(), BackendKind::Redis);
        assert_eq!(BackendKind::default(), BackendKind::Auto);
        assert!("sqlite".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_counter_arithmetic() {
        assert_eq!(add_integer("c", None, 1).unwrap(), 1);
        assert_eq!(add_integer("c", Some(&Value::Int(1)), 2).unwrap(), 3);
        assert!(add_integer("c", Some(&Value::from("x")), 1).is_err());
        assert!(add_integer("c", Some(&Value::Int(i64::MAX)), 1).is_err());
        assert_eq!(add_float("f", Some(&Value::Int(1)), 0.5).unwrap(), 1.5);
        assert_eq!(add_float("f", None, -2.0).unwrap(), -2.0);
    }
}
