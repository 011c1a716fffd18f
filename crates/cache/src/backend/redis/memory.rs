//! In-process stand-in for a Redis server

use super::RedisCommands;
use async_trait::async_trait;
use parking_lot::{Mutex, MutexGuard};
use pdict_core::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
enum Entry {
    Str(Vec<u8>),
    Hash(BTreeMap<String, Vec<u8>>),
}

#[derive(Debug)]
struct Slot {
    entry: Entry,
    expires_at: Option<Instant>,
}

/// Strings and hashes with lazy expiry. `KEYS` understands exact names and
/// a single trailing `*`.
#[derive(Debug, Default)]
pub struct MemoryRedis {
    slots: Mutex<HashMap<String, Slot>>,
}

fn wrong_type(operation: &'static str, key: &str) -> Error {
    Error::backend(
        "redis",
        operation,
        format!("WRONGTYPE operation against key {key} holding the wrong kind of value"),
    )
}

fn parse_int(operation: &'static str, bytes: &[u8]) -> Result<i64> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::backend("redis", operation, "value is not an integer"))
}

fn parse_float(operation: &'static str, bytes: &[u8]) -> Result<f64> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::backend("redis", operation, "value is not a valid float"))
}

impl MemoryRedis {
    pub fn new() -> Self {
        Self::default()
    }

    fn live(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        let mut slots = self.slots.lock();
        let now = Instant::now();
        slots.retain(|_, slot| slot.expires_at.map_or(true, |at| at > now));
        slots
    }

    /// Remaining TTL of a key
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.live()
            .get(key)
            .and_then(|slot| slot.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }

    /// Store bytes under a key, bypassing any codec
    pub fn put_raw(&self, key: &str, value: &[u8]) {
        self.live().insert(
            key.to_string(),
            Slot {
                entry: Entry::Str(value.to_vec()),
                expires_at: None,
            },
        );
    }

    /// Store bytes in a hash field, bypassing any codec
    pub fn hput_raw(&self, hash: &str, field: &str, value: &[u8]) {
        let mut slots = self.live();
        let slot = slots.entry(hash.to_string()).or_insert_with(|| Slot {
            entry: Entry::Hash(BTreeMap::new()),
            expires_at: None,
        });
        if let Entry::Hash(fields) = &mut slot.entry {
            fields.insert(field.to_string(), value.to_vec());
        }
    }

    pub fn key_count(&self) -> usize {
        self.live().len()
    }

    fn read_str(&self, operation: &'static str, key: &str) -> Result<Option<Vec<u8>>> {
        match self.live().get(key).map(|slot| &slot.entry) {
            None => Ok(None),
            Some(Entry::Str(bytes)) => Ok(Some(bytes.clone())),
            Some(Entry::Hash(_)) => Err(wrong_type(operation, key)),
        }
    }

    fn with_hash<R>(
        &self,
        operation: &'static str,
        hash: &str,
        create: bool,
        f: impl FnOnce(&mut BTreeMap<String, Vec<u8>>) -> Result<R>,
    ) -> Result<Option<R>> {
        let mut slots = self.live();
        if create && !slots.contains_key(hash) {
            slots.insert(
                hash.to_string(),
                Slot {
                    entry: Entry::Hash(BTreeMap::new()),
                    expires_at: None,
                },
            );
        }
        let result = match slots.get_mut(hash).map(|slot| &mut slot.entry) {
            None => return Ok(None),
            Some(Entry::Str(_)) => return Err(wrong_type(operation, hash)),
            Some(Entry::Hash(fields)) => f(fields)?,
        };
        if matches!(slots.get(hash).map(|s| &s.entry), Some(Entry::Hash(f)) if f.is_empty()) {
            slots.remove(hash);
        }
        Ok(Some(result))
    }

    fn update_str(
        &self,
        operation: &'static str,
        key: &str,
        f: impl FnOnce(Option<&[u8]>) -> Result<Vec<u8>>,
    ) -> Result<Vec<u8>> {
        let mut slots = self.live();
        let (current, expires_at) = match slots.get(key) {
            None => (None, None),
            Some(Slot {
                entry: Entry::Str(bytes),
                expires_at,
            }) => (Some(bytes.clone()), *expires_at),
            Some(_) => return Err(wrong_type(operation, key)),
        };
        let updated = f(current.as_deref())?;
        slots.insert(
            key.to_string(),
            Slot {
                entry: Entry::Str(updated.clone()),
                expires_at,
            },
        );
        Ok(updated)
    }
}

#[async_trait]
impl RedisCommands for MemoryRedis {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.read_str("GET", key)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        self.live().insert(
            key.to_string(),
            Slot {
                entry: Entry::Str(value),
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        let slots = self.live();
        Ok(keys
            .iter()
            .map(|key| match slots.get(key).map(|slot| &slot.entry) {
                Some(Entry::Str(bytes)) => Some(bytes.clone()),
                _ => None,
            })
            .collect())
    }

    async fn mset(&self, items: Vec<(String, Vec<u8>)>) -> Result<()> {
        let mut slots = self.live();
        for (key, value) in items {
            slots.insert(
                key,
                Slot {
                    entry: Entry::Str(value),
                    expires_at: None,
                },
            );
        }
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<u64> {
        let mut slots = self.live();
        Ok(keys.iter().filter(|key| slots.remove(*key).is_some()).count() as u64)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.live().contains_key(key))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        match self.live().get_mut(key) {
            Some(slot) => {
                slot.expires_at = Some(Instant::now() + ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let slots = self.live();
        let mut keys: Vec<String> = match pattern.strip_suffix('*') {
            Some(prefix) => slots
                .keys()
                .filter(|key| key.starts_with(prefix))
                .cloned()
                .collect(),
            None => slots.keys().filter(|key| *key == pattern).cloned().collect(),
        };
        keys.sort();
        Ok(keys)
    }

    async fn incrby(&self, key: &str, amount: i64) -> Result<i64> {
        let updated = self.update_str("INCRBY", key, |current| {
            let base = current.map(|b| parse_int("INCRBY", b)).transpose()?.unwrap_or(0);
            let next = base
                .checked_add(amount)
                .ok_or_else(|| Error::backend("redis", "INCRBY", "increment would overflow"))?;
            Ok(next.to_string().into_bytes())
        })?;
        parse_int("INCRBY", &updated)
    }

    async fn decrby(&self, key: &str, amount: i64) -> Result<i64> {
        let amount = amount
            .checked_neg()
            .ok_or_else(|| Error::backend("redis", "DECRBY", "decrement would overflow"))?;
        self.incrby(key, amount).await
    }

    async fn incrbyfloat(&self, key: &str, amount: f64) -> Result<f64> {
        let updated = self.update_str("INCRBYFLOAT", key, |current| {
            let base = current
                .map(|b| parse_float("INCRBYFLOAT", b))
                .transpose()?
                .unwrap_or(0.0);
            Ok((base + amount).to_string().into_bytes())
        })?;
        parse_float("INCRBYFLOAT", &updated)
    }

    async fn hget(&self, hash: &str, field: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .with_hash("HGET", hash, false, |fields| Ok(fields.get(field).cloned()))?
            .flatten())
    }

    async fn hmget(&self, hash: &str, fields: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        let found = self.with_hash("HMGET", hash, false, |stored| {
            Ok(fields.iter().map(|f| stored.get(f).cloned()).collect())
        })?;
        Ok(found.unwrap_or_else(|| vec![None; fields.len()]))
    }

    async fn hset(&self, hash: &str, items: Vec<(String, Vec<u8>)>) -> Result<()> {
        self.with_hash("HSET", hash, true, |fields| {
            fields.extend(items);
            Ok(())
        })?;
        Ok(())
    }

    async fn hgetall(&self, hash: &str) -> Result<HashMap<String, Vec<u8>>> {
        Ok(self
            .with_hash("HGETALL", hash, false, |fields| {
                Ok(fields.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            })?
            .unwrap_or_default())
    }

    async fn hdel(&self, hash: &str, fields: &[String]) -> Result<u64> {
        Ok(self
            .with_hash("HDEL", hash, false, |stored| {
                Ok(fields.iter().filter(|f| stored.remove(*f).is_some()).count() as u64)
            })?
            .unwrap_or(0))
    }

    async fn hkeys(&self, hash: &str) -> Result<Vec<String>> {
        Ok(self
            .with_hash("HKEYS", hash, false, |fields| Ok(fields.keys().cloned().collect()))?
            .unwrap_or_default())
    }

    async fn hexists(&self, hash: &str, field: &str) -> Result<bool> {
        Ok(self
            .with_hash("HEXISTS", hash, false, |fields| Ok(fields.contains_key(field)))?
            .unwrap_or(false))
    }

    async fn hlen(&self, hash: &str) -> Result<usize> {
        Ok(self
            .with_hash("HLEN", hash, false, |fields| Ok(fields.len()))?
            .unwrap_or(0))
    }

    async fn hincrby(&self, hash: &str, field: &str, amount: i64) -> Result<i64> {
        let updated = self.with_hash("HINCRBY", hash, true, |fields| {
            let base = fields
                .get(field)
                .map(|b| parse_int("HINCRBY", b))
                .transpose()?
                .unwrap_or(0);
            let next = base
                .checked_add(amount)
                .ok_or_else(|| Error::backend("redis", "HINCRBY", "increment would overflow"))?;
            fields.insert(field.to_string(), next.to_string().into_bytes());
            Ok(next)
        })?;
        Ok(updated.unwrap_or(amount))
    }

    async fn hincrbyfloat(&self, hash: &str, field: &str, amount: f64) -> Result<f64> {
        let updated = self.with_hash("HINCRBYFLOAT", hash, true, |fields| {
            let base = fields
                .get(field)
                .map(|b| parse_float("HINCRBYFLOAT", b))
                .transpose()?
                .unwrap_or(0.0);
            let next = base + amount;
            fields.insert(field.to_string(), next.to_string().into_bytes());
            Ok(next)
        })?;
        Ok(updated.unwrap_or(amount))
    }
}
