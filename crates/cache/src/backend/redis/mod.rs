//! Redis backend
//!
//! Two layouts, fixed at construction:
//! - flat: one Redis key per entry, `base_key + separator + key`
//! - hash: one Redis hash named `base_key`, one field per entry
//!
//! Hash mode is used whenever a base key is set and `hset_disabled` is off.

mod client;
#[cfg(test)]
pub(crate) mod memory;

pub use self::client::{RedisCommands, RedisConnection};

use super::{decode_entry, Decoded, Namespace, StatefulBackend};
use async_trait::async_trait;
use pdict_codec::{Payload, Serializer};
use pdict_core::{Error, Result, Value, REDIS_KEY_SEPARATOR};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Construction options for [`RedisStatefulBackend`]
#[derive(Debug, Clone, Default)]
pub struct RedisBackendOptions {
    pub base_key: Option<String>,
    /// Defaults to `:`
    pub key_separator: Option<String>,
    /// Default TTL applied by `set` and `set_batch`
    pub expiration: Option<Duration>,
    pub hset_disabled: bool,
}

#[derive(Debug, Clone)]
pub struct RedisStatefulBackend {
    client: Arc<dyn RedisCommands>,
    namespace: Namespace,
    serializer: Arc<dyn Serializer>,
    expiration: Option<Duration>,
    hset_disabled: bool,
}

fn is_decimal_digits(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

/// Native counters are stored as plain decimal strings in the exact form
/// INCRBY and INCRBYFLOAT write them: no sign other than `-`, no padding,
/// no leading zeros, no exponent and no trailing fractional zeros.
fn parse_counter(bytes: &[u8]) -> Option<Value> {
    let text = std::str::from_utf8(bytes).ok()?;
    if let Ok(i) = text.parse::<i64>() {
        return (i.to_string() == text).then_some(Value::Int(i));
    }

    let (whole, fraction) = text.split_once('.')?;
    let digits = whole.strip_prefix('-').unwrap_or(whole);
    let canonical_whole = is_decimal_digits(digits) && (digits == "0" || !digits.starts_with('0'));
    let canonical_fraction = is_decimal_digits(fraction) && !fraction.ends_with('0');
    if !canonical_whole || !canonical_fraction {
        return None;
    }
    text.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(Value::Float)
}

impl RedisStatefulBackend {
    pub fn new(
        client: Arc<dyn RedisCommands>,
        serializer: Arc<dyn Serializer>,
        options: RedisBackendOptions,
    ) -> Self {
        let separator = options
            .key_separator
            .unwrap_or_else(|| REDIS_KEY_SEPARATOR.to_string());
        Self {
            client,
            namespace: Namespace::new(options.base_key, separator),
            serializer,
            expiration: options.expiration,
            hset_disabled: options.hset_disabled,
        }
    }

    /// Connect to `url` and build a backend over the new connection
    pub async fn connect(
        url: &str,
        serializer: Arc<dyn Serializer>,
        options: RedisBackendOptions,
    ) -> Result<Self> {
        let connection = RedisConnection::connect(url).await?;
        Ok(Self::new(Arc::new(connection), serializer, options))
    }

    /// Whether entries live as fields of one hash
    pub fn is_hash_mode(&self) -> bool {
        !self.hset_disabled && self.namespace.base_key().is_some()
    }

    fn hash_name(&self) -> Option<&str> {
        if self.hset_disabled {
            None
        } else {
            self.namespace.base_key()
        }
    }

    fn require_base_key(&self, operation: &str) -> Result<&str> {
        self.namespace.base_key().ok_or_else(|| {
            Error::not_implemented(
                operation,
                "the redis backend cannot enumerate keys without a base_key",
            )
        })
    }

    fn scan_pattern(&self, operation: &str) -> Result<String> {
        let base = self.require_base_key(operation)?;
        Ok(format!("{base}{}*", self.namespace.separator()))
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        Ok(self.serializer.encode_value(value)?.into_bytes())
    }

    fn to_payload(&self, bytes: Vec<u8>) -> Payload {
        if self.serializer.produces_binary() {
            return Payload::Binary(bytes);
        }
        match String::from_utf8(bytes) {
            Ok(text) => Payload::Text(text),
            Err(e) => Payload::Binary(e.into_bytes()),
        }
    }

    fn decode(&self, bytes: Vec<u8>) -> Result<Decoded> {
        let counter = parse_counter(&bytes);
        let payload = self.to_payload(bytes);
        if !self.serializer.produces_binary() && payload.is_binary() {
            return Ok(counter.map_or_else(
                || Decoded::Corrupt(Error::decode(self.serializer.name(), "payload is not UTF-8")),
                Decoded::Present,
            ));
        }
        match decode_entry(self.serializer.as_ref(), &payload)? {
            Decoded::Corrupt(e) => Ok(counter.map_or(Decoded::Corrupt(e), Decoded::Present)),
            decoded => Ok(decoded),
        }
    }

    /// Remove entries that failed to decode. `keys` are fields in hash mode
    /// and full Redis keys otherwise.
    async fn heal(&self, keys: Vec<String>) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        for key in &keys {
            warn!("Removing unreadable redis entry {}", key);
        }
        match self.hash_name() {
            Some(hash) => self.client.hdel(hash, &keys).await?,
            None => self.client.del(&keys).await?,
        };
        Ok(())
    }

    fn display_key(&self, full_key: &str, exclude_base_key: bool) -> String {
        if exclude_base_key {
            self.namespace.strip(full_key).to_string()
        } else {
            full_key.to_string()
        }
    }

    /// Every stored entry as `(storage key, bytes)`; storage keys are fields
    /// in hash mode and full Redis keys otherwise
    async fn raw_entries(&self, operation: &str) -> Result<Vec<(String, Vec<u8>)>> {
        if let Some(hash) = self.hash_name() {
            let mut entries: Vec<_> = self.client.hgetall(hash).await?.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            return Ok(entries);
        }
        let keys = self.client.keys(&self.scan_pattern(operation)?).await?;
        let values = self.client.mget(&keys).await?;
        Ok(keys
            .into_iter()
            .zip(values)
            .filter_map(|(key, value)| value.map(|v| (key, v)))
            .collect())
    }

    async fn write_entries(
        &self,
        entries: Vec<(String, Vec<u8>)>,
        ttl: Option<Duration>,
    ) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        if let Some(hash) = self.hash_name() {
            self.client.hset(hash, entries).await?;
            if let Some(ttl) = ttl {
                self.client.expire(hash, ttl).await?;
            }
            return Ok(());
        }
        match ttl {
            None => self.client.mset(entries).await,
            Some(ttl) => {
                for (key, value) in entries {
                    self.client.set(&key, value, Some(ttl)).await?;
                }
                Ok(())
            }
        }
    }
}

#[async_trait]
impl StatefulBackend for RedisStatefulBackend {
    fn kind(&self) -> &'static str {
        "redis"
    }

    fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    fn serializer(&self) -> &Arc<dyn Serializer> {
        &self.serializer
    }

    fn child(&self, base_key: &str) -> Arc<dyn StatefulBackend> {
        Arc::new(Self {
            client: Arc::clone(&self.client),
            namespace: self.namespace.with_base_key(base_key),
            serializer: Arc::clone(&self.serializer),
            expiration: self.expiration,
            hset_disabled: self.hset_disabled,
        })
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let (storage_key, bytes) = match self.hash_name() {
            Some(hash) => (key.to_string(), self.client.hget(hash, key).await?),
            None => {
                let full_key = self.namespace.key(key);
                let bytes = self.client.get(&full_key).await?;
                (full_key, bytes)
            }
        };
        let Some(bytes) = bytes else {
            return Ok(None);
        };
        match self.decode(bytes)? {
            Decoded::Present(value) => Ok(Some(value)),
            Decoded::Absent => Ok(None),
            Decoded::Corrupt(e) => {
                debug!("Decode failure for {}: {}", storage_key, e);
                self.heal(vec![storage_key]).await?;
                Ok(None)
            }
        }
    }

    async fn get_values(&self, keys: &[String]) -> Result<Vec<Option<Value>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let (storage_keys, stored) = match self.hash_name() {
            Some(hash) => (keys.to_vec(), self.client.hmget(hash, keys).await?),
            None => {
                let full_keys: Vec<String> = keys.iter().map(|k| self.namespace.key(k)).collect();
                let stored = self.client.mget(&full_keys).await?;
                (full_keys, stored)
            }
        };

        let mut corrupt = Vec::new();
        let mut results = Vec::with_capacity(keys.len());
        for (storage_key, bytes) in storage_keys.into_iter().zip(stored) {
            let value = match bytes {
                None => None,
                Some(bytes) => match self.decode(bytes)? {
                    Decoded::Present(value) => Some(value),
                    Decoded::Absent => None,
                    Decoded::Corrupt(e) => {
                        debug!("Decode failure for {}: {}", storage_key, e);
                        corrupt.push(storage_key);
                        None
                    }
                },
            };
            results.push(value);
        }
        self.heal(corrupt).await?;
        Ok(results)
    }

    async fn set(&self, key: &str, value: &Value, ttl: Option<Duration>) -> Result<()> {
        let bytes = self.encode(value)?;
        let ttl = ttl.or(self.expiration);
        match self.hash_name() {
            Some(hash) => {
                self.client.hset(hash, vec![(key.to_string(), bytes)]).await?;
                if let Some(ttl) = ttl {
                    self.client.expire(hash, ttl).await?;
                }
                Ok(())
            }
            None => self.client.set(&self.namespace.key(key), bytes, ttl).await,
        }
    }

    async fn set_batch(
        &self,
        data: &BTreeMap<String, Value>,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let hash_mode = self.is_hash_mode();
        let entries = data
            .iter()
            .map(|(key, value)| {
                let storage_key = if hash_mode {
                    key.clone()
                } else {
                    self.namespace.key(key)
                };
                Ok((storage_key, self.encode(value)?))
            })
            .collect::<Result<Vec<_>>>()?;
        self.write_entries(entries, ttl.or(self.expiration)).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match self.hash_name() {
            Some(hash) => self.client.hdel(hash, &[key.to_string()]).await?,
            None => self.client.del(&[self.namespace.key(key)]).await?,
        };
        Ok(())
    }

    async fn clear(&self, keys: &[String]) -> Result<()> {
        if let Some(hash) = self.hash_name() {
            if keys.is_empty() {
                self.client.del(&[hash.to_string()]).await?;
            } else {
                self.client.hdel(hash, keys).await?;
            }
            return Ok(());
        }

        let targets = if keys.is_empty() {
            self.client.keys(&self.scan_pattern("clear")?).await?
        } else {
            keys.iter().map(|k| self.namespace.key(k)).collect()
        };
        debug!("Clearing {} redis keys", targets.len());
        self.client.del(&targets).await?;
        Ok(())
    }

    async fn contains(&self, key: &str) -> Result<bool> {
        match self.hash_name() {
            Some(hash) => self.client.hexists(hash, key).await,
            None => self.client.exists(&self.namespace.key(key)).await,
        }
    }

    async fn get_all_keys(&self, exclude_base_key: bool) -> Result<Vec<String>> {
        if let Some(hash) = self.hash_name() {
            let mut fields = self.client.hkeys(hash).await?;
            fields.sort();
            return Ok(fields);
        }
        let keys = self.client.keys(&self.scan_pattern("get_all_keys")?).await?;
        let mut keys: Vec<String> = keys
            .iter()
            .map(|k| self.display_key(k, exclude_base_key))
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn get_all_values(&self) -> Result<Vec<Value>> {
        Ok(self.get_all_data(true).await?.into_values().collect())
    }

    async fn get_all_data(&self, exclude_base_key: bool) -> Result<BTreeMap<String, Value>> {
        let hash_mode = self.is_hash_mode();
        let mut corrupt = Vec::new();
        let mut data = BTreeMap::new();
        for (storage_key, bytes) in self.raw_entries("get_all_data").await? {
            match self.decode(bytes)? {
                Decoded::Present(value) => {
                    let key = if hash_mode {
                        storage_key
                    } else {
                        self.display_key(&storage_key, exclude_base_key)
                    };
                    data.insert(key, value);
                }
                Decoded::Absent => {}
                Decoded::Corrupt(e) => {
                    debug!("Decode failure for {}: {}", storage_key, e);
                    corrupt.push(storage_key);
                }
            }
        }
        self.heal(corrupt).await?;
        Ok(data)
    }

    async fn length(&self) -> Result<usize> {
        match self.hash_name() {
            Some(hash) => self.client.hlen(hash).await,
            None => Ok(self.client.keys(&self.scan_pattern("length")?).await?.len()),
        }
    }

    async fn incrby(&self, key: &str, amount: i64) -> Result<i64> {
        match self.hash_name() {
            Some(hash) => self.client.hincrby(hash, key, amount).await,
            None => self.client.incrby(&self.namespace.key(key), amount).await,
        }
    }

    async fn incrbyfloat(&self, key: &str, amount: f64) -> Result<f64> {
        match self.hash_name() {
            Some(hash) => self.client.hincrbyfloat(hash, key, amount).await,
            None => self.client.incrbyfloat(&self.namespace.key(key), amount).await,
        }
    }

    async fn decrby(&self, key: &str, amount: i64) -> Result<i64> {
        match self.hash_name() {
            Some(hash) => {
                let amount = amount
                    .checked_neg()
                    .ok_or_else(|| Error::invalid_value(key, "a negatable amount"))?;
                self.client.hincrby(hash, key, amount).await
            }
            None => self.client.decrby(&self.namespace.key(key), amount).await,
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        if self.is_hash_mode() {
            warn!(
                "Redis hash mode cannot expire individual field {}; set a TTL on the whole hash instead",
                key
            );
            return Ok(());
        }
        self.client.expire(&self.namespace.key(key), ttl).await?;
        Ok(())
    }

    async fn migrate_compression(&self) -> Result<Vec<String>> {
        self.require_base_key("migrate_compression")?;
        let hash_mode = self.is_hash_mode();

        let mut failed = Vec::new();
        let mut migrated = Vec::new();
        for (storage_key, bytes) in self.raw_entries("migrate_compression").await? {
            let reported = if hash_mode {
                storage_key.clone()
            } else {
                self.namespace.strip(&storage_key).to_string()
            };
            let value = match self.decode(bytes)? {
                Decoded::Present(value) => value,
                Decoded::Absent => continue,
                Decoded::Corrupt(e) => {
                    warn!("Unable to migrate {}: {}", storage_key, e);
                    failed.push(reported);
                    continue;
                }
            };
            match self.encode(&value) {
                Ok(bytes) => migrated.push((storage_key, bytes)),
                Err(e) => {
                    warn!("Unable to re-encode {}: {}", storage_key, e);
                    failed.push(reported);
                }
            }
        }

        debug!(
            "Migrated {} redis entries, {} failed",
            migrated.len(),
            failed.len()
        );
        self.write_entries(migrated, self.expiration).await?;
        Ok(failed)
    }

    async fn get_all_raw(&self, exclude_base_key: bool) -> Result<BTreeMap<String, Payload>> {
        let hash_mode = self.is_hash_mode();
        Ok(self
            .raw_entries("get_all_raw")
            .await?
            .into_iter()
            .map(|(storage_key, bytes)| {
                let key = if hash_mode {
                    storage_key
                } else {
                    self.display_key(&storage_key, exclude_base_key)
                };
                (key, self.to_payload(bytes))
            })
            .collect())
    }

    async fn load_raw(
        &self,
        data: BTreeMap<String, Payload>,
        includes_base_key: bool,
    ) -> Result<()> {
        let hash_mode = self.is_hash_mode();
        let entries = data
            .into_iter()
            .map(|(key, payload)| {
                let storage_key = if hash_mode || includes_base_key {
                    key
                } else {
                    self.namespace.key(&key)
                };
                (storage_key, payload.into_bytes())
            })
            .collect();
        self.write_entries(entries, self.expiration).await
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryRedis;
    use super::*;
    use pdict_codec::{build_serializer, CompressionKind, SerializerKind, SerializerOptions};

    fn serializer(kind: SerializerKind, compression: CompressionKind) -> Arc<dyn Serializer> {
        build_serializer(&SerializerOptions::new(kind).with_compression(compression, None))
            .unwrap()
    }

    fn backend(
        redis: &Arc<MemoryRedis>,
        base_key: Option<&str>,
        hset_disabled: bool,
    ) -> RedisStatefulBackend {
        RedisStatefulBackend::new(
            redis.clone(),
            serializer(SerializerKind::Json, CompressionKind::None),
            RedisBackendOptions {
                base_key: base_key.map(str::to_string),
                hset_disabled,
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_flat_scenario() {
        let redis = Arc::new(MemoryRedis::new());
        let flat = backend(&redis, Some("app"), true);
        assert!(!flat.is_hash_mode());

        flat.set("foo", &Value::from("bar"), None).await.unwrap();
        assert_eq!(redis.get("app:foo").await.unwrap(), Some(b"\"bar\"".to_vec()));
        assert_eq!(flat.get("foo").await.unwrap(), Some(Value::from("bar")));
        assert_eq!(flat.get("app:foo").await.unwrap(), Some(Value::from("bar")));

        flat.delete("foo").await.unwrap();
        assert_eq!(flat.get("foo").await.unwrap(), None);
        assert!(!flat.contains("foo").await.unwrap());
    }

    #[tokio::test]
    async fn test_hash_mode_layout() {
        let redis = Arc::new(MemoryRedis::new());
        let hashed = backend(&redis, Some("app"), false);
        assert!(hashed.is_hash_mode());

        hashed.set("a", &Value::Int(1), None).await.unwrap();
        hashed.set("b", &Value::Int(2), None).await.unwrap();

        assert_eq!(redis.hget("app", "a").await.unwrap(), Some(b"1".to_vec()));
        assert_eq!(hashed.length().await.unwrap(), 2);
        assert_eq!(
            hashed.get_all_keys(false).await.unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );

        hashed.clear(&[]).await.unwrap();
        assert_eq!(redis.key_count(), 0);
    }

    #[tokio::test]
    async fn test_flat_enumeration_requires_base_key() {
        let redis = Arc::new(MemoryRedis::new());
        let bare = backend(&redis, None, false);
        bare.set("k", &Value::Int(1), None).await.unwrap();

        assert!(matches!(
            bare.get_all_keys(true).await,
            Err(Error::NotImplemented { .. })
        ));
        assert!(matches!(bare.clear(&[]).await, Err(Error::NotImplemented { .. })));
        assert!(matches!(
            bare.migrate_compression().await,
            Err(Error::NotImplemented { .. })
        ));

        bare.clear(&["k".to_string()]).await.unwrap();
        assert!(!bare.contains("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_flat_enumeration_is_scoped() {
        let redis = Arc::new(MemoryRedis::new());
        let flat = backend(&redis, Some("app"), true);
        redis.put_raw("other:x", b"1");

        flat.set("x", &Value::Int(1), None).await.unwrap();
        flat.set("y", &Value::from("two"), None).await.unwrap();

        assert_eq!(
            flat.get_all_keys(true).await.unwrap(),
            vec!["x".to_string(), "y".to_string()]
        );
        assert_eq!(
            flat.get_all_keys(false).await.unwrap(),
            vec!["app:x".to_string(), "app:y".to_string()]
        );
        let data = flat.get_all_data(true).await.unwrap();
        assert_eq!(data["y"], Value::from("two"));

        flat.clear(&[]).await.unwrap();
        assert_eq!(flat.length().await.unwrap(), 0);
        assert!(redis.exists("other:x").await.unwrap());
    }

    #[tokio::test]
    async fn test_ttl_semantics() {
        let redis = Arc::new(MemoryRedis::new());
        let flat = backend(&redis, Some("app"), true);
        flat.set("k", &Value::Int(1), None).await.unwrap();
        flat.expire("k", Duration::from_secs(60)).await.unwrap();
        assert!(redis.ttl("app:k").is_some());

        let hashed = backend(&redis, Some("h"), false);
        hashed.set("k", &Value::Int(1), None).await.unwrap();
        hashed.expire("k", Duration::from_secs(60)).await.unwrap();
        assert!(redis.ttl("h").is_none());

        hashed
            .set("k", &Value::Int(2), Some(Duration::from_secs(30)))
            .await
            .unwrap();
        assert!(redis.ttl("h").is_some());
    }

    #[tokio::test]
    async fn test_default_expiration() {
        let redis = Arc::new(MemoryRedis::new());
        let flat = RedisStatefulBackend::new(
            redis.clone(),
            serializer(SerializerKind::Json, CompressionKind::None),
            RedisBackendOptions {
                base_key: Some("app".to_string()),
                expiration: Some(Duration::from_secs(120)),
                hset_disabled: true,
                ..Default::default()
            },
        );
        let mut batch = BTreeMap::new();
        batch.insert("a".to_string(), Value::Int(1));
        flat.set_batch(&batch, None).await.unwrap();
        flat.set("b", &Value::Int(2), None).await.unwrap();

        assert!(redis.ttl("app:a").unwrap() > Duration::from_secs(60));
        assert!(redis.ttl("app:b").is_some());
    }

    #[tokio::test]
    async fn test_native_counters() {
        let redis = Arc::new(MemoryRedis::new());
        for hset_disabled in [true, false] {
            let backend = RedisStatefulBackend::new(
                redis.clone(),
                serializer(SerializerKind::Pickle, CompressionKind::Gzip),
                RedisBackendOptions {
                    base_key: Some(format!("counters{hset_disabled}")),
                    hset_disabled,
                    ..Default::default()
                },
            );
            assert_eq!(backend.incrby("counter", 1).await.unwrap(), 1);
            assert_eq!(backend.incrby("counter", 2).await.unwrap(), 3);
            assert_eq!(backend.decrby("counter", 4).await.unwrap(), -1);
            assert_eq!(backend.incrbyfloat("ratio", 1.5).await.unwrap(), 1.5);
            assert_eq!(backend.decrbyfloat("ratio", 0.5).await.unwrap(), 1.0);

            // Plain decimal strings read back as numbers
            assert_eq!(backend.get("counter").await.unwrap(), Some(Value::Int(-1)));
            assert_eq!(backend.get("ratio").await.unwrap(), Some(Value::Int(1)));
        }
    }

    #[tokio::test]
    async fn test_self_healing() {
        let redis = Arc::new(MemoryRedis::new());
        let codec = serializer(SerializerKind::MsgPack, CompressionKind::Zstd);
        let flat = RedisStatefulBackend::new(
            redis.clone(),
            codec.clone(),
            RedisBackendOptions {
                base_key: Some("app".to_string()),
                hset_disabled: true,
                ..Default::default()
            },
        );
        redis.put_raw("app:bad", b"\x00garbage");
        assert_eq!(flat.get("bad").await.unwrap(), None);
        assert!(!flat.contains("bad").await.unwrap());

        let hashed = RedisStatefulBackend::new(
            redis.clone(),
            codec,
            RedisBackendOptions {
                base_key: Some("h".to_string()),
                ..Default::default()
            },
        );
        hashed.set("good", &Value::from("ok"), None).await.unwrap();
        redis.hput_raw("h", "bad", b"\x00garbage");
        let values = hashed
            .get_values(&["good".to_string(), "bad".to_string()])
            .await
            .unwrap();
        assert_eq!(values, vec![Some(Value::from("ok")), None]);
        assert!(!hashed.contains("bad").await.unwrap());
    }

    #[tokio::test]
    async fn test_migrate_compression() {
        let redis = Arc::new(MemoryRedis::new());
        let options = RedisBackendOptions {
            base_key: Some("app".to_string()),
            hset_disabled: true,
            ..Default::default()
        };
        let old = RedisStatefulBackend::new(
            redis.clone(),
            serializer(SerializerKind::Json, CompressionKind::Zlib),
            options.clone(),
        );
        old.set("a", &Value::from("alpha"), None).await.unwrap();
        old.set("b", &Value::Int(2), None).await.unwrap();
        redis.put_raw("app:broken", b"\x00\x01");

        let new_codec = build_serializer(
            &SerializerOptions::new(SerializerKind::Json)
                .with_compression(CompressionKind::Zstd, None)
                .with_previous_compression(CompressionKind::Zlib),
        )
        .unwrap();
        let new = RedisStatefulBackend::new(redis.clone(), new_codec, options);

        let failed = new.migrate_compression().await.unwrap();
        assert_eq!(failed, vec!["broken".to_string()]);
        assert_eq!(redis.get("app:broken").await.unwrap(), Some(b"\x00\x01".to_vec()));

        assert_eq!(new.get("a").await.unwrap(), Some(Value::from("alpha")));
        assert_eq!(new.get("b").await.unwrap(), Some(Value::Int(2)));
        let raw = new.get_all_raw(true).await.unwrap();
        assert_eq!(&raw["a"].as_bytes()[..4], &[0x28, 0xb5, 0x2f, 0xfd]);
    }

    #[tokio::test]
    async fn test_migrate_compression_reapplies_expiration() {
        let redis = Arc::new(MemoryRedis::new());
        for hset_disabled in [true, false] {
            let options = RedisBackendOptions {
                base_key: Some(format!("ttl{hset_disabled}")),
                expiration: Some(Duration::from_secs(600)),
                hset_disabled,
                ..Default::default()
            };
            let old = RedisStatefulBackend::new(
                redis.clone(),
                serializer(SerializerKind::Json, CompressionKind::Zlib),
                options.clone(),
            );
            old.set("a", &Value::from("alpha"), None).await.unwrap();

            let new_codec = build_serializer(
                &SerializerOptions::new(SerializerKind::Json)
                    .with_compression(CompressionKind::Gzip, None)
                    .with_previous_compression(CompressionKind::Zlib),
            )
            .unwrap();
            let new = RedisStatefulBackend::new(redis.clone(), new_codec, options);

            let ttl_key = if hset_disabled {
                format!("ttl{hset_disabled}:a")
            } else {
                format!("ttl{hset_disabled}")
            };
            assert!(new.migrate_compression().await.unwrap().is_empty());
            let ttl = redis.ttl(&ttl_key).expect("migrated entry keeps a TTL");
            assert!(ttl > Duration::from_secs(590));
            assert_eq!(new.get("a").await.unwrap(), Some(Value::from("alpha")));
        }
    }

    #[tokio::test]
    async fn test_non_canonical_digits_are_healed() {
        let redis = Arc::new(MemoryRedis::new());
        let flat = RedisStatefulBackend::new(
            redis.clone(),
            serializer(SerializerKind::Pickle, CompressionKind::Gzip),
            RedisBackendOptions {
                base_key: Some("digits".to_string()),
                hset_disabled: true,
                ..Default::default()
            },
        );

        redis.put_raw("digits:int", b"42");
        redis.put_raw("digits:float", b"-0.25");
        assert_eq!(flat.get("int").await.unwrap(), Some(Value::Int(42)));
        assert_eq!(flat.get("float").await.unwrap(), Some(Value::Float(-0.25)));

        let malformed: [(&str, &[u8]); 5] = [
            ("padded", b"007"),
            ("signed", b"+5"),
            ("spaced", b" 12\n"),
            ("exponent", b"1e3"),
            ("trailing", b"1.50"),
        ];
        for (key, raw) in malformed {
            redis.put_raw(&format!("digits:{key}"), raw);
            assert_eq!(flat.get(key).await.unwrap(), None, "{key} should heal");
            assert!(!flat.contains(key).await.unwrap(), "{key} should be removed");
        }
    }

    #[test]
    fn test_parse_counter_accepts_native_forms() {
        assert_eq!(parse_counter(b"0"), Some(Value::Int(0)));
        assert_eq!(parse_counter(b"-17"), Some(Value::Int(-17)));
        assert_eq!(parse_counter(b"10.5"), Some(Value::Float(10.5)));
        assert_eq!(parse_counter(b"-0"), None);
        assert_eq!(parse_counter(b"01.5"), None);
        assert_eq!(parse_counter(b"1."), None);
        assert_eq!(parse_counter(b"abc"), None);
    }

    #[tokio::test]
    async fn test_child_shares_connection() {
        let redis = Arc::new(MemoryRedis::new());
        let root = backend(&redis, Some("root"), false);
        let child = root.child("root:child");

        root.set("a", &Value::Int(1), None).await.unwrap();
        child.set("a", &Value::Int(2), None).await.unwrap();

        assert_eq!(root.get("a").await.unwrap(), Some(Value::Int(1)));
        assert_eq!(child.get("a").await.unwrap(), Some(Value::Int(2)));
        assert!(redis.exists("root:child").await.unwrap());
    }

    #[tokio::test]
    async fn test_raw_dump_and_load() {
        let redis = Arc::new(MemoryRedis::new());
        let source = backend(&redis, Some("src"), true);
        source.set("k", &Value::from("v"), None).await.unwrap();

        let raw = source.get_all_raw(true).await.unwrap();
        assert_eq!(raw["k"], Payload::Text("\"v\"".to_string()));

        let target = source.child("dst");
        target.load_raw(raw, false).await.unwrap();
        assert_eq!(redis.get("dst:k").await.unwrap(), Some(b"\"v\"".to_vec()));
    }
}
