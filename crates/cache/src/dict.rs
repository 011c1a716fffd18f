//! Dict-like façade over a [`StatefulBackend`]

use crate::backend::{
    BackendKind, KeyIter, LocalStatefulBackend, RedisBackendOptions, RedisStatefulBackend,
    StatefulBackend,
};
use crate::blocking::BlockingDict;
use crate::config::PersistentDictConfig;
use pdict_codec::{build_serializer, Payload, Serializer};
use pdict_core::{Result, Value, CHILD_KEY_SEPARATOR};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Persistent key-value dict bound to one backend
#[derive(Debug, Clone)]
pub struct PersistentDict {
    name: String,
    backend: Arc<dyn StatefulBackend>,
    /// Save key of the parent, for child dicts
    parent: Option<String>,
    child_key: Option<String>,
    async_enabled: bool,
}

impl PersistentDict {
    /// Build serializer, compressor and backend from `config`
    pub async fn new(config: PersistentDictConfig) -> Result<Self> {
        config.validate()?;
        let serializer = build_serializer(&config.serializer_options()?)?;

        let backend: Arc<dyn StatefulBackend> = match config.resolved_backend() {
            BackendKind::Redis => {
                let url = config.redis_url.as_deref().unwrap_or_default();
                let options = RedisBackendOptions {
                    base_key: config.base_key.clone(),
                    key_separator: config.key_separator.clone(),
                    expiration: config.expiration_duration(),
                    hset_disabled: config.hset_disabled,
                };
                Arc::new(RedisStatefulBackend::connect(url, serializer, options).await?)
            }
            _ => {
                if config.backend == BackendKind::Auto {
                    warn!("No redis_url configured for '{}'; using the local backend", config.name);
                }
                let file_path = config.local_file_path();
                Arc::new(LocalStatefulBackend::open(
                    file_path,
                    config.base_key.clone(),
                    config.key_separator.clone(),
                    serializer,
                )?)
            }
        };

        info!(
            "Opened persistent dict '{}' ({} backend, {} serializer)",
            config.name,
            backend.kind(),
            backend.serializer().name()
        );

        Ok(Self::with_backend(config.name, backend).with_async_enabled(config.async_enabled))
    }

    /// Wrap an existing backend
    pub fn with_backend(name: impl Into<String>, backend: Arc<dyn StatefulBackend>) -> Self {
        Self {
            name: name.into(),
            backend,
            parent: None,
            child_key: None,
            async_enabled: false,
        }
    }

    pub fn with_async_enabled(mut self, enabled: bool) -> Self {
        self.async_enabled = enabled;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backend(&self) -> &Arc<dyn StatefulBackend> {
        &self.backend
    }

    pub fn serializer(&self) -> &Arc<dyn Serializer> {
        self.backend.serializer()
    }

    pub fn base_key(&self) -> Option<&str> {
        self.backend.base_key()
    }

    pub fn async_enabled(&self) -> bool {
        self.async_enabled
    }

    /// Effective compression level, if a compressor is configured
    pub fn compression_level(&self) -> Option<i32> {
        self.serializer().compression_level()
    }

    /// Key identifying this dict when saved: the base key (or name) for a
    /// root dict, `p:<parent>:c:<child>` for a child
    pub fn cache_save_key(&self) -> String {
        match (&self.parent, &self.child_key) {
            (Some(parent), Some(child)) => format!("p:{parent}:c:{child}"),
            _ => self.base_key().unwrap_or(&self.name).to_string(),
        }
    }

    /// Dict sharing this dict's store, scoped under `<base_key>:<key>`
    pub fn child(&self, key: &str) -> Self {
        let base_key = match self.base_key() {
            Some(base) => format!("{base}{CHILD_KEY_SEPARATOR}{key}"),
            None => key.to_string(),
        };
        debug!("Deriving child dict '{}' from '{}'", base_key, self.name);
        Self {
            name: format!("{}{CHILD_KEY_SEPARATOR}{key}", self.name),
            backend: self.backend.child(&base_key),
            parent: Some(self.cache_save_key()),
            child_key: Some(key.to_string()),
            async_enabled: self.async_enabled,
        }
    }

    /// Blocking view driving this dict on a private runtime
    pub fn blocking(&self) -> BlockingDict {
        BlockingDict::new(self.clone())
    }

    /// Stored value, or `default` when missing or unreadable
    pub async fn get(&self, key: &str, default: impl Into<Value> + Send) -> Result<Value> {
        Ok(self.backend.get(key).await?.unwrap_or_else(|| default.into()))
    }

    /// Stored value, or `None` when missing or unreadable
    pub async fn fetch(&self, key: &str) -> Result<Option<Value>> {
        self.backend.get(key).await
    }

    pub async fn get_values(&self, keys: &[String]) -> Result<Vec<Option<Value>>> {
        self.backend.get_values(keys).await
    }

    pub async fn set(
        &self,
        key: &str,
        value: impl Into<Value> + Send,
        ttl: Option<Duration>,
    ) -> Result<()> {
        self.backend.set(key, &value.into(), ttl).await
    }

    pub async fn set_batch(
        &self,
        data: &BTreeMap<String, Value>,
        ttl: Option<Duration>,
    ) -> Result<()> {
        self.backend.set_batch(data, ttl).await
    }

    pub async fn update(&self, data: &BTreeMap<String, Value>) -> Result<()> {
        self.backend.set_batch(data, None).await
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        self.backend.delete(key).await
    }

    pub async fn contains(&self, key: &str) -> Result<bool> {
        self.backend.contains(key).await
    }

    pub async fn len(&self) -> Result<usize> {
        self.backend.length().await
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    pub async fn keys(&self) -> Result<Vec<String>> {
        self.backend.get_all_keys(true).await
    }

    pub async fn values(&self) -> Result<Vec<Value>> {
        self.backend.get_all_values().await
    }

    pub async fn items(&self) -> Result<Vec<(String, Value)>> {
        Ok(self.backend.get_all_data(true).await?.into_iter().collect())
    }

    pub async fn get_all_data(&self, exclude_base_key: bool) -> Result<BTreeMap<String, Value>> {
        self.backend.get_all_data(exclude_base_key).await
    }

    /// Remove every entry in this dict's namespace
    pub async fn clear(&self) -> Result<()> {
        self.backend.clear(&[]).await
    }

    pub async fn clear_keys(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        self.backend.clear(keys).await
    }

    /// Snapshot of the keys at call time
    pub async fn iterate(&self) -> Result<KeyIter> {
        self.backend.iterate().await
    }

    pub async fn incrby(&self, key: &str, amount: i64) -> Result<i64> {
        self.backend.incrby(key, amount).await
    }

    pub async fn incrbyfloat(&self, key: &str, amount: f64) -> Result<f64> {
        self.backend.incrbyfloat(key, amount).await
    }

    pub async fn decrby(&self, key: &str, amount: i64) -> Result<i64> {
        self.backend.decrby(key, amount).await
    }

    pub async fn decrbyfloat(&self, key: &str, amount: f64) -> Result<f64> {
        self.backend.decrbyfloat(key, amount).await
    }

    pub async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        self.backend.expire(key, ttl).await
    }

    /// Re-encode every entry with the current codec; returns keys that could
    /// not be decoded
    pub async fn migrate_compression(&self) -> Result<Vec<String>> {
        let failed = self.backend.migrate_compression().await?;
        if !failed.is_empty() {
            warn!(
                "{} entries in '{}' could not be migrated",
                failed.len(),
                self.name
            );
        }
        Ok(failed)
    }

    /// Remove `key` and return its value, or `default`
    pub async fn pop(&self, key: &str, default: impl Into<Value> + Send) -> Result<Value> {
        match self.backend.get(key).await? {
            Some(value) => {
                self.backend.delete(key).await?;
                Ok(value)
            }
            None => Ok(default.into()),
        }
    }

    /// Remove and return the last entry in key order
    pub async fn popitem(&self) -> Result<Option<(String, Value)>> {
        let mut keys = self.backend.get_all_keys(true).await?;
        while let Some(key) = keys.pop() {
            if let Some(value) = self.backend.get(&key).await? {
                self.backend.delete(&key).await?;
                return Ok(Some((key, value)));
            }
        }
        Ok(None)
    }

    /// Stored value, storing `default` first when the key is missing
    pub async fn setdefault(&self, key: &str, default: impl Into<Value> + Send) -> Result<Value> {
        if let Some(value) = self.backend.get(key).await? {
            return Ok(value);
        }
        let default = default.into();
        self.backend.set(key, &default, None).await?;
        Ok(default)
    }

    /// Encoded payloads keyed without the namespace prefix
    pub async fn dump_raw(&self) -> Result<BTreeMap<String, Payload>> {
        self.backend.get_all_raw(true).await
    }

    /// Store payloads produced by [`Self::dump_raw`] under this namespace
    pub async fn load_raw(&self, data: BTreeMap<String, Payload>) -> Result<()> {
        self.backend.load_raw(data, false).await
    }
}
