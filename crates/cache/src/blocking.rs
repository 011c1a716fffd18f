//! Blocking surface over [`PersistentDict`]
//!
//! Every call blocks on the async operation using a private current-thread
//! runtime shared by a view and its children. Calling from inside a runtime
//! is an error, except for writes on dicts with `async_enabled`, which are
//! spawned onto the caller's runtime instead.

use crate::backend::KeyIter;
use crate::config::PersistentDictConfig;
use crate::dict::PersistentDict;
use parking_lot::Mutex;
use pdict_codec::Payload;
use pdict_core::{Error, Result, Value};
use pdict_utils::{spawn_detached, AsyncRuntime};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Clone)]
pub struct BlockingDict {
    dict: PersistentDict,
    runtime: Arc<Mutex<AsyncRuntime>>,
}

impl std::fmt::Debug for BlockingDict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingDict")
            .field("dict", &self.dict)
            .finish_non_exhaustive()
    }
}

fn ensure_outside_runtime() -> Result<()> {
    if AsyncRuntime::is_in_async_context() {
        return Err(Error::runtime(
            "blocking dict call inside an async runtime; use the async PersistentDict methods",
        ));
    }
    Ok(())
}

impl BlockingDict {
    pub(crate) fn new(dict: PersistentDict) -> Self {
        Self {
            dict,
            runtime: Arc::new(Mutex::new(AsyncRuntime::new())),
        }
    }

    /// Build a dict from `config` on the view's own runtime
    pub fn open(config: PersistentDictConfig) -> Result<Self> {
        ensure_outside_runtime()?;
        let mut runtime = AsyncRuntime::new();
        let dict = runtime.block_on(PersistentDict::new(config))?;
        Ok(Self {
            dict,
            runtime: Arc::new(Mutex::new(runtime)),
        })
    }

    /// The async dict behind this view
    pub fn as_async(&self) -> &PersistentDict {
        &self.dict
    }

    fn block_on<F, T>(&self, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        ensure_outside_runtime()?;
        self.runtime.lock().block_on(future)
    }

    fn write<F, Fut>(&self, operation: &'static str, f: F) -> Result<()>
    where
        F: FnOnce(PersistentDict) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        if self.dict.async_enabled() && AsyncRuntime::is_in_async_context() {
            debug!("Spawning background {} on '{}'", operation, self.dict.name());
            spawn_detached(operation, f(self.dict.clone()));
            return Ok(());
        }
        self.block_on(f(self.dict.clone()))
    }

    pub fn child(&self, key: &str) -> Self {
        Self {
            dict: self.dict.child(key),
            runtime: Arc::clone(&self.runtime),
        }
    }

    pub fn cache_save_key(&self) -> String {
        self.dict.cache_save_key()
    }

    pub fn compression_level(&self) -> Option<i32> {
        self.dict.compression_level()
    }

    pub fn get(&self, key: &str, default: impl Into<Value> + Send) -> Result<Value> {
        self.block_on(self.dict.get(key, default))
    }

    pub fn fetch(&self, key: &str) -> Result<Option<Value>> {
        self.block_on(self.dict.fetch(key))
    }

    pub fn get_values(&self, keys: &[String]) -> Result<Vec<Option<Value>>> {
        self.block_on(self.dict.get_values(keys))
    }

    pub fn set(&self, key: &str, value: impl Into<Value>, ttl: Option<Duration>) -> Result<()> {
        let key = key.to_string();
        let value = value.into();
        self.write("set", move |dict| async move { dict.set(&key, value, ttl).await })
    }

    pub fn set_batch(&self, data: BTreeMap<String, Value>, ttl: Option<Duration>) -> Result<()> {
        self.write("set_batch", move |dict| async move {
            dict.set_batch(&data, ttl).await
        })
    }

    pub fn update(&self, data: BTreeMap<String, Value>) -> Result<()> {
        self.set_batch(data, None)
    }

    pub fn delete(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.write("delete", move |dict| async move { dict.delete(&key).await })
    }

    pub fn clear(&self) -> Result<()> {
        self.write("clear", |dict| async move { dict.clear().await })
    }

    pub fn clear_keys(&self, keys: Vec<String>) -> Result<()> {
        self.write("clear", move |dict| async move { dict.clear_keys(&keys).await })
    }

    pub fn contains(&self, key: &str) -> Result<bool> {
        self.block_on(self.dict.contains(key))
    }

    pub fn len(&self) -> Result<usize> {
        self.block_on(self.dict.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.block_on(self.dict.is_empty())
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        self.block_on(self.dict.keys())
    }

    pub fn values(&self) -> Result<Vec<Value>> {
        self.block_on(self.dict.values())
    }

    pub fn items(&self) -> Result<Vec<(String, Value)>> {
        self.block_on(self.dict.items())
    }

    pub fn get_all_data(&self, exclude_base_key: bool) -> Result<BTreeMap<String, Value>> {
        self.block_on(self.dict.get_all_data(exclude_base_key))
    }

    pub fn iterate(&self) -> Result<KeyIter> {
        self.block_on(self.dict.iterate())
    }

    pub fn incrby(&self, key: &str, amount: i64) -> Result<i64> {
        self.block_on(self.dict.incrby(key, amount))
    }

    pub fn incrbyfloat(&self, key: &str, amount: f64) -> Result<f64> {
        self.block_on(self.dict.incrbyfloat(key, amount))
    }

    pub fn decrby(&self, key: &str, amount: i64) -> Result<i64> {
        self.block_on(self.dict.decrby(key, amount))
    }

    pub fn decrbyfloat(&self, key: &str, amount: f64) -> Result<f64> {
        self.block_on(self.dict.decrbyfloat(key, amount))
    }

    pub fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        self.block_on(self.dict.expire(key, ttl))
    }

    pub fn migrate_compression(&self) -> Result<Vec<String>> {
        self.block_on(self.dict.migrate_compression())
    }

    pub fn pop(&self, key: &str, default: impl Into<Value> + Send) -> Result<Value> {
        self.block_on(self.dict.pop(key, default))
    }

    pub fn popitem(&self) -> Result<Option<(String, Value)>> {
        self.block_on(self.dict.popitem())
    }

    pub fn setdefault(&self, key: &str, default: impl Into<Value> + Send) -> Result<Value> {
        self.block_on(self.dict.setdefault(key, default))
    }

    pub fn dump_raw(&self) -> Result<BTreeMap<String, Payload>> {
        self.block_on(self.dict.dump_raw())
    }

    pub fn load_raw(&self, data: BTreeMap<String, Payload>) -> Result<()> {
        self.block_on(self.dict.load_raw(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendKind;
    use crate::config::PersistentDictConfigBuilder;
    use tempfile::TempDir;

    fn config(dir: &TempDir, async_enabled: bool) -> PersistentDictConfig {
        PersistentDictConfigBuilder::new()
            .with_name("blocking")
            .with_backend(BackendKind::Local)
            .with_data_dir(dir.path())
            .with_async_enabled(async_enabled)
            .build()
            .unwrap()
    }

    #[test]
    fn test_blocking_scenario() {
        let dir = TempDir::new().unwrap();
        let dict = BlockingDict::open(config(&dir, false)).unwrap();

        dict.set("foo", "bar", None).unwrap();
        assert_eq!(dict.get("foo", Value::Null).unwrap(), Value::from("bar"));
        dict.delete("foo").unwrap();
        assert_eq!(dict.get("foo", "missing").unwrap(), Value::from("missing"));
        assert!(!dict.contains("foo").unwrap());

        assert_eq!(dict.incrby("counter", 1).unwrap(), 1);
        assert_eq!(dict.incrby("counter", 2).unwrap(), 3);
        assert_eq!(dict.iterate().unwrap().collect::<Vec<_>>(), vec!["counter".to_string()]);
    }

    #[test]
    fn test_children_share_runtime_and_store() {
        let dir = TempDir::new().unwrap();
        let dict = BlockingDict::open(config(&dir, false)).unwrap();
        let child = dict.child("sub");

        child.set("k", 1, None).unwrap();
        assert_eq!(child.get("k", Value::Null).unwrap(), Value::Int(1));
        assert_eq!(child.cache_save_key(), "p:blocking:c:sub");
        assert!(Arc::ptr_eq(&dict.runtime, &child.runtime));
    }

    #[tokio::test]
    async fn test_blocking_read_inside_runtime_fails() {
        let dir = TempDir::new().unwrap();
        let dict = PersistentDict::new(config(&dir, true)).await.unwrap();
        let view = dict.blocking();

        assert!(matches!(view.get("k", Value::Null), Err(Error::Runtime { .. })));
    }

    #[tokio::test]
    async fn test_blocking_write_inside_runtime_fails_without_async() {
        let dir = TempDir::new().unwrap();
        let dict = PersistentDict::new(config(&dir, false)).await.unwrap();
        assert!(dict.blocking().set("k", 1, None).is_err());
    }

    #[tokio::test]
    async fn test_async_enabled_writes_are_spawned() {
        let dir = TempDir::new().unwrap();
        let dict = PersistentDict::new(config(&dir, true)).await.unwrap();
        dict.blocking().set("k", 1, None).unwrap();

        let mut value = None;
        for _ in 0..50 {
            tokio::task::yield_now().await;
            value = dict.fetch("k").await.unwrap();
            if value.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(value, Some(Value::Int(1)));
    }
}
