//! JSON-document backend on the local file system
//!
//! The whole namespace lives in one pretty-printed JSON object file next to a
//! generation token file. Every successful write replaces both; readers reload
//! the document whenever the token on disk differs from the one they last saw.

use super::{add_float, add_integer, decode_entry, Decoded, KeyIter, Namespace, StatefulBackend};
use async_trait::async_trait;
use parking_lot::Mutex;
use pdict_codec::{Payload, Serializer};
use pdict_core::{
    Error, Result, Value, CACHE_FILE_EXTENSION, LOCAL_KEY_SEPARATOR, LOCK_FILE_EXTENSION,
    TOKEN_FILE_EXTENSION,
};
use pdict_utils::{write_atomic_string, FileLockGuard};
use serde::Serialize;
use serde_json::{Map, Value as Json};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

type Document = Map<String, Json>;

#[derive(Debug, Default)]
struct Mirror {
    data: Document,
    token: Option<String>,
}

/// One document file shared by every namespace opened through it
#[derive(Debug)]
struct LocalStore {
    file_path: PathBuf,
    lock_path: PathBuf,
    token_path: PathBuf,
    mirror: Mutex<Mirror>,
}

fn new_token() -> String {
    Uuid::new_v4().simple().to_string()
}

fn render_document(data: &Document) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    data.serialize(&mut ser)?;
    String::from_utf8(buf).map_err(|e| Error::encode_with_source("local", "render document", e))
}

impl LocalStore {
    fn open(file_path: PathBuf) -> Result<Self> {
        let store = Self {
            lock_path: file_path.with_extension(LOCK_FILE_EXTENSION),
            token_path: file_path.with_extension(TOKEN_FILE_EXTENSION),
            file_path,
            mirror: Mutex::new(Mirror::default()),
        };

        {
            let mut mirror = store.mirror.lock();
            let _lock = FileLockGuard::acquire(&store.lock_path)?;
            if store.file_path.exists() {
                store.refresh_locked(&mut mirror)?;
            } else {
                debug!("Creating local cache document {}", store.file_path.display());
                write_atomic_string(&store.file_path, "{}")?;
                let token = new_token();
                write_atomic_string(&store.token_path, &token)?;
                mirror.token = Some(token);
            }
        }

        Ok(store)
    }

    fn read_token(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.token_path) {
            Ok(token) => Ok(Some(token.trim().to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::file_system(&self.token_path, "read token", e)),
        }
    }

    fn read_document(&self) -> Result<Document> {
        let content = match fs::read_to_string(&self.file_path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Document::new()),
            Err(e) => return Err(Error::file_system(&self.file_path, "read document", e)),
        };
        match serde_json::from_str::<Json>(&content)? {
            Json::Object(data) => Ok(data),
            other => Err(Error::backend(
                "local",
                "read document",
                format!(
                    "{} holds a JSON {} instead of an object",
                    self.file_path.display(),
                    json_kind(&other)
                ),
            )),
        }
    }

    /// Reload the mirror if the token on disk moved. Caller holds the file lock.
    fn refresh_locked(&self, mirror: &mut Mirror) -> Result<bool> {
        let token = match self.read_token()? {
            Some(token) if !token.is_empty() => token,
            _ => {
                debug!("Regenerating missing token for {}", self.file_path.display());
                let token = new_token();
                write_atomic_string(&self.token_path, &token)?;
                mirror.token = None;
                token
            }
        };

        if mirror.token.as_deref() == Some(token.as_str()) {
            return Ok(false);
        }

        debug!("Reloading {} after token change", self.file_path.display());
        mirror.data = self.read_document()?;
        mirror.token = Some(token);
        Ok(true)
    }

    fn sync(&self) -> Result<bool> {
        let mut mirror = self.mirror.lock();
        let _lock = FileLockGuard::acquire(&self.lock_path)?;
        self.refresh_locked(&mut mirror)
    }

    fn read<R>(&self, f: impl FnOnce(&Document) -> R) -> Result<R> {
        let mut mirror = self.mirror.lock();
        {
            let _lock = FileLockGuard::acquire(&self.lock_path)?;
            self.refresh_locked(&mut mirror)?;
        }
        Ok(f(&mirror.data))
    }

    fn write<R>(&self, f: impl FnOnce(&mut Document) -> R) -> Result<R> {
        let mut mirror = self.mirror.lock();
        let _lock = FileLockGuard::acquire(&self.lock_path)?;
        self.refresh_locked(&mut mirror)?;

        let mut data = mirror.data.clone();
        let result = f(&mut data);

        write_atomic_string(&self.file_path, &render_document(&data)?)?;
        let token = new_token();
        write_atomic_string(&self.token_path, &token)?;

        mirror.data = data;
        mirror.token = Some(token);
        Ok(result)
    }
}

fn json_kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

/// Local file backend
#[derive(Debug, Clone)]
pub struct LocalStatefulBackend {
    store: Arc<LocalStore>,
    namespace: Namespace,
    serializer: Arc<dyn Serializer>,
}

impl LocalStatefulBackend {
    /// Open (creating if needed) the document at `file_path`
    pub fn open(
        file_path: impl Into<PathBuf>,
        base_key: Option<String>,
        separator: Option<String>,
        serializer: Arc<dyn Serializer>,
    ) -> Result<Self> {
        let store = LocalStore::open(file_path.into())?;
        Ok(Self {
            store: Arc::new(store),
            namespace: Namespace::new(
                base_key,
                separator.unwrap_or_else(|| LOCAL_KEY_SEPARATOR.to_string()),
            ),
            serializer,
        })
    }

    /// Default document path for a dict `name` inside `data_dir`
    pub fn default_file_path(data_dir: &Path, name: &str) -> PathBuf {
        data_dir.join(format!("{name}.{CACHE_FILE_EXTENSION}"))
    }

    pub fn file_path(&self) -> &Path {
        &self.store.file_path
    }

    /// Reload the in-memory document if another writer changed it
    pub fn sync(&self) -> Result<bool> {
        self.store.sync()
    }

    fn to_stored(&self, key: &str, payload: Payload) -> Result<Json> {
        if self.serializer.produces_binary() {
            return Ok(Json::String(hex::encode(payload.as_bytes())));
        }
        match payload {
            Payload::Text(text) => Ok(Json::String(text)),
            Payload::Binary(bytes) => String::from_utf8(bytes)
                .map(Json::String)
                .map_err(|_| Error::invalid_value(key, "a UTF-8 text payload")),
        }
    }

    fn from_stored(&self, stored: &Json) -> Result<Payload> {
        let Json::String(text) = stored else {
            return Err(Error::decode(
                "local",
                format!("stored entry is a JSON {}, not a string", json_kind(stored)),
            ));
        };
        if self.serializer.produces_binary() {
            hex::decode(text)
                .map(Payload::Binary)
                .map_err(|e| Error::decode_with_source("local", "invalid hex payload", e))
        } else {
            Ok(Payload::Text(text.clone()))
        }
    }

    fn encode(&self, key: &str, value: &Value) -> Result<Json> {
        self.to_stored(key, self.serializer.encode_value(value)?)
    }

    fn decode(&self, stored: &Json) -> Result<Decoded> {
        match self.from_stored(stored) {
            Ok(payload) => decode_entry(self.serializer.as_ref(), &payload),
            Err(e) => Ok(Decoded::Corrupt(e)),
        }
    }

    fn remove_full_keys(&self, full_keys: Vec<String>) -> Result<()> {
        if full_keys.is_empty() {
            return Ok(());
        }
        self.store.write(|data| {
            for key in &full_keys {
                data.remove(key);
            }
        })
    }

    /// Owned entries as `(full key, stored json)` pairs
    fn owned_entries(&self) -> Result<Vec<(String, Json)>> {
        self.store.read(|data| {
            data.iter()
                .filter(|(k, _)| self.namespace.owns(k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
    }

    fn display_key(&self, full_key: &str, exclude_base_key: bool) -> String {
        if exclude_base_key {
            self.namespace.strip(full_key).to_string()
        } else {
            full_key.to_string()
        }
    }
}

#[async_trait]
impl StatefulBackend for LocalStatefulBackend {
    fn kind(&self) -> &'static str {
        "local"
    }

    fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    fn serializer(&self) -> &Arc<dyn Serializer> {
        &self.serializer
    }

    fn child(&self, base_key: &str) -> Arc<dyn StatefulBackend> {
        Arc::new(Self {
            store: Arc::clone(&self.store),
            namespace: self.namespace.with_base_key(base_key),
            serializer: Arc::clone(&self.serializer),
        })
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let full_key = self.namespace.key(key);
        let Some(stored) = self.store.read(|data| data.get(&full_key).cloned())? else {
            return Ok(None);
        };
        match self.decode(&stored)? {
            Decoded::Present(value) => Ok(Some(value)),
            Decoded::Absent => Ok(None),
            Decoded::Corrupt(e) => {
                warn!("Removing unreadable entry {}: {}", full_key, e);
                self.remove_full_keys(vec![full_key])?;
                Ok(None)
            }
        }
    }

    async fn get_values(&self, keys: &[String]) -> Result<Vec<Option<Value>>> {
        let full_keys: Vec<String> = keys.iter().map(|k| self.namespace.key(k)).collect();
        let stored: Vec<Option<Json>> = self
            .store
            .read(|data| full_keys.iter().map(|k| data.get(k).cloned()).collect())?;

        let mut corrupt = Vec::new();
        let mut results = Vec::with_capacity(stored.len());
        for (full_key, entry) in full_keys.into_iter().zip(stored) {
            let value = match entry {
                None => None,
                Some(entry) => match self.decode(&entry)? {
                    Decoded::Present(value) => Some(value),
                    Decoded::Absent => None,
                    Decoded::Corrupt(e) => {
                        warn!("Removing unreadable entry {}: {}", full_key, e);
                        corrupt.push(full_key);
                        None
                    }
                },
            };
            results.push(value);
        }
        self.remove_full_keys(corrupt)?;
        Ok(results)
    }

    async fn set(&self, key: &str, value: &Value, ttl: Option<Duration>) -> Result<()> {
        if ttl.is_some() {
            debug!("Local backend ignores TTL for {}", key);
        }
        let full_key = self.namespace.key(key);
        let stored = self.encode(key, value)?;
        self.store.write(|data| {
            data.insert(full_key, stored);
        })
    }

    async fn set_batch(
        &self,
        data: &BTreeMap<String, Value>,
        ttl: Option<Duration>,
    ) -> Result<()> {
        if ttl.is_some() {
            debug!("Local backend ignores TTL for batch of {}", data.len());
        }
        let encoded = data
            .iter()
            .map(|(k, v)| Ok((self.namespace.key(k), self.encode(k, v)?)))
            .collect::<Result<Vec<_>>>()?;
        self.store.write(|doc| doc.extend(encoded))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.remove_full_keys(vec![self.namespace.key(key)])
    }

    async fn clear(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return self
                .store
                .write(|data| data.retain(|k, _| !self.namespace.owns(k)));
        }
        self.remove_full_keys(keys.iter().map(|k| self.namespace.key(k)).collect())
    }

    async fn contains(&self, key: &str) -> Result<bool> {
        let full_key = self.namespace.key(key);
        self.store.read(|data| data.contains_key(&full_key))
    }

    async fn get_all_keys(&self, exclude_base_key: bool) -> Result<Vec<String>> {
        self.store.read(|data| {
            data.keys()
                .filter(|k| self.namespace.owns(k))
                .map(|k| self.display_key(k, exclude_base_key))
                .collect()
        })
    }

    async fn get_all_values(&self) -> Result<Vec<Value>> {
        Ok(self.get_all_data(true).await?.into_values().collect())
    }

    async fn get_all_data(&self, exclude_base_key: bool) -> Result<BTreeMap<String, Value>> {
        let mut corrupt = Vec::new();
        let mut result = BTreeMap::new();
        for (full_key, stored) in self.owned_entries()? {
            match self.decode(&stored)? {
                Decoded::Present(value) => {
                    result.insert(self.display_key(&full_key, exclude_base_key), value);
                }
                Decoded::Absent => {}
                Decoded::Corrupt(e) => {
                    warn!("Removing unreadable entry {}: {}", full_key, e);
                    corrupt.push(full_key);
                }
            }
        }
        self.remove_full_keys(corrupt)?;
        Ok(result)
    }

    async fn iterate(&self) -> Result<KeyIter> {
        Ok(self.get_all_keys(true).await?.into_iter())
    }

    async fn length(&self) -> Result<usize> {
        self.store
            .read(|data| data.keys().filter(|k| self.namespace.owns(k)).count())
    }

    async fn incrby(&self, key: &str, amount: i64) -> Result<i64> {
        let current = self.get(key).await?;
        let updated = add_integer(key, current.as_ref(), amount)?;
        self.set(key, &Value::Int(updated), None).await?;
        Ok(updated)
    }

    async fn incrbyfloat(&self, key: &str, amount: f64) -> Result<f64> {
        let current = self.get(key).await?;
        let updated = add_float(key, current.as_ref(), amount)?;
        self.set(key, &Value::Float(updated), None).await?;
        Ok(updated)
    }

    async fn expire(&self, key: &str, _ttl: Duration) -> Result<()> {
        warn!("Local backend does not support per-key expiration; ignoring expire for {}", key);
        Ok(())
    }

    async fn migrate_compression(&self) -> Result<Vec<String>> {
        let mut failed = Vec::new();
        let mut migrated = Vec::new();
        for (full_key, stored) in self.owned_entries()? {
            let value = match self.decode(&stored)? {
                Decoded::Present(value) => value,
                Decoded::Absent => Value::Null,
                Decoded::Corrupt(e) => {
                    warn!("Unable to migrate {}: {}", full_key, e);
                    failed.push(self.namespace.strip(&full_key).to_string());
                    continue;
                }
            };
            match self.encode(&full_key, &value) {
                Ok(encoded) => migrated.push((full_key, encoded)),
                Err(e) => {
                    warn!("Unable to re-encode {}: {}", full_key, e);
                    failed.push(self.namespace.strip(&full_key).to_string());
                }
            }
        }
        if !migrated.is_empty() {
            debug!("Migrated {} entries in {}", migrated.len(), self.file_path().display());
            self.store.write(|data| data.extend(migrated))?;
        }
        Ok(failed)
    }

    async fn get_all_raw(&self, exclude_base_key: bool) -> Result<BTreeMap<String, Payload>> {
        let mut raw = BTreeMap::new();
        for (full_key, stored) in self.owned_entries()? {
            match self.from_stored(&stored) {
                Ok(payload) => {
                    raw.insert(self.display_key(&full_key, exclude_base_key), payload);
                }
                Err(e) => warn!("Skipping unreadable raw entry {}: {}", full_key, e),
            }
        }
        Ok(raw)
    }

    async fn load_raw(
        &self,
        data: BTreeMap<String, Payload>,
        includes_base_key: bool,
    ) -> Result<()> {
        let entries = data
            .into_iter()
            .map(|(key, payload)| {
                let stored = self.to_stored(&key, payload)?;
                let full_key = if includes_base_key {
                    key
                } else {
                    self.namespace.key(&key)
                };
                Ok((full_key, stored))
            })
            .collect::<Result<Vec<(String, Json)>>>()?;
        self.store.write(|doc| doc.extend(entries))
    }
}
