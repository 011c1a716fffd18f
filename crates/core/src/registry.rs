//! Registry of record decoders keyed by type name

use crate::errors::{Error, Result};
use crate::value::{Record, TypedRecord, Value};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type RecordDecoder = Arc<dyn Fn(serde_json::Value) -> Result<Arc<dyn Record>> + Send + Sync>;

static GLOBAL: Lazy<Arc<TypeRegistry>> = Lazy::new(|| Arc::new(TypeRegistry::new()));

/// Maps type names found in record tags to decoder functions.
///
/// Serializers hold an `Arc<TypeRegistry>`; registering a type after a
/// serializer is built makes it decodable immediately.
#[derive(Default)]
pub struct TypeRegistry {
    decoders: RwLock<HashMap<String, RecordDecoder>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry shared by every serializer that is not given its own
    pub fn global() -> Arc<TypeRegistry> {
        Arc::clone(&GLOBAL)
    }

    /// Register a serde-backed record type under its `TYPE_NAME`
    pub fn register<T: TypedRecord>(&self) {
        self.register_with(T::TYPE_NAME, |payload| {
            let record: T = serde_json::from_value(payload)
                .map_err(|e| Error::decode_with_source("record", T::TYPE_NAME, e))?;
            Ok(Arc::new(record) as Arc<dyn Record>)
        });
    }

    /// Register an arbitrary decoder function for `type_name`
    pub fn register_with<F>(&self, type_name: impl Into<String>, decoder: F)
    where
        F: Fn(serde_json::Value) -> Result<Arc<dyn Record>> + Send + Sync + 'static,
    {
        let type_name = type_name.into();
        tracing::debug!("Registering record type {}", type_name);
        self.decoders.write().insert(type_name, Arc::new(decoder));
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.decoders.read().contains_key(type_name)
    }

    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.decoders.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Decode a tagged payload into a record value
    pub fn decode(&self, type_name: &str, payload: serde_json::Value) -> Result<Value> {
        let decoder = self
            .decoders
            .read()
            .get(type_name)
            .cloned()
            .ok_or_else(|| Error::UnknownRecordType {
                type_name: type_name.to_string(),
            })?;
        Ok(Value::Record(decoder(payload)?))
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}
