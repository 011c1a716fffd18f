//! Persistent dict for pdict
//!
//! This crate provides the storage side of pdict:
//! - [`StatefulBackend`] implementations for a local JSON document and Redis
//! - [`PersistentDict`], the dict-like façade over one backend
//! - [`BlockingDict`], the same surface for synchronous callers
//! - layered configuration through [`ConfigLoader`]

pub mod backend;
pub mod blocking;
pub mod config;
pub mod dict;

pub use backend::{
    BackendKind, KeyIter, LocalStatefulBackend, Namespace, RedisBackendOptions, RedisCommands,
    RedisConnection, RedisStatefulBackend, StatefulBackend,
};
pub use blocking::BlockingDict;
pub use config::{ConfigLoader, ConfigSource, PersistentDictConfig, PersistentDictConfigBuilder};
pub use dict::PersistentDict;
