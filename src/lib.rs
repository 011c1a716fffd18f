//! pdict: a persistent, dict-like key-value cache
//!
//! Values travel through a [`Serializer`] (JSON, binary or MessagePack, with
//! optional gzip/zlib/lzma/zstd compression) into a [`StatefulBackend`]: a
//! local JSON document shared safely between processes, or Redis.
//!
//! ```no_run
//! use pdict::{ConfigLoader, PersistentDict, Value};
//!
//! # async fn run() -> pdict::Result<()> {
//! let dict = PersistentDict::new(ConfigLoader::load()?).await?;
//! dict.set("greeting", "hello", None).await?;
//! assert_eq!(dict.get("greeting", Value::Null).await?, Value::from("hello"));
//! # Ok(())
//! # }
//! ```

pub use pdict_cache::{
    backend, BackendKind, BlockingDict, ConfigLoader, ConfigSource, KeyIter,
    LocalStatefulBackend, Namespace, PersistentDict, PersistentDictConfig,
    PersistentDictConfigBuilder, RedisBackendOptions, RedisCommands, RedisConnection,
    RedisStatefulBackend, StatefulBackend,
};
pub use pdict_codec::{
    build_compressor, build_serializer, CompressionKind, Compressor, Payload, Serializer,
    SerializerKind, SerializerOptions,
};
pub use pdict_core::{
    Error, Record, RecoveryHint, Result, ResultExt, TypeRegistry, TypedRecord, Value,
};

/// Install the default `tracing` subscriber (`PDICT_LOG`, then `RUST_LOG`)
pub fn init_tracing() -> Result<()> {
    pdict_utils::tracing::init()
        .map_err(|e| Error::runtime(format!("failed to initialize tracing: {e}")))
}
