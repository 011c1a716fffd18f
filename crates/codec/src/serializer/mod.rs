//! Value serializers
//!
//! Three families share one pipeline: type tagging, format encoding, then the
//! optional compression stage. Compressed output is always
//! [`Payload::Binary`].

mod binary;
mod json;
mod msgpack;
mod stage;
mod tagging;

pub use self::binary::{BinaryFormat, BinarySerializer};
pub use self::json::{JsonFlavor, JsonSerializer};
pub use self::msgpack::MsgPackSerializer;
pub use self::stage::CompressionStage;
pub use self::tagging::RecordResolver;

use crate::compression::{CompressionKind, Compressor};
use pdict_core::{Error, Result, TypeRegistry, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Encoded form of a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

impl Payload {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Text(text) => text.as_bytes(),
            Payload::Binary(bytes) => bytes,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Payload::Text(text) => text.into_bytes(),
            Payload::Binary(bytes) => bytes,
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Payload::Binary(_))
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Binary(bytes)
    }
}

/// Value ⇄ payload codec
pub trait Serializer: Send + Sync + fmt::Debug {
    /// Configured serializer name (the alias that selected it)
    fn name(&self) -> &str;

    /// Whether the uncompressed format is binary
    fn is_binary(&self) -> bool;

    fn compressor(&self) -> Option<&Arc<dyn Compressor>>;

    fn raise_errors(&self) -> bool;

    /// Strict encode: tag, serialize and compress
    fn encode_value(&self, value: &Value) -> Result<Payload>;

    /// Strict decode: decompress (with legacy fallback), parse and untag
    fn decode_value(&self, payload: &Payload) -> Result<Value>;

    fn compression_level(&self) -> Option<i32> {
        self.compressor().map(|c| c.level())
    }

    /// Whether payloads must be hex-encoded before storing them as text
    fn produces_binary(&self) -> bool {
        self.is_binary() || self.compressor().is_some()
    }

    /// Soft encode: `Ok(None)` on failure unless `raise_errors` is set
    fn dumps(&self, value: &Value) -> Result<Option<Payload>> {
        match self.encode_value(value) {
            Ok(payload) => Ok(Some(payload)),
            Err(e) if self.raise_errors() => Err(e),
            Err(e) => {
                tracing::debug!("[{}] Error encoding {} value: {}", self.name(), value.kind(), e);
                Ok(None)
            }
        }
    }

    /// Soft decode: `Ok(None)` on failure unless `raise_errors` is set
    fn loads(&self, payload: &Payload) -> Result<Option<Value>> {
        match self.decode_value(payload) {
            Ok(value) => Ok(Some(value)),
            Err(e) if self.raise_errors() => Err(e),
            Err(e) => {
                tracing::debug!(
                    "[{}] Error decoding {} byte payload: {}",
                    self.name(),
                    payload.len(),
                    e
                );
                Ok(None)
            }
        }
    }
}

/// Serializer names accepted by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SerializerKind {
    Json,
    Orjson,
    Ujson,
    Simdjson,
    Pickle,
    Dill,
    Cloudpickle,
    Bincode,
    Rmp,
    MsgPack,
}

impl SerializerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SerializerKind::Json => "json",
            SerializerKind::Orjson => "orjson",
            SerializerKind::Ujson => "ujson",
            SerializerKind::Simdjson => "simdjson",
            SerializerKind::Pickle => "pickle",
            SerializerKind::Dill => "dill",
            SerializerKind::Cloudpickle => "cloudpickle",
            SerializerKind::Bincode => "bincode",
            SerializerKind::Rmp => "rmp",
            SerializerKind::MsgPack => "msgpack",
        }
    }
}

impl FromStr for SerializerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(SerializerKind::Json),
            "orjson" => Ok(SerializerKind::Orjson),
            "ujson" => Ok(SerializerKind::Ujson),
            "simdjson" => Ok(SerializerKind::Simdjson),
            "pickle" => Ok(SerializerKind::Pickle),
            "dill" => Ok(SerializerKind::Dill),
            "cloudpickle" => Ok(SerializerKind::Cloudpickle),
            "bincode" => Ok(SerializerKind::Bincode),
            "rmp" => Ok(SerializerKind::Rmp),
            "msgpack" => Ok(SerializerKind::MsgPack),
            _ => Err(Error::unsupported("serializer", s)),
        }
    }
}

impl fmt::Display for SerializerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to build a serializer
#[derive(Debug, Clone)]
pub struct SerializerOptions {
    pub kind: SerializerKind,
    pub compression: CompressionKind,
    pub compression_level: Option<i32>,
    /// Codec used before the current one; tried when decompression fails
    pub previous_compression: Option<CompressionKind>,
    /// Try zlib as a last resort when decompression fails
    pub legacy_fallback: bool,
    pub raise_errors: bool,
    /// Return the bare payload for record tags with no registered decoder
    pub allow_unregistered: bool,
    pub registry: Arc<TypeRegistry>,
}

impl Default for SerializerOptions {
    fn default() -> Self {
        Self {
            kind: SerializerKind::Json,
            compression: CompressionKind::None,
            compression_level: None,
            previous_compression: None,
            legacy_fallback: true,
            raise_errors: false,
            allow_unregistered: false,
            registry: TypeRegistry::global(),
        }
    }
}

impl SerializerOptions {
    pub fn new(kind: SerializerKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn with_compression(mut self, compression: CompressionKind, level: Option<i32>) -> Self {
        self.compression = compression;
        self.compression_level = level;
        self
    }

    pub fn with_previous_compression(mut self, previous: CompressionKind) -> Self {
        self.previous_compression = Some(previous);
        self
    }

    pub fn with_registry(mut self, registry: Arc<TypeRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn raise_errors(mut self, raise_errors: bool) -> Self {
        self.raise_errors = raise_errors;
        self
    }

    pub fn allow_unregistered(mut self, allow: bool) -> Self {
        self.allow_unregistered = allow;
        self
    }
}

/// Build the serializer selected by `options.kind`
pub fn build_serializer(options: &SerializerOptions) -> Result<Arc<dyn Serializer>> {
    let stage = CompressionStage::from_options(options)?;
    let resolver = RecordResolver::new(Arc::clone(&options.registry), options.allow_unregistered);
    let serializer: Arc<dyn Serializer> = match options.kind {
        kind @ (SerializerKind::Json
        | SerializerKind::Orjson
        | SerializerKind::Ujson
        | SerializerKind::Simdjson) => Arc::new(JsonSerializer::new(
            JsonFlavor::for_kind(kind),
            stage,
            resolver,
            options.raise_errors,
        )),
        SerializerKind::Pickle
        | SerializerKind::Dill
        | SerializerKind::Cloudpickle
        | SerializerKind::Bincode => Arc::new(BinarySerializer::new(
            options.kind.as_str(),
            BinaryFormat::Bincode,
            stage,
            resolver,
            options.raise_errors,
        )),
        SerializerKind::Rmp => Arc::new(BinarySerializer::new(
            options.kind.as_str(),
            BinaryFormat::Rmp,
            stage,
            resolver,
            options.raise_errors,
        )),
        SerializerKind::MsgPack => Arc::new(MsgPackSerializer::new(
            stage,
            resolver,
            options.raise_errors,
        )),
    };
    tracing::debug!(
        "Built {} serializer (compression: {})",
        serializer.name(),
        options.compression
    );
    Ok(serializer)
}
