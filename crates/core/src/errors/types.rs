//! Core error type definitions

use std::path::PathBuf;

/// Result type alias for pdict operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error used as the source of wrapped third-party failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Core error type for pdict operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid or inconsistent configuration
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// A serializer, compression or backend name that is not in the codec table
    #[error("unsupported {kind} '{name}'")]
    UnsupportedCodec { kind: &'static str, name: String },

    /// Compression level outside the codec's accepted domain
    #[error("invalid {codec} compression level {level}: expected {expected}")]
    InvalidCompressionLevel {
        codec: &'static str,
        level: i32,
        expected: &'static str,
    },

    /// A value could not be turned into a payload
    #[error("failed to encode value with {codec}: {message}")]
    Encode {
        codec: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// A payload could not be turned back into a value
    #[error("failed to decode value with {codec}: {message}")]
    Decode {
        codec: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Compressor failure
    #[error("{codec} {operation} failed: {source}")]
    Compression {
        codec: &'static str,
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// Tagged record whose type name has no registered decoder
    #[error("no decoder registered for record type '{type_name}'")]
    UnknownRecordType { type_name: String },

    /// File system operations
    #[error("file system {operation} operation failed for '{path}': {source}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON document errors outside of value decoding
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// Storage backend failure (connection, protocol, server reply)
    #[error("{backend} backend {operation} failed: {message}")]
    Backend {
        backend: &'static str,
        operation: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Operation that is structurally impossible in the current backend mode
    #[error("operation '{operation}' is not supported: {reason}")]
    NotImplemented { operation: String, reason: String },

    /// Stored value has the wrong shape for the requested operation
    #[error("value at key '{key}' is not {expected}")]
    InvalidValue { key: String, expected: &'static str },

    /// Async runtime misuse or construction failure
    #[error("runtime error: {message}")]
    Runtime { message: String },
}
