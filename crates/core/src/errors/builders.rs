//! Builder methods for creating errors with context

use super::types::{BoxError, Error};
use std::path::PathBuf;

impl Error {
    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Create an unsupported codec error
    #[must_use]
    pub fn unsupported(kind: &'static str, name: impl Into<String>) -> Self {
        Error::UnsupportedCodec {
            kind,
            name: name.into(),
        }
    }

    /// Create an encode error
    #[must_use]
    pub fn encode(codec: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Encode {
            codec: codec.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create an encode error with a source error
    #[must_use]
    pub fn encode_with_source(
        codec: impl Into<String>,
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Error::Encode {
            codec: codec.into(),
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a decode error
    #[must_use]
    pub fn decode(codec: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Decode {
            codec: codec.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a decode error with a source error
    #[must_use]
    pub fn decode_with_source(
        codec: impl Into<String>,
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Error::Decode {
            codec: codec.into(),
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a file system error
    #[must_use]
    pub fn file_system(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Error::FileSystem {
            path: path.into(),
            operation: operation.into(),
            source,
        }
    }

    /// Create a backend error
    #[must_use]
    pub fn backend(
        backend: &'static str,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Backend {
            backend,
            operation: operation.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a backend error with a source error
    #[must_use]
    pub fn backend_with_source(
        backend: &'static str,
        operation: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        let source = source.into();
        Error::Backend {
            backend,
            operation: operation.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create a structural "not implemented" error
    #[must_use]
    pub fn not_implemented(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::NotImplemented {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid value error
    #[must_use]
    pub fn invalid_value(key: impl Into<String>, expected: &'static str) -> Self {
        Error::InvalidValue {
            key: key.into(),
            expected,
        }
    }

    /// Create a runtime error
    #[must_use]
    pub fn runtime(message: impl Into<String>) -> Self {
        Error::Runtime {
            message: message.into(),
        }
    }
}
