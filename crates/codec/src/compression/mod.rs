//! Byte-level compressors
//!
//! Levels are validated when a compressor is built; an out-of-range level is a
//! configuration error rather than a silent clamp.

mod deflate;
mod lzma;
mod zstandard;

pub use self::deflate::{GzipCompressor, ZlibCompressor};
pub use self::lzma::LzmaCompressor;
pub use self::zstandard::ZstdCompressor;

use pdict_core::{Error, Result};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Compress and decompress opaque byte strings
pub trait Compressor: Send + Sync + fmt::Debug {
    /// Codec name as accepted by configuration
    fn name(&self) -> &'static str;

    /// Level used by [`Compressor::compress`]
    fn level(&self) -> i32;

    /// Compress with an explicit level, or the configured one when `None`
    fn compress_with_level(&self, data: &[u8], level: Option<i32>) -> Result<Vec<u8>>;

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.compress_with_level(data, None)
    }
}

/// Supported compression codecs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionKind {
    None,
    Gzip,
    Zlib,
    Lzma,
    Zstd,
}

impl CompressionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionKind::None => "none",
            CompressionKind::Gzip => "gzip",
            CompressionKind::Zlib => "zlib",
            CompressionKind::Lzma => "lzma",
            CompressionKind::Zstd => "zstd",
        }
    }

    /// Default level for this codec
    pub fn default_level(&self) -> Option<i32> {
        match self {
            CompressionKind::None => None,
            CompressionKind::Gzip => Some(deflate::GZIP_DEFAULT_LEVEL),
            CompressionKind::Zlib => Some(deflate::ZLIB_DEFAULT_LEVEL),
            CompressionKind::Lzma => Some(lzma::DEFAULT_LEVEL),
            CompressionKind::Zstd => Some(zstandard::DEFAULT_LEVEL),
        }
    }

    /// Check a level against this codec's domain
    pub fn validate_level(&self, level: i32) -> Result<()> {
        match self {
            CompressionKind::None => Ok(()),
            CompressionKind::Gzip => deflate::validate_gzip_level(level),
            CompressionKind::Zlib => deflate::validate_zlib_level(level),
            CompressionKind::Lzma => lzma::validate_level(level),
            CompressionKind::Zstd => zstandard::validate_level(level),
        }
    }
}

impl FromStr for CompressionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(CompressionKind::None),
            "gzip" | "gz" => Ok(CompressionKind::Gzip),
            "zlib" => Ok(CompressionKind::Zlib),
            "lzma" | "xz" => Ok(CompressionKind::Lzma),
            "zstd" | "zstandard" => Ok(CompressionKind::Zstd),
            _ => Err(Error::unsupported("compression", s)),
        }
    }
}

impl fmt::Display for CompressionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build a compressor; `None` for [`CompressionKind::None`]
pub fn build_compressor(
    kind: CompressionKind,
    level: Option<i32>,
) -> Result<Option<Arc<dyn Compressor>>> {
    let compressor: Arc<dyn Compressor> = match kind {
        CompressionKind::None => return Ok(None),
        CompressionKind::Gzip => Arc::new(GzipCompressor::new(level)?),
        CompressionKind::Zlib => Arc::new(ZlibCompressor::new(level)?),
        CompressionKind::Lzma => Arc::new(LzmaCompressor::new(level)?),
        CompressionKind::Zstd => Arc::new(ZstdCompressor::new(level)?),
    };
    tracing::debug!(
        "Built {} compressor at level {}",
        compressor.name(),
        compressor.level()
    );
    Ok(Some(compressor))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KINDS: [CompressionKind; 4] = [
        CompressionKind::Gzip,
        CompressionKind::Zlib,
        CompressionKind::Lzma,
        CompressionKind::Zstd,
    ];

    #[test]
    fn test_parse_names() {
        assert_eq!("gzip".parse::<CompressionKind>().unwrap(), CompressionKind::Gzip);
        assert_eq!("ZSTD".parse::<CompressionKind>().unwrap(), CompressionKind::Zstd);
        assert_eq!("none".parse::<CompressionKind>().unwrap(), CompressionKind::None);
        assert!("brotli".parse::<CompressionKind>().is_err());
    }

    #[test]
    fn test_none_builds_nothing() {
        assert!(build_compressor(CompressionKind::None, None).unwrap().is_none());
    }

    #[test]
    fn test_defaults() {
        assert_eq!(CompressionKind::Gzip.default_level(), Some(9));
        assert_eq!(CompressionKind::Lzma.default_level(), Some(6));
        assert_eq!(CompressionKind::Zlib.default_level(), Some(-1));
        assert_eq!(CompressionKind::Zstd.default_level(), Some(3));
        for kind in KINDS {
            let compressor = build_compressor(kind, None).unwrap().unwrap();
            assert_eq!(Some(compressor.level()), kind.default_level());
            assert_eq!(compressor.name(), kind.as_str());
        }
    }

    #[test]
    fn test_level_bounds() {
        assert!(build_compressor(CompressionKind::Gzip, Some(10)).is_err());
        assert!(build_compressor(CompressionKind::Gzip, Some(-1)).is_err());
        assert!(build_compressor(CompressionKind::Zlib, Some(-1)).is_ok());
        assert!(build_compressor(CompressionKind::Zlib, Some(-2)).is_err());
        assert!(build_compressor(CompressionKind::Lzma, Some(10)).is_err());
        assert!(build_compressor(CompressionKind::Zstd, Some(22)).is_ok());
        assert!(build_compressor(CompressionKind::Zstd, Some(23)).is_err());
        assert!(build_compressor(CompressionKind::Zstd, Some(-5)).is_ok());

        let err = build_compressor(CompressionKind::Gzip, Some(42)).unwrap_err();
        assert!(matches!(err, Error::InvalidCompressionLevel { level: 42, .. }));
    }

    #[test]
    fn test_round_trip_every_codec() {
        let data = b"persistent dict payload ".repeat(64);
        for kind in KINDS {
            let compressor = build_compressor(kind, None).unwrap().unwrap();
            let compressed = compressor.compress(&data).unwrap();
            assert!(compressed.len() < data.len(), "{kind} did not shrink input");
            assert_eq!(compressor.decompress(&compressed).unwrap(), data);
        }
    }

    #[test]
    fn test_explicit_level_overrides_configured() {
        let data = b"abcabcabcabc".repeat(32);
        for kind in KINDS {
            let compressor = build_compressor(kind, None).unwrap().unwrap();
            let compressed = compressor.compress_with_level(&data, Some(1)).unwrap();
            assert_eq!(compressor.decompress(&compressed).unwrap(), data);
            assert!(compressor.compress_with_level(&data, Some(99)).is_err());
        }
    }

    #[test]
    fn test_garbage_fails_to_decompress() {
        for kind in KINDS {
            let compressor = build_compressor(kind, None).unwrap().unwrap();
            let err = compressor.decompress(b"definitely not compressed").unwrap_err();
            assert!(err.is_decode_error(), "{kind}: {err}");
        }
    }
}
