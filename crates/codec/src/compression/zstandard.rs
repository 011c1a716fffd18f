//! Zstandard compressor

use super::Compressor;
use pdict_core::{Error, Result};
use zstd::stream::{decode_all as zstd_decode, encode_all as zstd_encode};

pub(super) const DEFAULT_LEVEL: i32 = 3;

pub(super) fn validate_level(level: i32) -> Result<()> {
    let range = zstd::compression_level_range();
    // 0 selects the library default
    if level == 0 || range.contains(&level) {
        Ok(())
    } else {
        Err(Error::InvalidCompressionLevel {
            codec: "zstd",
            level,
            expected: "0-22 or a negative fast level",
        })
    }
}

#[derive(Debug, Clone)]
pub struct ZstdCompressor {
    level: i32,
}

impl ZstdCompressor {
    pub fn new(level: Option<i32>) -> Result<Self> {
        let level = level.unwrap_or(DEFAULT_LEVEL);
        validate_level(level)?;
        Ok(Self { level })
    }
}

impl Compressor for ZstdCompressor {
    fn name(&self) -> &'static str {
        "zstd"
    }

    fn level(&self) -> i32 {
        self.level
    }

    fn compress_with_level(&self, data: &[u8], level: Option<i32>) -> Result<Vec<u8>> {
        let level = level.unwrap_or(self.level);
        validate_level(level)?;
        zstd_encode(data, level).map_err(|source| Error::Compression {
            codec: "zstd",
            operation: "compress",
            source,
        })
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        zstd_decode(data).map_err(|source| Error::Compression {
            codec: "zstd",
            operation: "decompress",
            source,
        })
    }
}
