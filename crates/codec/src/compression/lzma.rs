//! LZMA (xz container) compressor backed by xz2

use super::Compressor;
use pdict_core::{Error, Result};
use std::io::{Read, Write};
use xz2::read::XzDecoder;
use xz2::write::XzEncoder;

pub(super) const DEFAULT_LEVEL: i32 = 6;

pub(super) fn validate_level(level: i32) -> Result<()> {
    if (0..=9).contains(&level) {
        Ok(())
    } else {
        Err(Error::InvalidCompressionLevel {
            codec: "lzma",
            level,
            expected: "0-9",
        })
    }
}

#[derive(Debug, Clone)]
pub struct LzmaCompressor {
    level: i32,
}

impl LzmaCompressor {
    pub fn new(level: Option<i32>) -> Result<Self> {
        let level = level.unwrap_or(DEFAULT_LEVEL);
        validate_level(level)?;
        Ok(Self { level })
    }
}

impl Compressor for LzmaCompressor {
    fn name(&self) -> &'static str {
        "lzma"
    }

    fn level(&self) -> i32 {
        self.level
    }

    fn compress_with_level(&self, data: &[u8], level: Option<i32>) -> Result<Vec<u8>> {
        let level = level.unwrap_or(self.level);
        validate_level(level)?;
        // validated above, so the preset is 0..=9
        let preset = level.unsigned_abs();
        let mut encoder = XzEncoder::new(Vec::new(), preset);
        encoder.write_all(data).map_err(|source| Error::Compression {
            codec: "lzma",
            operation: "compress",
            source,
        })?;
        encoder.finish().map_err(|source| Error::Compression {
            codec: "lzma",
            operation: "compress",
            source,
        })
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut decoder = XzDecoder::new(data);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|source| Error::Compression {
                codec: "lzma",
                operation: "decompress",
                source,
            })?;
        Ok(out)
    }
}
