//! gzip and zlib compressors backed by flate2

use super::Compressor;
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;
use pdict_core::{Error, Result};
use std::io::{Read, Write};

pub(super) const GZIP_DEFAULT_LEVEL: i32 = 9;
pub(super) const ZLIB_DEFAULT_LEVEL: i32 = -1;

pub(super) fn validate_gzip_level(level: i32) -> Result<()> {
    if (0..=9).contains(&level) {
        Ok(())
    } else {
        Err(Error::InvalidCompressionLevel {
            codec: "gzip",
            level,
            expected: "0-9",
        })
    }
}

pub(super) fn validate_zlib_level(level: i32) -> Result<()> {
    if level == -1 || (0..=9).contains(&level) {
        Ok(())
    } else {
        Err(Error::InvalidCompressionLevel {
            codec: "zlib",
            level,
            expected: "-1 or 0-9",
        })
    }
}

fn flate_level(level: i32) -> Compression {
    match u32::try_from(level) {
        Ok(level) => Compression::new(level),
        Err(_) => Compression::default(),
    }
}

fn compression_error(codec: &'static str, operation: &'static str) -> impl Fn(std::io::Error) -> Error {
    move |source| Error::Compression {
        codec,
        operation,
        source,
    }
}

#[derive(Debug, Clone)]
pub struct GzipCompressor {
    level: i32,
}

impl GzipCompressor {
    pub fn new(level: Option<i32>) -> Result<Self> {
        let level = level.unwrap_or(GZIP_DEFAULT_LEVEL);
        validate_gzip_level(level)?;
        Ok(Self { level })
    }
}

impl Compressor for GzipCompressor {
    fn name(&self) -> &'static str {
        "gzip"
    }

    fn level(&self) -> i32 {
        self.level
    }

    fn compress_with_level(&self, data: &[u8], level: Option<i32>) -> Result<Vec<u8>> {
        let level = level.unwrap_or(self.level);
        validate_gzip_level(level)?;
        let mut encoder = GzEncoder::new(Vec::new(), flate_level(level));
        encoder
            .write_all(data)
            .map_err(compression_error("gzip", "compress"))?;
        encoder.finish().map_err(compression_error("gzip", "compress"))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut decoder = GzDecoder::new(data);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(compression_error("gzip", "decompress"))?;
        Ok(out)
    }
}

#[derive(Debug, Clone)]
pub struct ZlibCompressor {
    level: i32,
}

impl ZlibCompressor {
    pub fn new(level: Option<i32>) -> Result<Self> {
        let level = level.unwrap_or(ZLIB_DEFAULT_LEVEL);
        validate_zlib_level(level)?;
        Ok(Self { level })
    }
}

impl Compressor for ZlibCompressor {
    fn name(&self) -> &'static str {
        "zlib"
    }

    fn level(&self) -> i32 {
        self.level
    }

    fn compress_with_level(&self, data: &[u8], level: Option<i32>) -> Result<Vec<u8>> {
        let level = level.unwrap_or(self.level);
        validate_zlib_level(level)?;
        let mut encoder = ZlibEncoder::new(Vec::new(), flate_level(level));
        encoder
            .write_all(data)
            .map_err(compression_error("zlib", "compress"))?;
        encoder.finish().map_err(compression_error("zlib", "compress"))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut decoder = ZlibDecoder::new(data);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(compression_error("zlib", "decompress"))?;
        Ok(out)
    }
}
