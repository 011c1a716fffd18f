use super::SerializerOptions;
use crate::compression::{build_compressor, CompressionKind, Compressor, ZlibCompressor};
use pdict_core::Result;
use std::borrow::Cow;
use std::sync::Arc;

/// Optional compression applied after format encoding.
///
/// Decompression falls back to the previous codec and then to zlib before
/// giving up, which lets a namespace be migrated between codecs.
#[derive(Debug, Clone, Default)]
pub struct CompressionStage {
    current: Option<Arc<dyn Compressor>>,
    previous: Option<Arc<dyn Compressor>>,
    legacy_fallback: bool,
}

impl CompressionStage {
    pub fn new(
        current: Option<Arc<dyn Compressor>>,
        previous: Option<Arc<dyn Compressor>>,
        legacy_fallback: bool,
    ) -> Self {
        Self {
            current,
            previous,
            legacy_fallback,
        }
    }

    pub(crate) fn from_options(options: &SerializerOptions) -> Result<Self> {
        let current = build_compressor(options.compression, options.compression_level)?;
        let previous = match options.previous_compression {
            Some(kind) if kind != options.compression && kind != CompressionKind::None => {
                build_compressor(kind, None)?
            }
            _ => None,
        };
        Ok(Self::new(current, previous, options.legacy_fallback))
    }

    pub fn compressor(&self) -> Option<&Arc<dyn Compressor>> {
        self.current.as_ref()
    }

    pub fn is_enabled(&self) -> bool {
        self.current.is_some()
    }

    pub fn compress(&self, raw: Vec<u8>) -> Result<Vec<u8>> {
        match &self.current {
            Some(compressor) => compressor.compress(&raw),
            None => Ok(raw),
        }
    }

    pub fn decompress<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        let Some(compressor) = &self.current else {
            return Ok(Cow::Borrowed(data));
        };
        let error = match compressor.decompress(data) {
            Ok(out) => return Ok(Cow::Owned(out)),
            Err(e) => e,
        };

        let mut attempts = compressor.name().to_string();
        if let Some(previous) = &self.previous {
            match previous.decompress(data) {
                Ok(out) => return Ok(Cow::Owned(out)),
                Err(_) => attempts.push_str(&format!(" -> {}", previous.name())),
            }
        }
        if self.legacy_fallback && compressor.name() != "zlib" {
            if let Ok(out) = ZlibCompressor::new(None).and_then(|z| z.decompress(data)) {
                return Ok(Cow::Owned(out));
            }
            attempts.push_str(" -> zlib");
        }
        tracing::trace!("[{}] Decompression failed: {}", attempts, error);
        Err(error)
    }
}
