//! Value codecs for pdict
//!
//! A [`Serializer`] turns a [`pdict_core::Value`] into a [`Payload`] and back.
//! Each serializer owns at most one [`Compressor`]; compressed output is
//! always binary.

pub mod compression;
pub mod serializer;

pub use compression::{build_compressor, CompressionKind, Compressor};
pub use serializer::{
    build_serializer, Payload, Serializer, SerializerKind, SerializerOptions,
};
