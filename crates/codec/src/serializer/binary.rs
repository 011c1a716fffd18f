use super::stage::CompressionStage;
use super::tagging::RecordResolver;
use super::{Payload, Serializer};
use crate::compression::Compressor;
use pdict_core::{Error, Result, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Backing codec of the opaque binary envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryFormat {
    Bincode,
    Rmp,
}

/// Self-describing envelope written by [`BinarySerializer`]
#[derive(Debug, Serialize, Deserialize)]
enum WireValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<WireValue>),
    Map(BTreeMap<String, WireValue>),
    /// Type name plus the record's JSON payload
    Record(String, String),
}

impl WireValue {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(match value {
            Value::Null => WireValue::Null,
            Value::Bool(b) => WireValue::Bool(*b),
            Value::Int(i) => WireValue::Int(*i),
            Value::Float(f) => WireValue::Float(*f),
            Value::Str(s) => WireValue::Str(s.clone()),
            Value::Bytes(b) => WireValue::Bytes(b.clone()),
            Value::List(items) => WireValue::List(
                items
                    .iter()
                    .map(WireValue::from_value)
                    .collect::<Result<_>>()?,
            ),
            Value::Map(map) => WireValue::Map(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), WireValue::from_value(v)?)))
                    .collect::<Result<_>>()?,
            ),
            Value::Record(record) => {
                WireValue::Record(record.type_name().to_string(), record.to_json()?.to_string())
            }
        })
    }

    fn into_value(self, resolver: &RecordResolver) -> Result<Value> {
        Ok(match self {
            WireValue::Null => Value::Null,
            WireValue::Bool(b) => Value::Bool(b),
            WireValue::Int(i) => Value::Int(i),
            WireValue::Float(f) => Value::Float(f),
            WireValue::Str(s) => Value::Str(s),
            WireValue::Bytes(b) => Value::Bytes(b),
            WireValue::List(items) => Value::List(
                items
                    .into_iter()
                    .map(|item| item.into_value(resolver))
                    .collect::<Result<_>>()?,
            ),
            WireValue::Map(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| Ok((k, v.into_value(resolver)?)))
                    .collect::<Result<_>>()?,
            ),
            WireValue::Record(type_name, payload) => {
                let payload = serde_json::from_str(&payload).map_err(|e| {
                    Error::decode_with_source("record", format!("payload of {type_name}"), e)
                })?;
                resolver.resolve(&type_name, payload)?
            }
        })
    }
}

/// Opaque binary serializer for the pickle family of names
#[derive(Debug, Clone)]
pub struct BinarySerializer {
    name: &'static str,
    format: BinaryFormat,
    stage: CompressionStage,
    resolver: RecordResolver,
    raise_errors: bool,
}

impl BinarySerializer {
    pub fn new(
        name: &'static str,
        format: BinaryFormat,
        stage: CompressionStage,
        resolver: RecordResolver,
        raise_errors: bool,
    ) -> Self {
        Self {
            name,
            format,
            stage,
            resolver,
            raise_errors,
        }
    }

    pub fn format(&self) -> BinaryFormat {
        self.format
    }
}

impl Serializer for BinarySerializer {
    fn name(&self) -> &str {
        self.name
    }

    fn is_binary(&self) -> bool {
        true
    }

    fn compressor(&self) -> Option<&Arc<dyn Compressor>> {
        self.stage.compressor()
    }

    fn raise_errors(&self) -> bool {
        self.raise_errors
    }

    fn encode_value(&self, value: &Value) -> Result<Payload> {
        let wire = WireValue::from_value(value)?;
        let raw = match self.format {
            BinaryFormat::Bincode => bincode::serialize(&wire)
                .map_err(|e| Error::encode_with_source(self.name, "bincode serialize", e))?,
            BinaryFormat::Rmp => rmp_serde::to_vec(&wire)
                .map_err(|e| Error::encode_with_source(self.name, "msgpack serialize", e))?,
        };
        Ok(Payload::Binary(self.stage.compress(raw)?))
    }

    fn decode_value(&self, payload: &Payload) -> Result<Value> {
        let raw = self.stage.decompress(payload.as_bytes())?;
        let wire: WireValue = match self.format {
            BinaryFormat::Bincode => bincode::deserialize(&raw)
                .map_err(|e| Error::decode_with_source(self.name, "bincode deserialize", e))?,
            BinaryFormat::Rmp => rmp_serde::from_slice(&raw)
                .map_err(|e| Error::decode_with_source(self.name, "msgpack deserialize", e))?,
        };
        wire.into_value(&self.resolver)
    }
}
