use super::stage::CompressionStage;
use super::tagging::{from_tagged_json, to_tagged_json, RecordResolver};
use super::{Payload, Serializer, SerializerKind};
use crate::compression::Compressor;
use pdict_core::{Error, Result, Value};
use std::sync::Arc;

/// JSON implementation variant. Every variant is served by serde_json; the
/// name is kept so configuration round-trips and shows up in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonFlavor {
    Json,
    Orjson,
    Ujson,
    Simdjson,
}

impl JsonFlavor {
    pub fn for_kind(kind: SerializerKind) -> Self {
        match kind {
            SerializerKind::Orjson => JsonFlavor::Orjson,
            SerializerKind::Ujson => JsonFlavor::Ujson,
            SerializerKind::Simdjson => JsonFlavor::Simdjson,
            _ => JsonFlavor::Json,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JsonFlavor::Json => "json",
            JsonFlavor::Orjson => "orjson",
            JsonFlavor::Ujson => "ujson",
            JsonFlavor::Simdjson => "simdjson",
        }
    }
}

/// Human-inspectable serializer; uncompressed output is [`Payload::Text`]
#[derive(Debug, Clone)]
pub struct JsonSerializer {
    flavor: JsonFlavor,
    stage: CompressionStage,
    resolver: RecordResolver,
    raise_errors: bool,
}

impl JsonSerializer {
    pub fn new(
        flavor: JsonFlavor,
        stage: CompressionStage,
        resolver: RecordResolver,
        raise_errors: bool,
    ) -> Self {
        Self {
            flavor,
            stage,
            resolver,
            raise_errors,
        }
    }

    pub fn flavor(&self) -> JsonFlavor {
        self.flavor
    }
}

impl Serializer for JsonSerializer {
    fn name(&self) -> &str {
        self.flavor.as_str()
    }

    fn is_binary(&self) -> bool {
        false
    }

    fn compressor(&self) -> Option<&Arc<dyn Compressor>> {
        self.stage.compressor()
    }

    fn raise_errors(&self) -> bool {
        self.raise_errors
    }

    fn encode_value(&self, value: &Value) -> Result<Payload> {
        let tagged = to_tagged_json(value)?;
        let text = serde_json::to_string(&tagged)
            .map_err(|e| Error::encode_with_source(self.name(), "serialize JSON", e))?;
        if self.stage.is_enabled() {
            Ok(Payload::Binary(self.stage.compress(text.into_bytes())?))
        } else {
            Ok(Payload::Text(text))
        }
    }

    fn decode_value(&self, payload: &Payload) -> Result<Value> {
        let raw = self.stage.decompress(payload.as_bytes())?;
        let text = std::str::from_utf8(&raw)
            .map_err(|e| Error::decode_with_source(self.name(), "payload is not UTF-8", e))?;
        let json: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| Error::decode_with_source(self.name(), "parse JSON", e))?;
        from_tagged_json(json, &self.resolver)
    }
}
