use super::stage::CompressionStage;
use super::tagging::RecordResolver;
use super::{Payload, Serializer};
use crate::compression::Compressor;
use pdict_core::{Error, Result, Value, CLASS_TAG, VALUE_FIELD};
use rmpv::Value as Msg;
use std::sync::Arc;

/// Class name used to escape user maps that own a `__class__` key
const ESCAPED_MAP_CLASS: &str = "__map__";

/// Compact binary serializer writing native MessagePack types
#[derive(Debug, Clone)]
pub struct MsgPackSerializer {
    stage: CompressionStage,
    resolver: RecordResolver,
    raise_errors: bool,
}

impl MsgPackSerializer {
    pub fn new(stage: CompressionStage, resolver: RecordResolver, raise_errors: bool) -> Self {
        Self {
            stage,
            resolver,
            raise_errors,
        }
    }
}

fn envelope(class: &str, value: Msg) -> Msg {
    Msg::Map(vec![
        (Msg::from(CLASS_TAG), Msg::from(class)),
        (Msg::from(VALUE_FIELD), value),
    ])
}

fn to_msg(value: &Value) -> Result<Msg> {
    Ok(match value {
        Value::Null => Msg::Nil,
        Value::Bool(b) => Msg::Boolean(*b),
        Value::Int(i) => Msg::from(*i),
        Value::Float(f) => Msg::F64(*f),
        Value::Str(s) => Msg::from(s.as_str()),
        Value::Bytes(b) => Msg::Binary(b.clone()),
        Value::List(items) => Msg::Array(items.iter().map(to_msg).collect::<Result<_>>()?),
        Value::Map(map) => {
            let entries = map
                .iter()
                .map(|(k, v)| Ok((Msg::from(k.as_str()), to_msg(v)?)))
                .collect::<Result<Vec<_>>>()?;
            if map.contains_key(CLASS_TAG) {
                envelope(ESCAPED_MAP_CLASS, Msg::Map(entries))
            } else {
                Msg::Map(entries)
            }
        }
        Value::Record(record) => envelope(record.type_name(), json_to_msg(record.to_json()?)),
    })
}

fn json_to_msg(json: serde_json::Value) -> Msg {
    match json {
        serde_json::Value::Null => Msg::Nil,
        serde_json::Value::Bool(b) => Msg::Boolean(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Msg::from(i)
            } else if let Some(u) = n.as_u64() {
                Msg::from(u)
            } else {
                Msg::F64(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(s) => Msg::from(s),
        serde_json::Value::Array(items) => Msg::Array(items.into_iter().map(json_to_msg).collect()),
        serde_json::Value::Object(map) => Msg::Map(
            map.into_iter()
                .map(|(k, v)| (Msg::from(k), json_to_msg(v)))
                .collect(),
        ),
    }
}

fn msg_to_json(msg: Msg) -> Result<serde_json::Value> {
    Ok(match msg {
        Msg::Nil => serde_json::Value::Null,
        Msg::Boolean(b) => serde_json::Value::Bool(b),
        Msg::Integer(i) => match (i.as_i64(), i.as_u64()) {
            (Some(i), _) => serde_json::Value::from(i),
            (None, Some(u)) => serde_json::Value::from(u),
            _ => return Err(Error::decode("msgpack", "integer out of range")),
        },
        Msg::F32(f) => pdict_core::value::float_to_json(f64::from(f))?,
        Msg::F64(f) => pdict_core::value::float_to_json(f)?,
        Msg::String(s) => serde_json::Value::String(
            s.into_str()
                .ok_or_else(|| Error::decode("msgpack", "string is not UTF-8"))?,
        ),
        Msg::Binary(b) => serde_json::Value::String(hex::encode(b)),
        Msg::Array(items) => serde_json::Value::Array(
            items.into_iter().map(msg_to_json).collect::<Result<_>>()?,
        ),
        Msg::Map(entries) => serde_json::Value::Object(
            entries
                .into_iter()
                .map(|(k, v)| Ok((map_key(k)?, msg_to_json(v)?)))
                .collect::<Result<_>>()?,
        ),
        Msg::Ext(..) => return Err(Error::decode("msgpack", "extension types are not supported")),
    })
}

fn map_key(key: Msg) -> Result<String> {
    match key {
        Msg::String(s) => s
            .into_str()
            .ok_or_else(|| Error::decode("msgpack", "map key is not UTF-8")),
        other => Err(Error::decode(
            "msgpack",
            format!("map key must be a string, found {other}"),
        )),
    }
}

/// Split a `{__class__, value}` envelope into its parts
fn as_envelope(entries: &[(Msg, Msg)]) -> Option<(String, usize)> {
    if entries.len() != 2 {
        return None;
    }
    let class = entries
        .iter()
        .find(|(k, _)| k.as_str() == Some(CLASS_TAG))
        .and_then(|(_, v)| v.as_str())?;
    let value_index = entries
        .iter()
        .position(|(k, _)| k.as_str() == Some(VALUE_FIELD))?;
    Some((class.to_string(), value_index))
}

fn from_msg(msg: Msg, resolver: &RecordResolver) -> Result<Value> {
    Ok(match msg {
        Msg::Nil => Value::Null,
        Msg::Boolean(b) => Value::Bool(b),
        Msg::Integer(i) => match (i.as_i64(), i.as_u64()) {
            (Some(i), _) => Value::Int(i),
            (None, Some(u)) => Value::Float(u as f64),
            _ => return Err(Error::decode("msgpack", "integer out of range")),
        },
        Msg::F32(f) => Value::Float(f64::from(f)),
        Msg::F64(f) => Value::Float(f),
        Msg::String(s) => Value::Str(
            s.into_str()
                .ok_or_else(|| Error::decode("msgpack", "string is not UTF-8"))?,
        ),
        Msg::Binary(b) => Value::Bytes(b),
        Msg::Array(items) => Value::List(
            items
                .into_iter()
                .map(|item| from_msg(item, resolver))
                .collect::<Result<_>>()?,
        ),
        Msg::Map(mut entries) => match as_envelope(&entries) {
            Some((class, value_index)) => {
                let (_, inner) = entries.swap_remove(value_index);
                if class == ESCAPED_MAP_CLASS {
                    match inner {
                        Msg::Map(inner) => decode_map(inner, resolver)?,
                        _ => return Err(Error::decode("msgpack", "escaped map is not a map")),
                    }
                } else {
                    resolver.resolve(&class, msg_to_json(inner)?)?
                }
            }
            None => decode_map(entries, resolver)?,
        },
        Msg::Ext(..) => return Err(Error::decode("msgpack", "extension types are not supported")),
    })
}

fn decode_map(entries: Vec<(Msg, Msg)>, resolver: &RecordResolver) -> Result<Value> {
    entries
        .into_iter()
        .map(|(k, v)| Ok((map_key(k)?, from_msg(v, resolver)?)))
        .collect::<Result<_>>()
        .map(Value::Map)
}

impl Serializer for MsgPackSerializer {
    fn name(&self) -> &str {
        "msgpack"
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
        let msg = to_msg(value)?;
        let mut raw = Vec::new();
        rmpv::encode::write_value(&mut raw, &msg)
            .map_err(|e| Error::encode_with_source("msgpack", "write value", e))?;
        Ok(Payload::Binary(self.stage.compress(raw)?))
    }

    fn decode_value(&self, payload: &Payload) -> Result<Value> {
        let raw = self.stage.decompress(payload.as_bytes())?;
        let mut cursor: &[u8] = &raw;
        let msg = rmpv::decode::read_value(&mut cursor)
            .map_err(|e| Error::decode_with_source("msgpack", "read value", e))?;
        if !cursor.is_empty() {
            return Err(Error::decode(
                "msgpack",
                format!("{} trailing bytes after value", cursor.len()),
            ));
        }
        from_msg(msg, &self.resolver)
    }
}
