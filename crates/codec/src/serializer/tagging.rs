//! Type tags for values carried through JSON
//!
//! Records become `{"__type__": "record", "__class__": name, "value": payload}`.
//! Bytes, lists holding tagged elements and maps that own a `__type__` key are
//! wrapped as well so that decoding never confuses user data with an envelope.

use pdict_core::value::float_to_json;
use pdict_core::{Error, Result, TypeRegistry, Value, CLASS_TAG, TYPE_TAG, VALUES_FIELD, VALUE_FIELD};
use serde_json::{json, Map, Value as Json};
use std::sync::Arc;

const RECORD_TAG: &str = "record";
const LIST_TAG: &str = "list";
const BYTES_TAG: &str = "bytes";
const MAP_TAG: &str = "map";

/// Looks up record decoders for serializers
#[derive(Debug, Clone)]
pub struct RecordResolver {
    registry: Arc<TypeRegistry>,
    allow_unregistered: bool,
}

impl RecordResolver {
    pub fn new(registry: Arc<TypeRegistry>, allow_unregistered: bool) -> Self {
        Self {
            registry,
            allow_unregistered,
        }
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Decode a record payload, or hand back the bare payload when the type is
    /// unknown and unregistered records are allowed
    pub fn resolve(&self, type_name: &str, payload: Json) -> Result<Value> {
        if self.allow_unregistered && !self.registry.contains(type_name) {
            tracing::debug!("Returning bare payload for unregistered record type {}", type_name);
            return Ok(Value::from(payload));
        }
        self.registry.decode(type_name, payload)
    }
}

fn is_tagged(value: &Value) -> bool {
    matches!(value, Value::Record(_) | Value::Bytes(_))
}

/// Convert a value into tagged JSON
pub fn to_tagged_json(value: &Value) -> Result<Json> {
    Ok(match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::from(*i),
        Value::Float(f) => float_to_json(*f)?,
        Value::Str(s) => Json::String(s.clone()),
        Value::Bytes(bytes) => json!({ TYPE_TAG: BYTES_TAG, VALUE_FIELD: hex::encode(bytes) }),
        Value::Record(record) => json!({
            TYPE_TAG: RECORD_TAG,
            CLASS_TAG: record.type_name(),
            VALUE_FIELD: record.to_json()?,
        }),
        Value::List(items) => {
            let values = items
                .iter()
                .map(to_tagged_json)
                .collect::<Result<Vec<_>>>()?;
            if items.iter().any(is_tagged) {
                json!({ TYPE_TAG: LIST_TAG, VALUES_FIELD: values })
            } else {
                Json::Array(values)
            }
        }
        Value::Map(map) => {
            let object = map
                .iter()
                .map(|(k, v)| Ok((k.clone(), to_tagged_json(v)?)))
                .collect::<Result<Map<String, Json>>>()?;
            if map.contains_key(TYPE_TAG) {
                json!({ TYPE_TAG: MAP_TAG, VALUE_FIELD: object })
            } else {
                Json::Object(object)
            }
        }
    })
}

/// Convert tagged JSON back into a value
pub fn from_tagged_json(json: Json, resolver: &RecordResolver) -> Result<Value> {
    match json {
        Json::Array(items) => decode_list(items, resolver),
        Json::Object(mut object) => {
            let tag = match object.get(TYPE_TAG) {
                Some(Json::String(tag)) => tag.clone(),
                _ => return decode_map(object, resolver),
            };
            match tag.as_str() {
                RECORD_TAG => {
                    let type_name = match object.remove(CLASS_TAG) {
                        Some(Json::String(name)) => name,
                        _ => return Err(Error::decode("json", "record tag without a class name")),
                    };
                    let payload = object.remove(VALUE_FIELD).unwrap_or(Json::Null);
                    resolver.resolve(&type_name, payload)
                }
                LIST_TAG => match object.remove(VALUES_FIELD) {
                    Some(Json::Array(items)) => decode_list(items, resolver),
                    _ => Err(Error::decode("json", "list tag without values")),
                },
                BYTES_TAG => match object.remove(VALUE_FIELD) {
                    Some(Json::String(encoded)) => hex::decode(&encoded)
                        .map(Value::Bytes)
                        .map_err(|e| Error::decode_with_source("json", "invalid hex in bytes tag", e)),
                    _ => Err(Error::decode("json", "bytes tag without a value")),
                },
                MAP_TAG => match object.remove(VALUE_FIELD) {
                    Some(Json::Object(inner)) => decode_map(inner, resolver),
                    _ => Err(Error::decode("json", "map tag without an object value")),
                },
                other => Err(Error::decode("json", format!("unknown type tag '{other}'"))),
            }
        }
        scalar => Ok(Value::from(scalar)),
    }
}

fn decode_list(items: Vec<Json>, resolver: &RecordResolver) -> Result<Value> {
    items
        .into_iter()
        .map(|item| from_tagged_json(item, resolver))
        .collect::<Result<Vec<_>>>()
        .map(Value::List)
}

fn decode_map(object: Map<String, Json>, resolver: &RecordResolver) -> Result<Value> {
    object
        .into_iter()
        .map(|(k, v)| Ok((k, from_tagged_json(v, resolver)?)))
        .collect::<Result<_>>()
        .map(Value::Map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdict_core::TypedRecord;
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeMap;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Job {
        id: u64,
        queue: String,
    }

    impl TypedRecord for Job {
        const TYPE_NAME: &'static str = "tests.Job";
    }

    fn resolver(allow_unregistered: bool) -> RecordResolver {
        let registry = Arc::new(TypeRegistry::new());
        registry.register::<Job>();
        RecordResolver::new(registry, allow_unregistered)
    }

    #[test]
    fn test_record_envelope_shape() {
        let job = Value::record(Job {
            id: 7,
            queue: "default".to_string(),
        });
        let tagged = to_tagged_json(&job).unwrap();
        assert_eq!(
            tagged,
            json!({"__type__": "record", "__class__": "tests.Job", "value": {"id": 7, "queue": "default"}})
        );
        assert_eq!(from_tagged_json(tagged, &resolver(false)).unwrap(), job);
    }

    #[test]
    fn test_list_with_records_is_wrapped() {
        let list = Value::List(vec![
            Value::Int(1),
            Value::record(Job {
                id: 1,
                queue: "q".to_string(),
            }),
        ]);
        let tagged = to_tagged_json(&list).unwrap();
        assert_eq!(tagged["__type__"], "list");
        assert_eq!(tagged["values"].as_array().unwrap().len(), 2);
        assert_eq!(from_tagged_json(tagged, &resolver(false)).unwrap(), list);

        let plain = Value::List(vec![Value::Int(1), Value::from("a")]);
        assert_eq!(to_tagged_json(&plain).unwrap(), json!([1, "a"]));
    }

    #[test]
    fn test_map_owning_type_key_round_trips() {
        let mut map = BTreeMap::new();
        map.insert("__type__".to_string(), Value::from("record"));
        map.insert("other".to_string(), Value::Int(2));
        let value = Value::Map(map);
        let tagged = to_tagged_json(&value).unwrap();
        assert_eq!(tagged["__type__"], "map");
        assert_eq!(from_tagged_json(tagged, &resolver(false)).unwrap(), value);
    }

    #[test]
    fn test_unknown_record_type() {
        let tagged = json!({"__type__": "record", "__class__": "tests.Missing", "value": {"a": 1}});
        let err = from_tagged_json(tagged.clone(), &resolver(false)).unwrap_err();
        assert!(matches!(err, Error::UnknownRecordType { .. }));

        let bare = from_tagged_json(tagged, &resolver(true)).unwrap();
        assert_eq!(bare, Value::from(json!({"a": 1})));
    }

    #[test]
    fn test_unknown_tag_is_a_decode_error() {
        let err = from_tagged_json(json!({"__type__": "set", "value": []}), &resolver(false)).unwrap_err();
        assert!(err.is_decode_error());
    }
}
