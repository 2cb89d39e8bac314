use serde_json::{Map, Number, Value as Json};

use crate::error::{CodecError, Result};
use crate::registry::TypeRegistry;
use crate::value::{dedup, Value};

/// First element of every tagged triple on the wire.
pub const CUSTOM_TYPE_MARKER: &str = "__customtype__";

/// Reserved tag for ordered fixed-arity sequences.
pub const TUPLE_TYPE_ID: &str = "tuple";

/// Reserved tag for unordered collections.
pub const SET_TYPE_ID: &str = "set";

fn tagged(type_id: &str, payload: Json) -> Json {
    Json::Array(vec![
        Json::String(CUSTOM_TYPE_MARKER.to_string()),
        Json::String(type_id.to_string()),
        payload,
    ])
}

/// Encode a native value into its transmissible JSON form.
///
/// Scalars and `null` pass through; lists and maps encode element-wise;
/// tuples, sets and registered custom types become tagged triples. A
/// custom value with no registered codec fails with
/// [`CodecError::UnsupportedType`].
pub fn encode(registry: &TypeRegistry, value: &Value) -> Result<Json> {
    match value {
        Value::Null => Ok(Json::Null),
        Value::Bool(v) => Ok(Json::Bool(*v)),
        Value::Int(v) => Ok(Json::Number(Number::from(*v))),
        Value::Float(v) => Number::from_f64(*v)
            .map(Json::Number)
            .ok_or(CodecError::NonFiniteNumber),
        Value::Str(v) => Ok(Json::String(v.clone())),
        Value::List(items) => Ok(Json::Array(encode_items(registry, items)?)),
        Value::Tuple(items) => Ok(tagged(
            TUPLE_TYPE_ID,
            Json::Array(encode_items(registry, items)?),
        )),
        Value::Set(items) => Ok(tagged(
            SET_TYPE_ID,
            Json::Array(encode_items(registry, items)?),
        )),
        Value::Map(fields) => {
            let mut object = Map::with_capacity(fields.len());
            for (key, field) in fields {
                object.insert(key.clone(), encode(registry, field)?);
            }
            Ok(Json::Object(object))
        }
        Value::Custom(custom) => {
            let codec =
                registry
                    .get(custom.type_id())
                    .ok_or_else(|| CodecError::UnsupportedType {
                        type_id: custom.type_id().to_string(),
                    })?;
            Ok(tagged(custom.type_id(), codec.encode(custom)?))
        }
    }
}

fn encode_items(registry: &TypeRegistry, items: &[Value]) -> Result<Vec<Json>> {
    items.iter().map(|item| encode(registry, item)).collect()
}

/// Decode a transmissible JSON form back into a native value.
///
/// Mirrors [`encode`]: three-element arrays opening with the marker are
/// dispatched on their tag (`tuple`, `set`, or a registry identifier);
/// everything else decodes structurally. An unknown tag fails with
/// [`CodecError::UnsupportedType`].
pub fn decode(registry: &TypeRegistry, json: &Json) -> Result<Value> {
    match json {
        Json::Null => Ok(Value::Null),
        Json::Bool(v) => Ok(Value::Bool(*v)),
        Json::Number(n) => {
            if let Some(v) = n.as_i64() {
                Ok(Value::Int(v))
            } else if let Some(v) = n.as_f64() {
                Ok(Value::Float(v))
            } else {
                Err(CodecError::Malformed(format!("unrepresentable number {n}")))
            }
        }
        Json::String(v) => Ok(Value::Str(v.clone())),
        Json::Array(items) => match tagged_parts(items) {
            Some((type_id, payload)) => decode_tagged(registry, type_id, payload),
            None => Ok(Value::List(decode_items(registry, items)?)),
        },
        Json::Object(object) => {
            let mut fields = std::collections::BTreeMap::new();
            for (key, field) in object {
                fields.insert(key.clone(), decode(registry, field)?);
            }
            Ok(Value::Map(fields))
        }
    }
}

fn tagged_parts(items: &[Json]) -> Option<(&str, &Json)> {
    match items {
        [Json::String(marker), Json::String(type_id), payload]
            if marker == CUSTOM_TYPE_MARKER =>
        {
            Some((type_id, payload))
        }
        _ => None,
    }
}

fn decode_tagged(registry: &TypeRegistry, type_id: &str, payload: &Json) -> Result<Value> {
    match type_id {
        TUPLE_TYPE_ID => Ok(Value::Tuple(decode_items(
            registry,
            expect_array(type_id, payload)?,
        )?)),
        SET_TYPE_ID => Ok(Value::Set(dedup(decode_items(
            registry,
            expect_array(type_id, payload)?,
        )?))),
        _ => {
            let codec = registry
                .get(type_id)
                .ok_or_else(|| CodecError::UnsupportedType {
                    type_id: type_id.to_string(),
                })?;
            Ok(Value::Custom(codec.decode(payload)?))
        }
    }
}

fn expect_array<'a>(type_id: &str, payload: &'a Json) -> Result<&'a [Json]> {
    payload
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| CodecError::Malformed(format!("{type_id} payload must be an array")))
}

fn decode_items(registry: &TypeRegistry, items: &[Json]) -> Result<Vec<Value>> {
    items.iter().map(|item| decode(registry, item)).collect()
}
