use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value as Json;

use crate::error::{CodecError, Result};
use crate::serializer::{SET_TYPE_ID, TUPLE_TYPE_ID};
use crate::value::CustomValue;

/// Type identifier for the built-in immutable byte string codec.
pub const BYTES_TYPE_ID: &str = "bytes";

/// Type identifier for the built-in mutable byte buffer codec.
pub const BYTEARRAY_TYPE_ID: &str = "bytearray";

/// Encode/decode pair for one user-defined native type.
pub trait TypeCodec: Send + Sync {
    /// Stable identifier the type travels under. Unique per session.
    fn type_id(&self) -> &str;

    /// Native value to transmissible payload.
    fn encode(&self, value: &CustomValue) -> Result<Json>;

    /// Transmissible payload back to native value.
    fn decode(&self, wire: &Json) -> Result<CustomValue>;
}

/// Registry of custom-type codecs, keyed by type identifier.
///
/// Re-registering an identifier overwrites the previous codec silently.
pub struct TypeRegistry {
    codecs: HashMap<String, Arc<dyn TypeCodec>>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    /// Create a registry with the built-in byte codecs installed.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        // Built-in registrations carry valid ids; ignore the impossible error.
        let _ = registry.register(bytes_codec());
        let _ = registry.register(bytearray_codec());
        registry
    }

    /// Register a codec under its declared type identifier.
    pub fn register(&mut self, codec: Arc<dyn TypeCodec>) -> Result<()> {
        // Fully qualified so `Any::type_id` on the Arc cannot shadow
        // the codec's own identifier.
        let type_id = TypeCodec::type_id(codec.as_ref());
        if type_id.is_empty() {
            return Err(CodecError::InvalidCodec("empty type identifier".into()));
        }
        if type_id == TUPLE_TYPE_ID || type_id == SET_TYPE_ID {
            return Err(CodecError::InvalidCodec(format!(
                "type identifier `{type_id}` is reserved"
            )));
        }
        self.codecs.insert(type_id.to_string(), codec);
        Ok(())
    }

    /// Look up a codec by type identifier.
    pub fn get(&self, type_id: &str) -> Option<Arc<dyn TypeCodec>> {
        self.codecs.get(type_id).cloned()
    }

    /// Whether a codec is registered for the identifier.
    pub fn contains(&self, type_id: &str) -> bool {
        self.codecs.contains_key(type_id)
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

type EncodeFn<T> = Box<dyn Fn(&T) -> Result<Json> + Send + Sync>;
type DecodeFn<T> = Box<dyn Fn(&Json) -> Result<T> + Send + Sync>;

/// Codec built from two closures, with the `Any` downcast handled once.
pub struct FnCodec<T> {
    type_id: String,
    encode: EncodeFn<T>,
    decode: DecodeFn<T>,
}

impl<T: Any + Send + Sync> FnCodec<T> {
    pub fn new(
        type_id: impl Into<String>,
        encode: impl Fn(&T) -> Result<Json> + Send + Sync + 'static,
        decode: impl Fn(&Json) -> Result<T> + Send + Sync + 'static,
    ) -> Self {
        Self {
            type_id: type_id.into(),
            encode: Box::new(encode),
            decode: Box::new(decode),
        }
    }
}

impl<T: Any + Send + Sync> TypeCodec for FnCodec<T> {
    fn type_id(&self) -> &str {
        &self.type_id
    }

    fn encode(&self, value: &CustomValue) -> Result<Json> {
        let typed = value
            .downcast_ref::<T>()
            .ok_or_else(|| CodecError::TypeMismatch {
                type_id: self.type_id.clone(),
            })?;
        (self.encode)(typed)
    }

    fn decode(&self, wire: &Json) -> Result<CustomValue> {
        let typed = (self.decode)(wire)?;
        Ok(CustomValue::new(self.type_id.clone(), typed))
    }
}

fn expect_hex(type_id: &str, wire: &Json) -> Result<Vec<u8>> {
    let text = wire
        .as_str()
        .ok_or_else(|| CodecError::Malformed(format!("{type_id} payload must be a hex string")))?;
    hex::decode(text).map_err(|err| CodecError::Malformed(format!("{type_id} payload: {err}")))
}

fn bytes_codec() -> Arc<dyn TypeCodec> {
    Arc::new(FnCodec::<Bytes>::new(
        BYTES_TYPE_ID,
        |value| Ok(Json::String(hex::encode(value))),
        |wire| Ok(Bytes::from(expect_hex(BYTES_TYPE_ID, wire)?)),
    ))
}

fn bytearray_codec() -> Arc<dyn TypeCodec> {
    Arc::new(FnCodec::<Vec<u8>>::new(
        BYTEARRAY_TYPE_ID,
        |value| Ok(Json::String(hex::encode(value))),
        |wire| expect_hex(BYTEARRAY_TYPE_ID, wire),
    ))
}
