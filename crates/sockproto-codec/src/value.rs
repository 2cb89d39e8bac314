use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Top-level message shape exchanged by `send`/`receive`: a string-keyed map.
pub type Fields = BTreeMap<String, Value>;

/// A native structured value.
///
/// Mapping keys are `String` by construction, so non-string keys are
/// rejected before encoding rather than deep inside it.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Ordered sequence; decodes back as a list.
    List(Vec<Value>),
    /// Ordered fixed-arity sequence; survives the wire as a tuple, not a list.
    Tuple(Vec<Value>),
    /// Unordered collection; element order is not meaningful and equality
    /// between sets ignores it.
    Set(Vec<Value>),
    Map(Fields),
    /// A user-defined value handled by a registered codec.
    Custom(CustomValue),
}

impl Value {
    /// Build a set, dropping duplicate members.
    pub fn set(items: Vec<Value>) -> Value {
        Value::Set(dedup(items))
    }

    /// Build a tuple.
    pub fn tuple(items: Vec<Value>) -> Value {
        Value::Tuple(items)
    }

    /// Wrap a native value for a registered codec.
    pub fn custom<T: Any + Send + Sync>(type_id: impl Into<String>, value: T) -> Value {
        Value::Custom(CustomValue::new(type_id, value))
    }
}

pub(crate) fn dedup(items: Vec<Value>) -> Vec<Value> {
    let mut unique: Vec<Value> = Vec::with_capacity(items.len());
    for item in items {
        if !unique.contains(&item) {
            unique.push(item);
        }
    }
    unique
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => a == b,
            // Sets compare as unordered collections.
            (Value::Set(a), Value::Set(b)) => {
                a.len() == b.len() && a.iter().all(|item| b.contains(item))
            }
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Custom(a), Value::Custom(b)) => a == b,
            _ => false,
        }
    }
}

/// A user-defined native value paired with its registry type identifier.
///
/// The payload is type-erased; codecs recover the concrete type via
/// [`CustomValue::downcast_ref`].
#[derive(Clone)]
pub struct CustomValue {
    type_id: String,
    data: Arc<dyn Any + Send + Sync>,
}

impl CustomValue {
    pub fn new<T: Any + Send + Sync>(type_id: impl Into<String>, value: T) -> Self {
        Self {
            type_id: type_id.into(),
            data: Arc::new(value),
        }
    }

    /// The registry key this value is encoded under.
    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    /// Borrow the payload as its concrete type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }
}

impl fmt::Debug for CustomValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomValue")
            .field("type_id", &self.type_id)
            .finish_non_exhaustive()
    }
}

/// Identity comparison: two custom values are equal only when they share
/// the same payload allocation. Structural equality requires the concrete
/// type, which the registry has and this module does not.
impl PartialEq for CustomValue {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && Arc::ptr_eq(&self.data, &other.data)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<Fields> for Value {
    fn from(v: Fields) -> Self {
        Value::Map(v)
    }
}
