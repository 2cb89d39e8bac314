//! Extensible recursive value serialization for sockproto messages.
//!
//! Converts between the native [`Value`] model (scalars, lists, tuples,
//! sets, string-keyed maps, and user-registered custom types) and the
//! transmissible JSON form that goes over the wire. Values that are not
//! plain JSON shapes travel as a tagged triple:
//! `["__customtype__", type_id, payload]`.
//!
//! No I/O and no concurrency live here.

pub mod error;
pub mod registry;
pub mod serializer;
pub mod value;

pub use error::{CodecError, Result};
pub use registry::{FnCodec, TypeCodec, TypeRegistry, BYTEARRAY_TYPE_ID, BYTES_TYPE_ID};
pub use serializer::{decode, encode, CUSTOM_TYPE_MARKER, SET_TYPE_ID, TUPLE_TYPE_ID};
pub use value::{CustomValue, Fields, Value};
