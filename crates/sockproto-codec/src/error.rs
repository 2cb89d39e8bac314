/// Errors that can occur during value encoding/decoding or codec registration.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// No codec is registered for the given type identifier.
    #[error("unsupported data type: {type_id}")]
    UnsupportedType { type_id: String },

    /// A codec was handed a custom value of a different native type.
    #[error("codec {type_id} received a value of another type")]
    TypeMismatch { type_id: String },

    /// The codec being registered is malformed.
    #[error("invalid codec registration: {0}")]
    InvalidCodec(String),

    /// The transmissible form is not a shape the serializer produces.
    #[error("malformed transmissible value: {0}")]
    Malformed(String),

    /// A float that JSON cannot represent (NaN or infinity).
    #[error("non-finite number cannot be encoded")]
    NonFiniteNumber,
}

pub type Result<T> = std::result::Result<T, CodecError>;
