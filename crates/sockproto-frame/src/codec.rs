use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::{BufMut, BytesMut};
use serde_json::Value as Json;

use crate::error::{FrameError, Result};

/// Wire header size: one 4-byte big-endian signed integer.
pub const HEADER_SIZE: usize = 4;

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Configuration for frame encoding/decoding.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

/// Encode a transmissible value into a complete data frame.
///
/// The value is rendered as canonical JSON text, wrapped in a base64
/// envelope so the body can never collide with header bytes, and
/// prefixed with its length as a 4-byte big-endian signed integer.
pub fn encode_frame(value: &Json, dst: &mut BytesMut, max_payload: usize) -> Result<()> {
    let text = serde_json::to_string(value)?;
    let envelope = STANDARD.encode(text.as_bytes());

    let limit = max_payload.min(i32::MAX as usize);
    if envelope.len() > limit {
        return Err(FrameError::PayloadTooLarge {
            size: envelope.len(),
            max: limit,
        });
    }

    dst.reserve(HEADER_SIZE + envelope.len());
    dst.put_i32(envelope.len() as i32);
    dst.put_slice(envelope.as_bytes());
    Ok(())
}

/// Decode a data frame body back into the transmissible value.
///
/// Any envelope or JSON failure here means the stream is corrupt; the
/// caller must treat it as fatal.
pub fn decode_payload(body: &[u8]) -> Result<Json> {
    let text = STANDARD
        .decode(body)
        .map_err(|err| FrameError::InvalidEnvelope(err.to_string()))?;
    Ok(serde_json::from_slice(&text)?)
}
