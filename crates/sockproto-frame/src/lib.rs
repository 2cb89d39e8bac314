//! Length-prefixed frame and control-signal codec for sockproto.
//!
//! Every unit on the wire opens with a 4-byte big-endian signed header:
//! - header `>= 0`: a data frame, followed by exactly that many bytes of
//!   base64-enveloped canonical JSON
//! - header `< 0`: a reserved control signal (PING or ACKNOWLEDGE), no body
//!
//! Partial reads are handled internally; callers always see complete
//! headers and payloads.

pub mod codec;
pub mod error;
pub mod reader;
pub mod signal;
pub mod writer;

pub use codec::{decode_payload, encode_frame, FrameConfig, DEFAULT_MAX_PAYLOAD, HEADER_SIZE};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use signal::{Header, Signal, SIGNAL_ACK, SIGNAL_PING};
pub use writer::FrameWriter;
