use std::time::Duration;

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::Instant;

use crate::codec::{FrameConfig, HEADER_SIZE};
use crate::error::{FrameError, Result};
use crate::signal::Header;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Reads complete headers and payloads from any async byte stream.
///
/// Partial reads accumulate in an internal buffer, so a header read that
/// times out never loses bytes already received.
pub struct FrameReader<R> {
    inner: R,
    buf: BytesMut,
    config: FrameConfig,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Create a frame reader with default configuration.
    pub fn new(inner: R) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a frame reader with explicit configuration.
    pub fn with_config(inner: R, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next 4-byte header, waiting at most `poll`.
    ///
    /// Returns `Ok(None)` when no complete header arrived within the poll
    /// window, so callers can recheck liveness while idle. A data header
    /// larger than the configured maximum is a fatal framing error.
    pub async fn read_header(&mut self, poll: Duration) -> Result<Option<Header>> {
        let deadline = Instant::now() + poll;
        while self.buf.len() < HEADER_SIZE {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            match tokio::time::timeout(remaining, self.inner.read_buf(&mut self.buf)).await {
                Err(_elapsed) => return Ok(None),
                Ok(Ok(0)) => return Err(FrameError::ConnectionClosed),
                Ok(Ok(_)) => {}
                Ok(Err(err)) => return Err(err.into()),
            }
        }

        let header = Header::from_code(self.buf.get_i32())?;
        if let Header::Data(len) = header {
            if len > self.config.max_payload_size {
                return Err(FrameError::PayloadTooLarge {
                    size: len,
                    max: self.config.max_payload_size,
                });
            }
        }
        Ok(Some(header))
    }

    /// Read exactly `len` payload bytes.
    pub async fn read_payload(&mut self, len: usize) -> Result<Bytes> {
        while self.buf.len() < len {
            let read = self.inner.read_buf(&mut self.buf).await?;
            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }
        }
        Ok(self.buf.split_to(len).freeze())
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> R {
        self.inner
    }
}
