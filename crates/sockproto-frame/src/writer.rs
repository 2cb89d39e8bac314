use bytes::BytesMut;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::codec::{encode_frame, FrameConfig};
use crate::error::Result;
use crate::signal::Signal;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete frames and signals to any async byte stream.
///
/// Every write is followed by a flush, so a unit is fully on the wire
/// before the writer is released to the next caller.
pub struct FrameWriter<W> {
    inner: W,
    buf: BytesMut,
    config: FrameConfig,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Create a frame writer with default configuration.
    pub fn new(inner: W) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a frame writer with explicit configuration.
    pub fn with_config(inner: W, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Encode and write a data frame for a transmissible value.
    pub async fn write_frame(&mut self, value: &serde_json::Value) -> Result<()> {
        self.buf.clear();
        encode_frame(value, &mut self.buf, self.config.max_payload_size)?;
        let frame = self.buf.split();
        self.write_bytes(&frame).await
    }

    /// Write a control signal header.
    pub async fn write_signal(&mut self, signal: Signal) -> Result<()> {
        tracing::trace!(code = signal.code(), "signal written");
        self.inner.write_all(&signal.code().to_be_bytes()).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Write pre-framed bytes (a complete header + body unit).
    pub async fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Shut down the write side of the stream.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> W {
        self.inner
    }
}
