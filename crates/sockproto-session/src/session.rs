use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::BytesMut;
use sockproto_codec::{serializer, Fields, TypeCodec, TypeRegistry, Value};
use sockproto_frame::{encode_frame, FrameConfig, FrameReader, FrameWriter};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::config::SessionConfig;
use crate::engine::{self, OutboundPacket, SharedWriter};
use crate::error::{Result, SessionError};

/// One acknowledged, keep-alive-monitored connection to a peer.
///
/// All methods take `&self`; a session can be shared across tasks.
/// Concurrent `send` calls are serialized only through the outbound
/// queue (FIFO fairness) and several packets may be in flight at once.
pub struct Session {
    outbound_tx: mpsc::Sender<OutboundPacket>,
    inbound_rx: Mutex<mpsc::Receiver<serde_json::Value>>,
    registry: RwLock<TypeRegistry>,
    writer: SharedWriter,
    cancel: CancellationToken,
    connected: Arc<AtomicBool>,
    engine: Mutex<Option<tokio::task::JoinHandle<()>>>,
    config: SessionConfig,
}

impl Session {
    /// Wrap an already-connected stream with default configuration.
    pub fn from_stream(stream: TcpStream) -> Session {
        Self::from_stream_with_config(stream, SessionConfig::default())
    }

    /// Wrap an already-connected stream with explicit configuration.
    ///
    /// Installs the built-in byte codecs and starts the keep-alive engine.
    pub fn from_stream_with_config(stream: TcpStream, config: SessionConfig) -> Session {
        let (read_half, write_half) = stream.into_split();
        let frame_config = FrameConfig {
            max_payload_size: config.max_payload_size,
        };
        let reader = FrameReader::with_config(read_half, frame_config.clone());
        let writer: SharedWriter =
            Arc::new(Mutex::new(FrameWriter::with_config(write_half, frame_config)));

        let (outbound_tx, outbound_rx) = mpsc::channel(config.queue_capacity);
        let (inbound_tx, inbound_rx) = mpsc::channel(config.queue_capacity);
        let cancel = CancellationToken::new();
        let connected = Arc::new(AtomicBool::new(true));

        let engine = engine::spawn(
            reader,
            Arc::clone(&writer),
            outbound_rx,
            inbound_tx,
            config.clone(),
            cancel.clone(),
            Arc::clone(&connected),
        );

        Session {
            outbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
            registry: RwLock::new(TypeRegistry::with_builtins()),
            writer,
            cancel,
            connected,
            engine: Mutex::new(Some(engine)),
            config,
        }
    }

    /// Send a message and wait until the peer has acknowledged receipt.
    ///
    /// Serialization failures are local: the connection stays usable.
    /// There is no caller-facing timeout; wrap in `tokio::time::timeout`
    /// if bounded waiting is required.
    pub async fn send(&self, fields: Fields) -> Result<()> {
        if !self.is_connected() {
            return Err(SessionError::Disconnected);
        }

        let payload = {
            let registry = self.registry.read().await;
            serializer::encode(&registry, &Value::Map(fields))?
        };
        let mut buf = BytesMut::new();
        encode_frame(&payload, &mut buf, self.config.max_payload_size)?;

        let (done_tx, done_rx) = oneshot::channel();
        let packet = OutboundPacket {
            bytes: buf.freeze(),
            done: done_tx,
        };
        self.outbound_tx
            .send(packet)
            .await
            .map_err(|_| SessionError::Disconnected)?;

        done_rx.await.map_err(|_| SessionError::Disconnected)
    }

    /// Wait for the next inbound message and decode it.
    ///
    /// Decode failures (e.g. an unregistered custom tag) are local to
    /// this call; the payload they consumed is dropped.
    pub async fn receive(&self) -> Result<Fields> {
        let payload = self
            .inbound_rx
            .lock()
            .await
            .recv()
            .await
            .ok_or(SessionError::Disconnected)?;

        let value = {
            let registry = self.registry.read().await;
            serializer::decode(&registry, &payload)?
        };
        match value {
            Value::Map(fields) => Ok(fields),
            other => Err(SessionError::MalformedMessage(format!(
                "expected a field mapping, got {other:?}"
            ))),
        }
    }

    /// Register a custom-type codec for this session.
    ///
    /// Re-registering an identifier overwrites the previous codec;
    /// malformed codecs (empty or reserved identifier) are rejected.
    pub async fn add_serializer(&self, codec: Arc<dyn TypeCodec>) -> Result<()> {
        self.registry.write().await.register(codec)?;
        Ok(())
    }

    /// True while the keep-alive engine is running and the stream is open.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && !self.cancel.is_cancelled()
    }

    /// Close the session: shut down the write half (the peer sees EOF),
    /// cancel the engine and wait for it, bounded by `close_timeout`.
    /// Idempotent.
    pub async fn close(&self) {
        if self.cancel.is_cancelled() {
            return;
        }

        // The send activity may be blocked mid-write holding the writer
        // lock (peer stopped reading); do not wait on it unbounded.
        match tokio::time::timeout(self.config.close_timeout, self.writer.lock()).await {
            Ok(mut writer) => {
                if let Err(err) = writer.shutdown().await {
                    tracing::debug!(error = %err, "write shutdown failed");
                }
            }
            Err(_elapsed) => {
                tracing::warn!("writer busy past close timeout; skipping shutdown");
            }
        }
        self.cancel.cancel();

        if let Some(handle) = self.engine.lock().await.take() {
            let abort = handle.abort_handle();
            if tokio::time::timeout(self.config.close_timeout, handle)
                .await
                .is_err()
            {
                tracing::warn!("engine did not stop within close timeout; aborting");
                abort.abort();
            }
        }
        self.connected.store(false, Ordering::SeqCst);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Background activities must not outlive their session.
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}
