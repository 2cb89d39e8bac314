//! The per-connection keep-alive engine.
//!
//! Two concurrently scheduled activities share nothing but the three
//! queues and the write lock: the receive loop parses headers into
//! signals and data frames, the send loop drains the outbound queue and
//! runs the ping watchdog. Acknowledgments carry no identifier and are
//! matched strictly FIFO against the pending queue, which holds because
//! the peer acknowledges every received unit immediately in receipt
//! order.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use sockproto_frame::{decode_payload, FrameError, FrameReader, FrameWriter, Header, Signal};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};

/// All stream writes (data, ping, acknowledge) go through this one lock.
pub(crate) type SharedWriter = Arc<Mutex<FrameWriter<OwnedWriteHalf>>>;

type PendingAcks = Arc<Mutex<VecDeque<oneshot::Sender<()>>>>;
type LastSeen = Arc<Mutex<Instant>>;

/// A framed outbound unit plus its single-shot completion signal,
/// fulfilled when the peer's acknowledgment is observed.
pub(crate) struct OutboundPacket {
    pub bytes: Bytes,
    pub done: oneshot::Sender<()>,
}

/// Spawn the engine for one connection. The returned task ends when the
/// stream closes, the token is cancelled, or a fatal error occurs; it
/// flips `connected` to false on the way out.
pub(crate) fn spawn(
    reader: FrameReader<OwnedReadHalf>,
    writer: SharedWriter,
    outbound_rx: mpsc::Receiver<OutboundPacket>,
    inbound_tx: mpsc::Sender<serde_json::Value>,
    config: SessionConfig,
    cancel: CancellationToken,
    connected: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let pending: PendingAcks = Arc::new(Mutex::new(VecDeque::new()));
        let last_seen: LastSeen = Arc::new(Mutex::new(Instant::now()));

        let mut recv = tokio::spawn(recv_loop(
            reader,
            Arc::clone(&writer),
            inbound_tx,
            Arc::clone(&pending),
            Arc::clone(&last_seen),
            config.clone(),
            cancel.clone(),
        ));
        let mut send = tokio::spawn(send_loop(
            writer,
            outbound_rx,
            pending,
            last_seen,
            config,
            cancel.clone(),
        ));

        // First activity to finish takes the other down with it.
        let first = tokio::select! {
            res = &mut recv => {
                cancel.cancel();
                let _ = (&mut send).await;
                res
            }
            res = &mut send => {
                cancel.cancel();
                let _ = (&mut recv).await;
                res
            }
        };

        connected.store(false, Ordering::SeqCst);
        match first {
            Ok(Ok(())) => tracing::debug!("session engine stopped"),
            Ok(Err(SessionError::Frame(FrameError::ConnectionClosed))) => {
                tracing::debug!("peer closed the connection");
            }
            Ok(Err(err)) => tracing::error!(error = %err, "session aborted"),
            Err(err) => tracing::error!(error = %err, "session activity panicked"),
        }
    })
}

async fn touch(last_seen: &LastSeen) {
    *last_seen.lock().await = Instant::now();
}

async fn recv_loop(
    mut reader: FrameReader<OwnedReadHalf>,
    writer: SharedWriter,
    inbound_tx: mpsc::Sender<serde_json::Value>,
    pending: PendingAcks,
    last_seen: LastSeen,
    config: SessionConfig,
    cancel: CancellationToken,
) -> Result<()> {
    loop {
        let header = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            header = reader.read_header(config.read_poll) => header?,
        };
        let Some(header) = header else {
            // Idle poll window elapsed; go around so cancellation and
            // liveness stay responsive.
            continue;
        };

        match header {
            Header::Signal(Signal::Ping) => {
                touch(&last_seen).await;
                tracing::trace!("ping received");
                writer.lock().await.write_signal(Signal::Acknowledge).await?;
            }
            Header::Signal(Signal::Acknowledge) => {
                touch(&last_seen).await;
                // Bind the pop so the queue lock is released before the
                // grace-period retry below takes it again.
                let first = pending.lock().await.pop_front();
                let oldest = match first {
                    Some(entry) => entry,
                    None => {
                        // The matching entry may still be on its way into
                        // the queue; give it one grace period.
                        tokio::time::sleep(config.ack_grace).await;
                        pending.lock().await.pop_front().ok_or_else(|| {
                            SessionError::Protocol(
                                "acknowledge received with no packet awaiting one".into(),
                            )
                        })?
                    }
                };
                // The sender may have abandoned the wait; that is its call.
                let _ = oldest.send(());
            }
            Header::Data(len) => {
                let body = tokio::select! {
                    _ = cancel.cancelled() => return Ok(()),
                    body = reader.read_payload(len) => body?,
                };
                // Acknowledge in receipt order before handing the payload
                // on; the peer's FIFO matching depends on it.
                writer.lock().await.write_signal(Signal::Acknowledge).await?;
                let payload = decode_payload(&body)?;
                tracing::trace!(len, "data frame received");
                if inbound_tx.send(payload).await.is_err() {
                    // Session handle is gone; nothing left to deliver to.
                    return Ok(());
                }
            }
        }
    }
}

async fn send_loop(
    writer: SharedWriter,
    mut outbound_rx: mpsc::Receiver<OutboundPacket>,
    pending: PendingAcks,
    last_seen: LastSeen,
    config: SessionConfig,
    cancel: CancellationToken,
) -> Result<()> {
    // Outstanding keep-alive ping: its synthetic pending-ack receiver and
    // the instant it was written.
    let mut ping: Option<(oneshot::Receiver<()>, Instant)> = None;

    loop {
        if cancel.is_cancelled() {
            return Ok(());
        }

        match &mut ping {
            Some((done, sent_at)) => match done.try_recv() {
                Ok(()) => {
                    touch(&last_seen).await;
                    ping = None;
                }
                Err(oneshot::error::TryRecvError::Empty) => {
                    if sent_at.elapsed() >= config.ack_timeout {
                        return Err(SessionError::PeerUnresponsive {
                            timeout: config.ack_timeout,
                        });
                    }
                }
                Err(oneshot::error::TryRecvError::Closed) => return Ok(()),
            },
            None => {
                if last_seen.lock().await.elapsed() >= config.ping_interval {
                    let (done_tx, done_rx) = oneshot::channel();
                    // Register the synthetic entry before the bytes leave,
                    // so the acknowledge can never race an empty queue.
                    pending.lock().await.push_back(done_tx);
                    writer.lock().await.write_signal(Signal::Ping).await?;
                    tracing::debug!("keep-alive ping sent");
                    ping = Some((done_rx, Instant::now()));
                }
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = tokio::time::sleep(config.send_poll) => {}
            packet = outbound_rx.recv() => match packet {
                Some(packet) => {
                    pending.lock().await.push_back(packet.done);
                    writer.lock().await.write_bytes(&packet.bytes).await?;
                    tracing::trace!(len = packet.bytes.len(), "data frame written");
                }
                // Session handle dropped; no more work will arrive.
                None => return Ok(()),
            }
        }
    }
}
