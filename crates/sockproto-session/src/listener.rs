use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::error::{Result, SessionError};
use crate::session::Session;

/// Handle to a running server: one accept loop, one session per peer.
#[derive(Debug)]
pub struct ServerHandle {
    port: u16,
    cancel: CancellationToken,
    accept_task: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
    close_timeout: std::time::Duration,
}

/// Bind the first free port from the candidate list and serve connections.
///
/// The handler is invoked with an owned [`Session`] per accepted peer;
/// sessions are fully independent of one another.
pub async fn start_server<F, Fut>(candidate_ports: &[u16], handler: F) -> Result<ServerHandle>
where
    F: Fn(Session) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    start_server_with_config(candidate_ports, handler, ServerConfig::default()).await
}

/// Start a server with explicit configuration.
pub async fn start_server_with_config<F, Fut>(
    candidate_ports: &[u16],
    handler: F,
    config: ServerConfig,
) -> Result<ServerHandle>
where
    F: Fn(Session) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut bound = None;
    for &port in candidate_ports {
        match TcpListener::bind(("0.0.0.0", port)).await {
            Ok(listener) => {
                bound = Some((listener, port));
                break;
            }
            Err(err) => {
                tracing::debug!(port, error = %err, "candidate port unavailable");
            }
        }
    }
    let (listener, port) = bound.ok_or_else(|| SessionError::PortsBusy {
        ports: candidate_ports.to_vec(),
    })?;
    tracing::info!(port, "server listening");

    let cancel = CancellationToken::new();
    let accept_task = tokio::spawn(accept_loop(
        listener,
        Arc::new(handler),
        config.clone(),
        cancel.clone(),
    ));

    Ok(ServerHandle {
        port,
        cancel,
        accept_task: tokio::sync::Mutex::new(Some(accept_task)),
        close_timeout: config.close_timeout,
    })
}

async fn accept_loop<F, Fut>(
    listener: TcpListener,
    handler: Arc<F>,
    config: ServerConfig,
    cancel: CancellationToken,
) where
    F: Fn(Session) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut sessions = JoinSet::new();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    tracing::debug!(%addr, "peer connected");
                    let session = Session::from_stream_with_config(stream, config.session.clone());
                    let handler = Arc::clone(&handler);
                    sessions.spawn(async move { handler(session).await });
                }
                Err(err) => {
                    tracing::warn!(error = %err, "accept failed");
                }
            }
        }
        // Reap finished sessions without blocking the accept path.
        while sessions.try_join_next().is_some() {}
    }
    // Force-cancel sessions that are still running.
    sessions.shutdown().await;
}

impl ServerHandle {
    /// The port the server actually bound.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve until [`ServerHandle::close`] is called.
    pub async fn idle(&self) {
        self.cancel.cancelled().await;
    }

    /// Stop accepting, cancel live sessions, wait bounded for the accept
    /// loop to wind down. Idempotent.
    pub async fn close(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();

        if let Some(handle) = self.accept_task.lock().await.take() {
            let abort = handle.abort_handle();
            if tokio::time::timeout(self.close_timeout, handle).await.is_err() {
                tracing::warn!("accept loop did not stop within close timeout; aborting");
                abort.abort();
            }
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
