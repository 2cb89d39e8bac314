use tokio::net::TcpStream;

use crate::config::SessionConfig;
use crate::error::Result;
use crate::session::Session;

/// Connect to a listening peer and start a session.
pub async fn connect(host: &str, port: u16) -> Result<Session> {
    connect_with_config(host, port, SessionConfig::default()).await
}

/// Connect with explicit configuration.
pub async fn connect_with_config(host: &str, port: u16, config: SessionConfig) -> Result<Session> {
    let stream = TcpStream::connect((host, port)).await?;
    tracing::debug!(host, port, "connected");
    Ok(Session::from_stream_with_config(stream, config))
}
