use std::time::Duration;

/// Errors surfaced by sessions and servers.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Frame-level error (framing, envelope, unknown signal). Fatal.
    #[error("frame error: {0}")]
    Frame(#[from] sockproto_frame::FrameError),

    /// Value serialization error. Local to the offending call; the
    /// connection stays usable.
    #[error("codec error: {0}")]
    Codec(#[from] sockproto_codec::CodecError),

    /// The peer violated the signal protocol. Fatal.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// A keep-alive ping went unacknowledged past the timeout. Fatal.
    #[error("peer unresponsive (no acknowledge within {timeout:?})")]
    PeerUnresponsive { timeout: Duration },

    /// The session is no longer connected.
    #[error("session disconnected")]
    Disconnected,

    /// A received message did not decode to a field mapping.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// I/O error while connecting or binding.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No candidate port could be bound.
    #[error("all candidate ports are busy: {ports:?}")]
    PortsBusy { ports: Vec<u16> },
}

pub type Result<T> = std::result::Result<T, SessionError>;
