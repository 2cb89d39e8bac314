/// Errors that can occur while framing or parsing the byte stream.
///
/// Everything except [`FrameError::PayloadTooLarge`] on the encode side is
/// fatal to the connection.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A negative header that is not a known signal code.
    #[error("unknown signal code {code}")]
    UnknownSignal { code: i32 },

    /// The data frame body is not valid base64.
    #[error("invalid payload envelope: {0}")]
    InvalidEnvelope(String),

    /// The enveloped text is not valid JSON (or could not be encoded).
    #[error("payload JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended before a complete unit was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
