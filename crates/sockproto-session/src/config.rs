use std::time::Duration;

use sockproto_frame::DEFAULT_MAX_PAYLOAD;

/// Per-session timing and queue configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Idle time after which a keep-alive ping is sent. Default: 30 s.
    pub ping_interval: Duration,
    /// How long an unacknowledged ping may stay outstanding before the
    /// peer is declared dead. Default: 15 s.
    pub ack_timeout: Duration,
    /// Bound on waiting for the engine to stop during `close`. Default: 10 s.
    pub close_timeout: Duration,
    /// Poll window for header reads, so liveness is rechecked while idle.
    /// Default: 200 ms.
    pub read_poll: Duration,
    /// Poll interval of the send activity. Default: 50 ms.
    pub send_poll: Duration,
    /// Grace period before an acknowledge with no pending packet is
    /// treated as a protocol violation. Default: 50 ms.
    pub ack_grace: Duration,
    /// Capacity of the outbound and inbound queues. Default: 64.
    pub queue_capacity: usize,
    /// Maximum data frame payload size. Default: 16 MiB.
    pub max_payload_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            ack_timeout: Duration::from_secs(15),
            close_timeout: Duration::from_secs(10),
            read_poll: Duration::from_millis(200),
            send_poll: Duration::from_millis(50),
            ack_grace: Duration::from_millis(50),
            queue_capacity: 64,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

/// Server-side configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Configuration applied to each accepted session.
    pub session: SessionConfig,
    /// Bound on waiting for the accept loop to stop during `close`.
    /// Default: 10 s.
    pub close_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            close_timeout: Duration::from_secs(10),
        }
    }
}
