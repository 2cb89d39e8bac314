//! Acknowledged sessions with keep-alive over a byte stream.
//!
//! This is the layer external code touches. A [`Session`] wraps one
//! connected TCP stream and exposes `send`/`receive` for typed messages,
//! with every data frame acknowledged by the peer and a background
//! ping/acknowledge cycle that detects a silently dead peer.

pub mod config;
pub mod connector;
mod engine;
pub mod error;
pub mod listener;
pub mod session;

pub use config::{ServerConfig, SessionConfig};
pub use connector::{connect, connect_with_config};
pub use error::{Result, SessionError};
pub use listener::{start_server, start_server_with_config, ServerHandle};
pub use session::Session;

pub use sockproto_codec::{CustomValue, Fields, FnCodec, TypeCodec, Value};
