use crate::error::{FrameError, Result};

/// Header code for the ACKNOWLEDGE signal.
pub const SIGNAL_ACK: i32 = -100;

/// Header code for the PING signal.
pub const SIGNAL_PING: i32 = -200;

/// A reserved control signal. Carries no body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Confirms receipt of a data frame or a ping, in receipt order.
    Acknowledge,
    /// Liveness probe; the receiver must acknowledge promptly.
    Ping,
}

impl Signal {
    /// The negative header code this signal travels as.
    pub fn code(self) -> i32 {
        match self {
            Signal::Acknowledge => SIGNAL_ACK,
            Signal::Ping => SIGNAL_PING,
        }
    }

    /// Map a header code back to a signal, if it is one of the known codes.
    pub fn from_code(code: i32) -> Option<Signal> {
        match code {
            SIGNAL_ACK => Some(Signal::Acknowledge),
            SIGNAL_PING => Some(Signal::Ping),
            _ => None,
        }
    }
}

/// A parsed 4-byte wire header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Header {
    /// A data frame follows, with this many body bytes.
    Data(usize),
    /// An out-of-band control signal; no body follows.
    Signal(Signal),
}

impl Header {
    /// Parse a raw header code. Non-negative codes are data lengths;
    /// negative codes must be known signals.
    pub fn from_code(code: i32) -> Result<Header> {
        if code >= 0 {
            Ok(Header::Data(code as usize))
        } else {
            Signal::from_code(code)
                .map(Header::Signal)
                .ok_or(FrameError::UnknownSignal { code })
        }
    }
}
