//! Transport errors.

use std::io;

use thiserror::Error;

/// Errors raised by a [`Transport`](super::Transport).
#[derive(Debug, Error)]
pub enum TransportError {
    /// Socket-level failure.
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),

    /// The transport is not open.
    #[error("transport not open")]
    NotOpen,

    /// The peer went away.
    #[error("peer closed the transport")]
    PeerClosed,

    /// The pair token was rejected or is malformed.
    #[error("invalid pair token: {0}")]
    InvalidToken(String),

    /// The open handshake did not complete in time.
    #[error("handshake timed out")]
    HandshakeTimeout,

    /// A datagram or payload exceeds the transport limit.
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Payload size.
        size: usize,
        /// Maximum allowed.
        max: usize,
    },

    /// Received a datagram this transport cannot parse.
    #[error("malformed datagram: {0}")]
    Malformed(String),
}

impl TransportError {
    /// Whether the transport failed and will not recover.
    ///
    /// Oversized or malformed datagrams affect one datagram only. Not being
    /// open and a departed peer are states the owner learns about through
    /// transport events. A full socket buffer only drops the payload.
    pub fn is_fatal(&self) -> bool {
        match self {
            TransportError::Io(e) => !matches!(
                e.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
            ),
            TransportError::InvalidToken(_) | TransportError::HandshakeTimeout => true,
            TransportError::NotOpen
            | TransportError::PeerClosed
            | TransportError::PayloadTooLarge { .. }
            | TransportError::Malformed(_) => false,
        }
    }
}
