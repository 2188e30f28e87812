//! Transport layer.
//!
//! - [`Transport`]: the open/send/close contract every carrier implements
//! - [`Connection`]: pairing handshake, heartbeat and liveness on top of it
//! - [`Scheduler`] / [`TimerQueue`]: the deadline timers the connection runs on
//! - [`LoopbackTransport`]: in-process linked pair
//! - [`UdpTransport`]: datagram carrier with a token-matched open handshake
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        GymoteScreen / GymoteRemote      │
//! ├─────────────────────────────────────────┤
//! │   Connection (heartbeat, liveness)      │  ← This module
//! ├─────────────────────────────────────────┤
//! │   Transport (loopback, UDP, ...)        │  ← This module
//! └─────────────────────────────────────────┘
//! ```
//!
//! Transports push what happens to them into a [`TransportEvents`] channel;
//! the owner feeds each event to [`Connection::handle_transport_event`].

mod connection;
mod error;
mod loopback;
mod scheduler;
#[cfg(feature = "udp")]
mod udp;

use tokio::sync::mpsc;

use crate::wire::Payload;

pub use connection::{Connection, ConnectionEvent, ConnectionPhase, ConnectionState, ConnectionTimer};
pub use error::TransportError;
pub use loopback::LoopbackTransport;
pub use scheduler::{Scheduler, TimerId, TimerQueue};
#[cfg(feature = "udp")]
pub use udp::{Datagram, UdpTransport};

/// Something that happened to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Both peers joined with the same pair token.
    Connected,
    /// The peer closed the transport.
    Closed,
    /// The transport failed and is unusable.
    Error(String),
    /// A payload arrived.
    DataReceived(Payload),
    /// A protocol upgrade is being attempted; the fallback carrier is in use.
    UpgradeAttempted,
}

/// Sender half transports publish their events on.
pub type TransportEventSender = mpsc::UnboundedSender<TransportEvent>;

/// Receiver half the owner drains.
pub type TransportEvents = mpsc::UnboundedReceiver<TransportEvent>;

/// Create a transport event channel.
pub fn event_channel() -> (TransportEventSender, TransportEvents) {
    mpsc::unbounded_channel()
}

/// Bidirectional carrier between one remote and one screen.
///
/// Calls never block. Closing locally raises no event; only a peer-initiated
/// close is reported as [`TransportEvent::Closed`].
pub trait Transport {
    /// Start joining the peer identified by `token`. Completion is reported
    /// as [`TransportEvent::Connected`].
    fn open(&mut self, token: &str) -> Result<(), TransportError>;

    /// Send a payload to the peer.
    fn send(&mut self, payload: Payload) -> Result<(), TransportError>;

    /// Close the transport. Idempotent.
    fn close(&mut self);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&mut self, token: &str) -> Result<(), TransportError> {
        (**self).open(token)
    }

    fn send(&mut self, payload: Payload) -> Result<(), TransportError> {
        (**self).send(payload)
    }

    fn close(&mut self) {
        (**self).close()
    }
}
