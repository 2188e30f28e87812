//! In-process transport pair.
//!
//! Two linked ends share one link. Each end reports on its own event channel;
//! the pair connects once both ends are open with the same token.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;

use super::{Transport, TransportError, TransportEvent, TransportEventSender, TransportEvents, event_channel};
use crate::wire::Payload;

#[derive(Debug)]
struct End {
    token: Option<String>,
    connected: bool,
    events: TransportEventSender,
}

impl End {
    fn emit(&self, event: TransportEvent) {
        // The owner may have dropped its receiver; nothing to report to then.
        let _ = self.events.send(event);
    }
}

#[derive(Debug)]
struct Link {
    ends: [End; 2],
}

/// One end of an in-process transport pair.
#[derive(Debug, Clone)]
pub struct LoopbackTransport {
    link: Arc<Mutex<Link>>,
    side: usize,
}

impl LoopbackTransport {
    /// Create two linked ends and their event channels.
    pub fn pair() -> ((Self, TransportEvents), (Self, TransportEvents)) {
        let (tx_a, rx_a) = event_channel();
        let (tx_b, rx_b) = event_channel();
        let link = Arc::new(Mutex::new(Link {
            ends: [
                End {
                    token: None,
                    connected: false,
                    events: tx_a,
                },
                End {
                    token: None,
                    connected: false,
                    events: tx_b,
                },
            ],
        }));

        (
            (
                Self {
                    link: link.clone(),
                    side: 0,
                },
                rx_a,
            ),
            (Self { link, side: 1 }, rx_b),
        )
    }

    fn link(&self) -> MutexGuard<'_, Link> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn peer(&self) -> usize {
        1 - self.side
    }

    /// Whether this end is joined with its peer.
    pub fn is_connected(&self) -> bool {
        self.link().ends[self.side].connected
    }

    /// Report an upgrade attempt on this end.
    pub fn signal_upgrade(&self) {
        self.link().ends[self.side].emit(TransportEvent::UpgradeAttempted);
    }

    /// Fail both ends.
    pub fn fail(&self, reason: &str) {
        let mut link = self.link();
        for end in link.ends.iter_mut() {
            if end.token.take().is_some() {
                end.connected = false;
                end.emit(TransportEvent::Error(reason.to_string()));
            }
        }
    }
}

impl Transport for LoopbackTransport {
    fn open(&mut self, token: &str) -> Result<(), TransportError> {
        if token.is_empty() {
            return Err(TransportError::InvalidToken("empty token".to_string()));
        }

        let (side, peer) = (self.side, self.peer());
        let mut link = self.link();
        link.ends[side].token = Some(token.to_string());
        link.ends[side].connected = false;

        if link.ends[peer].token.as_deref() == Some(token) {
            trace!(side, "loopback joined");
            for end in link.ends.iter_mut() {
                end.connected = true;
                end.emit(TransportEvent::Connected);
            }
        }
        Ok(())
    }

    fn send(&mut self, payload: Payload) -> Result<(), TransportError> {
        let link = self.link();
        if !link.ends[self.side].connected {
            return Err(TransportError::NotOpen);
        }
        link.ends[self.peer()].emit(TransportEvent::DataReceived(payload));
        Ok(())
    }

    fn close(&mut self) {
        let (side, peer) = (self.side, self.peer());
        let mut link = self.link();
        let was_connected = link.ends[side].connected;
        link.ends[side].token = None;
        link.ends[side].connected = false;

        if was_connected && link.ends[peer].connected {
            link.ends[peer].connected = false;
            link.ends[peer].emit(TransportEvent::Closed);
        }
    }
}
