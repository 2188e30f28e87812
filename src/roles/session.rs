//! State shared by both roles: pairing lifecycle, connection, events.

use std::time::Instant;

use tracing::warn;

use crate::config::GymoteConfig;
use crate::core::events::{Event, EventQueue};
use crate::pairing::{Pairing, PairingError, PairingManager};
use crate::transport::{Connection, ConnectionEvent, ConnectionPhase, Transport, TransportEvent};
use crate::wire::Message;

/// What a role has to react to after the session handled an input.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Inbound {
    /// A new session is live.
    Started,
    /// The session ended (closed, failed or timed out).
    Ended,
    /// Application message from the peer.
    Message(Message),
}

/// A pairing manager and a connection publishing into one event queue.
#[derive(Debug)]
pub struct Gymote<T> {
    config: GymoteConfig,
    pairing: PairingManager,
    connection: Connection<T>,
    events: EventQueue<Event>,
}

impl<T: Transport> Gymote<T> {
    /// Create a session over `transport`.
    pub fn new(config: GymoteConfig, pairing: PairingManager, transport: T) -> Self {
        let connection = Connection::new(transport, &config.connection, config.profile);
        Self {
            config,
            pairing,
            connection,
            events: EventQueue::new(),
        }
    }

    /// Validate the stored pairing. A valid one is raised as
    /// [`Event::RestorablePairing`] and returned.
    pub async fn load_stored_pairing(&mut self) -> Result<Option<Pairing>, PairingError> {
        let pairing = self.pairing.load_stored_pairing().await?;
        if let Some(pairing) = &pairing {
            self.events.push(Event::RestorablePairing(pairing.clone()));
        }
        Ok(pairing)
    }

    /// Connect with `pairing`.
    pub fn connect(&mut self, pairing: Pairing) {
        self.connection.connect(pairing);
        self.process_connection_events();
    }

    /// Tear the session down without raising events.
    pub fn disconnect(&mut self) {
        self.connection.disconnect();
    }

    /// Forget the stored pairing.
    pub fn forget_pairing(&self) -> Result<(), PairingError> {
        self.pairing.erase()
    }

    /// Send a message if connected.
    pub fn send(&mut self, message: &Message) -> bool {
        self.connection.send(message)
    }

    pub(crate) fn handle_transport_event(
        &mut self,
        event: TransportEvent,
        now: Instant,
    ) -> Vec<Inbound> {
        self.connection.handle_transport_event(event, now);
        self.process_connection_events()
    }

    pub(crate) fn poll_timers(&mut self, now: Instant) -> Vec<Inbound> {
        self.connection.poll_timers(now);
        self.process_connection_events()
    }

    /// Translate connection events into application events.
    fn process_connection_events(&mut self) -> Vec<Inbound> {
        let mut inbound = Vec::new();
        while let Some(event) = self.connection.poll_event() {
            match event {
                ConnectionEvent::Connected(pairing) => {
                    if let Err(e) = self.pairing.persist(&pairing) {
                        warn!(error = %e, "failed to persist pairing");
                    }
                    self.events.push(Event::Connected);
                    inbound.push(Inbound::Started);
                }
                ConnectionEvent::Closed => {
                    self.events.push(Event::Disconnected);
                    inbound.push(Inbound::Ended);
                }
                ConnectionEvent::Timeout => {
                    self.events.push(Event::ConnectionTimeout);
                    inbound.push(Inbound::Ended);
                }
                ConnectionEvent::Error(reason) => {
                    self.events.push(Event::ConnectionError(reason));
                    inbound.push(Inbound::Ended);
                }
                ConnectionEvent::UsingFallback => self.events.push(Event::UsingFallbackTransport),
                ConnectionEvent::Message(message) => inbound.push(Inbound::Message(message)),
            }
        }
        inbound
    }

    /// Publish an application event.
    pub(crate) fn publish(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Whether the session is live.
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Connection phase.
    pub fn phase(&self) -> ConnectionPhase {
        self.connection.phase()
    }

    /// Pairing bound by the last connect.
    pub fn pairing(&self) -> Option<&Pairing> {
        self.connection.pairing()
    }

    /// Pairing manager.
    pub fn pairing_manager(&self) -> &PairingManager {
        &self.pairing
    }

    /// Configuration.
    pub fn config(&self) -> &GymoteConfig {
        &self.config
    }

    /// Earliest pending timer deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.connection.next_deadline()
    }

    /// Underlying transport.
    pub fn transport(&self) -> &T {
        self.connection.transport()
    }

    /// Underlying transport, mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        self.connection.transport_mut()
    }

    /// Take the oldest pending event.
    pub fn poll_event(&mut self) -> Option<Event> {
        self.events.poll()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::pairing::{Device, MemoryStore, MockService, PairingStore};
    use crate::transport::testing::RecordingTransport;

    fn session(store: Arc<MemoryStore>, service: MockService) -> Gymote<RecordingTransport> {
        Gymote::new(
            GymoteConfig::default(),
            PairingManager::new(Arc::new(service), store),
            RecordingTransport::default(),
        )
    }

    #[tokio::test]
    async fn test_restorable_pairing_event() {
        let record = r#"{"device":"remote","hash":"h1","code":"1"}"#;
        let store = Arc::new(MemoryStore::with_record(record));
        let mut session = session(store, MockService::issuing("1", "h1"));

        let pairing = session.load_stored_pairing().await.unwrap().unwrap();
        assert_eq!(session.poll_event(), Some(Event::RestorablePairing(pairing)));
    }

    #[test]
    fn test_connected_persists_pairing() {
        let t0 = Instant::now();
        let store = Arc::new(MemoryStore::new());
        let mut session = session(store.clone(), MockService::default());
        let pairing = Pairing::new("7", "h7", Device::Remote);

        session.connect(pairing.clone());
        assert_eq!(store.load().unwrap(), None);

        let inbound = session.handle_transport_event(TransportEvent::Connected, t0);
        assert_eq!(inbound, vec![Inbound::Started]);
        assert_eq!(session.poll_event(), Some(Event::Connected));
        assert_eq!(
            Pairing::from_record(&store.load().unwrap().unwrap()).unwrap(),
            pairing
        );
    }

    #[test]
    fn test_connection_events_are_translated() {
        let t0 = Instant::now();
        let mut session = session(Arc::new(MemoryStore::new()), MockService::default());
        session.connect(Pairing::new("7", "h7", Device::Screen));
        session.handle_transport_event(TransportEvent::Connected, t0);
        session.handle_transport_event(TransportEvent::UpgradeAttempted, t0);

        let inbound = session.poll_timers(t0 + crate::core::constants::LIVENESS_TIMEOUT);
        assert_eq!(inbound, vec![Inbound::Ended]);

        let events: Vec<_> = std::iter::from_fn(|| session.poll_event()).collect();
        assert_eq!(
            events,
            vec![
                Event::Connected,
                Event::UsingFallbackTransport,
                Event::ConnectionTimeout
            ]
        );
    }

    #[test]
    fn test_failed_open_is_connection_error() {
        let mut session = session(Arc::new(MemoryStore::new()), MockService::default());
        session.transport_mut().fail_open = true;
        session.connect(Pairing::new("7", "h7", Device::Screen));

        assert!(matches!(session.poll_event(), Some(Event::ConnectionError(_))));
        assert_eq!(session.phase(), ConnectionPhase::Disconnected);
    }
}
