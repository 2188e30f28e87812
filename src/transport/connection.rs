//! Connection state machine.
//!
//! ```text
//!          connect()            transport Connected
//!   Idle ───────────► Connecting ───────────────────► Connected
//!                        │  ▲                             │
//!       open failed,     │  │ connect()                   │ close, error,
//!       close, error     ▼  │                             ▼ liveness timeout
//!                     Disconnected ◄──────────────────────┘
//! ```
//!
//! While connected a PING goes out every heartbeat interval and any inbound
//! payload re-arms the liveness timeout. Every timer is cancelled before a new
//! connect and on teardown.

use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use super::scheduler::{Scheduler, TimerId, TimerQueue};
use super::{Transport, TransportEvent};
use crate::config::ConnectionConfig;
use crate::core::events::EventQueue;
use crate::pairing::Pairing;
use crate::wire::{Message, Payload, WireProfile};

/// Connection lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionPhase {
    /// Never connected.
    #[default]
    Idle,
    /// Transport opening, waiting for the peer.
    Connecting,
    /// Handshake acknowledged.
    Connected,
    /// Closed, failed or timed out.
    Disconnected,
}

/// Observable connection state.
#[derive(Debug, Clone, Default)]
pub struct ConnectionState {
    /// Current phase.
    pub phase: ConnectionPhase,
    /// Pairing bound by the last `connect`.
    pub pairing: Option<Pairing>,
    /// Last liveness signal from the peer.
    pub last_pong_at: Option<Instant>,
}

impl ConnectionState {
    /// Whether the handshake has been acknowledged and the session is live.
    pub fn is_connected(&self) -> bool {
        self.phase == ConnectionPhase::Connected
    }
}

/// Timers the connection schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionTimer {
    /// Send a PING.
    Heartbeat,
    /// The peer has been silent for the whole liveness window.
    LivenessTimeout,
}

/// What the connection reports to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// Session is live with this pairing.
    Connected(Pairing),
    /// Peer closed the session.
    Closed,
    /// Liveness window elapsed without a signal.
    Timeout,
    /// Transport failure.
    Error(String),
    /// Transport fell back while attempting an upgrade.
    UsingFallback,
    /// Application message from the peer.
    Message(Message),
}

/// A transport session bound to one pairing.
#[derive(Debug)]
pub struct Connection<T, S = TimerQueue<ConnectionTimer>> {
    transport: T,
    scheduler: S,
    state: ConnectionState,
    profile: WireProfile,
    heartbeat_interval: Duration,
    liveness_timeout: Duration,
    heartbeat_timer: Option<TimerId>,
    liveness_timer: Option<TimerId>,
    events: EventQueue<ConnectionEvent>,
}

impl<T: Transport> Connection<T> {
    /// Create a connection with the default timer queue.
    pub fn new(transport: T, config: &ConnectionConfig, profile: WireProfile) -> Self {
        Self::with_scheduler(transport, TimerQueue::new(), config, profile)
    }
}

impl<T: Transport, S: Scheduler<ConnectionTimer>> Connection<T, S> {
    /// Create a connection with an injected scheduler.
    pub fn with_scheduler(
        transport: T,
        scheduler: S,
        config: &ConnectionConfig,
        profile: WireProfile,
    ) -> Self {
        Self {
            transport,
            scheduler,
            state: ConnectionState::default(),
            profile,
            heartbeat_interval: config.heartbeat_interval(),
            liveness_timeout: config.liveness_timeout(),
            heartbeat_timer: None,
            liveness_timer: None,
            events: EventQueue::new(),
        }
    }

    /// Bind `pairing` and open the transport with its hash.
    ///
    /// An existing session is torn down first. A failing open is reported as
    /// [`ConnectionEvent::Error`] and leaves the connection disconnected.
    pub fn connect(&mut self, pairing: Pairing) {
        if matches!(
            self.state.phase,
            ConnectionPhase::Connecting | ConnectionPhase::Connected
        ) {
            debug!("replacing existing session");
            self.transport.close();
        }
        self.cancel_timers();

        info!(code = %pairing.code, device = %pairing.device, "connecting");
        let token = pairing.hash.clone();
        self.state = ConnectionState {
            phase: ConnectionPhase::Connecting,
            pairing: Some(pairing),
            last_pong_at: None,
        };
        if let Err(e) = self.transport.open(&token) {
            warn!(error = %e, "transport open failed");
            self.state.phase = ConnectionPhase::Disconnected;
            self.events.push(ConnectionEvent::Error(e.to_string()));
        }
    }

    /// Feed one transport event.
    pub fn handle_transport_event(&mut self, event: TransportEvent, now: Instant) {
        match event {
            TransportEvent::Connected => self.on_connected(now),
            TransportEvent::Closed => {
                if self.is_active() {
                    info!("peer closed the connection");
                    self.teardown();
                    self.events.push(ConnectionEvent::Closed);
                }
            }
            TransportEvent::Error(reason) => {
                if self.is_active() {
                    warn!(%reason, "transport error");
                    self.teardown();
                    self.events.push(ConnectionEvent::Error(reason));
                }
            }
            TransportEvent::DataReceived(payload) => self.on_data(payload, now),
            TransportEvent::UpgradeAttempted => {
                debug!("transport upgrade attempted, using fallback");
                self.events.push(ConnectionEvent::UsingFallback);
            }
        }
    }

    /// Fire every timer due at `now`, in deadline order.
    pub fn poll_timers(&mut self, now: Instant) {
        while let Some(timer) = self.scheduler.pop_due(now) {
            match timer {
                ConnectionTimer::Heartbeat => {
                    trace!("heartbeat");
                    self.send(&Message::Ping);
                }
                ConnectionTimer::LivenessTimeout => {
                    self.liveness_timer = None;
                    if self.state.is_connected() {
                        warn!("liveness timeout");
                        self.transport.close();
                        self.teardown();
                        self.events.push(ConnectionEvent::Timeout);
                    }
                }
            }
        }
    }

    /// Send a message. Dropped unless connected; returns whether it was handed
    /// to the transport.
    pub fn send(&mut self, message: &Message) -> bool {
        if !self.state.is_connected() {
            trace!(kind = ?message.kind(), "not connected, dropping message");
            return false;
        }
        let Some(payload) = message.encode(self.profile) else {
            return false;
        };
        match self.transport.send(payload) {
            Ok(()) => true,
            Err(e) if e.is_fatal() => {
                warn!(error = %e, "transport failed on send");
                self.transport.close();
                self.teardown();
                self.events.push(ConnectionEvent::Error(e.to_string()));
                false
            }
            Err(e) => {
                debug!(error = %e, "payload dropped");
                false
            }
        }
    }

    /// Tear down without raising events.
    pub fn disconnect(&mut self) {
        if self.is_active() {
            info!("disconnecting");
        }
        self.transport.close();
        self.teardown();
    }

    /// Whether the session is live.
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Current state.
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Current phase.
    pub fn phase(&self) -> ConnectionPhase {
        self.state.phase
    }

    /// Pairing bound by the last `connect`.
    pub fn pairing(&self) -> Option<&Pairing> {
        self.state.pairing.as_ref()
    }

    /// Outbound wire profile.
    pub fn profile(&self) -> WireProfile {
        self.profile
    }

    /// Earliest pending timer deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    /// Underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Underlying transport, mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Take the oldest pending event.
    pub fn poll_event(&mut self) -> Option<ConnectionEvent> {
        self.events.poll()
    }

    fn is_active(&self) -> bool {
        matches!(
            self.state.phase,
            ConnectionPhase::Connecting | ConnectionPhase::Connected
        )
    }

    fn on_connected(&mut self, now: Instant) {
        if self.state.phase != ConnectionPhase::Connecting {
            debug!(phase = ?self.state.phase, "ignoring stale connected event");
            return;
        }
        let Some(pairing) = self.state.pairing.clone() else {
            return;
        };

        self.state.phase = ConnectionPhase::Connected;
        self.state.last_pong_at = Some(now);
        self.heartbeat_timer = Some(self.scheduler.schedule_repeating(
            now,
            self.heartbeat_interval,
            ConnectionTimer::Heartbeat,
        ));
        self.arm_liveness(now);

        info!(code = %pairing.code, "connected");
        self.events.push(ConnectionEvent::Connected(pairing));
    }

    fn on_data(&mut self, payload: Payload, now: Instant) {
        if !self.state.is_connected() {
            trace!(len = payload.len(), "data outside a session, dropping");
            return;
        }

        self.state.last_pong_at = Some(now);
        self.arm_liveness(now);

        match Message::decode(&payload) {
            Ok(Message::Ping) => {
                self.send(&Message::Pong);
            }
            Ok(Message::Pong) => trace!("pong"),
            Ok(Message::Unknown { kind }) => debug!(%kind, "ignoring unknown message"),
            Ok(message) => self.events.push(ConnectionEvent::Message(message)),
            Err(e) => debug!(error = %e, "dropping undecodable payload"),
        }
    }

    fn arm_liveness(&mut self, now: Instant) {
        if let Some(id) = self.liveness_timer.take() {
            self.scheduler.cancel(id);
        }
        self.liveness_timer = Some(self.scheduler.schedule_once(
            now,
            self.liveness_timeout,
            ConnectionTimer::LivenessTimeout,
        ));
    }

    fn cancel_timers(&mut self) {
        for id in [self.heartbeat_timer.take(), self.liveness_timer.take()]
            .into_iter()
            .flatten()
        {
            self.scheduler.cancel(id);
        }
    }

    fn teardown(&mut self) {
        self.cancel_timers();
        if self.state.phase != ConnectionPhase::Idle {
            self.state.phase = ConnectionPhase::Disconnected;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pairing::Device;
    use crate::transport::testing::RecordingTransport;
    use crate::wire::RemoteDataFrame;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn pairing() -> Pairing {
        Pairing::new("123456", "hash-1", Device::Screen)
    }

    fn connection() -> Connection<RecordingTransport> {
        Connection::new(
            RecordingTransport::default(),
            &ConnectionConfig::default(),
            WireProfile::Text,
        )
    }

    fn connected(t0: Instant) -> Connection<RecordingTransport> {
        let mut conn = connection();
        conn.connect(pairing());
        conn.handle_transport_event(TransportEvent::Connected, t0);
        assert_eq!(conn.poll_event(), Some(ConnectionEvent::Connected(pairing())));
        conn
    }

    fn drain(conn: &mut Connection<RecordingTransport>) -> Vec<ConnectionEvent> {
        std::iter::from_fn(|| conn.poll_event()).collect()
    }

    #[test]
    fn test_connect_binds_token() {
        let t0 = Instant::now();
        let mut conn = connection();
        assert_eq!(conn.phase(), ConnectionPhase::Idle);

        conn.connect(pairing());
        assert_eq!(conn.phase(), ConnectionPhase::Connecting);
        assert!(!conn.is_connected());
        assert_eq!(conn.transport().opened, vec!["hash-1".to_string()]);

        conn.handle_transport_event(TransportEvent::Connected, t0);
        assert!(conn.is_connected());
        assert_eq!(conn.state().last_pong_at, Some(t0));
    }

    #[test]
    fn test_failed_open_is_connection_error() {
        let mut conn = connection();
        conn.transport_mut().fail_open = true;
        conn.connect(pairing());

        assert_eq!(conn.phase(), ConnectionPhase::Disconnected);
        assert!(matches!(conn.poll_event(), Some(ConnectionEvent::Error(_))));
    }

    #[test]
    fn test_heartbeat_sends_ping() {
        let t0 = Instant::now();
        let mut conn = connected(t0);

        conn.poll_timers(t0 + ms(4999));
        assert_eq!(conn.transport().sent_kind("PING"), 0);

        conn.poll_timers(t0 + ms(5000));
        assert_eq!(conn.transport().sent_kind("PING"), 1);

        conn.handle_transport_event(
            TransportEvent::DataReceived(Payload::Text("PONG~".into())),
            t0 + ms(5010),
        );
        conn.poll_timers(t0 + ms(10000));
        assert_eq!(conn.transport().sent_kind("PING"), 2);
        assert!(conn.is_connected());
    }

    #[test]
    fn test_liveness_reset_at_9999() {
        let t0 = Instant::now();
        let mut conn = connected(t0);

        conn.handle_transport_event(
            TransportEvent::DataReceived(Payload::Text("PONG~".into())),
            t0 + ms(9999),
        );
        conn.poll_timers(t0 + ms(10000));
        assert!(conn.is_connected());
        assert!(drain(&mut conn).is_empty());

        conn.poll_timers(t0 + ms(19998));
        assert!(conn.is_connected());

        conn.poll_timers(t0 + ms(19999));
        assert!(!conn.is_connected());
        assert_eq!(drain(&mut conn), vec![ConnectionEvent::Timeout]);
    }

    #[test]
    fn test_timeout_raised_exactly_once() {
        let t0 = Instant::now();
        let mut conn = connected(t0);

        conn.poll_timers(t0 + ms(10000));
        conn.poll_timers(t0 + ms(20000));
        conn.poll_timers(t0 + ms(60000));

        assert_eq!(drain(&mut conn), vec![ConnectionEvent::Timeout]);
        assert_eq!(conn.phase(), ConnectionPhase::Disconnected);
        assert_eq!(conn.next_deadline(), None);
        assert_eq!(conn.transport().closes, 1);
    }

    #[test]
    fn test_undecodable_payload_counts_as_liveness() {
        let t0 = Instant::now();
        let mut conn = connected(t0);

        conn.handle_transport_event(
            TransportEvent::DataReceived(Payload::Binary(vec![0x03, 0xff])),
            t0 + ms(8000),
        );
        conn.poll_timers(t0 + ms(10000));
        assert!(conn.is_connected());
        assert!(drain(&mut conn).is_empty());
    }

    #[test]
    fn test_ping_is_answered() {
        let t0 = Instant::now();
        let mut conn = connected(t0);

        conn.handle_transport_event(
            TransportEvent::DataReceived(Payload::Text("PING~".into())),
            t0,
        );
        assert_eq!(conn.transport().sent, vec![Payload::Text("PONG~".into())]);
        assert!(drain(&mut conn).is_empty());
    }

    #[test]
    fn test_messages_are_forwarded() {
        let t0 = Instant::now();
        let mut conn = connected(t0);
        let frame = RemoteDataFrame::new(120, 80, false, 0, 0);

        conn.handle_transport_event(
            TransportEvent::DataReceived(Payload::Text("REMOTE_DATA~120;80;0;0;0".into())),
            t0,
        );
        conn.handle_transport_event(
            TransportEvent::DataReceived(Payload::Text("Orientation~1;2".into())),
            t0,
        );
        assert_eq!(
            drain(&mut conn),
            vec![ConnectionEvent::Message(Message::RemoteData(frame))]
        );
    }

    #[test]
    fn test_clean_close_raises_no_timeout_or_error() {
        let t0 = Instant::now();
        let mut conn = connected(t0);

        conn.handle_transport_event(TransportEvent::Closed, t0 + ms(100));
        conn.poll_timers(t0 + ms(60000));

        assert_eq!(drain(&mut conn), vec![ConnectionEvent::Closed]);
        assert_eq!(conn.phase(), ConnectionPhase::Disconnected);
    }

    #[test]
    fn test_transport_error() {
        let t0 = Instant::now();
        let mut conn = connected(t0);

        conn.handle_transport_event(TransportEvent::Error("reset".into()), t0);
        conn.handle_transport_event(TransportEvent::Error("again".into()), t0);
        conn.poll_timers(t0 + ms(60000));

        assert_eq!(drain(&mut conn), vec![ConnectionEvent::Error("reset".into())]);
    }

    #[test]
    fn test_upgrade_keeps_state() {
        let t0 = Instant::now();
        let mut conn = connected(t0);
        conn.handle_transport_event(TransportEvent::UpgradeAttempted, t0);
        assert_eq!(conn.poll_event(), Some(ConnectionEvent::UsingFallback));
        assert!(conn.is_connected());
    }

    #[test]
    fn test_send_dropped_unless_connected() {
        let t0 = Instant::now();
        let mut conn = connection();
        assert!(!conn.send(&Message::Ping));

        conn.connect(pairing());
        assert!(!conn.send(&Message::Ping));

        conn.handle_transport_event(TransportEvent::Connected, t0);
        assert!(conn.send(&Message::Ping));
        assert!(!conn.send(&Message::Unknown { kind: "X".into() }));
        assert_eq!(conn.transport().sent.len(), 1);
    }

    #[test]
    fn test_reconnect_cancels_heartbeat() {
        let t0 = Instant::now();
        let mut conn = connected(t0);

        conn.connect(Pairing::new("2", "hash-2", Device::Screen));
        assert_eq!(conn.transport().closes, 1);
        conn.handle_transport_event(TransportEvent::Connected, t0 + ms(1000));

        conn.poll_timers(t0 + ms(5000));
        assert_eq!(conn.transport().sent_kind("PING"), 0);

        conn.poll_timers(t0 + ms(6000));
        assert_eq!(conn.transport().sent_kind("PING"), 1);
        assert_eq!(conn.pairing().map(|p| p.hash.as_str()), Some("hash-2"));
    }

    #[test]
    fn test_disconnect_is_silent() {
        let t0 = Instant::now();
        let mut conn = connected(t0);

        conn.disconnect();
        conn.poll_timers(t0 + ms(60000));

        assert!(drain(&mut conn).is_empty());
        assert_eq!(conn.phase(), ConnectionPhase::Disconnected);
        assert_eq!(conn.transport().closes, 1);
    }

    #[test]
    fn test_stale_connected_is_ignored() {
        let t0 = Instant::now();
        let mut conn = connection();
        conn.handle_transport_event(TransportEvent::Connected, t0);
        assert_eq!(conn.phase(), ConnectionPhase::Idle);
        assert!(conn.poll_event().is_none());
    }

    #[test]
    fn test_full_send_buffer_drops_payload() {
        let t0 = Instant::now();
        let mut conn = connected(t0);
        conn.transport_mut().send_error = Some(std::io::ErrorKind::WouldBlock);

        assert!(!conn.send(&Message::Ping));
        assert!(conn.is_connected());
        assert!(drain(&mut conn).is_empty());
    }

    #[test]
    fn test_fatal_send_error_ends_session() {
        let t0 = Instant::now();
        let mut conn = connected(t0);
        conn.transport_mut().send_error = Some(std::io::ErrorKind::ConnectionRefused);

        conn.poll_timers(t0 + ms(5000));
        assert_eq!(conn.phase(), ConnectionPhase::Disconnected);
        assert!(matches!(drain(&mut conn).as_slice(), [ConnectionEvent::Error(_)]));
        assert_eq!(conn.transport().closes, 1);

        conn.poll_timers(t0 + ms(60000));
        assert!(drain(&mut conn).is_empty());
    }
}
