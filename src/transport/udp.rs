//! UDP datagram transport.
//!
//! One side listens, the other dials. The dialer repeats HELLO with the pair
//! token until the listener answers WELCOME with the same token; from then on
//! both sides only accept datagrams from each other.
//!
//! Datagram layout:
//! ```text
//! +--------+--------+---------------------+
//! | 0x00   | Op     | Pair token (UTF-8)  |   control: HELLO=1 WELCOME=2 BYE=3
//! +--------+--------+---------------------+
//! | 0x01   | Text payload (UTF-8)         |
//! +--------+------------------------------+
//! | 0x02   | Binary payload               |
//! +--------+------------------------------+
//! ```

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use super::{Transport, TransportError, TransportEvent, TransportEventSender, TransportEvents, event_channel};
use crate::wire::Payload;

/// UDP transport constants.
pub mod constants {
    use std::time::Duration;

    // =========================================================================
    // Datagram Types
    // =========================================================================

    /// Control datagram (handshake, close).
    pub const DATAGRAM_CONTROL: u8 = 0x00;

    /// Text payload datagram.
    pub const DATAGRAM_TEXT: u8 = 0x01;

    /// Binary payload datagram.
    pub const DATAGRAM_BINARY: u8 = 0x02;

    // =========================================================================
    // Control Operations
    // =========================================================================

    /// Dialer asks to join the pair token.
    pub const OP_HELLO: u8 = 1;

    /// Listener accepts the join.
    pub const OP_WELCOME: u8 = 2;

    /// Either side closes.
    pub const OP_BYE: u8 = 3;

    // =========================================================================
    // Limits and Timing
    // =========================================================================

    /// Largest UDP payload over IPv4.
    pub const MAX_DATAGRAM_SIZE: usize = 65507;

    /// Receive buffer size.
    pub const RECV_BUFFER_SIZE: usize = 65535;

    /// Longest accepted pair token in bytes.
    pub const MAX_TOKEN_LEN: usize = 255;

    /// Interval between HELLO retransmissions.
    pub const HELLO_RETRY_INTERVAL: Duration = Duration::from_millis(250);

    /// Time the dialer waits for WELCOME.
    pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
}

use constants::*;

/// A parsed UDP datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Datagram {
    /// Join request.
    Hello(String),
    /// Join accepted.
    Welcome(String),
    /// Close notice.
    Bye(String),
    /// Application payload.
    Data(Payload),
}

impl Datagram {
    /// Serialize.
    pub fn encode(&self) -> Vec<u8> {
        let control = |op: u8, token: &str| {
            let mut buf = Vec::with_capacity(2 + token.len());
            buf.push(DATAGRAM_CONTROL);
            buf.push(op);
            buf.extend_from_slice(token.as_bytes());
            buf
        };

        match self {
            Datagram::Hello(token) => control(OP_HELLO, token),
            Datagram::Welcome(token) => control(OP_WELCOME, token),
            Datagram::Bye(token) => control(OP_BYE, token),
            Datagram::Data(Payload::Text(text)) => {
                let mut buf = Vec::with_capacity(1 + text.len());
                buf.push(DATAGRAM_TEXT);
                buf.extend_from_slice(text.as_bytes());
                buf
            }
            Datagram::Data(Payload::Binary(bytes)) => {
                let mut buf = Vec::with_capacity(1 + bytes.len());
                buf.push(DATAGRAM_BINARY);
                buf.extend_from_slice(bytes);
                buf
            }
        }
    }

    /// Parse.
    pub fn decode(data: &[u8]) -> Result<Self, TransportError> {
        let (&kind, body) = data
            .split_first()
            .ok_or_else(|| TransportError::Malformed("empty datagram".to_string()))?;

        let utf8 = |bytes: &[u8]| {
            String::from_utf8(bytes.to_vec())
                .map_err(|_| TransportError::Malformed("invalid UTF-8".to_string()))
        };

        match kind {
            DATAGRAM_CONTROL => {
                let (&op, token) = body
                    .split_first()
                    .ok_or_else(|| TransportError::Malformed("control without op".to_string()))?;
                let token = utf8(token)?;
                match op {
                    OP_HELLO => Ok(Datagram::Hello(token)),
                    OP_WELCOME => Ok(Datagram::Welcome(token)),
                    OP_BYE => Ok(Datagram::Bye(token)),
                    other => Err(TransportError::Malformed(format!("unknown op {other}"))),
                }
            }
            DATAGRAM_TEXT => Ok(Datagram::Data(Payload::Text(utf8(body)?))),
            DATAGRAM_BINARY => Ok(Datagram::Data(Payload::Binary(body.to_vec()))),
            other => Err(TransportError::Malformed(format!(
                "unknown datagram type 0x{other:02x}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Listen,
    Dial(SocketAddr),
}

#[derive(Debug, Default)]
struct Session {
    token: Option<String>,
    peer: Option<SocketAddr>,
    connected: bool,
}

type SharedSession = Arc<Mutex<Session>>;

fn lock(session: &SharedSession) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// [`Transport`] over a tokio UDP socket.
#[derive(Debug)]
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    mode: Mode,
    session: SharedSession,
    events: TransportEventSender,
    task: Option<JoinHandle<()>>,
}

impl UdpTransport {
    /// Bind `addr` and wait for a dialer.
    pub async fn listen(addr: SocketAddr) -> io::Result<(Self, TransportEvents)> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self::from_socket(socket, Mode::Listen))
    }

    /// Bind an ephemeral port and dial `peer`.
    pub async fn dial(peer: SocketAddr) -> io::Result<(Self, TransportEvents)> {
        let unspecified = match peer.ip() {
            IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        };
        let socket = UdpSocket::bind(SocketAddr::new(unspecified, 0)).await?;
        Ok(Self::from_socket(socket, Mode::Dial(peer)))
    }

    fn from_socket(socket: UdpSocket, mode: Mode) -> (Self, TransportEvents) {
        let (events, rx) = event_channel();
        let transport = Self {
            socket: Arc::new(socket),
            mode,
            session: SharedSession::default(),
            events,
            task: None,
        };
        (transport, rx)
    }

    /// Local socket address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Address of the joined peer.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        lock(&self.session).peer
    }

    /// Whether the handshake has completed.
    pub fn is_connected(&self) -> bool {
        lock(&self.session).connected
    }

    fn stop_task(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Transport for UdpTransport {
    fn open(&mut self, token: &str) -> Result<(), TransportError> {
        if token.is_empty() || token.len() > MAX_TOKEN_LEN {
            return Err(TransportError::InvalidToken(format!(
                "token must be 1..={MAX_TOKEN_LEN} bytes"
            )));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TransportError::Io(io::Error::other(e)))?;

        self.stop_task();
        {
            let mut session = lock(&self.session);
            *session = Session {
                token: Some(token.to_string()),
                peer: match self.mode {
                    Mode::Dial(peer) => Some(peer),
                    Mode::Listen => None,
                },
                connected: false,
            };
        }

        debug!(mode = ?self.mode, "opening UDP transport");
        let worker = Worker {
            socket: self.socket.clone(),
            mode: self.mode,
            token: token.to_string(),
            session: self.session.clone(),
            events: self.events.clone(),
        };
        self.task = Some(runtime.spawn(worker.run()));
        Ok(())
    }

    fn send(&mut self, payload: Payload) -> Result<(), TransportError> {
        let peer = {
            let session = lock(&self.session);
            match (session.connected, session.peer) {
                (true, Some(peer)) => peer,
                _ => return Err(TransportError::NotOpen),
            }
        };

        let datagram = Datagram::Data(payload).encode();
        if datagram.len() > MAX_DATAGRAM_SIZE {
            return Err(TransportError::PayloadTooLarge {
                size: datagram.len(),
                max: MAX_DATAGRAM_SIZE,
            });
        }
        self.socket.try_send_to(&datagram, peer)?;
        Ok(())
    }

    fn close(&mut self) {
        self.stop_task();
        let session = std::mem::take(&mut *lock(&self.session));
        if let (true, Some(peer), Some(token)) = (session.connected, session.peer, session.token) {
            if let Err(e) = self.socket.try_send_to(&Datagram::Bye(token).encode(), peer) {
                debug!(error = %e, "failed to send BYE");
            }
            info!(%peer, "UDP transport closed");
        }
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        self.stop_task();
    }
}

/// Receive loop of one open transport.
struct Worker {
    socket: Arc<UdpSocket>,
    mode: Mode,
    token: String,
    session: SharedSession,
    events: TransportEventSender,
}

impl Worker {
    async fn run(self) {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        let handshake_deadline = time::Instant::now() + HANDSHAKE_TIMEOUT;
        let mut hello = time::interval(HELLO_RETRY_INTERVAL);
        hello.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let dialing = matches!(self.mode, Mode::Dial(_)) && !lock(&self.session).connected;

            tokio::select! {
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok((len, from)) => {
                        if !self.handle(&buf[..len], from) {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "UDP receive failed");
                        self.fail(e.to_string());
                        break;
                    }
                },
                _ = hello.tick(), if dialing => {
                    if time::Instant::now() >= handshake_deadline {
                        self.fail(TransportError::HandshakeTimeout.to_string());
                        break;
                    }
                    if let Mode::Dial(peer) = self.mode {
                        trace!(%peer, "sending HELLO");
                        if let Err(e) = self.socket.send_to(&Datagram::Hello(self.token.clone()).encode(), peer).await {
                            debug!(error = %e, "HELLO send failed");
                        }
                    }
                }
            }
        }
    }

    /// Handle one datagram. Returns false when the session is over.
    fn handle(&self, data: &[u8], from: SocketAddr) -> bool {
        let datagram = match Datagram::decode(data) {
            Ok(datagram) => datagram,
            Err(e) => {
                debug!(error = %e, %from, "dropping datagram");
                return true;
            }
        };

        let mut session = lock(&self.session);
        let from_peer = session.peer == Some(from);

        match datagram {
            Datagram::Hello(token) if self.mode == Mode::Listen && token == self.token => {
                if session.connected && !from_peer {
                    trace!(%from, "already joined, ignoring HELLO");
                    return true;
                }
                if let Err(e) = self
                    .socket
                    .try_send_to(&Datagram::Welcome(token).encode(), from)
                {
                    debug!(error = %e, "WELCOME send failed");
                }
                if !session.connected {
                    session.peer = Some(from);
                    session.connected = true;
                    info!(peer = %from, "UDP peer joined");
                    self.emit(TransportEvent::Connected);
                }
            }
            Datagram::Welcome(token) if from_peer && token == self.token => {
                if !session.connected {
                    session.connected = true;
                    info!(peer = %from, "UDP handshake complete");
                    self.emit(TransportEvent::Connected);
                }
            }
            Datagram::Bye(token) if from_peer && session.connected && token == self.token => {
                session.connected = false;
                info!(peer = %from, "UDP peer closed");
                self.emit(TransportEvent::Closed);
                return false;
            }
            Datagram::Data(payload) if from_peer && session.connected => {
                self.emit(TransportEvent::DataReceived(payload));
            }
            other => trace!(%from, datagram = ?other, "ignoring datagram"),
        }
        true
    }

    fn fail(&self, reason: String) {
        lock(&self.session).connected = false;
        self.emit(TransportEvent::Error(reason));
    }

    fn emit(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    async fn next(events: &mut TransportEvents) -> TransportEvent {
        time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for transport event")
            .expect("event channel closed")
    }

    #[test]
    fn test_datagram_layout() {
        assert_eq!(
            hex::encode(Datagram::Hello("ab".into()).encode()),
            "00016162"
        );
        assert_eq!(
            hex::encode(Datagram::Data(Payload::Text("PING~".into())).encode()),
            "0150494e477e"
        );
        assert_eq!(
            hex::encode(Datagram::Data(Payload::Binary(vec![0x01])).encode()),
            "0201"
        );
    }

    #[test]
    fn test_datagram_decode() {
        for datagram in [
            Datagram::Hello("tok".into()),
            Datagram::Welcome("tok".into()),
            Datagram::Bye("tok".into()),
            Datagram::Data(Payload::Text("x~1".into())),
            Datagram::Data(Payload::Binary(vec![])),
        ] {
            assert_eq!(Datagram::decode(&datagram.encode()).unwrap(), datagram);
        }

        assert!(Datagram::decode(&[]).is_err());
        assert!(Datagram::decode(&[DATAGRAM_CONTROL]).is_err());
        assert!(Datagram::decode(&[DATAGRAM_CONTROL, 9]).is_err());
        assert!(Datagram::decode(&[DATAGRAM_TEXT, 0xff]).is_err());
        assert!(!Datagram::decode(&[0x7f]).unwrap_err().is_fatal());
    }

    #[tokio::test]
    async fn test_send_before_open() {
        let (mut transport, _events) = UdpTransport::listen("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        assert!(matches!(
            transport.send(Payload::Text("x".into())),
            Err(TransportError::NotOpen)
        ));
        assert!(matches!(transport.open(""), Err(TransportError::InvalidToken(_))));
    }

    #[tokio::test]
    async fn test_handshake_data_and_close() {
        let (mut screen, mut screen_events) =
            UdpTransport::listen("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = screen.local_addr().unwrap();
        let (mut remote, mut remote_events) = UdpTransport::dial(addr).await.unwrap();

        screen.open("pair-token").unwrap();
        remote.open("pair-token").unwrap();

        assert_eq!(next(&mut screen_events).await, TransportEvent::Connected);
        assert_eq!(next(&mut remote_events).await, TransportEvent::Connected);
        assert!(screen.is_connected());
        assert_eq!(screen.peer_addr().map(|a| a.port()), remote.local_addr().ok().map(|a| a.port()));

        remote
            .send(Payload::Text("REMOTE_DATA~1;2;0;0;0".into()))
            .unwrap();
        assert_eq!(
            next(&mut screen_events).await,
            TransportEvent::DataReceived(Payload::Text("REMOTE_DATA~1;2;0;0;0".into()))
        );

        screen.send(Payload::Binary(vec![0x01])).unwrap();
        assert_eq!(
            next(&mut remote_events).await,
            TransportEvent::DataReceived(Payload::Binary(vec![0x01]))
        );

        remote.close();
        assert_eq!(next(&mut screen_events).await, TransportEvent::Closed);
        assert!(!remote.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dialer_gives_up_after_handshake_timeout() {
        use crate::config::ConnectionConfig;
        use crate::pairing::{Device, Pairing};
        use crate::transport::{Connection, ConnectionEvent, ConnectionPhase};
        use crate::wire::WireProfile;

        // Bound but never answers HELLO.
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let (remote, mut events) = UdpTransport::dial(silent.local_addr().unwrap())
            .await
            .unwrap();
        let mut conn = Connection::new(remote, &ConnectionConfig::default(), WireProfile::Text);

        let started = time::Instant::now();
        conn.connect(Pairing::new("1", "pair-token", Device::Remote));
        assert_eq!(conn.phase(), ConnectionPhase::Connecting);

        let event = time::timeout(Duration::from_secs(60), events.recv())
            .await
            .expect("no handshake outcome")
            .expect("event channel closed");
        assert!(started.elapsed() >= HANDSHAKE_TIMEOUT);
        assert_eq!(
            event,
            TransportEvent::Error(TransportError::HandshakeTimeout.to_string())
        );

        conn.handle_transport_event(event, std::time::Instant::now());
        assert_eq!(conn.phase(), ConnectionPhase::Disconnected);
        assert_eq!(
            conn.poll_event(),
            Some(ConnectionEvent::Error(TransportError::HandshakeTimeout.to_string()))
        );
        assert!(!conn.transport().is_connected());
    }
}
