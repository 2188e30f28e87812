//! The screen role.

use std::time::{Duration, Instant};

use super::Role;
use super::session::{Gymote, Inbound};
use crate::config::GymoteConfig;
#[cfg(feature = "http")]
use crate::core::error::GymoteResult;
use crate::core::events::Event;
use crate::motion::ScreenPipeline;
use crate::pairing::{Pairing, PairingError, PairingManager};
use crate::transport::{Transport, TransportEvent};
use crate::wire::{Message, Viewport};

/// Display side: requests a pairing, receives frames, emits pointer events.
#[derive(Debug)]
pub struct GymoteScreen<T> {
    session: Gymote<T>,
    pipeline: ScreenPipeline,
}

impl<T: Transport> GymoteScreen<T> {
    /// Create a screen over `transport`.
    pub fn new(config: GymoteConfig, pairing: PairingManager, transport: T) -> Self {
        let pipeline = ScreenPipeline::new(&config.motion);
        Self {
            session: Gymote::new(config, pairing, transport),
            pipeline,
        }
    }

    /// Create a screen from a validated configuration, pairing over HTTP with
    /// `config.server_url`.
    #[cfg(feature = "http")]
    pub fn from_config(config: GymoteConfig, transport: T) -> GymoteResult<Self> {
        config.validate()?;
        let pairing = PairingManager::from_config(&config)?;
        Ok(Self::new(config, pairing, transport))
    }

    /// Request a fresh pairing and connect with it.
    ///
    /// The returned pairing carries the code to show to the user.
    pub async fn request_pairing(&mut self) -> Result<Pairing, PairingError> {
        let pairing = self.session.pairing_manager().request_pairing().await?;
        self.connect(pairing.clone());
        Ok(pairing)
    }

    /// Connect with a known pairing, e.g. a restored one.
    pub fn connect(&mut self, pairing: Pairing) {
        self.pipeline.reset_session();
        self.session.connect(pairing);
        self.forward_pipeline_events();
    }

    /// Tell the remote the viewport size.
    pub fn send_viewport(&mut self, viewport: Viewport) -> bool {
        self.session.send(&Message::ScreenViewport(viewport))
    }

    /// Tell the remote its distance to the screen in pixels.
    pub fn send_distance(&mut self, distance: f64) -> bool {
        self.session.send(&Message::ScreenDistance(distance))
    }

    /// Snap the pointer onto the latest received position.
    pub fn recalibrate(&mut self) {
        self.pipeline.recalibrate();
    }

    /// Shared session.
    pub fn session(&self) -> &Gymote<T> {
        &self.session
    }

    /// Shared session, mutably.
    pub fn session_mut(&mut self) -> &mut Gymote<T> {
        &mut self.session
    }

    /// Motion pipeline.
    pub fn pipeline(&self) -> &ScreenPipeline {
        &self.pipeline
    }

    fn apply(&mut self, inbound: Vec<Inbound>, now: Instant) {
        for item in inbound {
            match item {
                Inbound::Started | Inbound::Ended => self.pipeline.reset_session(),
                Inbound::Message(message) => self.pipeline.on_message(&message, now),
            }
        }
        self.forward_pipeline_events();
    }

    fn forward_pipeline_events(&mut self) {
        while let Some(event) = self.pipeline.poll_event() {
            self.session.publish(event);
        }
    }
}

impl<T: Transport> Role for GymoteScreen<T> {
    fn handle_transport_event(&mut self, event: TransportEvent, now: Instant) {
        let inbound = self.session.handle_transport_event(event, now);
        self.apply(inbound, now);
    }

    fn poll_timers(&mut self, now: Instant) {
        let inbound = self.session.poll_timers(now);
        self.apply(inbound, now);
    }

    fn on_animation_frame(&mut self, now: Instant) {
        self.pipeline.on_animation_frame(now);
        self.forward_pipeline_events();
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.session.next_deadline()
    }

    fn poll_event(&mut self) -> Option<Event> {
        self.session.poll_event()
    }

    fn disconnect(&mut self) {
        self.session.disconnect();
        self.pipeline.reset_session();
        self.forward_pipeline_events();
    }

    fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    fn animation_interval(&self) -> Duration {
        self.session.config().motion.animation_interval()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::pairing::{Device, MemoryStore, MockService};
    use crate::transport::testing::RecordingTransport;
    use crate::wire::{RemoteDataFrame, WireProfile};

    fn screen(service: MockService) -> GymoteScreen<RecordingTransport> {
        GymoteScreen::new(
            GymoteConfig::default(),
            PairingManager::new(Arc::new(service), Arc::new(MemoryStore::new())),
            RecordingTransport::default(),
        )
    }

    fn frame_payload(frame: RemoteDataFrame) -> TransportEvent {
        TransportEvent::DataReceived(
            Message::RemoteData(frame)
                .encode(WireProfile::Binary)
                .unwrap(),
        )
    }

    fn events(screen: &mut GymoteScreen<RecordingTransport>) -> Vec<Event> {
        std::iter::from_fn(|| screen.poll_event()).collect()
    }

    #[tokio::test]
    async fn test_request_pairing_connects() {
        let mut screen = screen(MockService::issuing("123456", "h1"));
        let pairing = screen.request_pairing().await.unwrap();

        assert_eq!(pairing.device, Device::Screen);
        assert_eq!(screen.session().transport().opened, vec!["h1".to_string()]);
        assert!(!screen.is_connected());
    }

    #[tokio::test]
    async fn test_request_pairing_failure() {
        let mut screen = screen(MockService::default());
        assert!(screen.request_pairing().await.is_err());
        assert!(screen.session().transport().opened.is_empty());
    }

    #[test]
    fn test_frames_become_pointer_events() {
        let t0 = Instant::now();
        let mut screen = screen(MockService::default());
        screen.connect(Pairing::new("1", "h1", Device::Screen));
        screen.handle_transport_event(TransportEvent::Connected, t0);

        screen.handle_transport_event(
            frame_payload(RemoteDataFrame::new(120, 80, true, 0, 5)),
            t0,
        );
        screen.on_animation_frame(t0 + Duration::from_millis(1));

        assert_eq!(
            events(&mut screen),
            vec![
                Event::Connected,
                Event::PointerDown,
                Event::Touch { x: 0, y: 5 },
                Event::PointerMove { x: 120.0, y: 80.0 },
            ]
        );
    }

    #[test]
    fn test_session_end_releases_click() {
        let t0 = Instant::now();
        let mut screen = screen(MockService::default());
        screen.connect(Pairing::new("1", "h1", Device::Screen));
        screen.handle_transport_event(TransportEvent::Connected, t0);
        screen.handle_transport_event(
            frame_payload(RemoteDataFrame::new(1, 1, true, 0, 0)),
            t0,
        );
        events(&mut screen);

        screen.handle_transport_event(TransportEvent::Closed, t0);
        assert_eq!(
            events(&mut screen),
            vec![Event::Disconnected, Event::PointerUp]
        );
    }

    #[test]
    fn test_timeout_closes_lag_episode() {
        let t0 = Instant::now();
        let mut screen = screen(MockService::default());
        screen.connect(Pairing::new("1", "h1", Device::Screen));
        screen.handle_transport_event(TransportEvent::Connected, t0);
        screen.handle_transport_event(
            frame_payload(RemoteDataFrame::new(50, 50, false, 0, 0)),
            t0,
        );
        screen.on_animation_frame(t0);
        screen.on_animation_frame(t0 + Duration::from_millis(200));
        assert!(events(&mut screen).contains(&Event::LagStart));

        screen.poll_timers(t0 + Duration::from_secs(10));
        assert_eq!(
            events(&mut screen),
            vec![Event::ConnectionTimeout, Event::LagEnd]
        );
        assert!(!screen.pipeline().has_delay());
    }

    #[test]
    fn test_control_messages_need_connection() {
        let t0 = Instant::now();
        let mut screen = screen(MockService::default());
        let viewport = Viewport {
            width: 1920,
            height: 1080,
        };
        assert!(!screen.send_viewport(viewport));

        screen.connect(Pairing::new("1", "h1", Device::Screen));
        screen.handle_transport_event(TransportEvent::Connected, t0);
        assert!(screen.send_viewport(viewport));
        assert!(screen.send_distance(420.0));

        let sent: Vec<_> = screen
            .session()
            .transport()
            .sent
            .iter()
            .map(|payload| Message::decode(payload).unwrap())
            .collect();
        assert_eq!(
            sent,
            vec![
                Message::ScreenViewport(viewport),
                Message::ScreenDistance(420.0)
            ]
        );
    }

    #[cfg(feature = "http")]
    #[test]
    fn test_from_config() {
        use crate::core::error::GymoteError;

        let screen = GymoteScreen::from_config(GymoteConfig::default(), RecordingTransport::default());
        assert!(screen.is_ok());

        let mut config = GymoteConfig::default();
        config.motion.smoothing_factor = 0.0;
        let err = GymoteScreen::from_config(config, RecordingTransport::default()).unwrap_err();
        assert!(matches!(err, GymoteError::Config(_)));
    }
}
