//! The remote role.

use std::time::{Duration, Instant};

use tracing::debug;

use super::Role;
use super::session::{Gymote, Inbound};
use crate::config::GymoteConfig;
#[cfg(feature = "http")]
use crate::core::error::GymoteResult;
use crate::core::events::Event;
use crate::motion::RemoteSampler;
use crate::pairing::{Pairing, PairingError, PairingManager};
use crate::transport::{Transport, TransportEvent};
use crate::wire::{Message, Viewport};

/// Controller side: joins a pairing by code and streams frames.
#[derive(Debug)]
pub struct GymoteRemote<T> {
    session: Gymote<T>,
    sampler: RemoteSampler,
}

impl<T: Transport> GymoteRemote<T> {
    /// Create a remote over `transport`.
    pub fn new(config: GymoteConfig, pairing: PairingManager, transport: T) -> Self {
        Self {
            session: Gymote::new(config, pairing, transport),
            sampler: RemoteSampler::new(),
        }
    }

    /// Create a remote from a validated configuration, pairing over HTTP with
    /// `config.server_url`.
    #[cfg(feature = "http")]
    pub fn from_config(config: GymoteConfig, transport: T) -> GymoteResult<Self> {
        config.validate()?;
        let pairing = PairingManager::from_config(&config)?;
        Ok(Self::new(config, pairing, transport))
    }

    /// Resolve the code shown on the screen and connect with it.
    pub async fn pairing_by_code(&mut self, code: &str) -> Result<Pairing, PairingError> {
        let pairing = self
            .session
            .pairing_manager()
            .resolve_pairing_from_code(code)
            .await?;
        self.connect(pairing.clone());
        Ok(pairing)
    }

    /// Connect with a known pairing, e.g. a restored one.
    pub fn connect(&mut self, pairing: Pairing) {
        self.sampler.reset_session();
        self.session.connect(pairing);
        self.forward_sampler_events();
    }

    /// Set the projected pointer position.
    pub fn update_pointer(&mut self, x: f64, y: f64) {
        self.sampler.update_pointer(x, y);
    }

    /// Set the click state.
    pub fn update_click(&mut self, is_clicking: bool) {
        self.sampler.update_click(is_clicking);
    }

    /// Set the touch position.
    pub fn update_touch(&mut self, x: f64, y: f64) {
        self.sampler.update_touch(x, y);
    }

    /// Send the current state on the next tick even if unchanged.
    pub fn calibrate(&mut self) {
        self.sampler.calibrate();
    }

    /// Viewport announced by the screen.
    pub fn viewport(&self) -> Option<Viewport> {
        self.sampler.viewport()
    }

    /// Distance announced by the screen.
    pub fn distance(&self) -> Option<f64> {
        self.sampler.distance()
    }

    /// Shared session.
    pub fn session(&self) -> &Gymote<T> {
        &self.session
    }

    /// Shared session, mutably.
    pub fn session_mut(&mut self) -> &mut Gymote<T> {
        &mut self.session
    }

    fn apply(&mut self, inbound: Vec<Inbound>) {
        for item in inbound {
            match item {
                Inbound::Started => self.sampler.reset_session(),
                Inbound::Ended => {}
                Inbound::Message(message) => self.sampler.on_message(&message),
            }
        }
        self.forward_sampler_events();
    }

    fn forward_sampler_events(&mut self) {
        while let Some(event) = self.sampler.poll_event() {
            self.session.publish(event);
        }
    }
}

impl<T: Transport> Role for GymoteRemote<T> {
    fn handle_transport_event(&mut self, event: TransportEvent, now: Instant) {
        let inbound = self.session.handle_transport_event(event, now);
        self.apply(inbound);
    }

    fn poll_timers(&mut self, now: Instant) {
        let inbound = self.session.poll_timers(now);
        self.apply(inbound);
    }

    fn on_animation_frame(&mut self, _now: Instant) {
        if !self.session.is_connected() {
            return;
        }
        if let Some(frame) = self.sampler.tick() {
            if !self.session.send(&Message::RemoteData(frame)) {
                debug!("frame not sent, retrying next tick");
                self.sampler.calibrate();
            }
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.session.next_deadline()
    }

    fn poll_event(&mut self) -> Option<Event> {
        self.session.poll_event()
    }

    fn disconnect(&mut self) {
        self.session.disconnect();
    }

    fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    fn animation_interval(&self) -> Duration {
        self.session.config().motion.animation_interval()
    }
}
