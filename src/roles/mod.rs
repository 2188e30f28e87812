//! Device roles.
//!
//! Both roles *have a* [`Gymote`] session and add their own motion half:
//! [`GymoteScreen`] turns frames into pointer events, [`GymoteRemote`] turns
//! controller state into frames. [`Role`] is the surface a driver loop needs.

mod remote;
mod screen;
mod session;

use std::time::{Duration, Instant};

use crate::core::constants::ANIMATION_FRAME_INTERVAL;
use crate::core::events::Event;
use crate::transport::TransportEvent;

pub use remote::GymoteRemote;
pub use screen::GymoteScreen;
pub use session::Gymote;

/// Inputs every role accepts. All of them take the current time so a role
/// can be driven by a real clock or by a test.
pub trait Role {
    /// Feed one transport event.
    fn handle_transport_event(&mut self, event: TransportEvent, now: Instant);

    /// Fire due timers.
    fn poll_timers(&mut self, now: Instant);

    /// Run one animation tick.
    fn on_animation_frame(&mut self, now: Instant);

    /// Earliest pending timer deadline.
    fn next_deadline(&self) -> Option<Instant>;

    /// Take the oldest pending application event.
    fn poll_event(&mut self) -> Option<Event>;

    /// Tear the session down without raising events.
    fn disconnect(&mut self);

    /// Whether the session is live.
    fn is_connected(&self) -> bool;

    /// Interval between animation ticks.
    fn animation_interval(&self) -> Duration {
        ANIMATION_FRAME_INTERVAL
    }
}
