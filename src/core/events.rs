//! Application events and the per-component event queue.
//!
//! Components never call back into their owner. Each one pushes what happened
//! into its own [`EventQueue`] and the owner drains it after every handler
//! call, re-publishing what it cares about.

use std::collections::VecDeque;

use crate::pairing::Pairing;
use crate::wire::Viewport;

/// Events surfaced to the application.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Handshake acknowledged, the session is live.
    Connected,
    /// The transport closed cleanly.
    Disconnected,
    /// No liveness signal within the liveness window.
    ConnectionTimeout,
    /// The transport reported a failure.
    ConnectionError(String),
    /// The transport is attempting a protocol upgrade and runs on its fallback.
    UsingFallbackTransport,
    /// A stored pairing was validated and can be reconnected.
    RestorablePairing(Pairing),
    /// Inbound frames started arriving late.
    LagStart,
    /// Inbound frames are back on time.
    LagEnd,
    /// Smoothed pointer position changed.
    PointerMove {
        /// Horizontal position.
        x: f64,
        /// Vertical position.
        y: f64,
    },
    /// Remote started clicking.
    PointerDown,
    /// Remote stopped clicking.
    PointerUp,
    /// Touch position on the remote changed.
    Touch {
        /// Horizontal touch coordinate.
        x: i16,
        /// Vertical touch coordinate.
        y: i16,
    },
    /// Screen announced its viewport (remote side).
    Viewport(Viewport),
    /// Screen announced the distance to the remote in pixels (remote side).
    Distance(f64),
}

impl Event {
    /// Stable lowercase event name.
    pub fn name(&self) -> &'static str {
        match self {
            Event::Connected => "connected",
            Event::Disconnected => "disconnected",
            Event::ConnectionTimeout => "connectiontimeout",
            Event::ConnectionError(_) => "connectionerror",
            Event::UsingFallbackTransport => "usingfallback",
            Event::RestorablePairing(_) => "restorable",
            Event::LagStart => "lagstart",
            Event::LagEnd => "lagend",
            Event::PointerMove { .. } => "pointermove",
            Event::PointerDown => "pointerdown",
            Event::PointerUp => "pointerup",
            Event::Touch { .. } => "touch",
            Event::Viewport(_) => "viewport",
            Event::Distance(_) => "distance",
        }
    }

    /// Whether this event ends the current session.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Event::Disconnected | Event::ConnectionTimeout | Event::ConnectionError(_)
        )
    }
}

/// FIFO of events produced by one component.
#[derive(Debug, Clone)]
pub struct EventQueue<E> {
    queue: VecDeque<E>,
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventQueue<E> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    /// Publish an event.
    pub fn push(&mut self, event: E) {
        self.queue.push_back(event);
    }

    /// Take the oldest event.
    pub fn poll(&mut self) -> Option<E> {
        self.queue.pop_front()
    }

    /// Take every pending event in order.
    pub fn drain(&mut self) -> impl Iterator<Item = E> + '_ {
        self.queue.drain(..)
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
