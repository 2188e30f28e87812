//! Remote-side sampling.
//!
//! The remote keeps the latest pointer, click and touch state. Each animation
//! tick turns it into a clamped [`RemoteDataFrame`] that is only handed out
//! when it differs from the last one sent.

use tracing::trace;

use crate::core::events::{Event, EventQueue};
use crate::wire::{Message, RemoteDataFrame, Viewport};

/// Samples controller state once per tick.
#[derive(Debug, Clone, Default)]
pub struct RemoteSampler {
    x: f64,
    y: f64,
    is_clicking: bool,
    touch_x: f64,
    touch_y: f64,
    /// Last frame handed out for sending.
    last_sent: Option<RemoteDataFrame>,
    /// Send on the next tick even if nothing changed.
    force_next: bool,
    viewport: Option<Viewport>,
    distance: Option<f64>,
    events: EventQueue<Event>,
}

impl RemoteSampler {
    /// Create a sampler with everything at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the projected pointer position.
    pub fn update_pointer(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
    }

    /// Set the click state.
    pub fn update_click(&mut self, is_clicking: bool) {
        self.is_clicking = is_clicking;
    }

    /// Set the touch position.
    pub fn update_touch(&mut self, x: f64, y: f64) {
        self.touch_x = x;
        self.touch_y = y;
    }

    /// Force the next tick to produce a frame.
    pub fn calibrate(&mut self) {
        self.force_next = true;
    }

    /// Frame for the current state, clamped to the wire range.
    pub fn current_frame(&self) -> RemoteDataFrame {
        RemoteDataFrame::from_coordinates(
            self.x,
            self.y,
            self.is_clicking,
            self.touch_x,
            self.touch_y,
        )
    }

    /// Run one tick. Returns the frame to send, if any.
    ///
    /// The frame is recorded as sent; callers that fail to deliver it should
    /// [`calibrate`](Self::calibrate) to retry on the next tick.
    pub fn tick(&mut self) -> Option<RemoteDataFrame> {
        let frame = self.current_frame();
        if !self.force_next && self.last_sent == Some(frame) {
            return None;
        }
        self.force_next = false;
        self.last_sent = Some(frame);
        trace!(x = frame.x, y = frame.y, click = frame.is_clicking, "sampled frame");
        Some(frame)
    }

    /// Handle a control message from the screen.
    pub fn on_message(&mut self, message: &Message) {
        match message {
            Message::ScreenViewport(viewport) => {
                self.viewport = Some(*viewport);
                self.events.push(Event::Viewport(*viewport));
            }
            Message::ScreenDistance(distance) => {
                self.distance = Some(*distance);
                self.events.push(Event::Distance(*distance));
            }
            _ => {}
        }
    }

    /// Forget what was sent in the previous session.
    pub fn reset_session(&mut self) {
        self.last_sent = None;
    }

    /// Last viewport announced by the screen.
    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    /// Last distance announced by the screen.
    pub fn distance(&self) -> Option<f64> {
        self.distance
    }

    /// Take the oldest pending event.
    pub fn poll_event(&mut self) -> Option<Event> {
        self.events.poll()
    }
}
