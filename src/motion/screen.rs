//! Screen-side motion pipeline.
//!
//! Frames and animation ticks arrive on two independent clocks:
//!
//! - [`ScreenPipeline::on_frame`] records the latest target, the arrival
//!   time and click/touch edges.
//! - [`ScreenPipeline::on_animation_frame`] runs lag detection, advances both
//!   axis filters toward the target and emits `PointerMove` on change.
//!
//! A new frame overwrites the pending target immediately; frames are never
//! buffered.

use std::time::Instant;

use tracing::{debug, trace};

use super::lag::LagDetector;
use super::smoothing::{Smoothing, adaptive_factor};
use crate::config::MotionConfig;
use crate::core::error::DecodeError;
use crate::core::events::{Event, EventQueue};
use crate::wire::{Message, Payload, RemoteDataFrame};

/// Turns decoded remote frames into pointer and touch events.
#[derive(Debug, Clone)]
pub struct ScreenPipeline {
    smooth_x: Smoothing,
    smooth_y: Smoothing,
    lag: LagDetector,
    adaptive: bool,
    /// Latest received pointer position.
    target: Option<(f64, f64)>,
    /// Snap the filters onto the next frame instead of easing toward it.
    snap_pending: bool,
    is_clicking: bool,
    touch: Option<(i16, i16)>,
    last_emitted: Option<(f64, f64)>,
    events: EventQueue<Event>,
}

impl Default for ScreenPipeline {
    fn default() -> Self {
        Self::new(&MotionConfig::default())
    }
}

impl ScreenPipeline {
    /// Create a pipeline from motion settings.
    pub fn new(config: &MotionConfig) -> Self {
        Self {
            smooth_x: Smoothing::new(config.smoothing_factor),
            smooth_y: Smoothing::new(config.smoothing_factor),
            lag: LagDetector::new(config.lag_threshold()),
            adaptive: config.adaptive_smoothing,
            target: None,
            snap_pending: true,
            is_clicking: false,
            touch: None,
            last_emitted: None,
            events: EventQueue::new(),
        }
    }

    /// Handle a decoded frame.
    pub fn on_frame(&mut self, frame: RemoteDataFrame, now: Instant) {
        if let Some(gap) = self.lag.on_frame(now) {
            trace!(gap_ms = gap.as_millis() as u64, "remote frame");
        }

        let target = (f64::from(frame.x), f64::from(frame.y));
        self.target = Some(target);

        if self.snap_pending {
            self.smooth_x.recalibrate(target.0);
            self.smooth_y.recalibrate(target.1);
            self.snap_pending = false;
        }

        if frame.is_clicking != self.is_clicking {
            self.is_clicking = frame.is_clicking;
            self.events.push(if frame.is_clicking {
                Event::PointerDown
            } else {
                Event::PointerUp
            });
        }

        let touch = (frame.touch_x, frame.touch_y);
        if self.touch != Some(touch) {
            self.touch = Some(touch);
            self.events.push(Event::Touch {
                x: touch.0,
                y: touch.1,
            });
        }
    }

    /// Handle a message delivered by the connection. Only remote data matters here.
    pub fn on_message(&mut self, message: &Message, now: Instant) {
        if let Message::RemoteData(frame) = message {
            self.on_frame(*frame, now);
        }
    }

    /// Decode and handle a raw payload. Malformed payloads are dropped.
    pub fn on_payload(&mut self, payload: &Payload, now: Instant) -> Result<(), DecodeError> {
        match Message::decode(payload) {
            Ok(message) => {
                self.on_message(&message, now);
                Ok(())
            }
            Err(e) => {
                debug!(error = %e, "dropping malformed frame");
                Err(e)
            }
        }
    }

    /// Advance one animation tick.
    pub fn on_animation_frame(&mut self, now: Instant) {
        let Some((target_x, target_y)) = self.target else {
            return;
        };

        let transition = self.lag.poll(now);
        if transition.entered_delay {
            debug!("lag episode started");
            self.events.push(Event::LagStart);
        }
        if transition.exited_delay {
            debug!("lag episode ended");
            self.events.push(Event::LagEnd);
        }

        let factor = if self.adaptive {
            self.lag.data_delta(now).map(adaptive_factor)
        } else {
            None
        };

        let x = self.smooth_x.next(target_x, factor);
        let y = self.smooth_y.next(target_y, factor);

        if self.last_emitted != Some((x, y)) {
            self.last_emitted = Some((x, y));
            self.events.push(Event::PointerMove { x, y });
        }
    }

    /// Snap both filters onto the current target, or onto the next frame if
    /// none has arrived.
    pub fn recalibrate(&mut self) {
        match self.target {
            Some((x, y)) => {
                self.smooth_x.recalibrate(x);
                self.smooth_y.recalibrate(y);
            }
            None => self.snap_pending = true,
        }
    }

    /// Forget the previous session. Releases a held click and closes an open
    /// lag episode.
    pub fn reset_session(&mut self) {
        if self.is_clicking {
            self.is_clicking = false;
            self.events.push(Event::PointerUp);
        }
        if self.lag.has_delay() {
            debug!("lag episode ended with the session");
            self.events.push(Event::LagEnd);
        }
        self.lag = LagDetector::new(self.lag.threshold());
        self.target = None;
        self.touch = None;
        self.last_emitted = None;
        self.snap_pending = true;
    }

    /// Whether a lag episode is in progress.
    pub fn has_delay(&self) -> bool {
        self.lag.has_delay()
    }

    /// Whether the remote is currently clicking.
    pub fn is_clicking(&self) -> bool {
        self.is_clicking
    }

    /// Take the oldest pending event.
    pub fn poll_event(&mut self) -> Option<Event> {
        self.events.poll()
    }

    /// Take all pending events.
    pub fn drain_events(&mut self) -> impl Iterator<Item = Event> + '_ {
        self.events.drain()
    }
}
