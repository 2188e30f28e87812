//! Inbound frame delay tracking.
//!
//! A single-threshold hysteresis: crossing above the threshold starts a lag
//! episode, dropping back to or below it ends the episode. Staying on one
//! side never re-signals, so every episode yields exactly one start and one
//! end.

use std::time::{Duration, Instant};

use crate::core::constants::LAG_THRESHOLD;

/// Delay-state change produced by one update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LagTransition {
    /// A lag episode started.
    pub entered_delay: bool,
    /// A lag episode ended.
    pub exited_delay: bool,
}

impl LagTransition {
    /// Whether nothing changed.
    pub fn is_none(self) -> bool {
        !self.entered_delay && !self.exited_delay
    }
}

/// Tracks time since the last inbound frame and the delay state.
#[derive(Debug, Clone)]
pub struct LagDetector {
    /// Delay above which a lag episode starts.
    threshold: Duration,
    /// When the last frame arrived.
    last_data_at: Option<Instant>,
    /// Whether a lag episode is in progress.
    has_delay: bool,
}

impl Default for LagDetector {
    fn default() -> Self {
        Self::new(LAG_THRESHOLD)
    }
}

impl LagDetector {
    /// Create a detector with the given threshold.
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            last_data_at: None,
            has_delay: false,
        }
    }

    /// Record a frame arrival. Returns the gap since the previous frame.
    pub fn on_frame(&mut self, now: Instant) -> Option<Duration> {
        let gap = self.data_delta(now);
        self.last_data_at = Some(now);
        gap
    }

    /// Time since the last frame, `None` before the first one.
    pub fn data_delta(&self, now: Instant) -> Option<Duration> {
        self.last_data_at
            .map(|last| now.saturating_duration_since(last))
    }

    /// Feed one delay observation through the hysteresis.
    pub fn update(&mut self, data_delta: Duration) -> LagTransition {
        let late = data_delta > self.threshold;

        if late && !self.has_delay {
            self.has_delay = true;
            LagTransition {
                entered_delay: true,
                exited_delay: false,
            }
        } else if !late && self.has_delay {
            self.has_delay = false;
            LagTransition {
                entered_delay: false,
                exited_delay: true,
            }
        } else {
            LagTransition::default()
        }
    }

    /// Run the hysteresis against the current time. No-op before the first frame.
    pub fn poll(&mut self, now: Instant) -> LagTransition {
        match self.data_delta(now) {
            Some(delta) => self.update(delta),
            None => LagTransition::default(),
        }
    }

    /// Whether a lag episode is in progress.
    pub fn has_delay(&self) -> bool {
        self.has_delay
    }

    /// When the last frame arrived.
    pub fn last_data_at(&self) -> Option<Instant> {
        self.last_data_at
    }

    /// Configured threshold.
    pub fn threshold(&self) -> Duration {
        self.threshold
    }
}
