//! Exponential smoothing of pointer coordinates.
//!
//! A first-order IIR filter per axis:
//! `output = previous + factor * (input - previous)`. It never overshoots, is
//! stable for `factor` in (0, 1] and leaves `(1 - factor)^n` of a step after
//! `n` ticks.

use std::time::Duration;

use crate::core::constants::{ADAPTIVE_DIVISOR_MS, ADAPTIVE_WINDOW_MS, DEFAULT_SMOOTHING_FACTOR};

/// Smoothing factor for the time since the previous inbound frame.
///
/// `clamp((200 - min(delta_ms, 200)) / 300, 0, 1)`: prompt frames let the
/// pointer follow closely, stale data eases the pointer to a stop instead of
/// chasing an outdated target.
pub fn adaptive_factor(data_delta: Duration) -> f64 {
    let delta_ms = data_delta.as_secs_f64() * 1000.0;
    ((ADAPTIVE_WINDOW_MS - delta_ms.min(ADAPTIVE_WINDOW_MS)) / ADAPTIVE_DIVISOR_MS).clamp(0.0, 1.0)
}

/// Per-axis exponential moving average.
#[derive(Debug, Clone, PartialEq)]
pub struct Smoothing {
    /// Last output.
    previous: f64,
    /// Construction-time factor.
    factor: f64,
}

impl Default for Smoothing {
    fn default() -> Self {
        Self::new(DEFAULT_SMOOTHING_FACTOR)
    }
}

impl Smoothing {
    /// Create a filter starting at 0. The factor is clamped into (0, 1].
    pub fn new(factor: f64) -> Self {
        Self {
            previous: 0.0,
            factor: sanitize_factor(factor),
        }
    }

    /// Advance toward `input`, optionally with a one-off factor.
    ///
    /// The state always moves to the returned value.
    pub fn next(&mut self, input: f64, factor_override: Option<f64>) -> f64 {
        let factor = factor_override.map_or(self.factor, |f| f.clamp(0.0, 1.0));
        let output = self.previous + factor * (input - self.previous);
        self.previous = output;
        output
    }

    /// Snap the filter onto `value`.
    pub fn recalibrate(&mut self, value: f64) {
        self.previous = value;
    }

    /// Last output.
    pub fn value(&self) -> f64 {
        self.previous
    }

    /// Construction-time factor.
    pub fn factor(&self) -> f64 {
        self.factor
    }
}

fn sanitize_factor(factor: f64) -> f64 {
    if factor.is_finite() && factor > 0.0 {
        factor.min(1.0)
    } else {
        DEFAULT_SMOOTHING_FACTOR
    }
}
