//! Motion processing.
//!
//! - [`Smoothing`] / [`adaptive_factor`]: per-axis exponential filter
//! - [`LagDetector`]: inter-frame delay hysteresis
//! - [`ScreenPipeline`]: frames in, pointer and touch events out
//! - [`RemoteSampler`]: controller state in, changed frames out

mod lag;
mod remote;
mod screen;
mod smoothing;

pub use lag::{LagDetector, LagTransition};
pub use remote::RemoteSampler;
pub use screen::ScreenPipeline;
pub use smoothing::{Smoothing, adaptive_factor};
