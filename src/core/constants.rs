//! Protocol constants.
//!
//! These values are shared by both devices of a pairing and MUST NOT diverge
//! between them. Tunable defaults live in [`crate::config`].

use std::time::Duration;

// =============================================================================
// CONNECTION TIMING
// =============================================================================

/// Interval between application-level PING messages once connected.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(5000);

/// Consider the connection lost after this long without any liveness signal.
pub const LIVENESS_TIMEOUT: Duration = Duration::from_millis(10000);

// =============================================================================
// MOTION PIPELINE
// =============================================================================

/// Fixed smoothing factor used when no adaptive override is supplied.
pub const DEFAULT_SMOOTHING_FACTOR: f64 = 0.3;

/// Inter-frame delay above which a lag episode starts.
pub const LAG_THRESHOLD: Duration = Duration::from_millis(80);

/// Inter-frame delay at which the adaptive factor reaches zero (ms).
pub const ADAPTIVE_WINDOW_MS: f64 = 200.0;

/// Divisor of the adaptive factor formula (ms).
pub const ADAPTIVE_DIVISOR_MS: f64 = 300.0;

/// Default animation tick (~60 Hz).
pub const ANIMATION_FRAME_INTERVAL: Duration = Duration::from_millis(16);

// =============================================================================
// WIRE FORMAT
// =============================================================================

/// Separator between message kind and payload in text messages.
pub const MESSAGE_SEPARATOR: char = '~';

/// Separator between fields of a text remote-data frame.
pub const FIELD_SEPARATOR: char = ';';

/// Compact binary frame size: x, y, click, touchY as LE16.
pub const BINARY_FRAME_SIZE: usize = 8;

/// Extended binary frame size: x, y, click, touchX, touchY as LE16.
pub const EXTENDED_BINARY_FRAME_SIZE: usize = 10;

/// Message tag: heartbeat request.
pub const TAG_PING: u8 = 0x01;

/// Message tag: heartbeat answer.
pub const TAG_PONG: u8 = 0x02;

/// Message tag: remote motion frame.
pub const TAG_REMOTE_DATA: u8 = 0x03;

/// Message tag: screen viewport size.
pub const TAG_SCREEN_VIEWPORT: u8 = 0x04;

/// Message tag: screen to remote distance.
pub const TAG_SCREEN_DISTANCE: u8 = 0x05;

// =============================================================================
// PAIRING SERVICE
// =============================================================================

/// Endpoint issuing a fresh code/hash pair.
pub const CODE_GET_PATH: &str = "/code/get";

/// Endpoint exchanging a code for its hash.
pub const CODE_VALIDATE_PATH: &str = "/code/validate";

/// Endpoint validating a stored pairing.
pub const PAIRING_VALIDATE_PATH: &str = "/pairing/validate";

/// Default storage key / file stem of the persisted pairing record.
pub const PAIRING_RECORD_KEY: &str = "pairing";
