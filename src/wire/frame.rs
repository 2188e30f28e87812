//! Remote motion frame encoding and decoding.
//!
//! One [`RemoteDataFrame`] is produced per animation tick on the remote. It
//! travels in one of three layouts selected by the deployment
//! [`WireProfile`]:
//!
//! Text (human-debuggable):
//! ```text
//! x;y;clickFlag;touchX;touchY
//! ```
//!
//! Binary (8 bytes, all LE16 signed):
//! ```text
//! +--------+--------+------------+---------+
//! | x      | y      | clickFlag  | touchY  |
//! +--------+--------+------------+---------+
//! ```
//!
//! Extended binary (10 bytes, all LE16 signed):
//! ```text
//! +--------+--------+------------+---------+---------+
//! | x      | y      | clickFlag  | touchX  | touchY  |
//! +--------+--------+------------+---------+---------+
//! ```

use serde::{Deserialize, Serialize};

use crate::core::constants::{BINARY_FRAME_SIZE, EXTENDED_BINARY_FRAME_SIZE, FIELD_SEPARATOR};
use crate::core::error::DecodeError;

/// Encoding used for outbound messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WireProfile {
    /// Semicolon-joined decimal fields inside `KIND~payload` text messages.
    #[default]
    Text,
    /// Tagged binary messages with the compact 8-byte frame (touchX dropped).
    Binary,
    /// Tagged binary messages with the 10-byte frame.
    BinaryExtended,
}

impl WireProfile {
    /// Whether messages are sent as binary payloads.
    pub fn is_binary(self) -> bool {
        !matches!(self, WireProfile::Text)
    }
}

/// Clamp a wide coordinate into the signed 16-bit wire range.
///
/// Rounds to the nearest integer; NaN maps to 0.
pub fn clamp_i16(value: f64) -> i16 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

fn clamp_wide(value: i64) -> i16 {
    value.clamp(i16::MIN as i64, i16::MAX as i64) as i16
}

/// One sample of remote pointer, click and touch state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RemoteDataFrame {
    /// Pointer x in screen pixels.
    pub x: i16,
    /// Pointer y in screen pixels.
    pub y: i16,
    /// Whether the remote is clicking.
    pub is_clicking: bool,
    /// Touch x on the remote surface.
    pub touch_x: i16,
    /// Touch y on the remote surface.
    pub touch_y: i16,
}

impl RemoteDataFrame {
    /// Create a frame from wire-range values.
    pub fn new(x: i16, y: i16, is_clicking: bool, touch_x: i16, touch_y: i16) -> Self {
        Self {
            x,
            y,
            is_clicking,
            touch_x,
            touch_y,
        }
    }

    /// Create a frame from unbounded coordinates, clamping each into range.
    pub fn from_coordinates(x: f64, y: f64, is_clicking: bool, touch_x: f64, touch_y: f64) -> Self {
        Self {
            x: clamp_i16(x),
            y: clamp_i16(y),
            is_clicking,
            touch_x: clamp_i16(touch_x),
            touch_y: clamp_i16(touch_y),
        }
    }

    fn click_flag(&self) -> i16 {
        i16::from(self.is_clicking)
    }

    /// Encode as `x;y;clickFlag;touchX;touchY`.
    pub fn encode_text(&self) -> String {
        let sep = FIELD_SEPARATOR;
        format!(
            "{}{sep}{}{sep}{}{sep}{}{sep}{}",
            self.x,
            self.y,
            self.click_flag(),
            self.touch_x,
            self.touch_y
        )
    }

    /// Decode a text frame.
    ///
    /// x and y must parse. The click flag is true only for `1`. Missing or
    /// unparseable touch fields read as 0. Out-of-range numbers are clamped.
    pub fn decode_text(data: &str) -> Result<Self, DecodeError> {
        if data.is_empty() {
            return Err(DecodeError::Empty);
        }

        let mut fields = data.split(FIELD_SEPARATOR);
        let x = parse_coordinate("x", fields.next())?;
        let y = parse_coordinate("y", fields.next())?;
        let is_clicking = fields.next().map(str::trim) == Some("1");
        let touch_x = parse_coordinate("touchX", fields.next()).unwrap_or(0);
        let touch_y = parse_coordinate("touchY", fields.next()).unwrap_or(0);

        Ok(Self {
            x,
            y,
            is_clicking,
            touch_x,
            touch_y,
        })
    }

    /// Serialize to the compact 8-byte layout (touchX is dropped).
    pub fn to_bytes(&self) -> [u8; BINARY_FRAME_SIZE] {
        let mut buf = [0u8; BINARY_FRAME_SIZE];
        buf[0..2].copy_from_slice(&self.x.to_le_bytes());
        buf[2..4].copy_from_slice(&self.y.to_le_bytes());
        buf[4..6].copy_from_slice(&self.click_flag().to_le_bytes());
        buf[6..8].copy_from_slice(&self.touch_y.to_le_bytes());
        buf
    }

    /// Serialize to the extended 10-byte layout.
    pub fn to_extended_bytes(&self) -> [u8; EXTENDED_BINARY_FRAME_SIZE] {
        let mut buf = [0u8; EXTENDED_BINARY_FRAME_SIZE];
        buf[0..2].copy_from_slice(&self.x.to_le_bytes());
        buf[2..4].copy_from_slice(&self.y.to_le_bytes());
        buf[4..6].copy_from_slice(&self.click_flag().to_le_bytes());
        buf[6..8].copy_from_slice(&self.touch_x.to_le_bytes());
        buf[8..10].copy_from_slice(&self.touch_y.to_le_bytes());
        buf
    }

    /// Parse a binary frame, choosing the layout by length.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let word = |i: usize| i16::from_le_bytes([bytes[i], bytes[i + 1]]);

        match bytes.len() {
            BINARY_FRAME_SIZE => Ok(Self {
                x: word(0),
                y: word(2),
                is_clicking: word(4) != 0,
                touch_x: 0,
                touch_y: word(6),
            }),
            EXTENDED_BINARY_FRAME_SIZE => Ok(Self {
                x: word(0),
                y: word(2),
                is_clicking: word(4) != 0,
                touch_x: word(6),
                touch_y: word(8),
            }),
            len if len < BINARY_FRAME_SIZE => Err(DecodeError::UnexpectedEof {
                expected: BINARY_FRAME_SIZE,
                actual: len,
            }),
            len => Err(DecodeError::InvalidLength(len)),
        }
    }

    /// Encode according to a binary profile. Text profile yields the extended layout.
    pub fn encode_binary(&self, profile: WireProfile) -> Vec<u8> {
        match profile {
            WireProfile::Binary => self.to_bytes().to_vec(),
            WireProfile::Text | WireProfile::BinaryExtended => self.to_extended_bytes().to_vec(),
        }
    }
}

fn parse_coordinate(field: &'static str, raw: Option<&str>) -> Result<i16, DecodeError> {
    let invalid = |value: &str| DecodeError::InvalidField {
        field,
        value: value.to_string(),
    };

    let raw = raw.ok_or_else(|| invalid(""))?;
    let text = raw.trim();

    if let Ok(value) = text.parse::<i64>() {
        return Ok(clamp_wide(value));
    }

    // Decimal coordinates are truncated toward zero.
    match text.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(clamp_i16(value.trunc())),
        _ => Err(invalid(raw)),
    }
}
