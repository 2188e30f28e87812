//! Tagged wire messages exchanged over a connection.
//!
//! Text envelope:
//! ```text
//! KIND~payload
//! ```
//!
//! Binary envelope:
//! ```text
//! +--------+---------------------+
//! | Tag    | Payload             |
//! | 1 byte | variable            |
//! +--------+---------------------+
//! ```
//!
//! Viewport and distance are low-frequency control messages and carry JSON
//! in both envelopes.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::frame::{RemoteDataFrame, WireProfile};
use crate::core::constants::{
    MESSAGE_SEPARATOR, TAG_PING, TAG_PONG, TAG_REMOTE_DATA, TAG_SCREEN_DISTANCE,
    TAG_SCREEN_VIEWPORT,
};
use crate::core::error::DecodeError;

/// Raw payload as handed to or received from a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// UTF-8 text payload.
    Text(String),
    /// Binary payload.
    Binary(Vec<u8>),
}

impl Payload {
    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        match self {
            Payload::Text(text) => text.len(),
            Payload::Binary(bytes) => bytes.len(),
        }
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Screen viewport size, sent from the screen to the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Viewport {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Kinds of known messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Heartbeat request.
    Ping,
    /// Heartbeat answer.
    Pong,
    /// Remote motion frame.
    RemoteData,
    /// Screen viewport size.
    ScreenViewport,
    /// Screen to remote distance.
    ScreenDistance,
}

impl MessageKind {
    /// Text envelope name.
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Ping => "PING",
            MessageKind::Pong => "PONG",
            MessageKind::RemoteData => "REMOTE_DATA",
            MessageKind::ScreenViewport => "SCREEN_VIEWPORT",
            MessageKind::ScreenDistance => "SCREEN_DISTANCE",
        }
    }

    /// Parse a text envelope name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "PING" => Some(Self::Ping),
            "PONG" => Some(Self::Pong),
            "REMOTE_DATA" => Some(Self::RemoteData),
            "SCREEN_VIEWPORT" => Some(Self::ScreenViewport),
            "SCREEN_DISTANCE" => Some(Self::ScreenDistance),
            _ => None,
        }
    }

    /// Binary envelope tag.
    pub fn tag(self) -> u8 {
        match self {
            MessageKind::Ping => TAG_PING,
            MessageKind::Pong => TAG_PONG,
            MessageKind::RemoteData => TAG_REMOTE_DATA,
            MessageKind::ScreenViewport => TAG_SCREEN_VIEWPORT,
            MessageKind::ScreenDistance => TAG_SCREEN_DISTANCE,
        }
    }

    /// Parse a binary envelope tag.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            TAG_PING => Some(Self::Ping),
            TAG_PONG => Some(Self::Pong),
            TAG_REMOTE_DATA => Some(Self::RemoteData),
            TAG_SCREEN_VIEWPORT => Some(Self::ScreenViewport),
            TAG_SCREEN_DISTANCE => Some(Self::ScreenDistance),
            _ => None,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded wire message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Heartbeat request.
    Ping,
    /// Heartbeat answer.
    Pong,
    /// Remote motion frame.
    RemoteData(RemoteDataFrame),
    /// Screen viewport size.
    ScreenViewport(Viewport),
    /// Screen to remote distance in pixels.
    ScreenDistance(f64),
    /// A message whose kind this build does not know. Never re-sent.
    Unknown {
        /// Text kind, or `0x..` for a binary tag.
        kind: String,
    },
}

impl Message {
    /// The message kind, `None` for unknown messages.
    pub fn kind(&self) -> Option<MessageKind> {
        match self {
            Message::Ping => Some(MessageKind::Ping),
            Message::Pong => Some(MessageKind::Pong),
            Message::RemoteData(_) => Some(MessageKind::RemoteData),
            Message::ScreenViewport(_) => Some(MessageKind::ScreenViewport),
            Message::ScreenDistance(_) => Some(MessageKind::ScreenDistance),
            Message::Unknown { .. } => None,
        }
    }

    /// Encode for the given profile. Returns `None` for unknown messages.
    pub fn encode(&self, profile: WireProfile) -> Option<Payload> {
        let kind = self.kind()?;

        if profile.is_binary() {
            let mut buf = vec![kind.tag()];
            match self {
                Message::RemoteData(frame) => buf.extend(frame.encode_binary(profile)),
                Message::ScreenViewport(_) | Message::ScreenDistance(_) => {
                    buf.extend(self.control_json()?.into_bytes())
                }
                _ => {}
            }
            Some(Payload::Binary(buf))
        } else {
            let body = match self {
                Message::RemoteData(frame) => frame.encode_text(),
                Message::ScreenViewport(_) | Message::ScreenDistance(_) => self.control_json()?,
                _ => String::new(),
            };
            Some(Payload::Text(format!("{kind}{MESSAGE_SEPARATOR}{body}")))
        }
    }

    fn control_json(&self) -> Option<String> {
        match self {
            Message::ScreenViewport(viewport) => Some(
                serde_json::json!({ "width": viewport.width, "height": viewport.height })
                    .to_string(),
            ),
            Message::ScreenDistance(distance) => Some(serde_json::Value::from(*distance).to_string()),
            _ => None,
        }
    }

    /// Decode any payload. Unknown kinds decode to [`Message::Unknown`].
    pub fn decode(payload: &Payload) -> Result<Self, DecodeError> {
        match payload {
            Payload::Text(text) => Self::decode_text(text),
            Payload::Binary(bytes) => Self::decode_binary(bytes),
        }
    }

    fn decode_text(text: &str) -> Result<Self, DecodeError> {
        if text.is_empty() {
            return Err(DecodeError::Empty);
        }

        let (name, body) = text.split_once(MESSAGE_SEPARATOR).unwrap_or((text, ""));
        match MessageKind::from_name(name) {
            Some(kind) => Self::decode_body(kind, body.as_bytes(), Some(body)),
            None => Ok(Message::Unknown {
                kind: name.to_string(),
            }),
        }
    }

    fn decode_binary(bytes: &[u8]) -> Result<Self, DecodeError> {
        let (&tag, body) = bytes.split_first().ok_or(DecodeError::Empty)?;
        match MessageKind::from_tag(tag) {
            Some(kind) => Self::decode_body(kind, body, None),
            None => Ok(Message::Unknown {
                kind: format!("0x{tag:02x}"),
            }),
        }
    }

    fn decode_body(kind: MessageKind, body: &[u8], text: Option<&str>) -> Result<Self, DecodeError> {
        match kind {
            MessageKind::Ping => Ok(Message::Ping),
            MessageKind::Pong => Ok(Message::Pong),
            MessageKind::RemoteData => match text {
                Some(text) => RemoteDataFrame::decode_text(text).map(Message::RemoteData),
                None => RemoteDataFrame::from_bytes(body).map(Message::RemoteData),
            },
            MessageKind::ScreenViewport => serde_json::from_slice::<Viewport>(body)
                .map(Message::ScreenViewport)
                .map_err(|e| DecodeError::InvalidJson(e.to_string())),
            MessageKind::ScreenDistance => serde_json::from_slice::<f64>(body)
                .map(Message::ScreenDistance)
                .map_err(|e| DecodeError::InvalidJson(e.to_string())),
        }
    }
}
