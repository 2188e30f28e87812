//! Error types for Gymote.

use thiserror::Error;

use crate::config::ConfigError;
use crate::pairing::{PairingError, StoreError};
use crate::transport::TransportError;

/// Errors that can occur when decoding a wire message or frame.
///
/// A decode error never ends a session: the frame is dropped and the loop
/// continues with the next one.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Payload was empty.
    #[error("empty payload")]
    Empty,

    /// Buffer shorter than the layout requires.
    #[error("unexpected end of data: expected {expected} bytes, got {actual}")]
    UnexpectedEof {
        /// Minimum expected size.
        expected: usize,
        /// Actual size received.
        actual: usize,
    },

    /// Binary frame with a length matching no known layout.
    #[error("invalid frame length: {0} bytes")]
    InvalidLength(usize),

    /// A text field could not be parsed.
    #[error("invalid {field} field: {value:?}")]
    InvalidField {
        /// Name of the field.
        field: &'static str,
        /// Raw field text.
        value: String,
    },

    /// Control message payload was not valid JSON for its kind.
    #[error("invalid control payload: {0}")]
    InvalidJson(String),
}

/// Top-level Gymote errors.
#[derive(Debug, Error)]
pub enum GymoteError {
    /// Wire decoding error.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Pairing error.
    #[error("pairing error: {0}")]
    Pairing(#[from] PairingError),

    /// Pairing storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for Gymote operations.
pub type GymoteResult<T> = Result<T, GymoteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_display() {
        let err = DecodeError::UnexpectedEof {
            expected: 8,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "unexpected end of data: expected 8 bytes, got 3"
        );

        let err = DecodeError::InvalidField {
            field: "x",
            value: "abc".to_string(),
        };
        assert_eq!(err.to_string(), "invalid x field: \"abc\"");
    }

    #[test]
    fn test_gymote_error_from_decode() {
        let err: GymoteError = DecodeError::Empty.into();
        assert!(matches!(err, GymoteError::Decode(DecodeError::Empty)));
    }
}
