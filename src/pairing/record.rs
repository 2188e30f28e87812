//! The pairing record and its persisted form.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use super::PairingError;

/// Which side of a pairing this device is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Device {
    /// The controller.
    #[serde(rename = "remote")]
    Remote,
    /// The display.
    #[serde(rename = "screen", alias = "desktop")]
    Screen,
    /// Not yet known, e.g. a record reconstructed without a device field.
    #[default]
    #[serde(rename = "")]
    Unset,
}

impl Device {
    /// Record value of this device.
    pub fn as_str(self) -> &'static str {
        match self {
            Device::Remote => "remote",
            Device::Screen => "screen",
            Device::Unset => "",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity linking one remote and one screen.
///
/// `hash` doubles as the transport pair token. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pairing {
    /// Side of the pairing this device plays.
    #[serde(default)]
    pub device: Device,
    /// Shared secret both devices connect with.
    pub hash: String,
    /// Short human-enterable code.
    #[serde(deserialize_with = "code_from_string_or_number")]
    pub code: String,
}

impl Pairing {
    /// Create a pairing.
    pub fn new(code: impl Into<String>, hash: impl Into<String>, device: Device) -> Self {
        Self {
            device,
            hash: hash.into(),
            code: code.into(),
        }
    }

    /// Transport pair token.
    pub fn token(&self) -> &str {
        &self.hash
    }

    /// Serialize to the persisted JSON record.
    pub fn to_record(&self) -> Result<String, PairingError> {
        serde_json::to_string(self).map_err(|e| PairingError::InvalidStoredPairing(e.to_string()))
    }

    /// Parse a persisted JSON record.
    pub fn from_record(record: &str) -> Result<Self, PairingError> {
        let pairing: Pairing = serde_json::from_str(record)
            .map_err(|e| PairingError::InvalidStoredPairing(e.to_string()))?;
        if pairing.hash.is_empty() {
            return Err(PairingError::InvalidStoredPairing(
                "record has an empty hash".to_string(),
            ));
        }
        Ok(pairing)
    }
}

impl fmt::Display for Pairing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pairing {} ({})", self.code, self.device)
    }
}

/// Pairing servers have issued codes both as JSON strings and as numbers.
pub(crate) fn code_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Code {
        Text(String),
        Number(u64),
    }

    Ok(match Code::deserialize(deserializer)? {
        Code::Text(text) => text,
        Code::Number(number) => number.to_string(),
    })
}
