//! Runtime configuration.
//!
//! Protocol constants live in [`crate::core::constants`]; this module holds
//! the values a deployment may tune. Every section has defaults, so a TOML
//! file only needs the keys it changes:
//!
//! ```toml
//! server_url = "https://gymote.example.com"
//! profile = "binary"
//!
//! [connection]
//! liveness_timeout_ms = 15000
//!
//! [motion]
//! adaptive_smoothing = false
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::constants::{
    ANIMATION_FRAME_INTERVAL, DEFAULT_SMOOTHING_FACTOR, HEARTBEAT_INTERVAL, LAG_THRESHOLD,
    LIVENESS_TIMEOUT,
};
use crate::wire::WireProfile;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Connection timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Interval between PING messages.
    pub heartbeat_interval_ms: u64,
    /// Silence after which the connection times out.
    pub liveness_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: HEARTBEAT_INTERVAL.as_millis() as u64,
            liveness_timeout_ms: LIVENESS_TIMEOUT.as_millis() as u64,
        }
    }
}

impl ConnectionConfig {
    /// Heartbeat interval.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Liveness window.
    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_millis(self.liveness_timeout_ms)
    }
}

/// Motion pipeline tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Fixed smoothing factor, in (0, 1].
    pub smoothing_factor: f64,
    /// Derive the factor from the inbound frame delay on the screen.
    pub adaptive_smoothing: bool,
    /// Inter-frame delay that starts a lag episode.
    pub lag_threshold_ms: u64,
    /// Animation tick interval.
    pub animation_interval_ms: u64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            smoothing_factor: DEFAULT_SMOOTHING_FACTOR,
            adaptive_smoothing: true,
            lag_threshold_ms: LAG_THRESHOLD.as_millis() as u64,
            animation_interval_ms: ANIMATION_FRAME_INTERVAL.as_millis() as u64,
        }
    }
}

impl MotionConfig {
    /// Lag threshold.
    pub fn lag_threshold(&self) -> Duration {
        Duration::from_millis(self.lag_threshold_ms)
    }

    /// Animation tick interval.
    pub fn animation_interval(&self) -> Duration {
        Duration::from_millis(self.animation_interval_ms)
    }
}

/// Complete configuration of one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GymoteConfig {
    /// Base URL of the pairing service.
    pub server_url: String,
    /// Outbound wire encoding.
    pub profile: WireProfile,
    /// Connection timing.
    pub connection: ConnectionConfig,
    /// Motion pipeline tuning.
    pub motion: MotionConfig,
    /// Where the pairing record is persisted (in memory if unset).
    pub storage_path: Option<PathBuf>,
}

impl Default for GymoteConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:3000".to_string(),
            profile: WireProfile::default(),
            connection: ConnectionConfig::default(),
            motion: MotionConfig::default(),
            storage_path: None,
        }
    }
}

impl GymoteConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: GymoteConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let factor = self.motion.smoothing_factor;
        if !(factor > 0.0 && factor <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "smoothing_factor must be in (0, 1], got {factor}"
            )));
        }
        if self.connection.heartbeat_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "heartbeat_interval_ms must be positive".to_string(),
            ));
        }
        if self.connection.liveness_timeout_ms <= self.connection.heartbeat_interval_ms {
            return Err(ConfigError::Invalid(format!(
                "liveness_timeout_ms ({}) must exceed heartbeat_interval_ms ({})",
                self.connection.liveness_timeout_ms, self.connection.heartbeat_interval_ms
            )));
        }
        if self.motion.animation_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "animation_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`GymoteConfig`].
#[derive(Debug, Default)]
pub struct GymoteConfigBuilder {
    config: GymoteConfig,
}

impl GymoteConfigBuilder {
    /// Start from the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pairing service URL.
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.config.server_url = url.into();
        self
    }

    /// Set the outbound wire profile.
    pub fn profile(mut self, profile: WireProfile) -> Self {
        self.config.profile = profile;
        self
    }

    /// Set the heartbeat interval.
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.config.connection.heartbeat_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set the liveness window.
    pub fn liveness_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection.liveness_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the fixed smoothing factor.
    pub fn smoothing_factor(mut self, factor: f64) -> Self {
        self.config.motion.smoothing_factor = factor;
        self
    }

    /// Enable or disable delay-adaptive smoothing.
    pub fn adaptive_smoothing(mut self, enabled: bool) -> Self {
        self.config.motion.adaptive_smoothing = enabled;
        self
    }

    /// Persist the pairing record at `path`.
    pub fn storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.storage_path = Some(path.into());
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<GymoteConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
