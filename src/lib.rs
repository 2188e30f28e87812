//! # Gymote
//!
//! Use a phone as a real-time pointer for a second screen.
//!
//! One device, the **remote**, samples pointer, click and touch state and
//! streams it to the other, the **screen**, over a paired low-latency
//! transport. The screen smooths the noisy, intermittently delayed samples
//! into stable pointer events.
//!
//! - **Pairing**: a short code shown on the screen, exchanged for a shared
//!   hash that both devices connect with
//! - **Liveness**: PING heartbeat and a liveness window on every connection
//! - **Wire format**: compact text or 8/10-byte binary motion frames
//! - **Smoothing**: per-axis exponential filter with a delay-adaptive factor
//!   and lag episode detection
//!
//! ## Feature Flags
//!
//! - `udp` (default): UDP datagram transport
//! - `http` (default): HTTP pairing service client
//! - `runtime` (default): tokio driver owning a role
//!
//! ## Modules
//!
//! - [`core`]: constants, errors and application events
//! - [`config`]: tunables, loadable from TOML
//! - [`wire`]: frames and tagged messages
//! - [`motion`]: smoothing, lag detection, screen and remote pipelines
//! - [`pairing`]: pairing records, service, store and manager
//! - [`transport`]: transports, timers and the connection state machine
//! - [`roles`]: [`GymoteScreen`] and [`GymoteRemote`]
//! - [`runtime`]: async driver (requires `runtime`)
//!
//! ## Example Usage
//!
//! Everything below the driver is sans-IO: every input carries the current
//! time, so a whole session can be stepped by hand.
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Instant;
//!
//! use gymote::prelude::*;
//!
//! # struct FixedService;
//! # #[async_trait::async_trait]
//! # impl PairingService for FixedService {
//! #     async fn request_code(&self) -> Result<CodeResponse, PairingError> {
//! #         Ok(CodeResponse { code: "1".into(), hash: "h".into() })
//! #     }
//! #     async fn validate_code(&self, _: &str) -> Result<CodeResponse, PairingError> {
//! #         self.request_code().await
//! #     }
//! #     async fn validate_pairing(&self, _: &Pairing) -> Result<bool, PairingError> {
//! #         Ok(true)
//! #     }
//! # }
//! let manager = PairingManager::new(Arc::new(FixedService), Arc::new(MemoryStore::new()));
//! let ((screen_end, _), (remote_end, _)) = LoopbackTransport::pair();
//!
//! let mut screen = GymoteScreen::new(GymoteConfig::default(), manager.clone(), screen_end);
//! let mut remote = GymoteRemote::new(GymoteConfig::default(), manager, remote_end);
//!
//! let pairing = Pairing::new("1", "h", Device::Screen);
//! screen.connect(pairing.clone());
//! remote.connect(pairing);
//!
//! let now = Instant::now();
//! screen.handle_transport_event(TransportEvent::Connected, now);
//! remote.handle_transport_event(TransportEvent::Connected, now);
//! assert!(screen.is_connected() && remote.is_connected());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

pub mod config;
pub mod motion;
pub mod pairing;
pub mod roles;
pub mod transport;
pub mod wire;

// Async driver (feature-gated)
#[cfg(feature = "runtime")]
#[cfg_attr(docsrs, doc(cfg(feature = "runtime")))]
pub mod runtime;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{GymoteConfig, GymoteConfigBuilder};
    pub use crate::core::{DecodeError, Event, GymoteError, GymoteResult};
    pub use crate::pairing::{
        CodeResponse, Device, FileStore, MemoryStore, Pairing, PairingError, PairingManager,
        PairingService, PairingStore,
    };
    pub use crate::roles::{Gymote, GymoteRemote, GymoteScreen, Role};
    pub use crate::transport::{
        Connection, ConnectionPhase, LoopbackTransport, Transport, TransportError, TransportEvent,
    };
    pub use crate::wire::{Message, Payload, RemoteDataFrame, Viewport, WireProfile};

    #[cfg(feature = "http")]
    pub use crate::pairing::HttpPairingService;

    #[cfg(feature = "udp")]
    pub use crate::transport::UdpTransport;

    #[cfg(feature = "runtime")]
    pub use crate::runtime::{Driver, DriverHandle};
}

// Re-export commonly used items at crate root
pub use config::GymoteConfig;
pub use core::{DecodeError, Event, GymoteError, GymoteResult};
pub use pairing::{Device, Pairing, PairingManager};
pub use roles::{GymoteRemote, GymoteScreen, Role};
pub use transport::{LoopbackTransport, Transport, TransportEvent};
pub use wire::{Message, RemoteDataFrame, WireProfile};
