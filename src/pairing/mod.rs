//! Pairing of one remote with one screen.
//!
//! - [`Pairing`]: the code/hash/device record
//! - [`PairingService`]: the remote code-issuance collaborator
//! - [`PairingStore`]: persistence of the serialized record
//! - [`PairingManager`]: the lifecycle on top of both

mod manager;
mod record;
mod service;
mod store;

use thiserror::Error;

pub use manager::PairingManager;
pub use record::{Device, Pairing};
#[cfg(feature = "http")]
pub use service::HttpPairingService;
pub use service::{CodeResponse, PairingService};
pub use store::{FileStore, MemoryStore, PairingStore, StoreError};

#[cfg(test)]
pub(crate) use manager::tests::MockService;

/// Pairing errors.
#[derive(Debug, Error)]
pub enum PairingError {
    /// The pairing service could not be reached or answered garbage.
    #[error("pairing request failed: {0}")]
    RequestFailed(String),

    /// The service knows no pairing for this code.
    #[error("invalid pairing code: {0:?}")]
    InvalidCode(String),

    /// A stored record could not be read or written.
    #[error("invalid stored pairing: {0}")]
    InvalidStoredPairing(String),

    /// The store failed.
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl PairingError {
    /// Whether retrying the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PairingError::RequestFailed(_))
    }
}
