//! Core constants, errors and events shared by every layer.

pub mod constants;
pub mod error;
pub mod events;

pub use constants::*;
pub use error::*;
pub use events::*;
