//! Wire format for motion frames and control messages.
//!
//! - [`RemoteDataFrame`]: the per-tick motion sample and its three layouts
//! - [`Message`]: the tagged envelope with a single decode entry point
//! - [`Payload`]: what transports actually carry

mod frame;
mod message;

pub use frame::{RemoteDataFrame, WireProfile, clamp_i16};
pub use message::{Message, MessageKind, Payload, Viewport};
