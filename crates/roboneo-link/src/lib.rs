//! RoboNeo Link - Board-to-board serial transport
//!
//! This crate provides:
//! - Serial device opening
//! - Sender role: timed, fire-and-forget half-image frames
//! - Receiver role: bounded-time reads, resync decoding, delivery to a sink

pub mod serial;
pub mod session;

pub use serial::*;
pub use session::*;
