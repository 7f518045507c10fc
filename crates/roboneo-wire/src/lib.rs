//! RoboNeo Wire Protocol - Serial link framing
//!
//! This crate implements the half-image link between the two boards:
//! - Header marker (resynchronisation point)
//! - Fixed-length RGB payload (one 16×16 half-image)
//! - Truncated SHA-256 tag over the payload
//!
//! There is no length field. Framing relies entirely on the marker and the
//! fixed sizes, so the decoder tolerates arbitrary byte loss or insertion.

pub mod codec;
pub mod decoder;
pub mod frame;

pub use codec::*;
pub use decoder::*;
pub use frame::*;
