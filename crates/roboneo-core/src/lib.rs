//! RoboNeo Core - Fundamental types and primitives
//!
//! This crate defines the types shared by every other RoboNeo crate:
//! - Pixel grids (FrameBuffer for the whole face, HalfImage per board)
//! - Monotonic time (Timestamp, MonotonicClock)
//! - The error taxonomy

pub mod clock;
pub mod error;
pub mod pixel;
pub mod time;

pub use clock::*;
pub use error::*;
pub use pixel::*;
pub use time::*;
