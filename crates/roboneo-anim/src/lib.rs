//! RoboNeo Animation - Expression playback
//!
//! An expression's animation is a looping frame sequence played at a fixed
//! per-frame delay against a monotonic timeline.
//!
//! # Playback Modes
//!
//! - Cached: every frame is decoded up front (short animations)
//! - Streaming: frames are decoded on demand from a re-openable source
//!
//! Both modes produce the same frame for the same instant: the index is
//! `floor((now - start) / delay) mod frame_count`, however often the
//! player is polled.

pub mod gif_source;
pub mod memory;
pub mod player;
pub mod ppm;
pub mod source;

pub use gif_source::*;
pub use memory::*;
pub use player::*;
pub use ppm::*;
pub use source::*;
