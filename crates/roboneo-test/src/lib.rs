//! RoboNeo Test Harness - Link noise simulation and end-to-end validation
//!
//! This crate provides:
//! - A seeded noisy serial line (drops, flips, garbage bursts, read splits)
//! - A codec-to-decoder link harness checking the resync invariants
//! - End-to-end tests across the anim, link and runtime crates

pub mod integration;
pub mod noise;

pub use integration::*;
pub use noise::*;
