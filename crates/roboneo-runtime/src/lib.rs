//! RoboNeo Runtime - Expression control and the per-board main loop
//!
//! Per render tick on the primary:
//! 1. Read the monotonic clock
//! 2. Lock the controller and fetch the active expression's frame
//! 3. Show the face on the local panel
//! 4. Publish the right half to the link sender
//!
//! Trigger events are applied by a separate consumer under the same lock.
//! The secondary only mirrors half-images from the link.

pub mod app;
pub mod config;
pub mod controller;
pub mod display;
pub mod trigger;

pub use app::*;
pub use config::*;
pub use controller::*;
pub use display::*;
pub use trigger::*;
