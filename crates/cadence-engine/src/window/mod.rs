//! Host runtime.
//!
//! Picks a frame source for the scheduler: a `winit` window paced at the
//! monitor refresh rate when a display is available, a headless timer loop
//! otherwise.

mod runtime;

pub use runtime::{FrameSourcePreference, Runtime, RuntimeConfig};
