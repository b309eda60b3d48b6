//! Time subsystem.
//!
//! Provides the millisecond timestamps handed to frame callbacks.
//! Intended usage:
//! - one `FrameClock` per frame source
//! - call `now_ms()` when a frame is delivered to obtain its `Timestamp`

mod frame_clock;

pub use frame_clock::{frame_interval_for_refresh, FrameClock, Timestamp, DEFAULT_FRAME_INTERVAL};
