//! Frame primitives.
//!
//! A frame primitive is the host service that delivers "next frame"
//! notifications to the scheduler. The scheduler only ever sees the
//! [`FramePrimitive`] trait; hosts keep a clone of the concrete adapter to
//! pump it:
//! - [`ManualFrames`]: timestamps are fed by the host (tests, custom loops)
//! - [`TimerFrames`]: timer-paced fallback when no display is available

mod manual;
mod queue;
mod timer;

pub use manual::ManualFrames;
pub use timer::TimerFrames;

use crate::time::Timestamp;

/// One-shot handler invoked with the frame timestamp.
pub type FrameHandler = Box<dyn FnOnce(Timestamp)>;

/// Opaque token identifying a pending frame request.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct FrameHandle(u64);

impl FrameHandle {
    /// Wraps an adapter-specific request id.
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Source of "next frame" notifications.
///
/// Contract:
/// - `request_frame` invokes `handler` at most once, after the call returns,
///   with a timestamp that never decreases across deliveries.
/// - `cancel_frame` withdraws a request that has not been delivered yet.
///   Cancelling an unknown or already delivered handle does nothing.
pub trait FramePrimitive {
    fn request_frame(&mut self, handler: FrameHandler) -> FrameHandle;

    fn cancel_frame(&mut self, handle: FrameHandle);
}
