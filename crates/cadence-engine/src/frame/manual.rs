use crate::time::Timestamp;

use super::queue::{deliver, FrameQueue, SharedQueue};
use super::{FrameHandle, FrameHandler, FramePrimitive};

/// Frame primitive driven by host-supplied timestamps.
///
/// Clones share the same request queue: hand one clone to the scheduler and
/// keep another to call [`ManualFrames::fire`] from the host loop.
///
/// ```rust
/// use cadence_engine::frame::ManualFrames;
/// use cadence_engine::scheduler::FrameScheduler;
///
/// let frames = ManualFrames::new();
/// let scheduler = FrameScheduler::new(frames.clone());
/// scheduler.start();
/// assert_eq!(frames.fire(16.0), 1);
/// assert_eq!(scheduler.time(), 16.0);
/// ```
#[derive(Debug, Clone)]
pub struct ManualFrames {
    queue: SharedQueue,
}

impl ManualFrames {
    pub fn new() -> Self {
        Self {
            queue: FrameQueue::shared(),
        }
    }

    /// Delivers all pending requests with `timestamp`.
    ///
    /// Returns the number of handlers invoked. Timestamps lower than a
    /// previous delivery are clamped up to it.
    pub fn fire(&self, timestamp: Timestamp) -> usize {
        deliver(&self.queue, timestamp)
    }

    pub fn has_pending(&self) -> bool {
        self.pending() > 0
    }

    /// Number of requests waiting for the next [`fire`](Self::fire).
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Timestamp of the most recent delivery.
    pub fn last_timestamp(&self) -> Timestamp {
        self.queue.borrow().last_timestamp()
    }
}

impl Default for ManualFrames {
    fn default() -> Self {
        Self::new()
    }
}

impl FramePrimitive for ManualFrames {
    fn request_frame(&mut self, handler: FrameHandler) -> FrameHandle {
        self.queue.borrow_mut().request(handler)
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        self.queue.borrow_mut().cancel(handle);
    }
}
