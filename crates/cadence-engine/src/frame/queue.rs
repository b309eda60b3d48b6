use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::rc::Rc;

use crate::time::Timestamp;

use super::{FrameHandle, FrameHandler};

/// Pending frame requests shared by every adapter.
pub(crate) struct FrameQueue {
    next_id: u64,
    pending: Vec<(FrameHandle, FrameHandler)>,
    last_timestamp: Timestamp,
}

pub(crate) type SharedQueue = Rc<RefCell<FrameQueue>>;

impl FrameQueue {
    pub(crate) fn shared() -> SharedQueue {
        Rc::new(RefCell::new(Self::default()))
    }

    pub(crate) fn request(&mut self, handler: FrameHandler) -> FrameHandle {
        let handle = FrameHandle(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.pending.push((handle, handler));
        handle
    }

    pub(crate) fn cancel(&mut self, handle: FrameHandle) {
        self.pending.retain(|(h, _)| *h != handle);
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn last_timestamp(&self) -> Timestamp {
        self.last_timestamp
    }
}

impl Default for FrameQueue {
    fn default() -> Self {
        Self {
            next_id: 1,
            pending: Vec::new(),
            last_timestamp: 0.0,
        }
    }
}

impl fmt::Debug for FrameQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameQueue")
            .field("next_id", &self.next_id)
            .field("pending", &self.pending.len())
            .field("last_timestamp", &self.last_timestamp)
            .finish()
    }
}

/// Delivers every request pending at call time and returns how many ran.
///
/// Handlers are taken out of the queue before any of them runs, so a handler
/// that requests another frame lands in the next delivery, not this one.
pub(crate) fn deliver(queue: &SharedQueue, timestamp: Timestamp) -> usize {
    let (handlers, timestamp) = {
        let mut q = queue.borrow_mut();
        if timestamp < q.last_timestamp {
            log::warn!(
                "frame timestamp went backwards ({timestamp} < {}); clamping",
                q.last_timestamp
            );
        }
        q.last_timestamp = q.last_timestamp.max(timestamp);
        (mem::take(&mut q.pending), q.last_timestamp)
    };

    let count = handlers.len();
    for (_, handler) in handlers {
        handler(timestamp);
    }
    count
}
