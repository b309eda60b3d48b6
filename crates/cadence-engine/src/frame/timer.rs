use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::time::{FrameClock, Timestamp, DEFAULT_FRAME_INTERVAL};

use super::queue::{deliver, FrameQueue, SharedQueue};
use super::{FrameHandle, FrameHandler, FramePrimitive};

#[derive(Debug)]
struct Pacing {
    clock: FrameClock,
    interval: Duration,
    last_delivery: Option<Instant>,
}

/// Timer-paced frame primitive.
///
/// Stands in for a display-synchronized "next frame" service: requests are
/// delivered no sooner than `interval` after the previous delivery, so the
/// wait for a request is `max(0, interval - (now - last))`. The first
/// delivery is due immediately.
///
/// The host pumps it with [`fire_due`](Self::fire_due), or hands control to
/// [`run_blocking`](Self::run_blocking).
#[derive(Debug, Clone)]
pub struct TimerFrames {
    queue: SharedQueue,
    pacing: Rc<RefCell<Pacing>>,
}

impl TimerFrames {
    /// Creates a primitive paced at `DEFAULT_FRAME_INTERVAL`.
    pub fn new() -> Self {
        Self::with_interval(DEFAULT_FRAME_INTERVAL)
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self::with_clock(FrameClock::new(), interval)
    }

    /// Creates a primitive reading timestamps from `clock`.
    pub fn with_clock(clock: FrameClock, interval: Duration) -> Self {
        Self {
            queue: FrameQueue::shared(),
            pacing: Rc::new(RefCell::new(Pacing {
                clock,
                interval,
                last_delivery: None,
            })),
        }
    }

    pub fn interval(&self) -> Duration {
        self.pacing.borrow().interval
    }

    /// Changes the pacing interval; takes effect for the next deadline.
    pub fn set_interval(&self, interval: Duration) {
        self.pacing.borrow_mut().interval = interval;
    }

    pub fn has_pending(&self) -> bool {
        self.queue.borrow().len() > 0
    }

    /// Instant at which pending requests become due, if any are pending.
    pub fn next_deadline(&self) -> Option<Instant> {
        if !self.has_pending() {
            return None;
        }
        Some(self.deadline_from(Instant::now()))
    }

    /// Delivers pending requests if they are due at `now`.
    ///
    /// Returns the number of handlers invoked.
    pub fn fire_due(&self, now: Instant) -> usize {
        if !self.has_pending() || self.deadline_from(now) > now {
            return 0;
        }

        let timestamp: Timestamp = {
            let mut pacing = self.pacing.borrow_mut();
            pacing.last_delivery = Some(now);
            pacing.clock.at(now)
        };

        deliver(&self.queue, timestamp)
    }

    /// Sleeps until each deadline and delivers, until nothing is pending.
    ///
    /// A scheduler driven by this primitive keeps the loop alive while it is
    /// running; stopping it ends the loop after the current delivery.
    pub fn run_blocking(&self) {
        while let Some(deadline) = self.next_deadline() {
            let now = Instant::now();
            if deadline > now {
                std::thread::sleep(deadline - now);
            }
            self.fire_due(Instant::now());
        }
    }

    fn deadline_from(&self, now: Instant) -> Instant {
        let pacing = self.pacing.borrow();
        match pacing.last_delivery {
            Some(last) => last + pacing.interval,
            None => now,
        }
    }
}

impl Default for TimerFrames {
    fn default() -> Self {
        Self::new()
    }
}

impl FramePrimitive for TimerFrames {
    fn request_frame(&mut self, handler: FrameHandler) -> FrameHandle {
        self.queue.borrow_mut().request(handler)
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        self.queue.borrow_mut().cancel(handle);
    }
}
