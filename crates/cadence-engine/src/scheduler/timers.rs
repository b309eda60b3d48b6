use crate::time::Timestamp;

use super::callback::{FrameCallback, FrameControl};
use super::frame_scheduler::FrameScheduler;

impl FrameScheduler {
    /// Runs `action` once, on the first tick at least `delay_ms` after the
    /// current scheduler time.
    ///
    /// Time is the scheduler's frame clock: nothing fires while the
    /// scheduler is stopped. The returned handle cancels the timeout through
    /// [`remove_callback`](Self::remove_callback); after firing, the timeout
    /// removes itself.
    pub fn schedule_timeout<F>(&self, action: F, delay_ms: f64) -> FrameCallback
    where
        F: FnOnce() + 'static,
    {
        let baseline = self.time();
        let mut action = Some(action);

        self.add_callback(FrameCallback::with_control(move |t: Timestamp| {
            if t - baseline >= delay_ms {
                if let Some(action) = action.take() {
                    action();
                }
                FrameControl::Remove
            } else {
                FrameControl::Continue
            }
        }))
    }

    /// Runs `action` on every tick at least `period_ms` after the previous
    /// firing (or after registration, for the first one).
    ///
    /// The period is measured from the tick that last fired, not from a
    /// fixed schedule, so late frames push later firings back instead of
    /// causing catch-up bursts. Runs until removed with
    /// [`remove_callback`](Self::remove_callback).
    pub fn schedule_interval<F>(&self, mut action: F, period_ms: f64) -> FrameCallback
    where
        F: FnMut() + 'static,
    {
        let mut baseline = self.time();

        self.add(move |t| {
            if t - baseline >= period_ms {
                // Reset first so a panicking action waits a full period.
                baseline = t;
                action();
            }
        })
    }
}
