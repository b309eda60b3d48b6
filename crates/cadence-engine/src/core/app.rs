use winit::event::WindowEvent;

use crate::scheduler::FrameScheduler;

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Application contract implemented by hosts of a [`FrameScheduler`].
pub trait App {
    /// Called once, before the first frame is delivered.
    ///
    /// Register callbacks and call `scheduler.start()` here; the runtime
    /// never starts the scheduler on its own.
    fn start(&mut self, scheduler: &FrameScheduler);

    /// Called for window events when running with a window.
    fn on_window_event(&mut self, scheduler: &FrameScheduler, event: &WindowEvent) -> AppControl {
        let _ = (scheduler, event);
        AppControl::Continue
    }
}
