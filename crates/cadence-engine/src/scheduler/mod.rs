//! Frame-synchronized callback scheduler.
//!
//! [`FrameScheduler`] runs every registered [`FrameCallback`] once per frame
//! delivered by a [`FramePrimitive`](crate::frame::FramePrimitive), and builds
//! timeouts and intervals on its own frame clock instead of system timers.
//!
//! Callbacks may add or remove callbacks (including themselves) and start or
//! stop the scheduler while a tick is running:
//! - additions are first invoked on the next tick
//! - removals take effect immediately, even for callbacks later in the tick
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use cadence_engine::frame::ManualFrames;
//! use cadence_engine::scheduler::FrameScheduler;
//!
//! let frames = ManualFrames::new();
//! let scheduler = FrameScheduler::new(frames.clone());
//!
//! let fired = Rc::new(Cell::new(false));
//! let flag = fired.clone();
//! scheduler.schedule_timeout(move || flag.set(true), 100.0);
//! scheduler.start();
//!
//! frames.fire(50.0);
//! assert!(!fired.get());
//! frames.fire(100.0);
//! assert!(fired.get());
//! assert!(scheduler.is_empty());
//! ```

mod callback;
mod config;
mod frame_scheduler;
mod timers;

pub use callback::{FrameCallback, FrameControl};
pub use config::{PanicPolicy, SchedulerConfig};
pub use frame_scheduler::{FrameScheduler, WeakScheduler};
