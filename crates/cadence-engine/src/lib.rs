//! Cadence engine crate.
//!
//! Frame-synchronized callback scheduling: a scheduler that runs registered
//! callbacks once per frame, timeouts and intervals measured on the
//! scheduler's frame clock, and the host pieces that deliver frames.

pub mod frame;
pub mod scheduler;
pub mod time;

pub mod core;
pub mod logging;
pub mod window;
